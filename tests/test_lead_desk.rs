//! Lead desk integration tests
//!
//! Background processing, concurrent intake, status actions racing with the
//! pipeline, and the follow-up queue.

use chrono::{Duration as ChronoDuration, Utc};
use futures::future::join_all;
use lead_intake::config::{DeskConfig, FollowUpConfig};
use lead_intake::desk::{follow_up_due, LeadDesk};
use lead_intake::error::LeadError;
use lead_intake::lead::{Lead, LeadStatus};
use lead_intake::observability::metrics::metrics;
use lead_intake::pipeline::LeadPipeline;
use lead_intake::testing::{sample_follow_up_answer, sample_model_answer, MockLlmProvider, MockReply};
use lead_intake::tools::builtin::configured_price_table;
use lead_intake::tools::ToolSystem;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CONFIG: &str = r#"
[desk]
id = "desk-test"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[tools]
find_providers = "builtin"
score_lead_priority = "builtin"

[tools.get_base_price]
impl = "builtin"

[tools.get_base_price.config.prices]
salon = 600

[followup]
customer_after_hours = 24
provider_after_hours = 48
"#;

async fn desk_with(provider: MockLlmProvider) -> LeadDesk {
    let config = DeskConfig::from_toml_str(CONFIG).unwrap();
    let mut tools = ToolSystem::new();
    tools.initialize(&config.tools).await.unwrap();
    let pipeline = LeadPipeline::new(Arc::new(provider), Arc::new(tools), &config);
    LeadDesk::new(
        Arc::new(pipeline),
        config.followup.clone(),
        configured_price_table(&config.tools).unwrap(),
    )
}

/// Poll until the lead leaves processing
async fn wait_until_processed(desk: &LeadDesk, id: Uuid) -> Lead {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let lead = desk.get(id).await.unwrap();
            if !lead.is_processing() {
                return lead;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("lead should finish processing")
}

#[tokio::test]
async fn test_enqueue_returns_processing_lead_then_completes() {
    let provider = MockLlmProvider::single_response(sample_model_answer("WAITING_CUSTOMER"))
        .with_delay(Duration::from_millis(50));
    let desk = desk_with(provider).await;

    let lead = desk
        .enqueue("Priya Singh", "Birthday decoration in Gaya tomorrow")
        .await
        .unwrap();
    assert!(lead.is_processing());
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(desk.stats().await.processing, 1);

    let processed = wait_until_processed(&desk, lead.id).await;
    assert_eq!(processed.status, LeadStatus::WaitingCustomer);
    assert!(processed.result().is_some());
    assert_eq!(desk.stats().await.processing, 0);
}

#[tokio::test]
async fn test_enqueue_failure_is_recorded_on_lead() {
    let desk = desk_with(MockLlmProvider::with_failure()).await;

    let lead = desk.enqueue("Amit", "need plumber").await.unwrap();
    let processed = wait_until_processed(&desk, lead.id).await;

    assert!(processed.error().is_some());
    assert_eq!(processed.status, LeadStatus::New);
    assert_eq!(desk.stats().await.failed, 1);
}

#[tokio::test]
async fn test_concurrent_submissions_are_all_stored() {
    let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
        "WAITING_CUSTOMER",
    )))
    .await;

    let submissions = (0..10).map(|i| {
        let desk = desk.clone();
        async move {
            desk.submit(&format!("Customer {i}"), &format!("Request number {i}"))
                .await
        }
    });
    let leads: Vec<Lead> = join_all(submissions)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(leads.len(), 10);
    assert_eq!(desk.list().await.len(), 10);
    assert!(leads
        .iter()
        .all(|lead| lead.status == LeadStatus::WaitingCustomer));

    let mut ids: Vec<Uuid> = leads.iter().map(|l| l.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
        "WAITING_CUSTOMER",
    )))
    .await;

    let first = desk.submit("First", "one").await.unwrap();
    let second = desk.submit("Second", "two").await.unwrap();

    let leads = desk.list().await;
    assert_eq!(leads[0].id, second.id);
    assert_eq!(leads[1].id, first.id);
}

#[tokio::test]
async fn test_close_during_processing_wins() {
    let provider = MockLlmProvider::single_response(sample_model_answer("WAITING_CUSTOMER"))
        .with_delay(Duration::from_millis(100));
    let desk = desk_with(provider).await;

    let lead = desk.enqueue("Neha", "Mehendi for Sunday").await.unwrap();
    let closed = desk.close(lead.id).await.unwrap();
    assert_eq!(closed.status, LeadStatus::Closed);

    let processed = wait_until_processed(&desk, lead.id).await;
    assert_eq!(processed.status, LeadStatus::Closed);
    assert!(processed.result().is_some());
}

#[tokio::test]
async fn test_close_during_follow_up_wins() {
    let provider = MockLlmProvider::new(vec![
        MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
        MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
        MockReply::Text(sample_follow_up_answer("Still need the mehendi artist?", "WAITING_CUSTOMER")),
        MockReply::Text(sample_follow_up_answer("Still need the mehendi artist?", "WAITING_CUSTOMER")),
    ])
    .with_delay(Duration::from_millis(50));
    let desk = desk_with(provider).await;
    let lead = desk.submit("Neha", "Mehendi for Sunday").await.unwrap();

    let follow_up = tokio::spawn({
        let desk = desk.clone();
        async move { desk.generate_follow_up(lead.id).await }
    });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let closed = desk.close(lead.id).await.unwrap();
    assert_eq!(closed.status, LeadStatus::Closed);

    let drafted = follow_up.await.unwrap().unwrap();
    assert_eq!(drafted.status, LeadStatus::Closed);
    let stored = desk.get(lead.id).await.unwrap();
    assert_eq!(stored.status, LeadStatus::Closed);
    assert_eq!(
        stored.result().unwrap().follow_up_message.as_deref(),
        Some("Still need the mehendi artist?")
    );
}

#[tokio::test]
async fn test_mark_followed_up_rejected_until_processed() {
    let provider = MockLlmProvider::single_response(sample_model_answer("WAITING_CUSTOMER"))
        .with_delay(Duration::from_millis(50));
    let desk = desk_with(provider).await;

    let lead = desk.enqueue("Kiran", "photographer").await.unwrap();
    let err = desk.mark_followed_up(lead.id).await.unwrap_err();
    assert!(matches!(err, LeadError::InvalidTransition { .. }));
    assert!(err.to_string().contains("PROCESSING"));

    let processed = wait_until_processed(&desk, lead.id).await;
    assert_eq!(processed.status, LeadStatus::WaitingCustomer);
    let marked = desk.mark_followed_up(lead.id).await.unwrap();
    assert_eq!(marked.status, LeadStatus::FollowedUp);
}

#[tokio::test]
async fn test_mark_followed_up_rejected_for_failed_lead() {
    let desk = desk_with(MockLlmProvider::with_failure()).await;
    let lead = desk.submit("Amit", "need plumber").await.unwrap();

    let err = desk.mark_followed_up(lead.id).await.unwrap_err();
    assert!(err.to_string().contains("FAILED"));
    assert_eq!(desk.get(lead.id).await.unwrap().status, LeadStatus::New);
}

#[tokio::test]
async fn test_followed_up_status_survives_late_first_result() {
    let provider = MockLlmProvider::single_response(sample_model_answer("WAITING_CUSTOMER"))
        .with_delay(Duration::from_millis(100));
    let desk = desk_with(provider).await;

    let lead = desk.enqueue("Sita", "decoration").await.unwrap();
    desk.store()
        .update(lead.id, |lead| lead.status = LeadStatus::FollowedUp)
        .await;

    let processed = wait_until_processed(&desk, lead.id).await;
    assert_eq!(processed.status, LeadStatus::FollowedUp);
    assert!(processed.result().is_some());
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_follow_up_actions() {
    let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
        "WAITING_CUSTOMER",
    )))
    .await;
    let lead = desk.submit("Ravi", "cleaning").await.unwrap();

    let closed = desk.close(lead.id).await.unwrap();
    let again = desk.close(lead.id).await.unwrap();
    assert_eq!(closed.status, LeadStatus::Closed);
    assert_eq!(again.updated_at, closed.updated_at);

    let err = desk.mark_followed_up(lead.id).await.unwrap_err();
    assert!(matches!(err, LeadError::InvalidTransition { .. }));
    assert_eq!(err.status_code(), 409);

    let err = desk.generate_follow_up(lead.id).await.unwrap_err();
    assert!(err.to_string().contains("CLOSED"));
}

#[tokio::test]
async fn test_follow_up_rejected_while_processing() {
    let provider = MockLlmProvider::single_response(sample_model_answer("WAITING_CUSTOMER"))
        .with_delay(Duration::from_millis(100));
    let desk = desk_with(provider).await;

    let lead = desk.enqueue("Kiran", "photographer").await.unwrap();
    let err = desk.generate_follow_up(lead.id).await.unwrap_err();
    assert!(err.to_string().contains("PROCESSING"));

    wait_until_processed(&desk, lead.id).await;
}

#[tokio::test]
async fn test_follow_up_failure_leaves_lead_untouched() {
    let desk = desk_with(MockLlmProvider::new(vec![
        MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
        MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
        MockReply::Fail(lead_intake::llm::provider::LlmError::NetworkError(
            "connection reset".to_string(),
        )),
    ]))
    .await;

    let lead = desk.submit("Sita", "decoration").await.unwrap();
    let before = metrics().get_metrics().follow_ups.failed;

    let err = desk.generate_follow_up(lead.id).await.unwrap_err();
    assert!(matches!(err, LeadError::LlmError { .. }));
    assert!(metrics().get_metrics().follow_ups.failed > before);

    let after = desk.get(lead.id).await.unwrap();
    assert_eq!(after.status, LeadStatus::WaitingCustomer);
    assert_eq!(after.result(), lead.result());
}

#[tokio::test]
async fn test_follow_up_keeps_summary_when_model_sends_none() {
    let answer = serde_json::json!({
        "follow_up_message": "Hi! Still need the decorator?",
        "new_status": "FOLLOWED_UP",
        "summary": ""
    })
    .to_string();
    let desk = desk_with(MockLlmProvider::new(vec![
        MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
        MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
        MockReply::Text(answer.clone()),
        MockReply::Text(answer),
    ]))
    .await;

    let lead = desk.submit("Sita", "decoration").await.unwrap();
    let original_summary = lead.result().unwrap().summary.clone();

    let updated = desk.generate_follow_up(lead.id).await.unwrap();
    let result = updated.result().unwrap();
    assert_eq!(updated.status, LeadStatus::FollowedUp);
    assert_eq!(result.summary, original_summary);
    assert_eq!(
        result.follow_up_message.as_deref(),
        Some("Hi! Still need the decorator?")
    );
}

#[tokio::test]
async fn test_follow_up_message_generation_then_mark_sent() {
    let desk = desk_with(MockLlmProvider::new(vec![
        MockReply::Text(sample_model_answer("WAITING_PROVIDER")),
        MockReply::Text(sample_model_answer("WAITING_PROVIDER")),
        MockReply::Text(sample_follow_up_answer("Any update on availability?", "WAITING_PROVIDER")),
        MockReply::Text(sample_follow_up_answer("Any update on availability?", "WAITING_PROVIDER")),
    ]))
    .await;

    let lead = desk.submit("Decor Studio", "I do decorations in Gaya").await.unwrap();
    let drafted = desk.generate_follow_up(lead.id).await.unwrap();
    assert_eq!(drafted.status, LeadStatus::WaitingProvider);

    let sent = desk.mark_followed_up(lead.id).await.unwrap();
    assert_eq!(sent.status, LeadStatus::FollowedUp);
    assert_eq!(
        sent.result().unwrap().follow_up_message.as_deref(),
        Some("Any update on availability?")
    );
}

#[tokio::test]
async fn test_due_follow_ups_sorted_oldest_first() {
    let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
        "WAITING_CUSTOMER",
    )))
    .await;

    let a = desk.submit("A", "first").await.unwrap();
    let b = desk.submit("B", "second").await.unwrap();
    let c = desk.submit("C", "third").await.unwrap();

    let now = Utc::now();
    desk.store()
        .update(a.id, |lead| lead.last_reply_at = Some(now - ChronoDuration::hours(30)))
        .await;
    desk.store()
        .update(b.id, |lead| lead.last_reply_at = Some(now - ChronoDuration::hours(50)))
        .await;
    desk.store()
        .update(c.id, |lead| lead.last_reply_at = Some(now - ChronoDuration::hours(2)))
        .await;

    let due: Vec<Uuid> = desk.due_follow_ups(now).await.iter().map(|l| l.id).collect();
    assert_eq!(due, vec![b.id, a.id]);
}

#[test]
fn test_provider_threshold_is_longer() {
    let thresholds = FollowUpConfig::default();
    let now = Utc::now();
    let mut lead = Lead::new("Decor Studio", "I am a decorator");
    lead.status = LeadStatus::WaitingProvider;
    lead.last_reply_at = Some(now - ChronoDuration::hours(30));

    assert!(!follow_up_due(&lead, now, &thresholds));
    lead.last_reply_at = Some(now - ChronoDuration::hours(48));
    assert!(follow_up_due(&lead, now, &thresholds));
}

#[tokio::test]
async fn test_stats_reflect_configured_prices() {
    let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
        "WAITING_CUSTOMER",
    )))
    .await;
    let lead = desk.submit("A", "first").await.unwrap();
    desk.submit("B", "second").await.unwrap();
    desk.close(lead.id).await.unwrap();

    let stats = desk.stats().await;
    assert_eq!(stats.total_leads, 2);
    assert_eq!(stats.active_leads, 1);
    assert_eq!(stats.by_status["CLOSED"], 1);
    assert_eq!(stats.by_status["WAITING_CUSTOMER"], 1);
    assert_eq!(stats.by_status["NEW"], 0);
    assert_eq!(stats.priced_services.len(), 4);
    // the salon override is appended after the eleven defaults
    assert_eq!(stats.priced_service_count, 12);
    assert!(desk
        .price_table()
        .iter()
        .any(|(name, price)| name == "salon" && *price == 600));
}

#[tokio::test]
async fn test_unknown_lead_is_not_found() {
    let desk = desk_with(MockLlmProvider::single_response("{}")).await;
    let id = Uuid::new_v4();

    for err in [
        desk.get(id).await.unwrap_err(),
        desk.close(id).await.unwrap_err(),
        desk.mark_followed_up(id).await.unwrap_err(),
    ] {
        assert!(matches!(err, LeadError::LeadNotFound(missing) if missing == id));
        assert_eq!(err.status_code(), 404);
    }
}
