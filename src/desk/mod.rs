//! The lead desk: intake, follow-ups and the local status actions
//!
//! The desk owns the lead list and drives the pipeline for each lead. Status
//! changes that come from the model are stored as-is; the only transitions
//! decided locally are the "mark followed up" and "close" actions.

pub mod store;

use crate::config::FollowUpConfig;
use crate::error::{sanitize_error_message, LeadError, LeadResult};
use crate::lead::{Lead, LeadOutcome, LeadStatus, PipelineInput};
use crate::observability::metrics::metrics;
use crate::pipeline::LeadPipeline;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

pub use store::LeadStore;

/// How many priced services the dashboard lists by name
const PRICED_SERVICES_SHOWN: usize = 4;

/// Dashboard counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskStats {
    pub total_leads: usize,
    /// Leads that are not closed
    pub active_leads: usize,
    pub processing: usize,
    pub failed: usize,
    pub by_status: BTreeMap<String, usize>,
    pub priced_services: Vec<String>,
    pub priced_service_count: usize,
}

/// Whether a lead has waited long enough for a follow-up (pure function)
pub fn follow_up_due(lead: &Lead, now: DateTime<Utc>, thresholds: &FollowUpConfig) -> bool {
    if lead.last_reply_at.is_none() {
        return false;
    }
    let hours = lead.hours_since_last_reply(now);
    match lead.status {
        LeadStatus::WaitingCustomer => hours >= f64::from(thresholds.customer_after_hours),
        LeadStatus::WaitingProvider => hours >= f64::from(thresholds.provider_after_hours),
        _ => false,
    }
}

#[derive(Clone)]
pub struct LeadDesk {
    store: LeadStore,
    pipeline: Arc<LeadPipeline>,
    follow_up: FollowUpConfig,
    price_table: Arc<Vec<(String, u64)>>,
}

impl LeadDesk {
    pub fn new(
        pipeline: Arc<LeadPipeline>,
        follow_up: FollowUpConfig,
        price_table: Vec<(String, u64)>,
    ) -> Self {
        Self {
            store: LeadStore::new(),
            pipeline,
            follow_up,
            price_table: Arc::new(price_table),
        }
    }

    pub fn store(&self) -> &LeadStore {
        &self.store
    }

    /// Prices the `get_base_price` tool answers with, in lookup order
    pub fn price_table(&self) -> &[(String, u64)] {
        &self.price_table
    }

    pub fn follow_up_thresholds(&self) -> &FollowUpConfig {
        &self.follow_up
    }

    /// Add a lead and run the pipeline to completion
    pub async fn submit(&self, customer_name: &str, message: &str) -> LeadResult<Lead> {
        let lead = self.create_lead(customer_name, message).await?;
        self.process(lead.id, lead.raw_message).await
    }

    /// Add a lead and process it in the background; returns the processing lead
    pub async fn enqueue(&self, customer_name: &str, message: &str) -> LeadResult<Lead> {
        let lead = self.create_lead(customer_name, message).await?;

        let desk = self.clone();
        let (id, raw_message) = (lead.id, lead.raw_message.clone());
        tokio::spawn(async move {
            if let Err(e) = desk.process(id, raw_message).await {
                warn!(lead_id = %id, error = %e, "Background processing did not finish");
            }
        });

        Ok(lead)
    }

    async fn create_lead(&self, customer_name: &str, message: &str) -> LeadResult<Lead> {
        let customer_name = customer_name.trim();
        let message = message.trim();

        if customer_name.is_empty() {
            metrics().lead_rejected();
            return Err(LeadError::invalid_input("customer_name must not be empty"));
        }
        if message.is_empty() {
            metrics().lead_rejected();
            return Err(LeadError::invalid_input("message must not be empty"));
        }

        let lead = Lead::new(customer_name, message);
        metrics().lead_received();
        info!(lead_id = %lead.id, customer = %lead.customer_name, "Lead received");

        self.store.insert(lead.clone()).await;
        Ok(lead)
    }

    /// First pipeline pass; failures are stored on the lead, not returned
    async fn process(&self, id: Uuid, raw_message: String) -> LeadResult<Lead> {
        let span = crate::lead_span!(lead_id = %id, mode = "pipeline");

        async {
            metrics().lead_processing_started();
            let start = Instant::now();
            let outcome = self
                .pipeline
                .run(&PipelineInput::for_new_message(raw_message))
                .await;

            let updated = match outcome {
                Ok(outcome) => {
                    metrics().lead_processed(start.elapsed());
                    info!(
                        provider = self.pipeline.provider_name(),
                        new_status = %outcome.result.new_status,
                        tool_calls = outcome.tool_invocations.len(),
                        "Lead processed"
                    );
                    self.store
                        .update(id, |lead| {
                            let kept = lead.status.is_terminal().then_some(lead.status);
                            lead.apply_result(outcome.result, outcome.tool_invocations);
                            if let Some(status) = kept {
                                lead.status = status;
                            }
                        })
                        .await
                }
                Err(e) => {
                    metrics().lead_failed(start.elapsed());
                    warn!(error = %e, "Lead processing failed");
                    let message = sanitize_error_message(&e.to_string());
                    self.store
                        .update(id, |lead| lead.apply_failure(message))
                        .await
                }
            };

            updated.ok_or(LeadError::LeadNotFound(id))
        }
        .instrument(span)
        .await
    }

    /// Ask the model for a follow-up message for a waiting lead
    pub async fn generate_follow_up(&self, id: Uuid) -> LeadResult<Lead> {
        let lead = self.get(id).await?;
        const ACTION: &str = "generate a follow-up for";

        let previous_summary = match &lead.outcome {
            LeadOutcome::Processing => {
                return Err(LeadError::invalid_transition(ACTION, "PROCESSING"))
            }
            LeadOutcome::Failed { .. } => {
                return Err(LeadError::invalid_transition(ACTION, "FAILED"))
            }
            LeadOutcome::Processed { result, .. } => result.summary.clone(),
        };
        if lead.status.is_terminal() {
            return Err(LeadError::invalid_transition(ACTION, lead.status));
        }

        let input = PipelineInput::for_follow_up(
            lead.raw_message.clone(),
            lead.status,
            lead.hours_since_last_reply(Utc::now()),
            previous_summary,
        );

        let span = crate::lead_span!(lead_id = %id, mode = "followup_only");
        let outcome = match self.pipeline.run(&input).instrument(span).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics().follow_up_failed();
                warn!(lead_id = %id, error = %e, "Follow-up generation failed");
                return Err(e);
            }
        };

        metrics().follow_up_generated();
        let result = outcome.result;
        info!(
            lead_id = %id,
            new_status = %result.new_status,
            has_message = result.follow_up_message.is_some(),
            "Follow-up generated"
        );

        self.store
            .update(id, move |lead| {
                // A lead closed or followed up during the call keeps its status
                let terminal = lead.status.is_terminal();
                if !terminal {
                    lead.status = result.new_status;
                }
                lead.updated_at = Utc::now();
                if let LeadOutcome::Processed { result: stored, .. } = &mut lead.outcome {
                    if result.follow_up_message.is_some() {
                        stored.follow_up_message = result.follow_up_message;
                    }
                    if !result.summary.trim().is_empty() {
                        stored.summary = result.summary;
                    }
                    if !terminal {
                        stored.new_status = result.new_status;
                    }
                }
            })
            .await
            .ok_or(LeadError::LeadNotFound(id))
    }

    /// Record that a follow-up went out
    pub async fn mark_followed_up(&self, id: Uuid) -> LeadResult<Lead> {
        let lead = self.get(id).await?;
        const ACTION: &str = "mark followed up";

        match &lead.outcome {
            LeadOutcome::Processing => {
                return Err(LeadError::invalid_transition(ACTION, "PROCESSING"))
            }
            LeadOutcome::Failed { .. } => {
                return Err(LeadError::invalid_transition(ACTION, "FAILED"))
            }
            LeadOutcome::Processed { .. } => {}
        }
        if lead.status.is_terminal() {
            return Err(LeadError::invalid_transition(ACTION, lead.status));
        }

        let updated = self
            .set_status(id, LeadStatus::FollowedUp)
            .await?;
        metrics().lead_marked_followed_up();
        info!(lead_id = %id, "Lead marked as followed up");
        Ok(updated)
    }

    /// Archive a lead; closing a closed lead is a no-op
    pub async fn close(&self, id: Uuid) -> LeadResult<Lead> {
        let lead = self.get(id).await?;
        if lead.status == LeadStatus::Closed {
            return Ok(lead);
        }

        let updated = self.set_status(id, LeadStatus::Closed).await?;
        metrics().lead_closed();
        info!(lead_id = %id, "Lead closed");
        Ok(updated)
    }

    async fn set_status(&self, id: Uuid, status: LeadStatus) -> LeadResult<Lead> {
        self.store
            .update(id, |lead| {
                lead.status = status;
                lead.updated_at = Utc::now();
            })
            .await
            .ok_or(LeadError::LeadNotFound(id))
    }

    pub async fn get(&self, id: Uuid) -> LeadResult<Lead> {
        self.store.get(id).await.ok_or(LeadError::LeadNotFound(id))
    }

    /// All leads, newest first
    pub async fn list(&self) -> Vec<Lead> {
        self.store.list().await
    }

    /// Leads waiting past their follow-up threshold, oldest reply first
    pub async fn due_follow_ups(&self, now: DateTime<Utc>) -> Vec<Lead> {
        let mut due: Vec<Lead> = self
            .store
            .list()
            .await
            .into_iter()
            .filter(|lead| follow_up_due(lead, now, &self.follow_up))
            .collect();
        due.sort_by_key(|lead| lead.last_reply_at);
        due
    }

    pub async fn stats(&self) -> DeskStats {
        let leads = self.store.list().await;

        let mut by_status: BTreeMap<String, usize> = LeadStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        for lead in &leads {
            *by_status.entry(lead.status.as_str().to_string()).or_default() += 1;
        }

        DeskStats {
            total_leads: leads.len(),
            active_leads: leads
                .iter()
                .filter(|l| l.status != LeadStatus::Closed)
                .count(),
            processing: leads.iter().filter(|l| l.is_processing()).count(),
            failed: leads.iter().filter(|l| l.error().is_some()).count(),
            by_status,
            priced_services: self
                .price_table
                .iter()
                .take(PRICED_SERVICES_SHOWN)
                .map(|(name, _)| name.clone())
                .collect(),
            priced_service_count: self.price_table.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_tools, DeskConfig};
    use crate::testing::mocks::{
        sample_follow_up_answer, sample_model_answer, MockLlmProvider, MockReply,
    };
    use crate::tools::builtin::default_price_table;
    use crate::tools::ToolSystem;
    use chrono::Duration;

    async fn desk_with(provider: MockLlmProvider) -> LeadDesk {
        let config = DeskConfig::test_config();
        let mut tools = ToolSystem::new();
        tools.initialize(&default_tools()).await.unwrap();
        let pipeline = LeadPipeline::new(Arc::new(provider), Arc::new(tools), &config);
        LeadDesk::new(Arc::new(pipeline), config.followup, default_price_table())
    }

    #[tokio::test]
    async fn test_submit_stores_result() {
        let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
            "WAITING_CUSTOMER",
        )))
        .await;

        let lead = desk.submit("  Rahul Kumar ", "decoration chahiye").await.unwrap();
        assert_eq!(lead.customer_name, "Rahul Kumar");
        assert_eq!(lead.status, LeadStatus::WaitingCustomer);
        assert!(lead.last_reply_at.is_some());
        assert_eq!(lead.result().unwrap().tools_result.base_price_inr, Some(2000.0));
        assert_eq!(desk.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_input_rejected() {
        let desk = desk_with(MockLlmProvider::single_response("{}")).await;
        let err = desk.submit("", "hello").await.unwrap_err();
        assert!(matches!(err, LeadError::InvalidInput { .. }));
        let err = desk.submit("Rahul", "   ").await.unwrap_err();
        assert!(matches!(err, LeadError::InvalidInput { .. }));
        assert!(desk.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_pipeline_is_stored_on_lead() {
        let desk = desk_with(MockLlmProvider::with_failure()).await;
        let lead = desk.submit("Rahul", "hello").await.unwrap();
        assert_eq!(lead.status, LeadStatus::New);
        assert!(lead.error().unwrap().contains("Mock LLM failure"));
        assert!(lead.last_reply_at.is_none());
    }

    #[tokio::test]
    async fn test_follow_up_flow() {
        let desk = desk_with(MockLlmProvider::new(vec![
            MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
            MockReply::Text(sample_model_answer("WAITING_CUSTOMER")),
            MockReply::Text(sample_follow_up_answer("Just checking in!", "FOLLOWED_UP")),
            MockReply::Text(sample_follow_up_answer("Just checking in!", "FOLLOWED_UP")),
        ]))
        .await;

        let lead = desk.submit("Rahul", "decoration chahiye").await.unwrap();
        let updated = desk.generate_follow_up(lead.id).await.unwrap();
        assert_eq!(updated.status, LeadStatus::FollowedUp);
        let result = updated.result().unwrap();
        assert_eq!(result.follow_up_message.as_deref(), Some("Just checking in!"));
        assert_eq!(result.summary, "Sent a gentle follow-up");
        // the original analysis survives the follow-up run
        assert_eq!(result.parsed_lead.location.as_deref(), Some("Gaya"));

        let err = desk.generate_follow_up(lead.id).await.unwrap_err();
        assert!(matches!(err, LeadError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_follow_up_rejected_for_failed_and_unknown_leads() {
        let desk = desk_with(MockLlmProvider::with_failure()).await;
        let lead = desk.submit("Rahul", "hello").await.unwrap();
        let err = desk.generate_follow_up(lead.id).await.unwrap_err();
        assert!(err.to_string().contains("FAILED"));

        let err = desk.generate_follow_up(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LeadError::LeadNotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_followed_up_and_close() {
        let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
            "WAITING_PROVIDER",
        )))
        .await;
        let lead = desk.submit("Amit", "photographer here").await.unwrap();

        let marked = desk.mark_followed_up(lead.id).await.unwrap();
        assert_eq!(marked.status, LeadStatus::FollowedUp);
        assert!(matches!(
            desk.mark_followed_up(lead.id).await,
            Err(LeadError::InvalidTransition { .. })
        ));

        let closed = desk.close(lead.id).await.unwrap();
        assert_eq!(closed.status, LeadStatus::Closed);
        let again = desk.close(lead.id).await.unwrap();
        assert_eq!(again.status, LeadStatus::Closed);
        assert!(desk.mark_followed_up(lead.id).await.is_err());
    }

    #[tokio::test]
    async fn test_due_follow_ups_use_thresholds() {
        let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
            "WAITING_CUSTOMER",
        )))
        .await;
        let lead = desk.submit("Rahul", "decoration chahiye").await.unwrap();
        let replied = lead.last_reply_at.unwrap();

        assert!(desk.due_follow_ups(replied + Duration::hours(23)).await.is_empty());
        let due = desk.due_follow_ups(replied + Duration::hours(24)).await;
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, lead.id);
    }

    #[test]
    fn test_follow_up_due_per_status() {
        let thresholds = FollowUpConfig::default();
        let now = Utc::now();
        let mut lead = Lead::new("Amit", "hello");
        lead.status = LeadStatus::WaitingProvider;
        assert!(!follow_up_due(&lead, now, &thresholds));

        lead.last_reply_at = Some(now - Duration::hours(30));
        assert!(!follow_up_due(&lead, now, &thresholds));
        lead.last_reply_at = Some(now - Duration::hours(48));
        assert!(follow_up_due(&lead, now, &thresholds));

        lead.status = LeadStatus::FollowedUp;
        assert!(!follow_up_due(&lead, now, &thresholds));
    }

    #[tokio::test]
    async fn test_stats() {
        let desk = desk_with(MockLlmProvider::single_response(sample_model_answer(
            "WAITING_CUSTOMER",
        )))
        .await;
        let first = desk.submit("Rahul", "decoration chahiye").await.unwrap();
        desk.submit("Sneha", "tutor chahiye").await.unwrap();
        desk.close(first.id).await.unwrap();

        let stats = desk.stats().await;
        assert_eq!(stats.total_leads, 2);
        assert_eq!(stats.active_leads, 1);
        assert_eq!(stats.by_status["WAITING_CUSTOMER"], 1);
        assert_eq!(stats.by_status["CLOSED"], 1);
        assert_eq!(stats.by_status["NEW"], 0);
        assert_eq!(stats.priced_services.len(), 4);
        assert_eq!(stats.priced_services[0], "birthday decoration");
        assert_eq!(stats.priced_service_count, 11);
    }
}
