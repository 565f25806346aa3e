//! HTTP surface for the lead desk
//!
//! JSON in, JSON out, except `/leads/{id}/card` which returns the plain-text
//! card. Errors always use the `{"error": {"code", "message"}}` body.

use crate::desk::LeadDesk;
use crate::error::{ErrorCode, ErrorDetails, ErrorResponse, LeadError};
use crate::health::{HealthCheckManager, HealthCheckResult};
use crate::lead::{render_card, sample_leads, Lead, LeadStatus};
use crate::observability::metrics::metrics;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 64 * 1024;

/// Shared state behind every route
#[derive(Clone)]
pub struct ApiState {
    desk: LeadDesk,
    health: Arc<HealthCheckManager>,
    desk_id: String,
    ready: Arc<AtomicBool>,
}

impl ApiState {
    pub fn new(desk: LeadDesk, health: HealthCheckManager, desk_id: impl Into<String>) -> Self {
        Self {
            desk,
            health: Arc::new(health),
            desk_id: desk_id.into(),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flip `/ready` to 200
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn desk(&self) -> &LeadDesk {
        &self.desk
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub customer_name: String,
    pub message: String,
    /// Process before answering instead of in the background
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    desk_id: String,
    timestamp: u64,
    uptime_seconds: u64,
    checks: Vec<HealthCheckResult>,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct DueFollowUp {
    hours_since_last_reply: f64,
    lead: Lead,
}

#[derive(Debug, Serialize)]
struct PriceEntry<'a> {
    service: &'a str,
    base_price_inr: u64,
}

#[derive(Debug, Serialize)]
struct SampleEntry {
    index: usize,
    name: &'static str,
    message: &'static str,
    kind: &'static str,
}

/// All routes, with JSON rejections
pub fn routes(state: ApiState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let root = warp::path::end().and(warp::get()).map(api_index);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(health_handler);

    let ready = warp::path!("ready")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: ApiState| {
            let ready = state.ready.load(Ordering::Relaxed);
            let status = if ready {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            json_reply(
                &ReadinessResponse {
                    ready,
                    timestamp: current_timestamp(),
                },
                status,
            )
        });

    let live = warp::path!("live").and(warp::get()).map(|| {
        json_reply(
            &LivenessResponse {
                alive: true,
                timestamp: current_timestamp(),
            },
            StatusCode::OK,
        )
    });

    let metrics_route = warp::path!("metrics")
        .and(warp::get())
        .map(|| json_reply(&metrics().get_metrics(), StatusCode::OK));

    let list_leads = warp::path!("leads")
        .and(warp::get())
        .and(warp::query::<HashMap<String, String>>())
        .and(with_state(state.clone()))
        .and_then(list_leads_handler);

    let create_lead = warp::path!("leads")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(create_lead_handler);

    let get_lead = warp::path!("leads" / String)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(|id: String, state: ApiState| async move {
            let result = match parse_lead_id(&id) {
                Ok(id) => state.desk.get(id).await,
                Err(e) => Err(e),
            };
            Ok::<_, Infallible>(lead_reply(result, StatusCode::OK))
        });

    let lead_card = warp::path!("leads" / String / "card")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(card_handler);

    let follow_up = warp::path!("leads" / String / "follow-up")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(|id: String, state: ApiState| async move {
            let result = match parse_lead_id(&id) {
                Ok(id) => state.desk.generate_follow_up(id).await,
                Err(e) => Err(e),
            };
            Ok::<_, Infallible>(lead_reply(result, StatusCode::OK))
        });

    let followed_up = warp::path!("leads" / String / "followed-up")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(|id: String, state: ApiState| async move {
            let result = match parse_lead_id(&id) {
                Ok(id) => state.desk.mark_followed_up(id).await,
                Err(e) => Err(e),
            };
            Ok::<_, Infallible>(lead_reply(result, StatusCode::OK))
        });

    let close = warp::path!("leads" / String / "close")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(|id: String, state: ApiState| async move {
            let result = match parse_lead_id(&id) {
                Ok(id) => state.desk.close(id).await,
                Err(e) => Err(e),
            };
            Ok::<_, Infallible>(lead_reply(result, StatusCode::OK))
        });

    let due = warp::path!("follow-ups" / "due")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(|state: ApiState| async move {
            let now = Utc::now();
            let due: Vec<DueFollowUp> = state
                .desk
                .due_follow_ups(now)
                .await
                .into_iter()
                .map(|lead| DueFollowUp {
                    hours_since_last_reply: lead.hours_since_last_reply(now),
                    lead,
                })
                .collect();
            Ok::<_, Infallible>(json_reply(&due, StatusCode::OK))
        });

    let samples = warp::path!("samples").and(warp::get()).map(|| {
        let samples: Vec<SampleEntry> = sample_leads()
            .iter()
            .enumerate()
            .map(|(index, s)| SampleEntry {
                index,
                name: s.name,
                message: s.message,
                kind: s.kind,
            })
            .collect();
        json_reply(&samples, StatusCode::OK)
    });

    let pricing = warp::path!("pricing")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(|state: ApiState| {
            let prices: Vec<PriceEntry> = state
                .desk
                .price_table()
                .iter()
                .map(|(service, price)| PriceEntry {
                    service,
                    base_price_inr: *price,
                })
                .collect();
            json_reply(&prices, StatusCode::OK)
        });

    let stats = warp::path!("stats")
        .and(warp::get())
        .and(with_state(state))
        .and_then(|state: ApiState| async move {
            Ok::<_, Infallible>(json_reply(&state.desk.stats().await, StatusCode::OK))
        });

    let lead_routes = list_leads
        .or(create_lead)
        .unify()
        .or(get_lead)
        .unify()
        .or(lead_card)
        .unify()
        .or(follow_up)
        .unify()
        .or(followed_up)
        .unify()
        .or(close)
        .unify()
        .boxed();

    let info_routes = root
        .or(health)
        .unify()
        .or(ready)
        .unify()
        .or(live)
        .unify()
        .or(metrics_route)
        .unify()
        .or(due)
        .unify()
        .or(samples)
        .unify()
        .or(pricing)
        .unify()
        .or(stats)
        .unify()
        .boxed();

    info_routes
        .or(lead_routes)
        .unify()
        .recover(handle_rejection)
        .unify()
        .with(warp::cors().allow_any_origin())
        .with(warp::log("lead_intake::http"))
}

/// Serve until ctrl-c
pub async fn serve(state: ApiState, addr: SocketAddr) -> Result<(), LeadError> {
    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
        }
    };

    let (bound, server) = warp::serve(routes(state.clone()))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| LeadError::internal_error(format!("Failed to bind {addr}: {e}")))?;

    state.mark_ready();
    metrics().set_desk_state("running");
    info!(address = %bound, "Lead desk listening");

    server.await;

    metrics().set_desk_state("stopped");
    info!("Server stopped");
    Ok(())
}

fn with_state(state: ApiState) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(err: &LeadError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_reply(&err.to_error_response(), status)
}

fn lead_reply(result: Result<Lead, LeadError>, status: StatusCode) -> Response {
    match result {
        Ok(lead) => json_reply(&lead, status),
        Err(e) => error_reply(&e),
    }
}

fn parse_lead_id(raw: &str) -> Result<Uuid, LeadError> {
    Uuid::parse_str(raw).map_err(|_| LeadError::invalid_input(format!("'{raw}' is not a lead id")))
}

fn api_index() -> Response {
    let endpoints: BTreeMap<&str, &str> = [
        ("GET /", "This index"),
        ("GET /health", "Provider and tool health checks"),
        ("GET /ready", "Readiness probe"),
        ("GET /live", "Liveness probe"),
        ("GET /metrics", "Lead, LLM and tool metrics"),
        ("GET /leads", "All leads, newest first (?status= to filter)"),
        ("POST /leads", "Add a lead: {customer_name, message, wait?}"),
        ("GET /leads/{id}", "One lead"),
        ("GET /leads/{id}/card", "Lead card as plain text"),
        ("POST /leads/{id}/follow-up", "Generate a follow-up message"),
        ("POST /leads/{id}/followed-up", "Mark a lead as followed up"),
        ("POST /leads/{id}/close", "Archive a lead"),
        ("GET /follow-ups/due", "Leads past their follow-up threshold"),
        ("GET /samples", "Demo messages"),
        ("GET /pricing", "Base price table"),
        ("GET /stats", "Dashboard counters"),
    ]
    .into_iter()
    .collect();

    json_reply(&serde_json::json!({ "endpoints": endpoints }), StatusCode::OK)
}

async fn health_handler(state: ApiState) -> Result<Response, Infallible> {
    let checks = state.health.run_health_checks().await;
    let healthy = HealthCheckManager::overall_health(&checks);
    metrics().update_health_status(healthy);

    let body = HealthStatus {
        status: if healthy { "healthy" } else { "degraded" },
        desk_id: state.desk_id.clone(),
        timestamp: current_timestamp(),
        uptime_seconds: metrics().get_metrics().lifecycle.uptime_seconds,
        checks,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(json_reply(&body, status))
}

async fn list_leads_handler(
    query: HashMap<String, String>,
    state: ApiState,
) -> Result<Response, Infallible> {
    let filter = match query.get("status") {
        None => None,
        Some(raw) => match LeadStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                let err = LeadError::invalid_input(format!("unknown status '{raw}'"));
                return Ok(error_reply(&err));
            }
        },
    };

    let leads: Vec<Lead> = state
        .desk
        .list()
        .await
        .into_iter()
        .filter(|lead| filter.map_or(true, |status| lead.status == status))
        .collect();
    Ok(json_reply(&leads, StatusCode::OK))
}

async fn create_lead_handler(
    request: CreateLeadRequest,
    state: ApiState,
) -> Result<Response, Infallible> {
    debug!(wait = request.wait, "Create lead request");
    let reply = if request.wait {
        lead_reply(
            state.desk.submit(&request.customer_name, &request.message).await,
            StatusCode::CREATED,
        )
    } else {
        lead_reply(
            state.desk.enqueue(&request.customer_name, &request.message).await,
            StatusCode::ACCEPTED,
        )
    };
    Ok(reply)
}

async fn card_handler(id: String, state: ApiState) -> Result<Response, Infallible> {
    let lead = match parse_lead_id(&id) {
        Ok(id) => state.desk.get(id).await,
        Err(e) => Err(e),
    };

    Ok(match lead {
        Ok(lead) => warp::reply::with_header(
            render_card(&lead),
            "content-type",
            "text/plain; charset=utf-8",
        )
        .into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, code, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, ErrorCode::NotFound, "No such endpoint".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidInput,
            format!("Invalid request body: {e}"),
        )
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::InvalidInput,
            "Request body too large".to_string(),
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            ErrorCode::InvalidInput,
            "Content-Length header is required".to_string(),
        )
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        (
            StatusCode::BAD_REQUEST,
            ErrorCode::InvalidInput,
            "Invalid query string".to_string(),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::InvalidInput,
            "Method not allowed".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError,
            "Unhandled request error".to_string(),
        )
    };

    let body = ErrorResponse {
        error: ErrorDetails { code, message },
    };
    Ok(json_reply(&body, status))
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_tools, DeskConfig};
    use crate::health::ToolSystemHealthCheck;
    use crate::pipeline::LeadPipeline;
    use crate::testing::mocks::{sample_model_answer, MockLlmProvider};
    use crate::tools::builtin::default_price_table;
    use crate::tools::ToolSystem;
    use serde_json::{json, Value};

    async fn state() -> ApiState {
        let config = DeskConfig::test_config();
        let mut tools = ToolSystem::new();
        tools.initialize(&default_tools()).await.unwrap();
        let tools = Arc::new(tools);

        let provider = MockLlmProvider::single_response(sample_model_answer("WAITING_CUSTOMER"));
        let pipeline = LeadPipeline::new(Arc::new(provider), tools.clone(), &config);
        let desk = LeadDesk::new(Arc::new(pipeline), config.followup.clone(), default_price_table());

        let mut health = HealthCheckManager::new();
        health.add_health_check(Box::new(ToolSystemHealthCheck::new(tools)));
        ApiState::new(desk, health, "test-desk")
    }

    fn body_json(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_lead() {
        let filter = routes(state().await);

        let response = warp::test::request()
            .method("POST")
            .path("/leads")
            .json(&json!({"customer_name": "Rahul", "message": "decoration chahiye", "wait": true}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 201);
        let lead = body_json(response.body());
        assert_eq!(lead["status"], "WAITING_CUSTOMER");
        assert_eq!(lead["outcome"]["state"], "processed");

        let id = lead["id"].as_str().unwrap();
        let response = warp::test::request()
            .path(&format!("/leads/{id}"))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 200);

        let response = warp::test::request()
            .path(&format!("/leads/{id}/card"))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 200);
        let card = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(card.contains("Rahul"));
    }

    #[tokio::test]
    async fn test_enqueue_returns_accepted() {
        let filter = routes(state().await);
        let response = warp::test::request()
            .method("POST")
            .path("/leads")
            .json(&json!({"customer_name": "Rahul", "message": "hello"}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 202);
        assert_eq!(body_json(response.body())["outcome"]["state"], "processing");
    }

    #[tokio::test]
    async fn test_errors_are_json() {
        let filter = routes(state().await);

        let response = warp::test::request()
            .method("POST")
            .path("/leads")
            .json(&json!({"customer_name": " ", "message": "hello", "wait": true}))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 400);
        assert_eq!(body_json(response.body())["error"]["code"], "invalid_input");

        let response = warp::test::request()
            .path(&format!("/leads/{}", Uuid::new_v4()))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 404);
        assert_eq!(body_json(response.body())["error"]["code"], "not_found");

        let response = warp::test::request().path("/leads/not-a-uuid").reply(&filter).await;
        assert_eq!(response.status(), 400);

        let response = warp::test::request().path("/nope").reply(&filter).await;
        assert_eq!(response.status(), 404);

        let response = warp::test::request()
            .method("POST")
            .path("/leads")
            .body("{not json")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_status_actions() {
        let state = state().await;
        let lead = state.desk().submit("Amit", "photographer").await.unwrap();
        let filter = routes(state);

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/leads/{}/followed-up", lead.id))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response.body())["status"], "FOLLOWED_UP");

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/leads/{}/follow-up", lead.id))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 409);
        assert_eq!(body_json(response.body())["error"]["code"], "invalid_transition");

        let response = warp::test::request()
            .method("POST")
            .path(&format!("/leads/{}/close", lead.id))
            .reply(&filter)
            .await;
        assert_eq!(body_json(response.body())["status"], "CLOSED");

        let response = warp::test::request()
            .path("/leads?status=closed")
            .reply(&filter)
            .await;
        assert_eq!(body_json(response.body()).as_array().unwrap().len(), 1);

        let response = warp::test::request()
            .path("/leads?status=archived")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_info_endpoints() {
        let state = state().await;
        let filter = routes(state.clone());

        let response = warp::test::request().path("/").reply(&filter).await;
        assert!(body_json(response.body())["endpoints"]["POST /leads"].is_string());

        let response = warp::test::request().path("/health").reply(&filter).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response.body())["status"], "healthy");

        let response = warp::test::request().path("/ready").reply(&filter).await;
        assert_eq!(response.status(), 503);
        state.mark_ready();
        let response = warp::test::request().path("/ready").reply(&filter).await;
        assert_eq!(response.status(), 200);

        let response = warp::test::request().path("/live").reply(&filter).await;
        assert_eq!(body_json(response.body())["alive"], true);

        let response = warp::test::request().path("/metrics").reply(&filter).await;
        assert!(body_json(response.body())["leads"].is_object());

        let response = warp::test::request().path("/samples").reply(&filter).await;
        assert_eq!(body_json(response.body()).as_array().unwrap().len(), 5);

        let response = warp::test::request().path("/pricing").reply(&filter).await;
        let prices = body_json(response.body());
        assert_eq!(prices[0]["service"], "birthday decoration");
        assert_eq!(prices[0]["base_price_inr"], 2000);

        let response = warp::test::request().path("/stats").reply(&filter).await;
        assert_eq!(body_json(response.body())["total_leads"], 0);

        let response = warp::test::request().path("/follow-ups/due").reply(&filter).await;
        assert_eq!(body_json(response.body()), json!([]));
    }
}
