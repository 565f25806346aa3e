//! Component health checks
//!
//! Used by the `/health` endpoint and the `check` command.

use crate::llm::provider::LlmProvider;
use crate::tools::ToolSystem;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub component: String,
    pub healthy: bool,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> HealthCheckResult;

    fn component_name(&self) -> &str;
}

/// Asks the provider whether its credentials work
pub struct LlmProviderHealthCheck {
    llm_provider: Arc<dyn LlmProvider>,
}

impl LlmProviderHealthCheck {
    pub fn new(llm_provider: Arc<dyn LlmProvider>) -> Self {
        Self { llm_provider }
    }
}

#[async_trait]
impl HealthCheck for LlmProviderHealthCheck {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let provider = self.llm_provider.name();
        let outcome = self.llm_provider.health_check().await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let (healthy, message) = match outcome {
            Ok(()) => {
                debug!(provider, response_time_ms, "LLM provider healthy");
                (true, format!("{provider} provider healthy"))
            }
            Err(e) => {
                warn!(provider, error = %e, response_time_ms, "LLM provider health check failed");
                (false, format!("{provider} provider error: {e}"))
            }
        };

        HealthCheckResult {
            component: self.component_name().to_string(),
            healthy,
            message: Some(message),
            response_time_ms: Some(response_time_ms),
        }
    }

    fn component_name(&self) -> &str {
        "llm_provider"
    }
}

/// Verifies the expected tools are registered and their schemas compile
pub struct ToolSystemHealthCheck {
    tool_system: Arc<ToolSystem>,
}

impl ToolSystemHealthCheck {
    pub fn new(tool_system: Arc<ToolSystem>) -> Self {
        Self { tool_system }
    }
}

#[async_trait]
impl HealthCheck for ToolSystemHealthCheck {
    async fn health_check(&self) -> HealthCheckResult {
        let start = Instant::now();
        let descriptions = self.tool_system.describe_all();

        let broken: Vec<String> = descriptions
            .iter()
            .filter(|d| jsonschema::validator_for(&d.parameters).is_err())
            .map(|d| d.name.clone())
            .collect();

        let (healthy, message) = if descriptions.is_empty() {
            (false, "no tools registered".to_string())
        } else if !broken.is_empty() {
            (false, format!("invalid schema for: {}", broken.join(", ")))
        } else {
            (true, format!("{} tools ready", descriptions.len()))
        };

        HealthCheckResult {
            component: self.component_name().to_string(),
            healthy,
            message: Some(message),
            response_time_ms: Some(start.elapsed().as_millis() as u64),
        }
    }

    fn component_name(&self) -> &str {
        "tool_system"
    }
}

#[derive(Default)]
pub struct HealthCheckManager {
    health_checks: Vec<Box<dyn HealthCheck>>,
}

impl HealthCheckManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_health_check(&mut self, health_check: Box<dyn HealthCheck>) {
        self.health_checks.push(health_check);
    }

    pub async fn run_health_checks(&self) -> Vec<HealthCheckResult> {
        let mut results = Vec::with_capacity(self.health_checks.len());
        for health_check in &self.health_checks {
            results.push(health_check.health_check().await);
        }
        results
    }

    /// All components must be healthy; no checks counts as healthy
    pub fn overall_health(results: &[HealthCheckResult]) -> bool {
        if results.is_empty() {
            warn!("No health checks configured - assuming healthy");
        }
        results.iter().all(|r| r.healthy)
    }
}
