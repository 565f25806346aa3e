//! Lead domain model
//!
//! A lead is one inbound message plus the analysis the model produced for it.
//! The enums here mirror the JSON contract the system prompt asks the model
//! to honor, so their serialized forms must not change.

pub mod card;
pub mod result;
pub mod samples;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub use card::{render_card, LeadCard};
pub use result::{parse_model_output, strip_code_fences};
pub use samples::{sample_lead, sample_leads, SampleLead};

/// Lead lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    WaitingCustomer,
    WaitingProvider,
    FollowedUp,
    Closed,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::WaitingCustomer,
        LeadStatus::WaitingProvider,
        LeadStatus::FollowedUp,
        LeadStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::WaitingCustomer => "WAITING_CUSTOMER",
            LeadStatus::WaitingProvider => "WAITING_PROVIDER",
            LeadStatus::FollowedUp => "FOLLOWED_UP",
            LeadStatus::Closed => "CLOSED",
        }
    }

    /// Case-insensitive parse; `None` for anything outside the contract
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|s| s.as_str() == normalized)
    }

    /// No further follow-up is sent once a lead reaches these
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::FollowedUp | LeadStatus::Closed)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency of a request, also used as the priority scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "high",
            Urgency::Medium => "medium",
            Urgency::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Urgency::High),
            "medium" => Some(Urgency::Medium),
            "low" => Some(Urgency::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who sent the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadRole {
    Customer,
    Provider,
    #[default]
    Unknown,
}

impl LeadRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadRole::Customer => "customer",
            LeadRole::Provider => "provider",
            LeadRole::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "customer" => LeadRole::Customer,
            "provider" => LeadRole::Provider,
            _ => LeadRole::Unknown,
        }
    }
}

/// What the sender wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    CustomerLead,
    ProviderLead,
    GeneralQuestion,
    #[default]
    Unknown,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::CustomerLead => "customer_lead",
            IntentType::ProviderLead => "provider_lead",
            IntentType::GeneralQuestion => "general_question",
            IntentType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "customer_lead" => IntentType::CustomerLead,
            "provider_lead" => IntentType::ProviderLead,
            "general_question" => IntentType::GeneralQuestion,
            _ => IntentType::Unknown,
        }
    }

    /// Human label used on cards ("customer lead")
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

/// Fields the model extracted from the raw message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedLead {
    pub role: LeadRole,
    pub intent_type: IntentType,
    pub service_type: Option<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub budget: Option<f64>,
    pub urgency: Option<Urgency>,
    pub notes: Option<String>,
}

/// Compact view of what the tools reported
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsResult {
    pub base_price_inr: Option<f64>,
    pub priority: Option<Urgency>,
    pub provider_summary: Option<String>,
}

/// The structured answer the model returns for every lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub parsed_lead: ParsedLead,
    pub tools_result: ToolsResult,
    pub reply_message: String,
    pub follow_up_message: Option<String>,
    pub new_status: LeadStatus,
    pub summary: String,
}

/// Which part of the prompt contract the model should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    Pipeline,
    FollowupOnly,
}

/// The JSON user turn sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineInput {
    pub mode: PipelineMode,
    pub message: String,
    pub lead_status: LeadStatus,
    pub time_since_last_reply_hours: f64,
    pub previous_summary: String,
}

impl PipelineInput {
    /// First pass over a freshly received message
    pub fn for_new_message(message: impl Into<String>) -> Self {
        Self {
            mode: PipelineMode::Pipeline,
            message: message.into(),
            lead_status: LeadStatus::New,
            time_since_last_reply_hours: 0.0,
            previous_summary: String::new(),
        }
    }

    /// Follow-up pass over an existing lead
    pub fn for_follow_up(
        message: impl Into<String>,
        lead_status: LeadStatus,
        time_since_last_reply_hours: f64,
        previous_summary: impl Into<String>,
    ) -> Self {
        Self {
            mode: PipelineMode::FollowupOnly,
            message: message.into(),
            lead_status,
            time_since_last_reply_hours,
            previous_summary: previous_summary.into(),
        }
    }
}

/// One local tool execution requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
    pub output: serde_json::Value,
    pub success: bool,
}

/// Where a lead is in processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LeadOutcome {
    Processing,
    Processed {
        result: PipelineResult,
        tool_invocations: Vec<ToolInvocation>,
    },
    Failed {
        error: String,
    },
}

/// A lead as tracked by the desk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub customer_name: String,
    pub raw_message: String,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub outcome: LeadOutcome,
}

impl Lead {
    /// A new lead waiting for its first pipeline run
    pub fn new(customer_name: impl Into<String>, raw_message: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer_name: customer_name.into(),
            raw_message: raw_message.into(),
            status: LeadStatus::New,
            created_at: now,
            updated_at: now,
            last_reply_at: None,
            outcome: LeadOutcome::Processing,
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.outcome, LeadOutcome::Processing)
    }

    pub fn result(&self) -> Option<&PipelineResult> {
        match &self.outcome {
            LeadOutcome::Processed { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            LeadOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// First eight characters of the id, as shown on cards
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }

    /// Hours since the draft reply was produced (0 when there is none)
    pub fn hours_since_last_reply(&self, now: DateTime<Utc>) -> f64 {
        self.last_reply_at
            .map(|at| (now - at).num_seconds().max(0) as f64 / 3600.0)
            .unwrap_or(0.0)
    }

    /// Record a successful pipeline run
    pub fn apply_result(&mut self, result: PipelineResult, tool_invocations: Vec<ToolInvocation>) {
        let now = Utc::now();
        self.status = result.new_status;
        self.updated_at = now;
        self.last_reply_at = Some(now);
        self.outcome = LeadOutcome::Processed {
            result,
            tool_invocations,
        };
    }

    /// Record a failed pipeline run
    pub fn apply_failure(&mut self, error: impl Into<String>) {
        self.updated_at = Utc::now();
        self.outcome = LeadOutcome::Failed {
            error: error.into(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&LeadStatus::WaitingCustomer).unwrap();
        assert_eq!(json, "\"WAITING_CUSTOMER\"");
        let status: LeadStatus = serde_json::from_str("\"FOLLOWED_UP\"").unwrap();
        assert_eq!(status, LeadStatus::FollowedUp);
    }

    #[test]
    fn test_status_parse_is_lenient() {
        assert_eq!(LeadStatus::parse("waiting_provider"), Some(LeadStatus::WaitingProvider));
        assert_eq!(LeadStatus::parse(" Followed Up "), Some(LeadStatus::FollowedUp));
        assert_eq!(LeadStatus::parse("ARCHIVED"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(LeadStatus::FollowedUp.is_terminal());
        assert!(LeadStatus::Closed.is_terminal());
        assert!(!LeadStatus::New.is_terminal());
        assert!(!LeadStatus::WaitingCustomer.is_terminal());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!(Urgency::parse("HIGH"), Some(Urgency::High));
        assert_eq!(Urgency::parse("urgent"), None);
        assert_eq!(LeadRole::parse("Provider"), LeadRole::Provider);
        assert_eq!(LeadRole::parse("vendor"), LeadRole::Unknown);
        assert_eq!(IntentType::parse("general question"), IntentType::GeneralQuestion);
        assert_eq!(IntentType::CustomerLead.label(), "customer lead");
    }

    #[test]
    fn test_pipeline_input_serialization() {
        let input = PipelineInput::for_new_message("kal decoration chahiye");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["mode"], "pipeline");
        assert_eq!(json["lead_status"], "NEW");
        assert_eq!(json["time_since_last_reply_hours"], 0.0);
        assert_eq!(json["previous_summary"], "");

        let follow_up =
            PipelineInput::for_follow_up("msg", LeadStatus::WaitingCustomer, 30.0, "summary");
        let json = serde_json::to_value(&follow_up).unwrap();
        assert_eq!(json["mode"], "followup_only");
        assert_eq!(json["lead_status"], "WAITING_CUSTOMER");
    }

    #[test]
    fn test_new_lead_is_processing() {
        let lead = Lead::new("Rahul", "hello");
        assert!(lead.is_processing());
        assert_eq!(lead.status, LeadStatus::New);
        assert_eq!(lead.short_id().len(), 8);
        assert!(lead.result().is_none());
        assert!(lead.error().is_none());
    }

    #[test]
    fn test_hours_since_last_reply() {
        let mut lead = Lead::new("Rahul", "hello");
        let now = Utc::now();
        assert_eq!(lead.hours_since_last_reply(now), 0.0);

        lead.last_reply_at = Some(now - Duration::hours(30));
        let hours = lead.hours_since_last_reply(now);
        assert!((hours - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_outcome_tagging() {
        let mut lead = Lead::new("Rahul", "hello");
        lead.apply_failure("boom");
        let json = serde_json::to_value(&lead).unwrap();
        assert_eq!(json["outcome"]["state"], "failed");
        assert_eq!(json["outcome"]["error"], "boom");
    }
}
