//! Lead priority scoring tool

use crate::lead::Urgency;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};

const CUSTOMER_BUDGET_THRESHOLD: f64 = 5000.0;
const PROVIDER_BUDGET_THRESHOLD: f64 = 1000.0;

#[derive(Default)]
pub struct LeadPriorityTool;

impl LeadPriorityTool {
    pub fn new() -> Self {
        Self
    }

    /// Score a lead (pure function)
    ///
    /// High urgency always wins. Without a role the lead is low priority;
    /// otherwise a budget above the role's threshold makes it medium.
    pub fn score(budget: Option<f64>, urgency: Option<Urgency>, role: Option<&str>) -> Urgency {
        if urgency == Some(Urgency::High) {
            return Urgency::High;
        }

        let above = |threshold: f64| budget.is_some_and(|b| b > threshold);
        match role.filter(|r| !r.is_empty()) {
            None => Urgency::Low,
            Some("customer") if above(CUSTOMER_BUDGET_THRESHOLD) => Urgency::Medium,
            Some("provider") if above(PROVIDER_BUDGET_THRESHOLD) => Urgency::Medium,
            Some(_) => Urgency::Low,
        }
    }
}

#[async_trait]
impl Tool for LeadPriorityTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: super::SCORE_LEAD_PRIORITY.to_string(),
            description: "Scores the priority of a lead (low, medium, or high) based on budget, urgency, and role."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "budget": {
                        "type": "number",
                        "description": "The budget specified by the customer, or 0 if not specified."
                    },
                    "urgency": {
                        "type": "string",
                        "enum": ["high", "medium", "low"],
                        "description": "The urgency of the request."
                    },
                    "role": {
                        "type": "string",
                        "enum": ["customer", "provider"],
                        "description": "The role of the lead (customer or provider)."
                    }
                },
                "required": ["budget", "urgency", "role"]
            }),
        }
    }

    async fn initialize(&mut self, _config: Option<&Value>) -> Result<(), ToolError> {
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let priority = Self::score(
            parameters["budget"].as_f64(),
            parameters["urgency"].as_str().and_then(Urgency::parse),
            parameters["role"].as_str(),
        );
        Ok(json!({ "priority": priority }))
    }
}
