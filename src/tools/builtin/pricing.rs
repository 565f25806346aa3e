//! Base price lookup tool
//!
//! Matches a free-form service name against a small price table. The first
//! entry whose key contains the input, or is contained in it, wins, so table
//! order matters ("wedding decoration" must not shadow "birthday decoration").

use crate::config::ToolConfig;
use crate::tools::{Tool, ToolDescription, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Starting prices in INR, in lookup order
const DEFAULT_PRICES: [(&str, u64); 11] = [
    ("birthday decoration", 2000),
    ("wedding decoration", 15000),
    ("home tutor", 500),
    ("assignment writing", 300),
    ("mehendi", 1200),
    ("makeup", 2500),
    ("plumbing", 200),
    ("cleaning", 800),
    ("car rental", 1000),
    ("photography", 3000),
    ("dj services", 4000),
];

/// The default price table as owned entries
pub fn default_price_table() -> Vec<(String, u64)> {
    DEFAULT_PRICES
        .iter()
        .map(|(name, price)| (name.to_string(), *price))
        .collect()
}

/// The table `get_base_price` will use for a `[tools]` section
pub fn configured_price_table(
    tool_configs: &HashMap<String, ToolConfig>,
) -> Result<Vec<(String, u64)>, ToolError> {
    let mut prices = default_price_table();
    if let Some(ToolConfig::Complex { config, .. }) = tool_configs.get(super::GET_BASE_PRICE) {
        if let Some(overrides) = config.get("prices").and_then(Value::as_object) {
            BasePriceTool::apply_overrides(&mut prices, overrides)?;
        }
    }
    Ok(prices)
}

pub struct BasePriceTool {
    prices: Vec<(String, u64)>,
}

impl Default for BasePriceTool {
    fn default() -> Self {
        Self::new()
    }
}

impl BasePriceTool {
    pub fn new() -> Self {
        Self {
            prices: default_price_table(),
        }
    }

    /// Current table, in lookup order
    pub fn prices(&self) -> &[(String, u64)] {
        &self.prices
    }

    /// Look up a starting price; 0 means unknown (pure function)
    pub fn lookup(prices: &[(String, u64)], service_type: Option<&str>) -> u64 {
        let Some(normalized) = service_type
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
        else {
            return 0;
        };

        prices
            .iter()
            .find(|(key, _)| normalized.contains(key.as_str()) || key.contains(normalized.as_str()))
            .map(|(_, price)| *price)
            .unwrap_or(0)
    }

    /// Override existing entries in place, append new ones at the end
    fn apply_overrides(prices: &mut Vec<(String, u64)>, overrides: &serde_json::Map<String, Value>) -> Result<(), ToolError> {
        for (name, value) in overrides {
            let key = name.trim().to_lowercase();
            if key.is_empty() {
                return Err(ToolError::InitializationError(
                    "price overrides need a non-blank service name".to_string(),
                ));
            }

            let price = value
                .as_u64()
                .or_else(|| value.as_f64().filter(|p| *p >= 0.0).map(|p| p.round() as u64))
                .ok_or_else(|| {
                    ToolError::InitializationError(format!(
                        "price for '{name}' must be a non-negative number"
                    ))
                })?;

            match prices.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = price,
                None => prices.push((key, price)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Tool for BasePriceTool {
    fn describe(&self) -> ToolDescription {
        ToolDescription {
            name: super::GET_BASE_PRICE.to_string(),
            description: "Get the base starting price in INR for a specific local service type."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "service_type": {
                        "type": "string",
                        "description": "The type of service (e.g., 'birthday decoration', 'home tutor', 'salon')."
                    }
                },
                "required": ["service_type"]
            }),
        }
    }

    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError> {
        if let Some(overrides) = config
            .and_then(|c| c.get("prices"))
            .and_then(Value::as_object)
        {
            Self::apply_overrides(&mut self.prices, overrides)?;
        }
        Ok(())
    }

    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError> {
        let price = Self::lookup(&self.prices, parameters["service_type"].as_str());
        Ok(json!({ "base_price_inr": price }))
    }
}
