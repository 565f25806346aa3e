//! Configuration system for the lead-intake desk
//!
//! Configuration is a single TOML file. Secrets are never stored in it: the
//! `[llm]` section names the environment variable holding the API key, and
//! the key is resolved at runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Main desk configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeskConfig {
    pub desk: DeskSection,
    pub llm: LlmSection,
    #[serde(default = "default_tools")]
    pub tools: HashMap<String, ToolConfig>,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub followup: FollowUpConfig,
    #[serde(default)]
    pub server: ServerSection,
}

/// Desk identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeskSection {
    /// Desk identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    /// Business name used inside the system prompt
    #[serde(default = "default_business_name")]
    pub business_name: String,
    #[serde(default)]
    pub description: String,
}

fn default_business_name() -> String {
    "LocalBookr".to_string()
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name ("gemini" or "openai")
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing API key
    pub api_key_env: String,
    /// Override for the provider's API base URL
    pub base_url: Option<String>,
    /// Replaces the built-in system prompt when set
    pub system_prompt: Option<String>,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Optional max tokens
    pub max_tokens: Option<u32>,
    /// HTTP timeout for a single provider request
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_timeout() -> u64 {
    60
}

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ToolConfig {
    /// Simple form: tool_name = "identifier"
    Simple(String),
    /// Complex form: tool_name = { impl = "identifier", config = { ... } }
    Complex {
        #[serde(rename = "impl")]
        implementation: String,
        #[serde(default)]
        config: HashMap<String, serde_json::Value>,
    },
}

/// The three lookups every desk ships with
pub fn default_tools() -> HashMap<String, ToolConfig> {
    ["get_base_price", "find_providers", "score_lead_priority"]
        .into_iter()
        .map(|name| (name.to_string(), ToolConfig::Simple("builtin".to_string())))
        .collect()
}

/// Budget for tool round-trips within a single pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetConfig {
    /// Model turns that may request tools before the final JSON turn
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Maximum number of tool executions per run
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: u32,
}

fn default_max_tool_rounds() -> u32 {
    1
}

fn default_max_tool_calls() -> u32 {
    8
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_tool_calls: default_max_tool_calls(),
        }
    }
}

/// Follow-up thresholds, in hours since the last reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowUpConfig {
    #[serde(default = "default_customer_after_hours")]
    pub customer_after_hours: u32,
    #[serde(default = "default_provider_after_hours")]
    pub provider_after_hours: u32,
}

fn default_customer_after_hours() -> u32 {
    24
}

fn default_provider_after_hours() -> u32 {
    48
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            customer_after_hours: default_customer_after_hours(),
            provider_after_hours: default_provider_after_hours(),
        }
    }
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid desk ID format: {0}")]
    InvalidDeskId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DeskConfig {
    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DeskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_desk_id(&self.desk.id)?;

        match self.llm.provider.as_str() {
            "gemini" | "openai" => {}
            other => {
                return Err(ConfigError::InvalidConfig(format!(
                    "Unsupported LLM provider '{other}' (expected 'gemini' or 'openai')"
                )))
            }
        }

        if let Some(base_url) = &self.llm.base_url {
            url::Url::parse(base_url).map_err(|e| {
                ConfigError::InvalidConfig(format!("Invalid llm.base_url '{base_url}': {e}"))
            })?;
        }

        if let Some(temperature) = self.llm.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature must be between 0.0 and 2.0, got {temperature}"
                )));
            }
        }

        if self.budget.max_tool_calls == 0 && self.budget.max_tool_rounds > 0 {
            return Err(ConfigError::InvalidConfig(
                "budget.max_tool_calls must be at least 1 when tool rounds are enabled"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Get LLM API key from environment variable
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    /// Whether the API key variable is set, without failing
    pub fn has_llm_api_key(&self) -> bool {
        self.get_llm_api_key().is_ok()
    }

    /// Server port, honoring the `SERVER_PORT` override
    pub fn server_port(&self) -> u16 {
        std::env::var("SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.server.port)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[desk]
id = "test-desk"
description = "A test desk"

[llm]
provider = "gemini"
model = "gemini-flash-lite-latest"
api_key_env = "GEMINI_API_KEY"
temperature = 0.2
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate desk ID format
fn validate_desk_id(desk_id: &str) -> Result<(), ConfigError> {
    let valid_chars = desk_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if desk_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidDeskId(format!(
            "Desk ID '{desk_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
