//! Local tool runtime
//!
//! Tools are described to the model by name, description and JSON schema,
//! and executed locally when the model calls them. Parameters are validated
//! against the schema before execution.
//!
//! # Usage
//!
//! ```rust
//! use lead_intake::config::default_tools;
//! use lead_intake::tools::ToolSystem;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let mut tools = ToolSystem::new();
//! tools.initialize(&default_tools()).await?;
//!
//! let output = tools
//!     .execute_tool("find_providers", &json!({"service_type": "home tutor", "location": "Kankarbagh"}))
//!     .await?;
//! assert_eq!(output["provider_summary"], "2 experienced tutors found in Kankarbagh.");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

use crate::config::ToolConfig;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

pub mod builtin;

/// A locally executed tool the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name, description and JSON schema for the parameters
    fn describe(&self) -> ToolDescription;

    /// Called once at startup with the tool's `config` table, if any
    async fn initialize(&mut self, config: Option<&Value>) -> Result<(), ToolError>;

    /// Run the tool; parameters have already been validated against the schema
    async fn execute(&self, parameters: &Value) -> Result<Value, ToolError>;

    async fn shutdown(&mut self) -> Result<(), ToolError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Registry of configured tools
pub struct ToolSystem {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolSystem {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create and initialize every tool in the `[tools]` table
    pub async fn initialize(
        &mut self,
        tool_configs: &HashMap<String, ToolConfig>,
    ) -> Result<(), ToolError> {
        for (tool_name, tool_config) in tool_configs {
            let mut tool = Self::create_tool(tool_name, tool_config)?;

            let config = match tool_config {
                ToolConfig::Simple(_) => None,
                ToolConfig::Complex { config, .. } => Some(
                    serde_json::to_value(config)
                        .map_err(|e| ToolError::InitializationError(e.to_string()))?,
                ),
            };

            tool.initialize(config.as_ref()).await?;
            tracing::debug!(tool = %tool_name, "Tool initialized");

            self.tools.insert(tool_name.clone(), tool);
        }

        Ok(())
    }

    /// Register an already constructed tool
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.describe().name;
        self.tools.insert(name, tool);
    }

    fn create_tool(tool_name: &str, config: &ToolConfig) -> Result<Box<dyn Tool>, ToolError> {
        let impl_name = match config {
            ToolConfig::Simple(impl_name) => impl_name,
            ToolConfig::Complex { implementation, .. } => implementation,
        };

        match impl_name.as_str() {
            "builtin" => Self::create_builtin_tool(tool_name),
            _ => Err(ToolError::UnknownImplementation(impl_name.clone())),
        }
    }

    fn create_builtin_tool(tool_name: &str) -> Result<Box<dyn Tool>, ToolError> {
        match tool_name {
            builtin::GET_BASE_PRICE => Ok(Box::new(builtin::BasePriceTool::new())),
            builtin::FIND_PROVIDERS => Ok(Box::new(builtin::FindProvidersTool::new())),
            builtin::SCORE_LEAD_PRIORITY => Ok(Box::new(builtin::LeadPriorityTool::new())),
            _ => Err(ToolError::UnknownTool(tool_name.to_string())),
        }
    }

    pub fn describe_tool(&self, tool_name: &str) -> Option<ToolDescription> {
        self.tools.get(tool_name).map(|tool| tool.describe())
    }

    /// Descriptions of all tools, sorted by name
    pub fn describe_all(&self) -> Vec<ToolDescription> {
        let mut descriptions: Vec<_> = self.tools.values().map(|t| t.describe()).collect();
        descriptions.sort_by(|a, b| a.name.cmp(&b.name));
        descriptions
    }

    /// Validate parameters and execute the named tool
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: &Value,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        Self::validate_parameters(&tool.describe(), parameters)?;

        tool.execute(parameters).await
    }

    fn validate_parameters(description: &ToolDescription, parameters: &Value) -> Result<(), ToolError> {
        let validator = jsonschema::validator_for(&description.parameters)
            .map_err(|e| ToolError::SchemaError(format!("Schema compilation error: {e}")))?;

        let error_messages: Vec<String> = validator
            .iter_errors(parameters)
            .map(|e| format!("At '{}': {}", e.instance_path, e))
            .collect();
        if error_messages.is_empty() {
            Ok(())
        } else {
            Err(ToolError::ValidationError(error_messages.join("; ")))
        }
    }

    /// Tool names, sorted
    pub fn list_tools(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn shutdown(&mut self) -> Result<(), ToolError> {
        for tool in self.tools.values_mut() {
            tool.shutdown().await?;
        }
        Ok(())
    }
}

impl Default for ToolSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Unknown tool implementation: {0}")]
    UnknownImplementation(String),
    #[error("Tool initialization failed: {0}")]
    InitializationError(String),
    #[error("Parameter validation failed: {0}")]
    ValidationError(String),
    #[error("Schema error: {0}")]
    SchemaError(String),
}
