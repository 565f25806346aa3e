//! Lead intake desk for a local-services marketplace
//!
//! Inbound messages from customers and service providers, often informal
//! Hinglish, are handed to a hosted LLM together with three local tools
//! (base price lookup, provider availability, priority scoring). The model
//! answers with a structured result: extracted lead fields, tool insights,
//! a draft reply, an optional follow-up and the next lead status.
//!
//! # Overview
//!
//! - [`lead`]: lead types, model-output parsing and the text card
//! - [`tools`]: the tool runtime and the builtin lookups
//! - [`llm`]: provider abstraction with Gemini and OpenAI backends
//! - [`pipeline`]: the system prompt and the tool-calling conversation
//! - [`desk`]: the lead list and its follow-up/close actions
//! - [`server`]: the warp HTTP surface
//!
//! # Quick Start
//!
//! ```rust
//! use lead_intake::lead::{parse_model_output, LeadStatus, PipelineInput};
//! use lead_intake::tools::builtin::BasePriceTool;
//! use lead_intake::tools::builtin::default_price_table;
//!
//! // The user turn sent to the model for a fresh message
//! let input = PipelineInput::for_new_message("kal Gaya me birthday decoration chahiye");
//! let turn = serde_json::to_string(&input).unwrap();
//! assert!(turn.contains("\"lead_status\":\"NEW\""));
//!
//! // The same lookup the model gets through get_base_price
//! let price = BasePriceTool::lookup(&default_price_table(), Some("Birthday Decoration"));
//! assert_eq!(price, 2000);
//!
//! // Fenced answers are accepted; a missing status keeps the current one
//! let result = parse_model_output("```json\n{\"reply_message\": \"Hi!\"}\n```", LeadStatus::New).unwrap();
//! assert_eq!(result.new_status, LeadStatus::New);
//! ```

pub mod config;
pub mod desk;
pub mod error;
pub mod health;
pub mod lead;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod testing;
pub mod tools;

pub use config::*;
pub use desk::{DeskStats, LeadDesk};
pub use error::{LeadError, LeadResult};
pub use lead::{Lead, LeadStatus, PipelineInput, PipelineResult};
pub use pipeline::{LeadPipeline, PipelineOutcome};
pub use tools::{Tool, ToolDescription, ToolError, ToolSystem};
