//! Builtin tools for lead intake
//!
//! Each tool keeps its decision logic in a pure function next to the `Tool`
//! implementation that exposes it to the model.

pub mod pricing;
pub mod priority;
pub mod providers;

pub use pricing::{configured_price_table, default_price_table, BasePriceTool};
pub use priority::LeadPriorityTool;
pub use providers::FindProvidersTool;

pub const GET_BASE_PRICE: &str = "get_base_price";
pub const FIND_PROVIDERS: &str = "find_providers";
pub const SCORE_LEAD_PRIORITY: &str = "score_lead_priority";
