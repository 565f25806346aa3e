//! LLM provider abstraction layer
//!
//! Provider-agnostic completion interface with function calling, plus the
//! Gemini and OpenAI backends.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
