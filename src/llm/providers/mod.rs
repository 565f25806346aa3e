//! Concrete `LlmProvider` implementations

pub mod gemini;
pub mod openai;

pub use gemini::*;
pub use openai::*;
