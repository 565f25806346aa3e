//! Testing utilities
//!
//! Scripted providers and canned model answers for exercising the pipeline,
//! the desk and the HTTP surface without network access.

pub mod mocks;

pub use mocks::*;
