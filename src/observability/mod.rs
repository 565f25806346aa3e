//! Observability for the lead desk
//!
//! Structured logging with span macros, plus a process-global metrics
//! collector exported at `/metrics`.

pub mod logging;
pub mod metrics;

pub use logging::{init_default_logging, init_logging, init_logging_with_verbosity, LogFormat};
pub use metrics::{metrics, MetricsCollector, MetricsSnapshot};

// Span macros for structured logging
pub use logging::{lead_span, llm_span, tool_span};
