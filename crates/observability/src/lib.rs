//! Process-wide tracing setup for the CRM worker.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{LogFormat, init, init_with};
