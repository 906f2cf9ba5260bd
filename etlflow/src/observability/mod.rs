//! Observability utilities.

mod logging;

pub use logging::{init_tracing, LogFormat, DEFAULT_LOG_FILTER};
