//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Proxy core produces:
//!     → sink.rs (one (tag, message) pair per notable event, injected)
//!     → tracing events (per-connection detail at debug level)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → LogBuffer (recent lines for the admin surface)
//!     → Prometheus scrape (optional)
//! ```

pub mod logging;
pub mod metrics;
pub mod sink;

pub use sink::{LogBuffer, LogSink, TracingSink};
