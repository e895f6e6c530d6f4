//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → metrics → log buffer → ProxyService::start → admin surface
//!
//! Service (service.rs):
//!     Stopped → Starting → Listening → Stopped
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → clear running flag → close listener → abort handlers → clear registry
//! ```

pub mod service;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use service::{ProxyService, ServiceState, LOG_TAG};
pub use shutdown::{RunningFlag, Shutdown};
pub use startup::{start, Running, StartupError};
