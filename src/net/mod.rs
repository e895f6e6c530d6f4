//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind with address reuse, accept)
//!     → connection.rs (connection id, in-flight count)
//!     → Hand off to proxy::handler
//! ```

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::Listener;
