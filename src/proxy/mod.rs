//! Forward proxy core.
//!
//! # Data Flow
//! ```text
//! accepted client socket
//!     → handler.rs (frame, classify, resolve)
//!         CONNECT → open tunnel → "200 Connection Established" → body prefix upstream
//!         other   → open upstream → rewritten header + body prefix
//!     → relay.rs (two copy tasks, joined)
//!     → both sockets closed
//! ```

pub mod handler;
pub mod relay;

pub use handler::ConnectionHandler;
pub use relay::{Direction, Relay, RelayStats};
