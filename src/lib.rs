//! Local forward proxy for clients sharing a hotspot network.
//!
//! Accepts plain TCP connections, frames one HTTP/1.x request off the wire,
//! then either opens a CONNECT tunnel or forwards a rewritten request, and
//! relays raw bytes in both directions. Client addresses are tracked with a
//! TTL so a status display can report who is using the proxy.

pub mod admin;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use lifecycle::{ProxyService, ServiceState};
