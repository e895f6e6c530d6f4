//! Client presence tracking.
//!
//! Every accepted connection refreshes its source address; readers see only
//! addresses seen within the TTL. There is no handshake of its own.

pub mod registry;

pub use registry::{ClientEntry, ClientRegistry, CLIENT_TTL};
