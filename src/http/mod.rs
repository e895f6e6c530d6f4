//! HTTP/1.x request handling straight off the wire.
//!
//! # Data Flow
//! ```text
//! client bytes
//!     → request.rs (frame header block, keep body prefix)
//!     → target.rs (absolute URI / Host header / CONNECT authority)
//!         → authority.rs (host[:port], bracketed IPv6)
//!     → rewrite.rs (forward header block for plain HTTP)
//!     → response.rs (CONNECT success line, terminal error lines)
//! ```
//!
//! # Design Decisions
//! - Header text is decoded 8-bit clean (latin1.rs) so retransmission is exact
//! - Only one request per connection is parsed; afterwards bytes are relayed raw

pub mod authority;
pub mod latin1;
pub mod request;
pub mod response;
pub mod rewrite;
pub mod target;

pub use authority::{parse_authority, HostPort};
pub use request::{FramedRequest, RequestFramer};
pub use rewrite::build_forward_header;
pub use target::{resolve_connect, resolve_target, UpstreamTarget};
