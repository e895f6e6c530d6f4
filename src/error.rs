//! Error taxonomy for the proxy core.
//!
//! Per-connection failures are answered with a minimal status line and only
//! ever close that one connection. Relay I/O errors never reach this type.

use std::io;
use thiserror::Error;

/// Errors produced while starting the proxy or serving one connection.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The listening socket could not be bound. Fatal to a start attempt.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// `start` was called while a run is already active.
    #[error("proxy is already running")]
    AlreadyRunning,

    /// No header terminator within the configured limit.
    #[error("request header exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// The request could not be framed or has no resolvable target.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An authority string (`host[:port]`) could not be parsed.
    #[error("invalid authority: {0:?}")]
    InvalidAuthority(String),

    /// The origin server refused or could not be reached.
    #[error("failed to connect to {target}: {source}")]
    UpstreamConnect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// A peer stayed silent for longer than the idle timeout.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// Any other socket error on the client connection.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProxyError {
    /// Status line sent to the client before closing, if the error warrants one.
    pub fn status_line(&self) -> Option<&'static str> {
        match self {
            ProxyError::BadRequest(_) | ProxyError::InvalidAuthority(_) => Some("400 Bad Request"),
            ProxyError::HeaderTooLarge { .. } => Some("431 Request Header Fields Too Large"),
            ProxyError::UpstreamConnect { source, .. } if source.kind() == io::ErrorKind::TimedOut => {
                Some("504 Gateway Timeout")
            }
            ProxyError::UpstreamConnect { .. } => Some("502 Bad Gateway"),
            _ => None,
        }
    }

    /// Short label used for the error metric.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Bind { .. } => "bind",
            ProxyError::AlreadyRunning => "already_running",
            ProxyError::HeaderTooLarge { .. } => "header_too_large",
            ProxyError::BadRequest(_) => "bad_request",
            ProxyError::InvalidAuthority(_) => "invalid_authority",
            ProxyError::UpstreamConnect { .. } => "upstream_connect",
            ProxyError::Timeout(_) => "timeout",
            ProxyError::Io(_) => "io",
        }
    }
}
