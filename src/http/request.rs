//! Request framing straight off the client socket.
//!
//! The header block is read in chunks until `\r\n\r\n` shows up. Whatever
//! followed the terminator in the same read is kept as the body prefix; it is
//! never read from the socket again, so it must be forwarded by the caller.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::http::latin1;

const HEADER_END: &[u8] = b"\r\n\r\n";

/// A request whose header block has been fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedRequest {
    pub method: String,
    /// Request-target exactly as sent (absolute URI, origin form, or authority).
    pub target: String,
    pub version: String,
    /// Value of the last `Host` header, trimmed.
    pub host: Option<String>,
    /// Header lines after the request line, verbatim and in order.
    pub headers: Vec<String>,
    /// Bytes read past the header terminator.
    pub body_prefix: Vec<u8>,
}

impl FramedRequest {
    pub fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case("CONNECT")
    }

    /// Parse a complete header block (terminator included or not).
    pub fn parse(header: &[u8], body_prefix: Vec<u8>) -> Result<Self, ProxyError> {
        let text = latin1::decode(header);
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut tokens = request_line.split(' ');
        let (method, target, version) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(m), Some(t), Some(v)) if !m.is_empty() && !t.is_empty() && !v.is_empty() => {
                (m, t, v)
            }
            _ => {
                return Err(ProxyError::BadRequest(format!(
                    "malformed request line {request_line:?}"
                )))
            }
        };

        let mut host = None;
        let mut headers = Vec::new();
        for line in lines.filter(|l| !l.is_empty()) {
            if is_host_line(line) {
                host = line.split_once(':').map(|(_, v)| v.trim().to_string());
            }
            headers.push(line.to_string());
        }

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version: version.to_string(),
            host,
            headers,
            body_prefix,
        })
    }
}

/// Field name of a header line, if it has a colon.
pub fn field_name(line: &str) -> Option<&str> {
    line.split_once(':').map(|(name, _)| name)
}

/// Whether a header line carries `Host`, ignoring case and padding around the name.
pub fn is_host_line(line: &str) -> bool {
    field_name(line).is_some_and(|name| name.trim().eq_ignore_ascii_case("host"))
}

/// Reads one request header block from a client stream.
#[derive(Debug, Clone)]
pub struct RequestFramer {
    max_header_bytes: usize,
    chunk_size: usize,
    idle: Duration,
}

impl RequestFramer {
    pub fn new(max_header_bytes: usize, chunk_size: usize, idle: Duration) -> Self {
        Self {
            max_header_bytes,
            chunk_size: chunk_size.max(1),
            idle,
        }
    }

    pub fn from_config(limits: &LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self::new(
            limits.max_header_bytes,
            limits.read_chunk_bytes,
            timeouts.idle(),
        )
    }

    /// Frame the next request.
    ///
    /// Returns `Ok(None)` when the stream ends before any byte arrives.
    pub async fn read<R>(&self, reader: &mut R) -> Result<Option<FramedRequest>, ProxyError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = Vec::with_capacity(self.chunk_size);
        let mut chunk = vec![0u8; self.chunk_size];

        loop {
            let n = tokio::time::timeout(self.idle, reader.read(&mut chunk))
                .await
                .map_err(|_| ProxyError::Timeout("request header read"))??;

            if n == 0 {
                if buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ProxyError::BadRequest(
                    "connection closed inside the header block".into(),
                ));
            }

            // The terminator may straddle the previous chunk boundary.
            let search_from = buffer.len().saturating_sub(HEADER_END.len() - 1);
            buffer.extend_from_slice(&chunk[..n]);

            if let Some(pos) = find(&buffer[search_from..], HEADER_END) {
                let end = search_from + pos + HEADER_END.len();
                let body_prefix = buffer.split_off(end);
                return FramedRequest::parse(&buffer, body_prefix).map(Some);
            }

            if buffer.len() > self.max_header_bytes {
                return Err(ProxyError::HeaderTooLarge {
                    limit: self.max_header_bytes,
                });
            }
        }
    }
}

impl Default for RequestFramer {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default(), &TimeoutConfig::default())
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
