//! Minimal responses written by the proxy itself.

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Status line sent after a CONNECT tunnel is open.
pub const CONNECT_ESTABLISHED: &[u8] = b"HTTP/1.1 200 Connection Established\r\n\r\n";

/// Terminal response for a failed request: status line, `Connection: close`, no body.
pub fn error_response(status: &str) -> Vec<u8> {
    format!("HTTP/1.1 {status}\r\nConnection: close\r\n\r\n").into_bytes()
}

/// Write a terminal error response and flush it.
pub async fn send_error<W>(writer: &mut W, status: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&error_response(status)).await?;
    writer.flush().await
}
