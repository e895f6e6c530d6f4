//! Bidirectional byte relay between a client and an upstream socket.
//!
//! Each direction is its own task with a blocking read → write → flush loop,
//! so backpressure comes from the writes themselves. A direction ends on EOF,
//! error or idle timeout and leaves the other direction running. Only EOF is
//! passed on as a half-close; an idle or failed direction just stops copying.
//! The relay returns only after both have finished.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to origin.
    Upstream,
    /// Origin to client.
    Downstream,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

/// Bytes moved in each direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub upstream_bytes: u64,
    pub downstream_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct Relay {
    chunk_size: usize,
    idle: Duration,
}

impl Relay {
    pub fn new(chunk_size: usize, idle: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            idle,
        }
    }

    pub fn from_config(limits: &LimitsConfig, timeouts: &TimeoutConfig) -> Self {
        Self::new(limits.relay_chunk_bytes, timeouts.idle())
    }

    /// Relay until both directions are exhausted.
    ///
    /// Dropping the returned future aborts both copy tasks, which closes
    /// both sockets.
    pub async fn run<C, U>(&self, client: C, upstream: U) -> RelayStats
    where
        C: AsyncRead + AsyncWrite + Send + 'static,
        U: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (client_read, client_write) = tokio::io::split(client);
        let (upstream_read, upstream_write) = tokio::io::split(upstream);

        let mut tasks = JoinSet::new();
        tasks.spawn(copy_half(
            client_read,
            upstream_write,
            self.chunk_size,
            self.idle,
            Direction::Upstream,
        ));
        tasks.spawn(copy_half(
            upstream_read,
            client_write,
            self.chunk_size,
            self.idle,
            Direction::Downstream,
        ));

        let mut stats = RelayStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((Direction::Upstream, n)) => stats.upstream_bytes = n,
                Ok((Direction::Downstream, n)) => stats.downstream_bytes = n,
                Err(e) => tracing::debug!(error = %e, "Relay task ended abnormally"),
            }
        }
        stats
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::from_config(&LimitsConfig::default(), &TimeoutConfig::default())
    }
}

async fn copy_half<R, W>(
    mut reader: R,
    mut writer: W,
    chunk_size: usize,
    idle: Duration,
    direction: Direction,
) -> (Direction, u64)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; chunk_size];
    let mut total = 0u64;
    let mut exhausted = false;

    loop {
        let n = match tokio::time::timeout(idle, reader.read(&mut buf)).await {
            Ok(Ok(0)) => {
                exhausted = true;
                break;
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::debug!(direction = direction.label(), error = %e, "Relay read ended");
                break;
            }
            Err(_) => {
                tracing::debug!(direction = direction.label(), "Relay read idle timeout");
                break;
            }
        };

        let written = tokio::time::timeout(idle, async {
            writer.write_all(&buf[..n]).await?;
            writer.flush().await
        })
        .await;
        match written {
            Ok(Ok(())) => total += n as u64,
            Ok(Err(e)) => {
                tracing::debug!(direction = direction.label(), error = %e, "Relay write ended");
                break;
            }
            Err(_) => {
                tracing::debug!(direction = direction.label(), "Relay write idle timeout");
                break;
            }
        }
    }

    // Propagate EOF to the peer; the opposite direction keeps running.
    if exhausted {
        let _ = tokio::time::timeout(idle, writer.shutdown()).await;
    }
    metrics::record_relay_bytes(direction.label(), total);
    (direction, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn relays_both_directions_until_both_close() {
        let (client_side, mut client) = duplex(1024);
        let (upstream_side, mut origin) = duplex(1024);

        let relay = tokio::spawn(async move {
            Relay::new(16, Duration::from_secs(5))
                .run(client_side, upstream_side)
                .await
        });

        client.write_all(b"request bytes that span chunks").await.unwrap();
        client.shutdown().await.unwrap();

        let mut seen = Vec::new();
        origin.read_to_end(&mut seen).await.unwrap();
        assert_eq!(seen, b"request bytes that span chunks");

        // Client half-closed; the response still flows back.
        origin.write_all(b"response").await.unwrap();
        origin.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"response");

        let stats = relay.await.unwrap();
        assert_eq!(
            stats,
            RelayStats {
                upstream_bytes: 30,
                downstream_bytes: 8,
            }
        );
    }

    #[tokio::test]
    async fn origin_close_does_not_cut_client_upload() {
        let (client_side, mut client) = duplex(1024);
        let (upstream_side, mut origin) = duplex(1024);

        let relay = tokio::spawn(async move {
            Relay::new(8, Duration::from_secs(5))
                .run(client_side, upstream_side)
                .await
        });

        origin.write_all(b"early").await.unwrap();
        origin.shutdown().await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, b"early");

        client.write_all(b"late upload").await.unwrap();
        client.shutdown().await.unwrap();
        let mut seen = Vec::new();
        origin.read_to_end(&mut seen).await.unwrap();
        assert_eq!(seen, b"late upload");

        let stats = relay.await.unwrap();
        assert_eq!(stats.upstream_bytes, 11);
        assert_eq!(stats.downstream_bytes, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peers_time_out() {
        let (client_side, _client) = duplex(64);
        let (upstream_side, _origin) = duplex(64);

        let stats = Relay::new(64, Duration::from_secs(30))
            .run(client_side, upstream_side)
            .await;
        assert_eq!(stats, RelayStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_client_leaves_streaming_origin_open() {
        let (client_side, mut client) = duplex(1024);
        let (upstream_side, mut origin) = duplex(1024);

        let relay = tokio::spawn(async move {
            Relay::new(64, Duration::from_secs(30))
                .run(client_side, upstream_side)
                .await
        });

        client.write_all(b"req").await.unwrap();
        let mut request = [0u8; 3];
        origin.read_exact(&mut request).await.unwrap();
        assert_eq!(&request, b"req");

        // The client stays silent well past the idle timeout while the
        // origin keeps streaming.
        for _ in 0..6 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            origin.write_all(b"chunk").await.unwrap();
            let mut chunk = [0u8; 5];
            client.read_exact(&mut chunk).await.unwrap();
            assert_eq!(&chunk, b"chunk");
        }

        // No FIN reached the origin: a read is still pending.
        let mut byte = [0u8; 1];
        let read = tokio::time::timeout(Duration::from_millis(1), origin.read(&mut byte)).await;
        assert!(read.is_err());

        origin.shutdown().await.unwrap();
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let stats = relay.await.unwrap();
        assert_eq!(
            stats,
            RelayStats {
                upstream_bytes: 3,
                downstream_bytes: 30,
            }
        );
    }
}
