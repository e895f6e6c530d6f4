//! Per-connection request dispatch.
//!
//! # Responsibilities
//! - Frame exactly one request from the client
//! - CONNECT: open the tunnel, confirm it, forward buffered bytes, relay
//! - Anything else: rewrite the header, forward it with buffered body bytes, relay
//! - Answer framing, resolution and upstream failures with a terminal status line
//!
//! # Design Decisions
//! - No upstream socket is opened unless the target resolved
//! - The body prefix is written upstream before any relayed byte
//! - Failures never leave this connection

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::authority::HostPort;
use crate::http::request::{FramedRequest, RequestFramer};
use crate::http::response::{send_error, CONNECT_ESTABLISHED};
use crate::http::rewrite::build_forward_header;
use crate::http::target::{resolve_connect, resolve_target};
use crate::net::ConnectionId;
use crate::observability::metrics;
use crate::proxy::relay::Relay;

/// Serves one client connection from first byte to relay teardown.
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    framer: RequestFramer,
    relay: Relay,
    connect_timeout: Duration,
    idle: Duration,
}

impl ConnectionHandler {
    pub fn new(framer: RequestFramer, relay: Relay, connect_timeout: Duration, idle: Duration) -> Self {
        Self {
            framer,
            relay,
            connect_timeout,
            idle,
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(
            RequestFramer::from_config(&config.limits, &config.timeouts),
            Relay::from_config(&config.limits, &config.timeouts),
            config.timeouts.connect(),
            config.timeouts.idle(),
        )
    }

    /// Handle one connection.
    ///
    /// Errors have already been answered on the wire when they carry a status
    /// line; the caller only needs to report them.
    pub async fn handle<S>(&self, mut client: S, id: ConnectionId) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let request = match self.framer.read(&mut client).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                tracing::debug!(connection_id = %id, "Client closed before sending a request");
                return Ok(());
            }
            Err(e) => return reject(&mut client, e).await,
        };

        tracing::debug!(
            connection_id = %id,
            method = %request.method,
            target = %request.target,
            buffered = request.body_prefix.len(),
            "Request framed"
        );

        if request.is_connect() {
            metrics::record_request("connect");
            self.tunnel(client, request, id).await
        } else {
            metrics::record_request("http");
            self.forward(client, request, id).await
        }
    }

    async fn tunnel<S>(&self, mut client: S, request: FramedRequest, id: ConnectionId) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let target = match resolve_connect(&request) {
            Ok(target) => target,
            Err(e) => return reject(&mut client, e).await,
        };
        let mut upstream = match self.connect(&target).await {
            Ok(upstream) => upstream,
            Err(e) => return reject(&mut client, e).await,
        };

        self.write_flush(&mut client, CONNECT_ESTABLISHED, "tunnel confirmation")
            .await?;
        if !request.body_prefix.is_empty() {
            self.write_flush(&mut upstream, &request.body_prefix, "tunnel prefix")
                .await?;
        }

        tracing::debug!(connection_id = %id, target = %target, "Tunnel established");
        let stats = self.relay.run(client, upstream).await;
        tracing::debug!(
            connection_id = %id,
            target = %target,
            sent = stats.upstream_bytes,
            received = stats.downstream_bytes,
            "Tunnel closed"
        );
        Ok(())
    }

    async fn forward<S>(&self, mut client: S, request: FramedRequest, id: ConnectionId) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let target = match resolve_target(&request) {
            Ok(target) => target,
            Err(e) => return reject(&mut client, e).await,
        };
        let authority = target.authority();
        let mut upstream = match self.connect(&authority).await {
            Ok(upstream) => upstream,
            Err(e) => return reject(&mut client, e).await,
        };

        let mut outbound = build_forward_header(&request, &target);
        outbound.extend_from_slice(&request.body_prefix);
        self.write_flush(&mut upstream, &outbound, "forward header")
            .await?;

        tracing::debug!(
            connection_id = %id,
            upstream = %authority,
            path = %target.forward_path,
            "Request forwarded"
        );
        let stats = self.relay.run(client, upstream).await;
        tracing::debug!(
            connection_id = %id,
            upstream = %authority,
            sent = stats.upstream_bytes,
            received = stats.downstream_bytes,
            "Exchange finished"
        );
        Ok(())
    }

    async fn connect(&self, target: &HostPort) -> Result<TcpStream, ProxyError> {
        let connect_error = |source: std::io::Error| ProxyError::UpstreamConnect {
            target: target.to_string(),
            source,
        };

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(target.connect_addr()))
            .await
            .map_err(|_| {
                connect_error(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect timed out",
                ))
            })?
            .map_err(connect_error)?;

        // Relayed chunks go out as soon as they are read.
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    async fn write_flush<W>(&self, writer: &mut W, bytes: &[u8], what: &'static str) -> Result<(), ProxyError>
    where
        W: AsyncWrite + Unpin,
    {
        tokio::time::timeout(self.idle, async {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| ProxyError::Timeout(what))??;
        Ok(())
    }
}

impl Default for ConnectionHandler {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

/// Answer a failed request on the wire, then hand the error back.
async fn reject<W>(client: &mut W, error: ProxyError) -> Result<(), ProxyError>
where
    W: AsyncWrite + Unpin,
{
    if let Some(status) = error.status_line() {
        if let Err(e) = send_error(client, status).await {
            tracing::debug!(error = %e, "Could not deliver error response");
        }
    }
    let _ = client.shutdown().await;
    Err(error)
}
