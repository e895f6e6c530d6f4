//! TCP listener setup.
//!
//! # Responsibilities
//! - Bind the configured address with address reuse enabled
//! - Accept incoming client connections
//!
//! # Design Decisions
//! - No connection cap; one handler per connection
//! - A bind failure is a configuration error and is never retried

use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::error::ProxyError;

const BACKLOG: u32 = 1024;

/// The accepting socket of one proxy run.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
}

impl Listener {
    /// Bind `addr` with `SO_REUSEADDR` set.
    pub fn bind(addr: SocketAddr) -> Result<Self, ProxyError> {
        let bind_error = |source: std::io::Error| ProxyError::Bind {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(addr).map_err(bind_error)?;
        let inner = socket.listen(BACKLOG).map_err(bind_error)?;

        tracing::info!(address = %addr, "Listener bound");
        Ok(Self { inner })
    }

    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.inner.accept().await?;
        tracing::debug!(peer_addr = %peer, "Connection accepted");
        Ok((stream, peer))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.inner.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port_and_accepts() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (_stream, peer) = listener.accept().await.unwrap();
        let client = client.await.unwrap();
        assert_eq!(peer, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn port_conflict_is_bind_error() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let err = Listener::bind(addr).unwrap_err();
        assert!(matches!(err, ProxyError::Bind { .. }));
    }
}
