//! Shared utilities for end-to-end tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use hotspot_proxy::config::ProxyConfig;
use hotspot_proxy::ProxyService;

/// Start a proxy on an ephemeral loopback port.
pub async fn start_proxy() -> (ProxyService, SocketAddr) {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1".into();
    let service = ProxyService::new(config);
    let addr = service.start(0).await.unwrap();
    (service, addr)
}

/// Origin that accepts one connection, captures the request header plus
/// `body_len` body bytes, answers with `response` and closes.
pub async fn start_recording_origin(
    body_len: usize,
    response: &'static str,
) -> (SocketAddr, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut seen = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(end) = header_end(&seen) {
                if seen.len() >= end + body_len {
                    break;
                }
            }
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&chunk[..n]);
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        let _ = tx.send(seen);
    });

    (addr, rx)
}

/// Origin that echoes every byte of one connection back.
pub async fn start_echo_origin() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = socket.split();
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
        let _ = writer.shutdown().await;
    });

    addr
}

/// Read from `stream` until the peer closes.
pub async fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    out
}

fn header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}
