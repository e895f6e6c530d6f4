//! The proxy service object.
//!
//! # Responsibilities
//! - Own the running flag, client registry and log sink of the proxy
//! - `start(port)`: Stopped → Starting → Listening, or back to Stopped on bind failure
//! - `stop()`: clear the flag, close the listener, abort in-flight handlers, clear the registry
//! - Answer status queries (running, active client count)
//!
//! # Design Decisions
//! - One accept task per run; one handler task per accepted connection
//! - Handler tasks live in a `JoinSet` owned by the accept task, so ending the
//!   accept task aborts them all
//! - Accept errors seen after the flag is cleared are expected and not reported

use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};

use crate::clients::{ClientEntry, ClientRegistry};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::lifecycle::shutdown::{RunningFlag, Shutdown};
use crate::net::{ConnectionTracker, Listener};
use crate::observability::{metrics, LogSink, TracingSink};
use crate::proxy::ConnectionHandler;

/// Tag attached to every event pushed to the log sink.
pub const LOG_TAG: &str = "ProxyService";

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Lifecycle state of the listener.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped = 0,
    Starting = 1,
    Listening = 2,
}

impl From<u8> for ServiceState {
    fn from(val: u8) -> Self {
        match val {
            1 => ServiceState::Starting,
            2 => ServiceState::Listening,
            _ => ServiceState::Stopped,
        }
    }
}

/// State shared by the service, its accept task and every handler.
struct Shared {
    running: RunningFlag,
    state: AtomicU8,
    registry: ClientRegistry,
    connections: ConnectionTracker,
    local_addr: StdMutex<Option<SocketAddr>>,
    sink: Arc<dyn LogSink>,
}

impl Shared {
    fn log(&self, message: &str) {
        self.sink.emit(LOG_TAG, message);
    }

    fn set_state(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn set_local_addr(&self, addr: Option<SocketAddr>) {
        match self.local_addr.lock() {
            Ok(mut slot) => *slot = addr,
            Err(poisoned) => *poisoned.into_inner() = addr,
        }
    }
}

/// A running accept loop and the means to stop it.
struct ActiveRun {
    shutdown: Shutdown,
    accept_task: JoinHandle<()>,
}

/// Local forward proxy with start/stop control and status queries.
pub struct ProxyService {
    config: ProxyConfig,
    shared: Arc<Shared>,
    run: Mutex<Option<ActiveRun>>,
}

impl ProxyService {
    /// Create a stopped service that logs through `tracing`.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Create a stopped service that pushes its events to `sink`.
    pub fn with_sink(config: ProxyConfig, sink: Arc<dyn LogSink>) -> Self {
        let registry = ClientRegistry::new(config.clients.ttl());
        Self {
            config,
            shared: Arc::new(Shared {
                running: RunningFlag::new(),
                state: AtomicU8::new(ServiceState::Stopped as u8),
                registry,
                connections: ConnectionTracker::new(),
                local_addr: StdMutex::new(None),
                sink,
            }),
            run: Mutex::new(None),
        }
    }

    /// Bind `port` on the configured interface and start accepting.
    ///
    /// Returns the bound address; port 0 picks an ephemeral port.
    pub async fn start(&self, port: u16) -> Result<SocketAddr, ProxyError> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(ProxyError::AlreadyRunning);
        }

        let shared = &self.shared;
        shared.set_state(ServiceState::Starting);
        shared.log(&format!("Starting proxy on port {port}"));

        let bound = bind_address(&self.config.listener.bind_address, port)
            .and_then(|addr| {
                let listener = Listener::bind(addr)?;
                let local = listener.local_addr().map_err(|source| ProxyError::Bind {
                    address: addr.to_string(),
                    source,
                })?;
                Ok((listener, local))
            });
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                shared.set_state(ServiceState::Stopped);
                metrics::record_error(e.kind());
                shared.log(&format!("Proxy error: {e}"));
                return Err(e);
            }
        };

        shared.running.set();
        shared.set_local_addr(Some(local_addr));
        shared.set_state(ServiceState::Listening);
        shared.log(&format!("Proxy listening on {local_addr}"));

        let shutdown = Shutdown::new();
        let stop_rx = shutdown.subscribe();
        let handler = Arc::new(ConnectionHandler::from_config(&self.config));
        let accept_task = tokio::spawn(accept_loop(listener, Arc::clone(shared), handler, stop_rx));

        *run = Some(ActiveRun {
            shutdown,
            accept_task,
        });
        Ok(local_addr)
    }

    /// Stop accepting, abort in-flight connections and forget all clients.
    pub async fn stop(&self) {
        let active = self.run.lock().await.take();
        let was_running = self.shared.running.clear();

        if let Some(active) = active {
            active.shutdown.trigger();
            if let Err(e) = active.accept_task.await {
                tracing::warn!(error = %e, "Accept task ended abnormally");
            }
        }

        self.shared.registry.clear();
        self.shared.set_local_addr(None);
        self.shared.set_state(ServiceState::Stopped);
        if was_running {
            self.shared.log("Proxy stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.is_set()
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from(self.shared.state.load(Ordering::SeqCst))
    }

    /// Distinct client addresses seen within the TTL.
    pub fn active_client_count(&self) -> u32 {
        u32::try_from(self.shared.registry.active_count()).unwrap_or(u32::MAX)
    }

    /// Tracked clients after pruning, most recent first.
    pub fn clients(&self) -> Vec<ClientEntry> {
        self.shared.registry.snapshot()
    }

    /// Connections currently being framed or relayed.
    pub fn open_connections(&self) -> u64 {
        self.shared.connections.open_count()
    }

    /// Address of the listening socket while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self.shared.local_addr.lock() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

impl Drop for ProxyService {
    fn drop(&mut self) {
        // Without an explicit stop the accept task would outlive its owner.
        if let Some(active) = self.run.get_mut().take() {
            self.shared.running.clear();
            active.shutdown.trigger();
            active.accept_task.abort();
        }
    }
}

fn bind_address(interface: &str, port: u16) -> Result<SocketAddr, ProxyError> {
    let ip: IpAddr = interface.parse().map_err(|e| ProxyError::Bind {
        address: format!("{interface}:{port}"),
        source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
    })?;
    Ok(SocketAddr::new(ip, port))
}

async fn accept_loop(
    listener: Listener,
    shared: Arc<Shared>,
    handler: Arc<ConnectionHandler>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if !shared.running.is_set() {
                        break;
                    }
                    let client_ip = peer.ip().to_canonical();
                    shared.registry.record(client_ip);
                    metrics::record_connection();
                    shared.log(&format!("Client connected: {client_ip}"));

                    let guard = shared.connections.track();
                    let shared = Arc::clone(&shared);
                    let handler = Arc::clone(&handler);
                    handlers.spawn(async move {
                        let id = guard.id();
                        if let Err(e) = handler.handle(stream, id).await {
                            metrics::record_error(e.kind());
                            shared.log(&format!("Client error ({client_ip}, {id}): {e}"));
                        }
                        drop(guard);
                    });
                }
                Err(e) => {
                    if !shared.running.is_set() {
                        break;
                    }
                    shared.log(&format!("Accept error: {e}"));
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            },
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = finished {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Connection handler panicked");
                    }
                }
            }
        }
    }

    // Close the listening socket before tearing down handlers.
    drop(listener);
    let in_flight = handlers.len();
    handlers.shutdown().await;
    tracing::debug!(in_flight, "Accept loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::LogBuffer;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn local_config() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.listener.bind_address = "127.0.0.1".into();
        config
    }

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            ServiceState::Stopped,
            ServiceState::Starting,
            ServiceState::Listening,
        ] {
            assert_eq!(ServiceState::from(state as u8), state);
        }
    }

    #[tokio::test]
    async fn start_and_stop_transitions() {
        let logs = Arc::new(LogBuffer::new(50));
        let service = ProxyService::with_sink(local_config(), logs.clone());
        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(!service.is_running());

        let addr = service.start(0).await.unwrap();
        assert!(service.is_running());
        assert_eq!(service.state(), ServiceState::Listening);
        assert_eq!(service.local_addr(), Some(addr));

        service.stop().await;
        assert!(!service.is_running());
        assert_eq!(service.state(), ServiceState::Stopped);
        assert_eq!(service.local_addr(), None);
        assert!(TcpStream::connect(addr).await.is_err());

        let text = logs.text();
        assert!(text.contains("ProxyService: Starting proxy on port 0"));
        assert!(text.contains(&format!("ProxyService: Proxy listening on {addr}")));
        assert!(text.contains("ProxyService: Proxy stopped"));
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let service = ProxyService::new(local_config());
        let addr = service.start(0).await.unwrap();
        assert!(matches!(service.start(0).await, Err(ProxyError::AlreadyRunning)));
        assert_eq!(service.local_addr(), Some(addr));
        service.stop().await;
    }

    #[tokio::test]
    async fn bind_failure_returns_to_stopped() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();

        let logs = Arc::new(LogBuffer::new(50));
        let service = ProxyService::with_sink(local_config(), logs.clone());
        let err = service.start(port).await.unwrap_err();
        assert!(matches!(err, ProxyError::Bind { .. }));
        assert_eq!(service.state(), ServiceState::Stopped);
        assert!(!service.is_running());
        assert!(logs.text().contains("Proxy error: failed to bind"));

        // The service can still be started elsewhere afterwards.
        service.start(0).await.unwrap();
        service.stop().await;
    }

    #[tokio::test]
    async fn accepted_clients_are_counted_and_cleared_on_stop() {
        let service = ProxyService::new(local_config());
        let addr = service.start(0).await.unwrap();

        let mut first = TcpStream::connect(addr).await.unwrap();
        first
            .write_all(b"GET nowhere HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        first.read_to_end(&mut response).await.unwrap();
        assert!(response.starts_with(b"HTTP/1.1 400"));

        let _second = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Both connections come from 127.0.0.1.
        assert_eq!(service.active_client_count(), 1);
        assert_eq!(service.active_client_count(), 1);
        assert_eq!(service.clients()[0].address, IpAddr::from([127, 0, 0, 1]));

        service.stop().await;
        assert_eq!(service.active_client_count(), 0);
    }

    #[tokio::test]
    async fn stop_interrupts_in_flight_connections() {
        let service = ProxyService::new(local_config());
        let addr = service.start(0).await.unwrap();

        // Never finishes its header, so the handler stays parked in framing.
        let mut idle = TcpStream::connect(addr).await.unwrap();
        idle.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.open_connections(), 1);

        service.stop().await;
        assert_eq!(service.open_connections(), 0);

        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(5), idle.read(&mut buf))
            .await
            .unwrap()
            .unwrap_or(0);
        assert_eq!(n, 0);
    }
}
