//! Startup orchestration.
//!
//! Order: metrics exporter, log buffer, proxy service, then the admin
//! surface. Any failure before the proxy listens is fatal.

use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::admin::{serve_admin, AdminState};
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::lifecycle::ProxyService;
use crate::observability::{metrics, LogBuffer};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Proxy(#[from] ProxyError),

    #[error("admin surface: {0}")]
    Admin(#[source] std::io::Error),
}

/// Everything started for one process run.
pub struct Running {
    pub service: Arc<ProxyService>,
    pub logs: Arc<LogBuffer>,
    pub proxy_addr: SocketAddr,
    pub admin_addr: Option<SocketAddr>,
    admin: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
}

impl Running {
    /// Stop the admin surface, then the proxy.
    pub async fn shutdown(self) {
        if let Some((stop_tx, task)) = self.admin {
            let _ = stop_tx.send(());
            let _ = task.await;
        }
        self.service.stop().await;
    }
}

/// Start the proxy and its optional companions from `config`.
pub async fn start(config: ProxyConfig) -> Result<Running, StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let logs = Arc::new(LogBuffer::new(config.observability.log_buffer_lines));
    let port = config.listener.port;
    let admin_config = config.admin.clone();
    let service = Arc::new(ProxyService::with_sink(config, logs.clone()));
    let proxy_addr = service.start(port).await?;

    let mut running = Running {
        service: Arc::clone(&service),
        logs: Arc::clone(&logs),
        proxy_addr,
        admin_addr: None,
        admin: None,
    };

    if admin_config.enabled {
        let listener = match TcpListener::bind(&admin_config.bind_address).await {
            Ok(listener) => listener,
            Err(e) => {
                running.service.stop().await;
                return Err(StartupError::Admin(e));
            }
        };
        running.admin_addr = listener.local_addr().ok();

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let state = AdminState { service, logs };
        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = stop_rx.await;
            };
            if let Err(e) = serve_admin(listener, state, shutdown).await {
                tracing::error!(error = %e, "Admin surface failed");
            }
        });
        running.admin = Some((stop_tx, task));
    }

    Ok(running)
}
