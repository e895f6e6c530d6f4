//! Read-only status surface for the reporting layer.
//!
//! Exposes aggregate status only: running state, client count, tracked
//! addresses and recent log lines. Nothing here can change the proxy.

pub mod handlers;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::lifecycle::ProxyService;
use crate::observability::LogBuffer;
use self::handlers::{get_clients, get_logs, get_status};

#[derive(Clone)]
pub struct AdminState {
    pub service: Arc<ProxyService>,
    pub logs: Arc<LogBuffer>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/clients", get(get_clients))
        .route("/admin/logs", get(get_logs))
        .with_state(state)
}

/// Serve the admin router until `shutdown` resolves.
pub async fn serve_admin<F>(listener: TcpListener, state: AdminState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin surface listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
