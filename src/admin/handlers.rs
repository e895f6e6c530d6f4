use axum::{extract::State, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::clients::ClientEntry;
use crate::lifecycle::ServiceState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub state: ServiceState,
    pub running: bool,
    pub active_clients: u32,
    pub open_connections: u64,
    pub local_address: Option<String>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let service = &state.service;
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        state: service.state(),
        running: service.is_running(),
        active_clients: service.active_client_count(),
        open_connections: service.open_connections(),
        local_address: service.local_addr().map(|addr| addr.to_string()),
    })
}

pub async fn get_clients(State(state): State<AdminState>) -> Json<Vec<ClientEntry>> {
    Json(state.service.clients())
}

pub async fn get_logs(State(state): State<AdminState>) -> Json<Vec<String>> {
    Json(state.logs.lines())
}
