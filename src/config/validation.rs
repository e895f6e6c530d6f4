//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! All problems are collected so a bad file is reported in one pass.

use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not an IP address")]
    BindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("limits.max_header_bytes must be at least 4, got {0}")]
    HeaderLimit(usize),

    #[error("{field} {value:?} is not a socket address")]
    SocketAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration, returning every error found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.idle_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }

    // The terminator alone is four bytes.
    if config.limits.max_header_bytes < 4 {
        errors.push(ValidationError::HeaderLimit(config.limits.max_header_bytes));
    }
    if config.limits.read_chunk_bytes == 0 {
        errors.push(ValidationError::Zero("limits.read_chunk_bytes"));
    }
    if config.limits.relay_chunk_bytes == 0 {
        errors.push(ValidationError::Zero("limits.relay_chunk_bytes"));
    }

    if config.clients.ttl_secs == 0 {
        errors.push(ValidationError::Zero("clients.ttl_secs"));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::SocketAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::SocketAddress {
            field: "admin.bind_address",
            value: config.admin.bind_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
