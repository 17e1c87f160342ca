//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, the base host and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: GateConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::events::tag::validate_label;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("events.base_host: {0}")]
    InvalidBaseHost(String),

    #[error("audit.log_dir must not be empty")]
    EmptyLogDir,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroTimeout,
}

pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Err(reason) = validate_host(&config.events.base_host) {
        errors.push(ValidationError::InvalidBaseHost(reason));
    }

    if config.audit.log_dir.trim().is_empty() {
        errors.push(ValidationError::EmptyLogDir);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_host(host: &str) -> Result<(), String> {
    if host.is_empty() {
        return Err("must not be empty".to_string());
    }
    for label in host.to_ascii_lowercase().split('.') {
        validate_label(label).map_err(|e| format!("label {:?}: {}", label, e))?;
    }
    Ok(())
}
