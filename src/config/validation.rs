//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, node id fits)
//! - Check formats serde cannot express (dates, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::snowflake::MAX_MACHINE_ID;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("port must be non-zero")]
    ZeroPort,

    #[error("shutdown_timeout_secs must be greater than zero")]
    ZeroShutdownTimeout,

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("start_time {0:?} is not a YYYY-MM-DD date")]
    InvalidStartTime(String),

    #[error("machine_id {0} exceeds maximum {max}", max = MAX_MACHINE_ID)]
    MachineIdOutOfRange(u16),

    #[error("locale must not be empty")]
    EmptyLocale,

    #[error("mysql.max_open_conns must be greater than zero")]
    ZeroPoolSize,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.shutdown_timeout_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTimeout);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }
    if NaiveDate::parse_from_str(&config.start_time, "%Y-%m-%d").is_err() {
        errors.push(ValidationError::InvalidStartTime(config.start_time.clone()));
    }
    if config.machine_id > MAX_MACHINE_ID {
        errors.push(ValidationError::MachineIdOutOfRange(config.machine_id));
    }
    if config.locale.trim().is_empty() {
        errors.push(ValidationError::EmptyLocale);
    }
    if config.mysql.max_open_conns == 0 {
        errors.push(ValidationError::ZeroPoolSize);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
