//! TCP listener binding.
//!
//! # Responsibilities
//! - Resolve the configured bind address
//! - Bind before the accept loop is spawned, so bind failures surface to the
//!   caller instead of dying inside a background task

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

/// Error type for starting the service listener. Always fatal.
#[derive(Debug, Error)]
pub enum ServiceStartError {
    /// The configured address does not parse.
    #[error("invalid bind address {address:?}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    /// Failed to bind to address (in use, permission denied, ...).
    #[error("listen: failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind a TCP listener to `address` (`host:port`).
pub async fn bind(address: &str) -> Result<TcpListener, ServiceStartError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|source| ServiceStartError::InvalidAddress {
            address: address.to_string(),
            source,
        })?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServiceStartError::Bind {
            address: address.to_string(),
            source,
        })?;

    let local_addr = listener.local_addr().map_err(|source| ServiceStartError::Bind {
        address: address.to_string(),
        source,
    })?;

    tracing::info!(address = %local_addr, "Listener bound");

    Ok(listener)
}
