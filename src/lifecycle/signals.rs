//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGINT, SIGTERM)
//! - Translate signals to [`TerminationRequest`] values
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe), no polling
//! - SIGKILL cannot be intercepted and is not listed
//! - Handlers are registered before the service starts so no signal is lost

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// An externally delivered request to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationRequest {
    /// SIGINT, e.g. Ctrl+C or `kill -2`.
    Interrupt,
    /// SIGTERM, the default of `kill`.
    Terminate,
}

impl TerminationRequest {
    pub fn signal_name(&self) -> &'static str {
        match self {
            TerminationRequest::Interrupt => "SIGINT",
            TerminationRequest::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for TerminationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationRequest::Interrupt => f.write_str("interrupt"),
            TerminationRequest::Terminate => f.write_str("terminate"),
        }
    }
}

/// Something that delivers termination requests.
///
/// `None` means the source is closed and will never deliver again.
#[async_trait]
pub trait TerminationSource: Send {
    async fn recv(&mut self) -> Option<TerminationRequest>;
}

/// Programmatic source, used by tests and embedders.
#[async_trait]
impl TerminationSource for mpsc::Receiver<TerminationRequest> {
    async fn recv(&mut self) -> Option<TerminationRequest> {
        mpsc::Receiver::recv(self).await
    }
}

/// Process signal listener for SIGINT and SIGTERM.
#[cfg(unix)]
pub struct Signals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    pub fn register() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let signals = Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        };
        tracing::debug!("Signal handlers registered (SIGINT, SIGTERM)");
        Ok(signals)
    }
}

#[cfg(unix)]
#[async_trait]
impl TerminationSource for Signals {
    async fn recv(&mut self) -> Option<TerminationRequest> {
        tokio::select! {
            received = self.interrupt.recv() => received.map(|()| TerminationRequest::Interrupt),
            received = self.terminate.recv() => received.map(|()| TerminationRequest::Terminate),
        }
    }
}

/// Ctrl+C listener on platforms without Unix signals.
#[cfg(not(unix))]
pub struct Signals;

#[cfg(not(unix))]
impl Signals {
    pub fn register() -> std::io::Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(unix))]
#[async_trait]
impl TerminationSource for Signals {
    async fn recv(&mut self) -> Option<TerminationRequest> {
        tokio::signal::ctrl_c()
            .await
            .ok()
            .map(|()| TerminationRequest::Interrupt)
    }
}
