//! Lifecycle error definitions.

use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::signals::TerminationRequest;

/// Failure cause reported by an init step, a rollback or a health probe.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// An init step failed; startup is aborted.
#[derive(Debug, Error)]
#[error("init {step} failed: {cause}")]
pub struct InitializationError {
    pub step: String,
    #[source]
    pub cause: StepError,
}

/// A rollback failed. Logged only, never escalated.
#[derive(Debug, Error)]
#[error("rollback of {step} failed: {cause}")]
pub struct RollbackError {
    pub step: String,
    #[source]
    pub cause: StepError,
}

/// The running service failed outside of a stop request.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("listen: {0}")]
    Io(#[from] std::io::Error),

    #[error("service task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("service exited without a stop request")]
    Exited,
}

/// Shutdown did not complete cleanly.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The drain deadline elapsed with work still outstanding.
    #[error("server shutdown timed out after {timeout:?}, {abandoned} in-flight request(s) abandoned")]
    Timeout { timeout: Duration, abandoned: u64 },

    /// A second termination request cut the drain short.
    #[error("server shutdown forced by second {request} request, {abandoned} in-flight request(s) abandoned")]
    Forced {
        request: TerminationRequest,
        abandoned: u64,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}
