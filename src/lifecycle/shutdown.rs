//! Shutdown coordination for the service.
//!
//! The coordinator parks the main task until either a termination request
//! arrives or the service dies on its own. It then asks the service to stop
//! within a fixed deadline and, only once that stop has completed or timed
//! out, unwinds the resources acquired at startup.

use std::process::ExitCode;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::lifecycle::error::{ServiceError, ShutdownError};
use crate::lifecycle::signals::{TerminationRequest, TerminationSource};
use crate::lifecycle::startup::{RollbackStack, RollbackSummary};
use crate::lifecycle::DEFAULT_SHUTDOWN_TIMEOUT;
use crate::observability::metrics;

/// Control surface of a running service, as seen by the coordinator.
#[async_trait]
pub trait ManagedService: Send {
    /// Resolves only if the service stops without being asked to.
    async fn exited(&mut self) -> ServiceError;

    /// Stop accepting work and wait for in-flight work to finish.
    ///
    /// `deadline` is informational; the coordinator enforces it.
    async fn stop(&mut self, deadline: Instant) -> Result<(), ServiceError>;

    /// Abandon outstanding work. Returns how many requests were still in
    /// flight. No abandoned work may still be running once this resolves.
    async fn abort(&mut self) -> u64;
}

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Signal(TerminationRequest),
    ServiceExited,
}

/// Everything the coordinator did, for logging and the exit code.
#[derive(Debug)]
pub struct ShutdownReport {
    pub trigger: Trigger,
    /// Drain deadline, set when a stop was requested.
    pub deadline: Option<Instant>,
    pub outcome: Result<(), ShutdownError>,
    pub rollback: RollbackSummary,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Rollback failures are logged but do not change the exit status.
    pub fn exit_code(&self) -> ExitCode {
        if self.is_clean() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

enum Drain {
    Done(Result<(), ServiceError>),
    Elapsed,
    Forced(TerminationRequest),
}

/// Coordinator for graceful shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for a termination request, stop the service within the
    /// deadline, then unwind `rollbacks`.
    ///
    /// Only the first request starts the shutdown. A second one arriving
    /// while the service drains aborts the drain immediately.
    pub async fn run<S, T>(
        &self,
        service: &mut S,
        signals: &mut T,
        rollbacks: &mut RollbackStack,
    ) -> ShutdownReport
    where
        S: ManagedService + ?Sized,
        T: TerminationSource + ?Sized,
    {
        let mut signals_open = true;
        let trigger = loop {
            tokio::select! {
                request = signals.recv(), if signals_open => match request {
                    Some(request) => break Ok(request),
                    None => {
                        tracing::warn!("termination source closed, waiting on the service only");
                        signals_open = false;
                    }
                },
                err = service.exited() => break Err(err),
            }
        };

        let (trigger, deadline, outcome) = match trigger {
            Ok(request) => {
                tracing::info!(
                    signal = %request,
                    name = request.signal_name(),
                    "Shutdown Server ..."
                );
                let deadline = Instant::now() + self.timeout;
                let outcome = self.drain(service, signals, deadline).await;
                (Trigger::Signal(request), Some(deadline), outcome)
            }
            Err(err) => {
                tracing::error!(severity = "fatal", error = %err, "Server stopped unexpectedly");
                (Trigger::ServiceExited, None, Err(ShutdownError::Service(err)))
            }
        };

        match &outcome {
            Ok(()) => tracing::info!("Server stopped gracefully"),
            Err(err) => tracing::error!(severity = "fatal", error = %err, "Server Shutdown"),
        }
        metrics::record_shutdown(outcome.is_ok());

        let rollback = rollbacks.unwind().await;
        tracing::info!(
            released = rollback.ran,
            failed = rollback.failed.len(),
            "Resources released"
        );
        tracing::info!("Server exiting");

        ShutdownReport {
            trigger,
            deadline,
            outcome,
            rollback,
        }
    }

    async fn drain<S, T>(
        &self,
        service: &mut S,
        signals: &mut T,
        deadline: Instant,
    ) -> Result<(), ShutdownError>
    where
        S: ManagedService + ?Sized,
        T: TerminationSource + ?Sized,
    {
        let drain = tokio::select! {
            result = tokio::time::timeout_at(deadline, service.stop(deadline)) => match result {
                Ok(stopped) => Drain::Done(stopped),
                Err(_) => Drain::Elapsed,
            },
            Some(request) = signals.recv() => Drain::Forced(request),
        };

        match drain {
            Drain::Done(stopped) => stopped.map_err(ShutdownError::from),
            Drain::Elapsed => Err(ShutdownError::Timeout {
                timeout: self.timeout,
                abandoned: service.abort().await,
            }),
            Drain::Forced(request) => {
                tracing::warn!(signal = %request, "Second termination request, abandoning drain");
                Err(ShutdownError::Forced {
                    request,
                    abandoned: service.abort().await,
                })
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_TIMEOUT)
    }
}
