//! HTTP service runner.
//!
//! # Responsibilities
//! - Bind the listener (bind failures are fatal and reported synchronously)
//! - Run the Axum accept loop on its own task
//! - Stop accepting on request and drain in-flight requests
//! - Report an accept loop that ends without being asked to
//! - On abort, cancel abandoned handlers before returning
//!
//! # States
//! ```text
//! not started → running → stopping → stopped
//! ```
//! running → stopping happens only through [`ServiceHandle::stop`].

use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{middleware, Router};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::lifecycle::{ManagedService, ServiceError};
use crate::net::connection::{track_in_flight, InFlightTracker};
use crate::net::listener::{bind, ServiceStartError};

/// Lifecycle state of a started service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Running,
    Stopping,
    Stopped,
}

/// Starts the HTTP service.
pub struct ServiceRunner;

impl ServiceRunner {
    /// Bind `address` and serve `router` on a background task.
    ///
    /// Returns once the listener is bound; the accept loop runs concurrently.
    pub async fn start(address: &str, router: Router) -> Result<ServiceHandle, ServiceStartError> {
        let listener = bind(address).await?;
        let local_addr = listener.local_addr().map_err(|source| ServiceStartError::Bind {
            address: address.to_string(),
            source,
        })?;

        let tracker = InFlightTracker::new();
        let app = router.layer(middleware::from_fn_with_state(tracker.clone(), track_in_flight));
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    // Also fires if the handle is dropped.
                    let _ = stop_rx.await;
                })
                .await
        });

        tracing::info!(address = %local_addr, "HTTP server starting");

        Ok(ServiceHandle {
            local_addr,
            stop_tx: Some(stop_tx),
            task: Some(task),
            tracker,
            state: ServiceState::Running,
        })
    }
}

/// Handle to a running HTTP service.
pub struct ServiceHandle {
    local_addr: SocketAddr,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
    tracker: InFlightTracker,
    state: ServiceState,
}

impl ServiceHandle {
    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> u64 {
        self.tracker.active_count()
    }
}

#[async_trait]
impl ManagedService for ServiceHandle {
    async fn exited(&mut self) -> ServiceError {
        let Some(task) = self.task.as_mut() else {
            return std::future::pending().await;
        };

        let err = match task.await {
            Ok(Ok(())) => ServiceError::Exited,
            Ok(Err(e)) => ServiceError::Io(e),
            Err(e) => ServiceError::Join(e),
        };
        self.task = None;
        self.state = ServiceState::Stopped;
        err
    }

    async fn stop(&mut self, deadline: Instant) -> Result<(), ServiceError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            self.state = ServiceState::Stopping;
            tracing::info!(
                in_flight = self.in_flight(),
                deadline_ms = deadline.saturating_duration_since(Instant::now()).as_millis() as u64,
                "HTTP server draining"
            );
            let _ = stop_tx.send(());
        }

        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };

        let result = task.await;
        self.task = None;
        self.state = ServiceState::Stopped;
        match result {
            Ok(Ok(())) => {
                tracing::info!("HTTP server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(ServiceError::Io(e)),
            Err(e) => Err(ServiceError::Join(e)),
        }
    }

    async fn abort(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.stop_tx = None;
        let abandoned = self.tracker.abandon().await;
        self.state = ServiceState::Stopped;
        tracing::warn!(abandoned, "HTTP server aborted");
        abandoned
    }
}
