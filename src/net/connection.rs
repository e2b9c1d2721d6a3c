//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests currently being handled
//! - Report how many were abandoned when a drain deadline elapses
//! - Cancel abandoned handlers and wait until none is left running
//!
//! Abandonment happens in the middleware rather than by aborting the accept
//! loop: each connection runs on its own task, so aborting the loop alone
//! leaves handlers alive.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Shared counter of requests currently inside the handler stack.
#[derive(Debug, Clone)]
pub struct InFlightTracker {
    active_count: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
}

impl Default for InFlightTracker {
    fn default() -> Self {
        Self {
            active_count: Arc::new(watch::Sender::new(0)),
            cancel: CancellationToken::new(),
        }
    }
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new in-flight request. Returns a guard that decrements on drop.
    pub fn track(&self) -> InFlightGuard {
        self.active_count.send_modify(|count| *count += 1);
        InFlightGuard {
            active_count: Arc::clone(&self.active_count),
        }
    }

    /// Get current in-flight request count.
    pub fn active_count(&self) -> u64 {
        *self.active_count.borrow()
    }

    pub fn is_abandoned(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel every tracked handler and wait until all of them are dropped.
    ///
    /// Requests arriving afterwards are refused without reaching a handler.
    /// Returns the number of requests that were in flight when called.
    pub async fn abandon(&self) -> u64 {
        let abandoned = self.active_count();
        self.cancel.cancel();

        let mut idle = self.active_count.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = idle.wait_for(|count| *count == 0).await;
        abandoned
    }
}

/// Guard that tracks one request's lifetime.
/// Decrements the count when dropped, including when the handler is cancelled.
#[derive(Debug)]
pub struct InFlightGuard {
    active_count: Arc<watch::Sender<u64>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active_count.send_modify(|count| *count -= 1);
    }
}

/// Middleware counting each request and racing it against abandonment.
pub async fn track_in_flight(
    State(tracker): State<InFlightTracker>,
    request: Request,
    next: Next,
) -> Response {
    let guard = tracker.track();
    let response = tokio::select! {
        biased;
        _ = tracker.cancel.cancelled() => None,
        response = next.run(request) => Some(response),
    };
    // The handler future is gone by now; only then stop counting it.
    drop(guard);

    match response {
        Some(response) => response,
        None => {
            tracing::warn!("Request abandoned at shutdown");
            (StatusCode::SERVICE_UNAVAILABLE, "server shutting down").into_response()
        }
    }
}
