//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Register each step's rollback the moment its init succeeds
//! - On the first failure, unwind what was acquired and report the step
//! - Freeze the application context and build the service from it
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal, nothing is retried
//! - Subsystems initialize in order, not concurrently
//! - The service is built last (traffic only when every dependency is up)

use std::time::Instant;

use async_trait::async_trait;

use crate::context::{AppContext, AppInfo, ContextBuilder};
use crate::lifecycle::error::{InitializationError, RollbackError, StepError};
use crate::observability::metrics;

/// One subsystem's startup action and its matching teardown.
///
/// `rollback` is only ever called after `init` returned `Ok`, and must be
/// idempotent: a second call is a no-op.
#[async_trait]
pub trait InitStep: Send {
    /// Name used in logs and in [`InitializationError`].
    fn name(&self) -> &str;

    /// Acquire the resource, registering any shared handle in `ctx`.
    async fn init(&mut self, ctx: &mut ContextBuilder) -> Result<(), StepError>;

    /// Release the resource acquired by `init`.
    async fn rollback(&mut self) -> Result<(), StepError> {
        Ok(())
    }
}

/// Outcome of a full sequencer run.
pub enum SequenceResult {
    /// Every step succeeded; the stack unwinds them newest first.
    Ready(RollbackStack),
    /// A step failed. Rollbacks of the earlier steps have already run.
    Failed(InitializationError),
}

impl SequenceResult {
    pub fn is_ready(&self) -> bool {
        matches!(self, SequenceResult::Ready(_))
    }

    pub fn into_result(self) -> Result<RollbackStack, InitializationError> {
        match self {
            SequenceResult::Ready(stack) => Ok(stack),
            SequenceResult::Failed(err) => Err(err),
        }
    }
}

/// Runs init steps in order with all-or-nothing semantics.
#[derive(Default)]
pub struct Sequencer {
    steps: Vec<Box<dyn InitStep>>,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; steps run in the order they are added.
    pub fn step(mut self, step: impl InitStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn push(&mut self, step: Box<dyn InitStep>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order.
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every step, stopping at the first failure.
    pub async fn run(self, ctx: &mut ContextBuilder) -> SequenceResult {
        let total = self.steps.len();
        let mut stack = RollbackStack::new();

        for (index, mut step) in self.steps.into_iter().enumerate() {
            let name = step.name().to_string();
            let started = Instant::now();

            match step.init(ctx).await {
                Ok(()) => {
                    tracing::debug!(
                        step = %name,
                        position = index + 1,
                        total,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "init step succeeded"
                    );
                    metrics::record_init_step(&name, true, started);
                    stack.push(step);
                }
                Err(cause) => {
                    tracing::error!(
                        severity = "fatal",
                        step = %name,
                        position = index + 1,
                        total,
                        error = %cause,
                        "init step failed, rolling back"
                    );
                    metrics::record_init_step(&name, false, started);
                    stack.unwind().await;
                    return SequenceResult::Failed(InitializationError { step: name, cause });
                }
            }
        }

        SequenceResult::Ready(stack)
    }
}

/// What happened while unwinding a [`RollbackStack`].
#[derive(Debug, Default)]
pub struct RollbackSummary {
    /// Rollbacks that completed successfully.
    pub ran: usize,
    /// Rollbacks that returned an error.
    pub failed: Vec<RollbackError>,
}

impl RollbackSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// LIFO stack of successfully initialized steps.
#[derive(Default)]
pub struct RollbackStack {
    entries: Vec<Box<dyn InitStep>>,
}

impl RollbackStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Box<dyn InitStep>) {
        self.entries.push(step);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered step names in acquisition order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|s| s.name().to_string()).collect()
    }

    /// Roll back every registered step, newest first.
    ///
    /// Failures are logged and collected; they never stop the remaining
    /// rollbacks. The stack is empty afterwards, so a second call is a no-op.
    pub async fn unwind(&mut self) -> RollbackSummary {
        let mut summary = RollbackSummary::default();

        while let Some(mut step) = self.entries.pop() {
            let name = step.name().to_string();
            match step.rollback().await {
                Ok(()) => {
                    tracing::debug!(step = %name, "rollback complete");
                    summary.ran += 1;
                }
                Err(cause) => {
                    let err = RollbackError { step: name, cause };
                    tracing::warn!(error = %err, "rollback failed, continuing");
                    summary.failed.push(err);
                }
            }
        }

        summary
    }
}

/// Run the sequencer, freeze the context and build the service from it.
///
/// `build` is only invoked when every step succeeded. If the context turns
/// out to be incomplete the acquired steps are unwound and the failure is
/// reported against the pseudo-step `context`.
pub async fn bootstrap<F, T>(
    sequencer: Sequencer,
    info: AppInfo,
    build: F,
) -> Result<(T, RollbackStack), InitializationError>
where
    F: FnOnce(AppContext) -> T,
{
    let mut builder = ContextBuilder::new();
    let mut stack = sequencer.run(&mut builder).await.into_result()?;

    match builder.finish(info) {
        Ok(ctx) => Ok((build(ctx), stack)),
        Err(missing) => {
            tracing::error!(severity = "fatal", error = %missing, "application context incomplete, rolling back");
            stack.unwind().await;
            Err(InitializationError {
                step: "context".to_string(),
                cause: Box::new(missing),
            })
        }
    }
}
