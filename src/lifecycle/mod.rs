//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config loaded → Init steps in order → Freeze context → Build router
//!     Any step fails → unwind the steps that succeeded, newest first
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → TerminationRequest
//!
//! Shutdown (shutdown.rs):
//!     Request received → Stop accepting → Drain until deadline → Unwind → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: the step list order encodes the dependency order
//! - Cleanup is an explicit stack, not Drop: deterministic and testable
//! - Shutdown has timeout: forced abort after deadline, rollback still runs

pub mod error;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use error::{InitializationError, RollbackError, ServiceError, ShutdownError, StepError};
pub use shutdown::{ManagedService, ShutdownCoordinator, ShutdownReport, Trigger};
pub use signals::{Signals, TerminationRequest, TerminationSource};
pub use startup::{bootstrap, InitStep, RollbackStack, RollbackSummary, SequenceResult, Sequencer};

/// Default time budget for draining in-flight work on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);
