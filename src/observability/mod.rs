//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout or log file
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The logger is the first init step, so every later step can log
//! - Metrics are cheap (no-op without a recorder)

pub mod logging;
pub mod metrics;

pub use logging::{LogGuard, LoggerStep};
pub use metrics::MetricsStep;
