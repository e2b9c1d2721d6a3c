//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Configured host:port
//!     → listener.rs (bind, fatal on failure)
//!     → Hand off to the HTTP service's accept loop
//!     → connection.rs (count in-flight requests for shutdown reporting)
//! ```

pub mod connection;
pub mod listener;

pub use connection::{InFlightGuard, InFlightTracker};
pub use listener::{bind, ServiceStartError};
