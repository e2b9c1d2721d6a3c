//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop on its own task, graceful stop)
//!     → request.rs (request ID)
//!     → routes.rs (handlers over the frozen AppContext)
//! ```

pub mod request;
pub mod routes;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{ServiceHandle, ServiceRunner, ServiceState};
