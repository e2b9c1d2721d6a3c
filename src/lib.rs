//! Web application lifecycle orchestrator.
//!
//! Brings the HTTP service online by initializing its subsystems in a fixed
//! order, serves until SIGINT/SIGTERM, then drains within a deadline and
//! releases every acquired resource in reverse order.

pub mod app;
pub mod config;
pub mod context;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod snowflake;
pub mod store;
pub mod validator;

pub use app::App;
pub use config::AppConfig;
pub use context::{AppContext, ContextBuilder};
pub use lifecycle::{InitStep, Sequencer, ShutdownCoordinator};
