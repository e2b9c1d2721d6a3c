//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Route records to stdout or an append-only log file
//! - Flush buffered output once at process exit
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for release mode, human-readable format otherwise
//! - Log level configurable via config, overridden by `RUST_LOG`

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

use crate::config::{LogConfig, Mode};
use crate::context::ContextBuilder;
use crate::lifecycle::{InitStep, StepError};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("cannot open log file {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("global subscriber already installed: {0}")]
    Install(#[from] TryInitError),
}

/// Keeps the log sink reachable so it can be flushed at exit.
#[derive(Debug, Clone, Default)]
pub struct LogGuard {
    file: Option<Arc<File>>,
}

impl LogGuard {
    /// Flush buffered records. Safe to call more than once.
    pub fn flush(&self) -> io::Result<()> {
        io::stdout().flush()?;
        if let Some(file) = &self.file {
            (&**file).flush()?;
            file.sync_data()?;
        }
        Ok(())
    }
}

/// Install the global subscriber.
pub fn init(config: &LogConfig, mode: Mode) -> Result<LogGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    let file = match &config.filename {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: PathBuf::from(path),
                    source,
                })?;
            Some(Arc::new(file))
        }
        None => None,
    };

    let writer = match &file {
        Some(file) => BoxMakeWriter::new(file.clone()),
        None => BoxMakeWriter::new(io::stdout),
    };

    let fmt_layer = match mode {
        Mode::Release => fmt::layer().json().with_writer(writer).boxed(),
        Mode::Debug | Mode::Test => fmt::layer()
            .with_ansi(file.is_none())
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(LogGuard { file })
}

/// Init step for the logging sink. Its rollback is the final flush.
pub struct LoggerStep {
    config: LogConfig,
    mode: Mode,
    guard: Option<LogGuard>,
}

impl LoggerStep {
    pub fn new(config: LogConfig, mode: Mode) -> Self {
        Self {
            config,
            mode,
            guard: None,
        }
    }
}

#[async_trait]
impl InitStep for LoggerStep {
    fn name(&self) -> &str {
        "logger"
    }

    async fn init(&mut self, _ctx: &mut ContextBuilder) -> Result<(), StepError> {
        let guard = init(&self.config, self.mode)?;
        tracing::debug!(
            level = %self.config.level,
            mode = %self.mode,
            file = ?self.config.filename,
            "logger init success"
        );
        self.guard = Some(guard);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StepError> {
        if let Some(guard) = self.guard.take() {
            guard.flush()?;
        }
        Ok(())
    }
}
