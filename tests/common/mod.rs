//! Shared mocks for lifecycle and service tests.

#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use web_app::context::ContextBuilder;
use web_app::lifecycle::{
    InitStep, ManagedService, RollbackStack, Sequencer, ServiceError, StepError,
};

/// Ordered record of everything the mocks were asked to do.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Entries starting with `prefix`, prefix stripped.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Init step that logs `init:<name>` / `rollback:<name>` to a journal.
pub struct RecordingStep {
    name: String,
    journal: Journal,
    init_error: Option<String>,
    rollback_error: Option<String>,
    acquired: bool,
}

impl RecordingStep {
    pub fn ok(name: &str, journal: &Journal) -> Self {
        Self {
            name: name.to_string(),
            journal: journal.clone(),
            init_error: None,
            rollback_error: None,
            acquired: false,
        }
    }

    pub fn failing(name: &str, cause: &str, journal: &Journal) -> Self {
        Self {
            init_error: Some(cause.to_string()),
            ..Self::ok(name, journal)
        }
    }

    pub fn failing_rollback(name: &str, cause: &str, journal: &Journal) -> Self {
        Self {
            rollback_error: Some(cause.to_string()),
            ..Self::ok(name, journal)
        }
    }
}

#[async_trait]
impl InitStep for RecordingStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&mut self, _ctx: &mut ContextBuilder) -> Result<(), StepError> {
        self.journal.push(format!("init:{}", self.name));
        if let Some(cause) = &self.init_error {
            return Err(cause.clone().into());
        }
        self.acquired = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StepError> {
        if !self.acquired {
            return Ok(());
        }
        self.acquired = false;
        self.journal.push(format!("rollback:{}", self.name));
        match &self.rollback_error {
            Some(cause) => Err(cause.clone().into()),
            None => Ok(()),
        }
    }
}

/// Run recording steps named `names` to completion and return their stack.
pub async fn ready_stack(names: &[&str], journal: &Journal) -> RollbackStack {
    let mut sequencer = Sequencer::new();
    for name in names {
        sequencer.push(Box::new(RecordingStep::ok(name, journal)));
    }
    sequencer
        .run(&mut ContextBuilder::new())
        .await
        .into_result()
        .unwrap()
}

/// Service double with scripted stop latency and failure.
pub struct MockService {
    journal: Journal,
    stop_delay: Duration,
    exit_after: Option<Duration>,
    in_flight: u64,
    pub stop_deadline: Option<Instant>,
}

impl MockService {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            stop_delay: Duration::ZERO,
            exit_after: None,
            in_flight: 0,
            stop_deadline: None,
        }
    }

    pub fn stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn exit_after(mut self, delay: Duration) -> Self {
        self.exit_after = Some(delay);
        self
    }

    pub fn in_flight(mut self, count: u64) -> Self {
        self.in_flight = count;
        self
    }
}

#[async_trait]
impl ManagedService for MockService {
    async fn exited(&mut self) -> ServiceError {
        match self.exit_after {
            Some(delay) => {
                tokio::time::sleep(delay).await;
                self.journal.push("exited");
                ServiceError::Exited
            }
            None => std::future::pending().await,
        }
    }

    async fn stop(&mut self, deadline: Instant) -> Result<(), ServiceError> {
        self.journal.push("stop");
        self.stop_deadline = Some(deadline);
        tokio::time::sleep(self.stop_delay).await;
        self.journal.push("stopped");
        Ok(())
    }

    async fn abort(&mut self) -> u64 {
        self.journal.push("abort");
        self.in_flight
    }
}

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route this thread's events here until the guard is dropped.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn events(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// `(level, message)` of every event logged with `severity = "fatal"`.
    pub fn fatal_events(&self) -> Vec<(String, String)> {
        self.events()
            .iter()
            .filter(|event| event["fields"]["severity"] == "fatal")
            .map(|event| {
                (
                    event["level"].as_str().unwrap_or_default().to_string(),
                    event["fields"]["message"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
