//! Metrics collection and exposition.
//!
//! # Metrics
//! - `app_init_step_duration_seconds` (histogram): per init step, by outcome
//! - `app_shutdown_total` (counter): shutdowns by outcome
//!
//! Recording is a no-op until the exporter step installs a recorder.

use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::ObservabilityConfig;
use crate::context::ContextBuilder;
use crate::lifecycle::{InitStep, StepError};

pub fn record_init_step(step: &str, ok: bool, started: Instant) {
    let outcome = if ok { "ok" } else { "error" };
    histogram!(
        "app_init_step_duration_seconds",
        "step" => step.to_string(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_shutdown(clean: bool) {
    let outcome = if clean { "clean" } else { "fatal" };
    counter!("app_shutdown_total", "outcome" => outcome).increment(1);
}

/// Init step installing the Prometheus exporter when enabled.
pub struct MetricsStep {
    config: ObservabilityConfig,
}

impl MetricsStep {
    pub fn new(config: ObservabilityConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl InitStep for MetricsStep {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn init(&mut self, _ctx: &mut ContextBuilder) -> Result<(), StepError> {
        if !self.config.metrics_enabled {
            tracing::debug!("Metrics exporter disabled");
            return Ok(());
        }

        let addr: SocketAddr = self.config.metrics_address.parse()?;
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        tracing::info!(address = %addr, "Metrics exporter listening");
        Ok(())
    }
}
