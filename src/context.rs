//! Application context shared by the init steps, the router and handlers.
//!
//! Steps populate a [`ContextBuilder`] while the sequencer runs. Once every
//! step succeeded the builder is frozen into an [`AppContext`], which is the
//! axum state for all handlers. Nothing mutates it afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AppConfig, Mode};
use crate::lifecycle::StepError;
use crate::snowflake::IdGenerator;
use crate::validator::Validator;

/// A dependency that can be pinged by the health endpoint.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;

    async fn ping(&self) -> Result<(), StepError>;
}

/// Static facts about the running application.
#[derive(Debug, Clone)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub mode: Mode,
}

impl AppInfo {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            mode: config.mode,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("application context is missing the {0}")]
pub struct MissingDependency(pub &'static str);

/// Mutable context threaded through the init steps.
#[derive(Default)]
pub struct ContextBuilder {
    probes: Vec<Arc<dyn HealthProbe>>,
    ids: Option<Arc<IdGenerator>>,
    validator: Option<Arc<Validator>>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_probe(&mut self, probe: Arc<dyn HealthProbe>) {
        self.probes.push(probe);
    }

    pub fn set_id_generator(&mut self, ids: Arc<IdGenerator>) {
        self.ids = Some(ids);
    }

    pub fn set_validator(&mut self, validator: Arc<Validator>) {
        self.validator = Some(validator);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Freeze into the immutable context handed to the service.
    pub fn finish(self, info: AppInfo) -> Result<AppContext, MissingDependency> {
        Ok(AppContext {
            info,
            ids: self.ids.ok_or(MissingDependency("ID generator"))?,
            validator: self.validator.ok_or(MissingDependency("request validator"))?,
            probes: self.probes.into(),
        })
    }
}

/// Immutable handles shared by every request handler.
#[derive(Clone)]
pub struct AppContext {
    pub info: AppInfo,
    pub ids: Arc<IdGenerator>,
    pub validator: Arc<Validator>,
    pub probes: Arc<[Arc<dyn HealthProbe>]>,
}
