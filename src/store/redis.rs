//! Redis connection manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::config::RedisConfig;
use crate::context::{ContextBuilder, HealthProbe};
use crate::lifecycle::{InitStep, StepError};
use crate::store::Releasable;

pub struct RedisStep {
    config: RedisConfig,
    connect_timeout: Duration,
    manager: Option<Releasable<ConnectionManager>>,
}

impl RedisStep {
    pub fn new(config: RedisConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
            manager: None,
        }
    }
}

impl std::fmt::Debug for RedisStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStep")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("db", &self.config.db)
            .field("connected", &self.manager.is_some())
            .finish()
    }
}

#[async_trait]
impl InitStep for RedisStep {
    fn name(&self) -> &str {
        "redis"
    }

    async fn init(&mut self, ctx: &mut ContextBuilder) -> Result<(), StepError> {
        let client = redis::Client::open(self.config.url())?;
        let manager =
            match tokio::time::timeout(self.connect_timeout, ConnectionManager::new(client)).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(
                        format!("connection timed out after {:?}", self.connect_timeout).into(),
                    )
                }
            };

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            db = self.config.db,
            "Redis connected"
        );

        let manager = Releasable::new(manager);
        ctx.register_probe(Arc::new(RedisProbe {
            manager: manager.clone(),
        }));
        self.manager = Some(manager);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StepError> {
        // The connection closes once no request still holds a clone.
        if let Some(manager) = self.manager.take() {
            manager.release();
            tracing::info!("Redis connection handle revoked");
        }
        Ok(())
    }
}

struct RedisProbe {
    manager: Releasable<ConnectionManager>,
}

#[async_trait]
impl HealthProbe for RedisProbe {
    fn name(&self) -> &str {
        "redis"
    }

    async fn ping(&self) -> Result<(), StepError> {
        let mut conn = self.manager.get().ok_or("redis connection released")?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
