//! MySQL connection pool.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::config::MySqlConfig;
use crate::context::{ContextBuilder, HealthProbe};
use crate::lifecycle::{InitStep, StepError};

pub struct MySqlStep {
    config: MySqlConfig,
    connect_timeout: Duration,
    pool: Option<MySqlPool>,
}

impl MySqlStep {
    pub fn new(config: MySqlConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
            pool: None,
        }
    }

    /// The pool opens connections lazily up to `max_open_conns` and closes
    /// them again after `idle_timeout_secs` without use.
    fn pool_options(&self) -> MySqlPoolOptions {
        let idle_timeout = match self.config.idle_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        MySqlPoolOptions::new()
            .max_connections(self.config.max_open_conns)
            .min_connections(0)
            .idle_timeout(idle_timeout)
            .acquire_timeout(self.connect_timeout)
    }
}

#[async_trait]
impl InitStep for MySqlStep {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn init(&mut self, ctx: &mut ContextBuilder) -> Result<(), StepError> {
        let pool = self.pool_options().connect(&self.config.url()).await?;

        tracing::info!(
            host = %self.config.host,
            port = self.config.port,
            dbname = %self.config.dbname,
            max_open_conns = self.config.max_open_conns,
            "MySQL pool connected"
        );

        ctx.register_probe(Arc::new(MySqlProbe { pool: pool.clone() }));
        self.pool = Some(pool);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StepError> {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            tracing::info!("MySQL pool closed");
        }
        Ok(())
    }
}

struct MySqlProbe {
    pool: MySqlPool,
}

#[async_trait]
impl HealthProbe for MySqlProbe {
    fn name(&self) -> &str {
        "mysql"
    }

    async fn ping(&self) -> Result<(), StepError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
