//! MongoDB client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::{bson::doc, options::ClientOptions, Client};

use crate::config::MongoConfig;
use crate::context::{ContextBuilder, HealthProbe};
use crate::lifecycle::{InitStep, StepError};

pub struct MongoStep {
    config: MongoConfig,
    connect_timeout: Duration,
    client: Option<Client>,
}

impl MongoStep {
    pub fn new(config: MongoConfig, connect_timeout: Duration) -> Self {
        Self {
            config,
            connect_timeout,
            client: None,
        }
    }
}

#[async_trait]
impl InitStep for MongoStep {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn init(&mut self, ctx: &mut ContextBuilder) -> Result<(), StepError> {
        let mut options = ClientOptions::parse(&self.config.uri).await?;
        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);
        let client = Client::with_options(options)?;

        // The driver connects lazily; ping so an unreachable server fails here.
        client
            .database(&self.config.database)
            .run_command(doc! { "ping": 1 })
            .await?;

        tracing::info!(database = %self.config.database, "MongoDB connected");

        ctx.register_probe(Arc::new(MongoProbe {
            client: client.clone(),
            database: self.config.database.clone(),
        }));
        self.client = Some(client);
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StepError> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            tracing::info!("MongoDB client closed");
        }
        Ok(())
    }
}

struct MongoProbe {
    client: Client,
    database: String,
}

#[async_trait]
impl HealthProbe for MongoProbe {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), StepError> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }
}
