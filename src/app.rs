//! Application wiring: which subsystems start, in which order, and how the
//! process exits.

use std::process::ExitCode;
use std::time::Duration;

use crate::config::AppConfig;
use crate::context::AppInfo;
use crate::http::{routes, ServiceRunner};
use crate::lifecycle::{bootstrap, Sequencer, ShutdownCoordinator, Signals, TerminationSource};
use crate::observability::{LoggerStep, MetricsStep};
use crate::snowflake::IdGeneratorStep;
use crate::store::{MongoStep, MySqlStep, RedisStep};
use crate::validator::ValidatorStep;

pub struct App {
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Init steps in dependency order. The logger comes first so that every
    /// later step can log, and is released last.
    pub fn init_steps(&self) -> Sequencer {
        let config = &self.config;
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

        Sequencer::new()
            .step(LoggerStep::new(config.log.clone(), config.mode))
            .step(MetricsStep::new(config.observability.clone()))
            .step(MySqlStep::new(config.mysql.clone(), connect_timeout))
            .step(RedisStep::new(config.redis.clone(), connect_timeout))
            .step(MongoStep::new(config.mongodb.clone(), connect_timeout))
            .step(IdGeneratorStep::new(config.start_time.clone(), config.machine_id))
            .step(ValidatorStep::new(config.locale.clone()))
    }

    /// Start every subsystem, serve until a termination request, shut down.
    pub async fn run(self) -> ExitCode {
        let sequencer = self.init_steps();
        self.run_with(sequencer, Signals::register).await
    }

    /// [`App::run`] with the init steps and the termination source supplied
    /// by the caller. `signals` is only called once every step succeeded.
    pub async fn run_with<T, F>(self, sequencer: Sequencer, signals: F) -> ExitCode
    where
        T: TerminationSource,
        F: FnOnce() -> std::io::Result<T>,
    {
        let config = self.config;
        let info = AppInfo::from_config(&config);
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let mode = config.mode;

        let started = bootstrap(sequencer, info, |ctx| routes::build(mode, ctx, request_timeout)).await;
        let (router, mut rollbacks) = match started {
            Ok(ready) => ready,
            Err(err) => {
                eprintln!("fatal: {err}");
                return ExitCode::FAILURE;
            }
        };

        let mut signals = match signals() {
            Ok(signals) => signals,
            Err(err) => {
                tracing::error!(severity = "fatal", error = %err, "Cannot register signal handlers");
                rollbacks.unwind().await;
                eprintln!("fatal: cannot register signal handlers: {err}");
                return ExitCode::FAILURE;
            }
        };

        let mut service = match ServiceRunner::start(&config.bind_address(), router).await {
            Ok(service) => service,
            Err(err) => {
                tracing::error!(severity = "fatal", error = %err, "Cannot start HTTP server");
                rollbacks.unwind().await;
                eprintln!("fatal: {err}");
                return ExitCode::FAILURE;
            }
        };

        let report = ShutdownCoordinator::new(config.shutdown_timeout())
            .run(&mut service, &mut signals, &mut rollbacks)
            .await;

        if let Err(err) = &report.outcome {
            eprintln!("fatal: {err}");
        }
        report.exit_code()
    }
}
