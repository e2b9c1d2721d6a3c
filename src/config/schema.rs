//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration for the web application.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name, used in logs and the health endpoint.
    pub name: String,

    /// Application version reported by the health endpoint.
    pub version: String,

    /// Run mode (debug, release, test).
    pub mode: Mode,

    /// TCP port the HTTP service listens on.
    pub port: u16,

    /// Bind host for the HTTP service.
    pub host: String,

    /// Custom epoch for ID generation (YYYY-MM-DD).
    pub start_time: String,

    /// Node identifier for ID generation (0..=1023).
    pub machine_id: u16,

    /// Locale for request validation messages.
    pub locale: String,

    /// Time budget for draining in-flight requests on shutdown.
    pub shutdown_timeout_secs: u64,

    /// Request timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging sink settings.
    pub log: LogConfig,

    /// Relational store settings.
    pub mysql: MySqlConfig,

    /// Key-value cache settings.
    pub redis: RedisConfig,

    /// Document store settings.
    pub mongodb: MongoConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "web-app".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: Mode::Debug,
            port: 8080,
            host: "0.0.0.0".to_string(),
            start_time: "2020-07-01".to_string(),
            machine_id: 1,
            locale: "en".to_string(),
            shutdown_timeout_secs: 5,
            timeouts: TimeoutConfig::default(),
            log: LogConfig::default(),
            mysql: MySqlConfig::default(),
            redis: RedisConfig::default(),
            mongodb: MongoConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Address the HTTP service binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Application run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Verbose, human-readable logs.
    #[default]
    Debug,
    /// JSON logs, quieter request tracing.
    Release,
    /// Used by test harnesses.
    Test,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Debug => "debug",
            Mode::Release => "release",
            Mode::Test => "test",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timeout configuration for request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Store connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            connect_secs: 5,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or full filter directive (trace, debug, info, warn, error).
    pub level: String,

    /// Optional file the log records are appended to instead of stdout.
    pub filename: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            filename: None,
        }
    }
}

/// MySQL connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,

    /// Upper bound of pooled connections.
    pub max_open_conns: u32,

    /// Seconds an idle connection is kept before the pool closes it.
    /// Zero keeps idle connections until the pool closes.
    pub idle_timeout_secs: u64,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            dbname: "web_app".to_string(),
            max_open_conns: 200,
            idle_timeout_secs: 600,
        }
    }
}

impl MySqlConfig {
    /// Connection URL understood by sqlx.
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("mysql://{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
        } else {
            format!(
                "mysql://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.dbname
            )
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: u8,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            db: 0,
        }
    }
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

/// MongoDB configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MongoConfig {
    /// Connection string (mongodb://...).
    pub uri: String,

    /// Database used for health probes.
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://127.0.0.1:27017".to_string(),
            database: "web_app".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
