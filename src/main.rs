//! Web application server.
//!
//! # Lifecycle
//!
//! ```text
//!   config.toml ──▶ load + validate
//!                        │
//!                        ▼
//!   logger → metrics → mysql → redis → mongodb → snowflake → validator
//!      │ any step fails: roll back the ones before it, exit 1
//!      ▼
//!   build router ──▶ accept loop (own task)
//!                        │
//!   SIGINT / SIGTERM ────┤
//!                        ▼
//!   stop + drain (5s deadline) ──▶ roll back in reverse ──▶ exit 0 / 1
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use web_app::config::load_config;
use web_app::App;

#[derive(Parser)]
#[command(name = "web-app")]
#[command(about = "Web application server", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Init settings failed: {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    if cli.check {
        println!("{}: configuration OK", cli.config.display());
        return ExitCode::SUCCESS;
    }

    App::new(config).run().await
}
