//! Exit paths of the assembled application.

use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use web_app::config::{AppConfig, Mode};
use web_app::lifecycle::{Sequencer, TerminationRequest};
use web_app::snowflake::IdGeneratorStep;
use web_app::validator::ValidatorStep;
use web_app::App;

mod common;
use common::{Journal, LogCapture, RecordingStep};

fn exit_code_repr(code: ExitCode) -> String {
    format!("{code:?}")
}

fn test_config(port: u16) -> AppConfig {
    AppConfig {
        mode: Mode::Test,
        host: "127.0.0.1".to_string(),
        port,
        ..AppConfig::default()
    }
}

/// Recording stand-ins for the store steps plus the real context providers.
fn steps(journal: &Journal) -> Sequencer {
    Sequencer::new()
        .step(RecordingStep::ok("logger", journal))
        .step(RecordingStep::ok("mysql", journal))
        .step(IdGeneratorStep::new("2020-07-01", 1))
        .step(ValidatorStep::new("en"))
}

#[tokio::test]
async fn init_failure_exits_non_zero_without_touching_signals() {
    let logs = LogCapture::new();
    let _subscriber = logs.install();
    let journal = Journal::new();
    let sequencer = Sequencer::new()
        .step(RecordingStep::ok("logger", &journal))
        .step(RecordingStep::failing("mysql", "connection refused", &journal));
    let asked = Arc::new(AtomicBool::new(false));
    let asked_flag = asked.clone();

    let code = App::new(test_config(0))
        .run_with(sequencer, move || {
            asked_flag.store(true, Ordering::SeqCst);
            Ok(mpsc::channel::<TerminationRequest>(1).1)
        })
        .await;

    assert_eq!(exit_code_repr(code), exit_code_repr(ExitCode::FAILURE));
    assert!(!asked.load(Ordering::SeqCst));
    assert_eq!(
        journal.entries(),
        vec!["init:logger", "init:mysql", "rollback:logger"]
    );
    assert_eq!(logs.fatal_events().len(), 1);
}

#[tokio::test]
async fn signal_registration_failure_rolls_back() {
    let journal = Journal::new();

    let code = App::new(test_config(0))
        .run_with(steps(&journal), || {
            Err::<mpsc::Receiver<TerminationRequest>, _>(std::io::Error::other("no signals"))
        })
        .await;

    assert_eq!(exit_code_repr(code), exit_code_repr(ExitCode::FAILURE));
    assert_eq!(journal.with_prefix("rollback:"), vec!["mysql", "logger"]);
}

#[tokio::test]
async fn port_in_use_rolls_back_and_exits_non_zero() {
    let logs = LogCapture::new();
    let _subscriber = logs.install();
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let journal = Journal::new();

    let code = App::new(test_config(port))
        .run_with(steps(&journal), || Ok(mpsc::channel::<TerminationRequest>(1).1))
        .await;

    assert_eq!(exit_code_repr(code), exit_code_repr(ExitCode::FAILURE));
    assert_eq!(journal.with_prefix("rollback:"), vec!["mysql", "logger"]);
    assert_eq!(
        logs.fatal_events(),
        vec![("ERROR".to_string(), "Cannot start HTTP server".to_string())]
    );
}

#[tokio::test]
async fn termination_request_exits_zero_after_rollback() {
    let journal = Journal::new();
    let (tx, signals) = mpsc::channel(1);
    tx.send(TerminationRequest::Terminate).await.unwrap();

    let code = App::new(test_config(0))
        .run_with(steps(&journal), move || Ok(signals))
        .await;

    assert_eq!(exit_code_repr(code), exit_code_repr(ExitCode::SUCCESS));
    assert_eq!(journal.with_prefix("rollback:"), vec!["mysql", "logger"]);
}
