use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use faceguard_cli::cli::{InitArgs, OutputMode, StatusArgs};
use faceguard_cli::commands::{CommandHandler, InitHandler, StatusHandler};
use faceguard_cli::faceset::{FaceSetSummary, InitOutcome, StatusOutcome};

fn summary(token: Option<&str>) -> FaceSetSummary {
    FaceSetSummary {
        state_file: "/tmp/faceguard/state.json".into(),
        faceset_token: token.map(str::to_string),
        registered_faces: 0,
    }
}

#[test]
fn init_handler_succeeds_when_faceset_exists() {
    let handler = InitHandler::with_dependencies(
        InitArgs { state_file: None },
        |_args| {
            Ok(InitOutcome {
                summary: summary(Some("fs-1")),
            })
        },
        |_outcome, _mode| Ok(()),
    );

    assert_eq!(
        handler.execute(OutputMode::Human, false).unwrap(),
        ExitCode::SUCCESS
    );
}

#[test]
fn init_handler_reports_creation_failure() {
    let rendered = Arc::new(Mutex::new(0));
    let handler = InitHandler::with_dependencies(
        InitArgs {
            state_file: Some(PathBuf::from("/tmp/faceguard/state.json")),
        },
        |_args| {
            Ok(InitOutcome {
                summary: summary(None),
            })
        },
        {
            let rendered = Arc::clone(&rendered);
            move |outcome, _mode| {
                assert!(!outcome.is_ready());
                *rendered.lock().unwrap() += 1;
                Ok(())
            }
        },
    );

    assert_eq!(
        handler.execute(OutputMode::Json, false).unwrap(),
        ExitCode::from(3)
    );
    assert_eq!(*rendered.lock().unwrap(), 1);
}

#[test]
fn status_handler_renders_uninitialized_state() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = StatusHandler::with_dependencies(
        StatusArgs { state_file: None },
        |_args| {
            Ok(StatusOutcome {
                summary: summary(None),
                config_source: None,
                face_tokens: Vec::new(),
                initialized: false,
            })
        },
        {
            let seen = Arc::clone(&seen);
            move |outcome, mode| {
                seen.lock().unwrap().push((outcome.initialized, mode));
                Ok(())
            }
        },
    );

    assert_eq!(
        handler.execute(OutputMode::Human, false).unwrap(),
        ExitCode::SUCCESS
    );
    assert_eq!(seen.lock().unwrap().as_slice(), [(false, OutputMode::Human)]);
}
