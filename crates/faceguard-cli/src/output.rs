use std::error::Error;
use std::io::{self, Write};

use faceguard_core::registration::RegistrationOutcome;
use serde_json::{json, Value};

use crate::cli::OutputMode;
use crate::errors::{AppError, AppResult};
use crate::faceset::{InitOutcome, RegisterOutcome, StatusOutcome};

pub fn render_init(outcome: &InitOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => match &outcome.summary.faceset_token {
            Some(token) => {
                println!("Face-set ready: {token}");
                println!(
                    "State file: {} ({} registered faces)",
                    outcome.summary.state_file, outcome.summary.registered_faces
                );
            }
            None => println!("Failed to create face set"),
        },
        OutputMode::Json => {
            let payload = json!({
                "success": outcome.is_ready(),
                "faceset": outcome.summary,
            });
            write_json(&payload)?;
        }
    }
    Ok(())
}

pub fn render_register(outcome: &RegisterOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            println!("{}", outcome.outcome.message());
            if verbose {
                if let Some(token) = face_token(&outcome.outcome) {
                    println!("face token: {token}");
                }
                println!(
                    "state file: {} ({} registered faces)",
                    outcome.summary.state_file, outcome.summary.registered_faces
                );
            }
        }
        OutputMode::Json => write_json(&register_payload(outcome))?,
    }
    Ok(())
}

pub fn register_payload(outcome: &RegisterOutcome) -> Value {
    let mut payload = json!({
        "success": outcome.outcome.is_success(),
        "status": outcome.outcome.status(),
        "message": outcome.outcome.message(),
        "image": outcome.image.display().to_string(),
        "faceset": outcome.summary,
    });
    if let Some(token) = face_token(&outcome.outcome) {
        payload["face_token"] = json!(token);
    }
    match &outcome.outcome {
        RegistrationOutcome::Rejected(reason) => payload["code"] = json!(reason.code()),
        RegistrationOutcome::RegisteredUnrecorded { reason, .. } => {
            payload["warning"] = json!(reason)
        }
        RegistrationOutcome::Registered { .. } => {}
    }
    payload
}

fn face_token(outcome: &RegistrationOutcome) -> Option<&str> {
    match outcome {
        RegistrationOutcome::Registered { face_token }
        | RegistrationOutcome::RegisteredUnrecorded { face_token, .. } => Some(face_token.as_str()),
        RegistrationOutcome::Rejected(_) => None,
    }
}

pub fn render_status(outcome: &StatusOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if let Some(source) = &outcome.config_source {
                println!("Config: {}", source.display());
            }
            println!("State file: {}", outcome.summary.state_file);
            if !outcome.initialized {
                println!("No face-set state recorded yet; run `faceguard init`");
                return Ok(());
            }
            println!(
                "Face-set: {}",
                outcome.summary.faceset_token.as_deref().unwrap_or("<none>")
            );
            println!("Registered faces: {}", outcome.summary.registered_faces);
            for token in &outcome.face_tokens {
                println!("  {token}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "initialized": outcome.initialized,
                "config_source": outcome.config_source.as_ref().map(|p| p.display().to_string()),
                "faceset": outcome.summary,
                "face_tokens": outcome.face_tokens,
            });
            write_json(&payload)?;
        }
    }
    Ok(())
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}

fn write_json(payload: &Value) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let serialized = serde_json::to_string(payload)?;
    handle.write_all(serialized.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}
