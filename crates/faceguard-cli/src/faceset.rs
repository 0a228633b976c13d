use std::path::PathBuf;

use faceguard_core::registration::RegistrationOutcome;
use faceguard_core::registry::open_from_config;
use faceguard_core::store::{FilesystemStateStore, StateStore};
use serde::Serialize;
use tracing::info;

use crate::cli::{InitArgs, RegisterArgs, StatusArgs};
use crate::config::load_settings;
use crate::errors::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceSetSummary {
    pub state_file: String,
    pub faceset_token: Option<String>,
    pub registered_faces: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitOutcome {
    pub summary: FaceSetSummary,
}

impl InitOutcome {
    pub fn is_ready(&self) -> bool {
        self.summary.faceset_token.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterOutcome {
    pub image: PathBuf,
    pub outcome: RegistrationOutcome,
    pub summary: FaceSetSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusOutcome {
    pub summary: FaceSetSummary,
    pub config_source: Option<PathBuf>,
    pub face_tokens: Vec<String>,
    /// False when no state file exists yet.
    pub initialized: bool,
}

pub fn run_init(args: &InitArgs) -> AppResult<InitOutcome> {
    let settings = load_settings(args.state_file.clone())?;
    let registry = open_from_config(&settings.resolved)?;
    let state = registry.snapshot();
    Ok(InitOutcome {
        summary: FaceSetSummary {
            state_file: settings.resolved.state_file.display().to_string(),
            faceset_token: state.faceset_token.clone(),
            registered_faces: state.registered_face_tokens().len(),
        },
    })
}

pub fn run_register(args: &RegisterArgs) -> AppResult<RegisterOutcome> {
    let settings = load_settings(args.state_file.clone())?;
    let registry = open_from_config(&settings.resolved)?;
    info!(image = %args.image.display(), "registering face");
    let outcome = registry.register_file(&args.image);
    let state = registry.snapshot();
    Ok(RegisterOutcome {
        image: args.image.clone(),
        outcome,
        summary: FaceSetSummary {
            state_file: settings.resolved.state_file.display().to_string(),
            faceset_token: state.faceset_token.clone(),
            registered_faces: state.registered_face_tokens().len(),
        },
    })
}

pub fn run_status(args: &StatusArgs) -> AppResult<StatusOutcome> {
    let settings = load_settings(args.state_file.clone())?;
    let backend = FilesystemStateStore::new(settings.resolved.state_file.clone());
    let state = backend.load()?;
    let summary = FaceSetSummary {
        state_file: backend.describe(),
        faceset_token: state.as_ref().and_then(|s| s.faceset_token.clone()),
        registered_faces: state
            .as_ref()
            .map_or(0, |s| s.registered_face_tokens().len()),
    };
    Ok(StatusOutcome {
        summary,
        config_source: settings.source,
        face_tokens: state
            .as_ref()
            .map(|s| s.registered_face_tokens().to_vec())
            .unwrap_or_default(),
        initialized: state.is_some(),
    })
}
