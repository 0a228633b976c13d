use std::env;
use std::path::PathBuf;

use faceguard_config::{default_sources, load_resolved_from_paths, ResolvedConfigWithSource};
use tracing::{debug, info};

use crate::errors::AppResult;

/// Resolves settings with precedence flag > environment > config file > default.
pub fn load_settings(state_file: Option<PathBuf>) -> AppResult<ResolvedConfigWithSource> {
    load_settings_with_sources(state_file, &default_sources(), |name| env::var(name).ok())
}

fn load_settings_with_sources<F>(
    state_file: Option<PathBuf>,
    sources: &[PathBuf],
    lookup: F,
) -> AppResult<ResolvedConfigWithSource>
where
    F: Fn(&str) -> Option<String>,
{
    let mut loaded = load_resolved_from_paths(sources)?;
    loaded.resolved = loaded.resolved.with_overrides_from(lookup);
    Ok(apply_state_file_flag(loaded, state_file))
}

fn apply_state_file_flag(
    mut loaded: ResolvedConfigWithSource,
    state_file: Option<PathBuf>,
) -> ResolvedConfigWithSource {
    match &loaded.source {
        Some(path) => debug!(path = %path.display(), "loaded configuration"),
        None => info!("no config file found; using built-in defaults"),
    }
    if let Some(path) = state_file {
        loaded.resolved.state_file = path;
    }
    loaded
}
