use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/faceguard/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/faceguard/config.toml";
pub const DEFAULT_API_BASE_URL: &str = "https://api-us.faceplusplus.com/facepp/v3";
pub const DEFAULT_STATE_FILE: &str = "/var/lib/faceguard/faceset_token.json";
pub const DEFAULT_FACESET_DISPLAY_NAME: &str = "UserFaceSet";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 70.0;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

pub const API_KEY_ENV: &str = "FACEGUARD_API_KEY";
pub const API_SECRET_ENV: &str = "FACEGUARD_API_SECRET";
pub const STATE_FILE_ENV: &str = "FACEGUARD_STATE_FILE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub state_file: Option<PathBuf>,
    pub faceset_display_name: Option<String>,
    pub similarity_threshold: Option<f64>,
    pub request_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Clone)]
pub struct ResolvedConfig {
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub state_file: PathBuf,
    pub faceset_display_name: String,
    pub similarity_threshold: f64,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

// Hand-written so the API secret never lands in debug logs.
impl std::fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("state_file", &self.state_file)
            .field("faceset_display_name", &self.faceset_display_name)
            .field("similarity_threshold", &self.similarity_threshold)
            .field("request_timeout", &self.request_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            api_base_url: raw
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_key: raw.api_key,
            api_secret: raw.api_secret,
            state_file: raw
                .state_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            faceset_display_name: raw
                .faceset_display_name
                .unwrap_or_else(|| DEFAULT_FACESET_DISPLAY_NAME.to_string()),
            similarity_threshold: raw
                .similarity_threshold
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            request_timeout: Duration::from_secs(
                raw.request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                    .max(1),
            ),
            connect_timeout: Duration::from_secs(
                raw.connect_timeout_secs
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
                    .max(1),
            ),
        }
    }

    /// Applies `FACEGUARD_*` overrides; `lookup` is normally `std::env::var`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(key) = non_empty(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        if let Some(secret) = non_empty(API_SECRET_ENV) {
            self.api_secret = Some(secret);
        }
        if let Some(path) = non_empty(STATE_FILE_ENV) {
            self.state_file = PathBuf::from(path);
        }
        self
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

pub fn default_sources() -> [PathBuf; 2] {
    [
        PathBuf::from(PRIMARY_CONFIG_PATH),
        PathBuf::from(SECONDARY_CONFIG_PATH),
    ]
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
