use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use faceguard_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("input file not found or unreadable: {path}")]
    MissingInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read face-set state {path}: {source}")]
    StateRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write face-set state {path}: {source}")]
    StateWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to lock face-set state {path}: {source}")]
    StateLock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("face-set state {path} is invalid: {message}")]
    InvalidStateFile { path: PathBuf, message: String },

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("missing provider credential {name}; set it in the config file or ${env}")]
    MissingCredentials {
        name: &'static str,
        env: &'static str,
    },

    #[error("failed to initialise provider client: {0}")]
    ProviderSetup(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::MissingInput { .. } => ExitCode::from(2),
            AppError::InvalidStateFile { .. } => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::MissingCredentials { .. } => ExitCode::from(2),
            AppError::ProviderSetup(_) => ExitCode::from(4),
            AppError::StateRead { .. } => ExitCode::from(4),
            AppError::StateWrite { .. } => ExitCode::from(4),
            AppError::StateLock { .. } => ExitCode::from(4),
            _ => ExitCode::from(1),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Read { path, source } => AppError::ConfigRead { path, source },
            ConfigError::Parse { path, message } => AppError::ConfigParse { path, message },
        }
    }
}
