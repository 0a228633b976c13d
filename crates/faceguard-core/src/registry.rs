use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use faceguard_config::ResolvedConfig;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::provider::{FacePlusPlusProvider, FaceProvider};
use crate::registration::{
    register_user_with, RegistrationOutcome, RegistrationPolicy, RejectionReason,
};
use crate::store::{FaceSetState, FaceSetStore, FilesystemStateStore, StateStore};

/// Process-wide handle on the shared face-set.
///
/// Every registration holds the state mutex and the store's cross-process lock
/// from reloading the state through recording the token, so two concurrent
/// submissions of the same face cannot both pass the duplicate checks, even
/// from separate processes.
pub struct FaceSetRegistry<P, S> {
    provider: P,
    store: FaceSetStore<S>,
    policy: RegistrationPolicy,
    state: Mutex<FaceSetState>,
}

impl<P, S> FaceSetRegistry<P, S>
where
    P: FaceProvider,
    S: StateStore,
{
    /// Loads the persisted state, creating the remote face-set on first run.
    pub fn open(provider: P, backend: S, policy: RegistrationPolicy) -> Self {
        let store = FaceSetStore::new(backend);
        let state = store.load_or_create(&provider);
        Self::with_state(provider, store, policy, state)
    }

    pub fn with_state(
        provider: P,
        store: FaceSetStore<S>,
        policy: RegistrationPolicy,
        state: FaceSetState,
    ) -> Self {
        Self {
            provider,
            store,
            policy,
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> FaceSetState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn register(&self, image: &[u8]) -> RegistrationOutcome {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let session = match self.store.lock() {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "registration refused: face-set state lock unavailable");
                return RegistrationOutcome::Rejected(RejectionReason::StateUnavailable);
            }
        };
        *state = session.refresh(&state);
        let report = register_user_with(image, &state, &self.provider, &session, &self.policy);
        if let Some(next) = report.updated_state {
            *state = next;
        }
        debug!(status = report.outcome.status(), "registration finished");
        report.outcome
    }

    pub fn register_file(&self, path: &Path) -> RegistrationOutcome {
        match read_image(path) {
            Ok(bytes) => self.register(&bytes),
            Err(err) => {
                warn!(error = %err, "registration image unavailable");
                RegistrationOutcome::Rejected(RejectionReason::ImageUnreadable)
            }
        }
    }
}

pub type DefaultRegistry = FaceSetRegistry<FacePlusPlusProvider, FilesystemStateStore>;

/// Builds the Face++ backed registry described by `config`.
pub fn open_from_config(config: &ResolvedConfig) -> AppResult<DefaultRegistry> {
    let provider = FacePlusPlusProvider::from_config(config)?;
    let backend = FilesystemStateStore::new(config.state_file.clone());
    Ok(FaceSetRegistry::open(
        provider,
        backend,
        RegistrationPolicy::from_config(config),
    ))
}

pub fn read_image(path: &Path) -> AppResult<Vec<u8>> {
    let bytes = fs::read(path).map_err(|source| AppError::MissingInput {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(AppError::MissingInput {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, "image file is empty"),
        });
    }
    Ok(bytes)
}
