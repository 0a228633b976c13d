use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::errors::{AppError, AppResult};
use crate::provider::FaceProvider;

/// Durable record of the shared face-set and the face tokens admitted into it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceSetState {
    pub faceset_token: Option<String>,
    #[serde(rename = "user_tokens", default)]
    registered_face_tokens: Vec<String>,
}

impl FaceSetState {
    pub fn with_faceset_token(token: impl Into<String>) -> Self {
        Self {
            faceset_token: Some(token.into()),
            registered_face_tokens: Vec::new(),
        }
    }

    pub fn is_registered(&self, face_token: &str) -> bool {
        self.registered_face_tokens
            .iter()
            .any(|token| token == face_token)
    }

    pub fn registered_face_tokens(&self) -> &[String] {
        &self.registered_face_tokens
    }

    /// Appends `face_token` unless already present; returns whether it was added.
    pub fn insert_token(&mut self, face_token: &str) -> bool {
        if self.is_registered(face_token) {
            return false;
        }
        self.registered_face_tokens.push(face_token.to_string());
        true
    }

    fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.registered_face_tokens.len());
        for token in self.registered_face_tokens.drain(..) {
            if !seen.contains(&token) {
                seen.push(token);
            }
        }
        self.registered_face_tokens = seen;
        self
    }
}

/// Exclusive hold on persisted state shared with other processes. Released on drop.
#[derive(Debug)]
pub struct StateLock {
    _file: Option<File>,
}

impl StateLock {
    /// For backends no other process can reach.
    pub fn in_process() -> Self {
        Self { _file: None }
    }
}

pub trait StateStore {
    /// `Ok(None)` when nothing has been persisted yet.
    fn load(&self) -> AppResult<Option<FaceSetState>>;
    fn save(&self, state: &FaceSetState) -> AppResult<()>;
    /// Blocks until the caller holds the state exclusively.
    fn lock(&self) -> AppResult<StateLock> {
        Ok(StateLock::in_process())
    }
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FilesystemStateStore {
    path: PathBuf,
}

impl FilesystemStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sibling of the state file, e.g. `faceset_token.json.lock`.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("faceset"));
        name.push(".lock");
        self.path.with_file_name(name)
    }
}

impl StateStore for FilesystemStateStore {
    fn load(&self) -> AppResult<Option<FaceSetState>> {
        read_state_file(&self.path)
    }

    fn save(&self, state: &FaceSetState) -> AppResult<()> {
        write_state_file(&self.path, state)
    }

    fn lock(&self) -> AppResult<StateLock> {
        let lock_path = self.lock_path();
        let lock_err = |source: io::Error| AppError::StateLock {
            path: lock_path.clone(),
            source,
        };

        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(lock_err)?;
        }
        let mut options = OpenOptions::new();
        options.create(true).truncate(false).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&lock_path).map_err(lock_err)?;
        flock_exclusive(&file).map_err(lock_err)?;
        debug!(lock = %lock_path.display(), "acquired face-set state lock");
        Ok(StateLock { _file: Some(file) })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> AppResult<Option<FaceSetState>> {
        (**self).load()
    }

    fn save(&self, state: &FaceSetState) -> AppResult<()> {
        (**self).save(state)
    }

    fn lock(&self) -> AppResult<StateLock> {
        (**self).lock()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(unix)]
fn flock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    loop {
        // SAFETY: `fd` belongs to `file`, which is borrowed for the whole call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

pub fn read_state_file(path: &Path) -> AppResult<Option<FaceSetState>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = fs::read(path).map_err(|source| AppError::StateRead {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice::<FaceSetState>(&data)
        .map(Some)
        .map_err(|err| AppError::InvalidStateFile {
            path: path.to_path_buf(),
            message: format!("invalid face-set state contents: {err}"),
        })
}

pub fn write_state_file(path: &Path, state: &FaceSetState) -> AppResult<()> {
    let write_err = |source: io::Error| AppError::StateWrite {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| AppError::StateWrite {
        path: parent.to_path_buf(),
        source,
    })?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;
    {
        let file = tmp.as_file_mut();
        {
            let mut writer = BufWriter::new(&mut *file);
            let serialized = serde_json::to_vec_pretty(state)?;
            writer.write_all(&serialized).map_err(write_err)?;
            writer.write_all(b"\n").map_err(write_err)?;
            writer.flush().map_err(write_err)?;
        }
        file.sync_all().map_err(write_err)?;
    }

    let file = tmp.persist(path).map_err(|err| write_err(err.error))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata().map_err(write_err)?.permissions();
        perms.set_mode(0o600);
        file.set_permissions(perms).map_err(write_err)?;
    }
    #[cfg(not(unix))]
    drop(file);

    Ok(())
}

/// Durable append of an admitted face token.
pub trait TokenRecorder {
    /// Returns the state to adopt. Recording a token that is already present
    /// succeeds without writing.
    fn record_token(&self, state: &FaceSetState, face_token: &str) -> AppResult<FaceSetState>;
    fn describe(&self) -> String;
}

/// Owns persistence of [`FaceSetState`] and serializes every mutation of it,
/// within this process through a mutex and across processes through the
/// backend's [`StateStore::lock`].
pub struct FaceSetStore<S> {
    backend: S,
    mutation: Mutex<()>,
}

/// Exclusive access to the persisted state for as long as the value lives.
pub struct StoreSession<'a, S> {
    store: &'a FaceSetStore<S>,
    _file_lock: StateLock,
    _guard: MutexGuard<'a, ()>,
}

impl<S: StateStore> FaceSetStore<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            mutation: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    pub fn lock(&self) -> AppResult<StoreSession<'_, S>> {
        let guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
        let file_lock = self.backend.lock()?;
        Ok(StoreSession {
            store: self,
            _file_lock: file_lock,
            _guard: guard,
        })
    }

    /// Reads persisted state, creating a remote face-set when none is usable.
    ///
    /// Never fails: a provider failure yields a state without a face-set token,
    /// which is enough for diagnostics but refuses every registration.
    pub fn load_or_create<P: FaceProvider>(&self, provider: &P) -> FaceSetState {
        match self.lock() {
            Ok(session) => session.load_or_create(provider),
            Err(err) => {
                warn!(
                    store = %self.backend.describe(),
                    error = %err,
                    "face-set state lock unavailable; loading without it"
                );
                let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
                self.load_or_create_locked(provider)
            }
        }
    }

    fn load_or_create_locked<P: FaceProvider>(&self, provider: &P) -> FaceSetState {
        let location = self.backend.describe();

        let existing = match self.backend.load() {
            Ok(Some(state)) => Some(state.normalized()),
            Ok(None) => {
                info!(store = %location, "no face-set state found");
                None
            }
            Err(err) => {
                warn!(store = %location, error = %err, "ignoring unreadable face-set state");
                None
            }
        };

        let carried_tokens = match existing {
            Some(state) if state.faceset_token.is_some() => {
                debug!(
                    store = %location,
                    registered = state.registered_face_tokens.len(),
                    "loaded face-set state"
                );
                return state;
            }
            Some(state) => state.registered_face_tokens,
            None => Vec::new(),
        };

        match provider.create_face_set() {
            Ok(token) => {
                info!(provider = provider.name(), faceset_token = %token, "created face-set");
                let state = FaceSetState {
                    faceset_token: Some(token),
                    registered_face_tokens: carried_tokens,
                };
                if let Err(err) = self.backend.save(&state) {
                    warn!(store = %location, error = %err, "failed to persist new face-set state");
                }
                state
            }
            Err(err) => {
                warn!(provider = provider.name(), error = %err, "face-set creation failed");
                FaceSetState {
                    faceset_token: None,
                    registered_face_tokens: carried_tokens,
                }
            }
        }
    }

    /// Folds whatever is persisted now into `state`. Tokens recorded by other
    /// processes since `state` was loaded are kept ahead of local ones.
    fn merge_persisted(&self, state: &FaceSetState) -> FaceSetState {
        let persisted = match self.backend.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return state.clone(),
            Err(err) => {
                warn!(
                    store = %self.backend.describe(),
                    error = %err,
                    "could not re-read face-set state; keeping in-memory copy"
                );
                return state.clone();
            }
        };

        let same_faceset =
            state.faceset_token.is_none() || persisted.faceset_token == state.faceset_token;
        if !same_faceset {
            debug!("persisted state names another face-set; keeping in-memory copy");
            return state.clone();
        }

        let mut merged = persisted.normalized();
        for token in &state.registered_face_tokens {
            merged.insert_token(token);
        }
        merged
    }

    fn record_token_locked(&self, state: &FaceSetState, face_token: &str) -> AppResult<FaceSetState> {
        let mut next = self.merge_persisted(state);
        if !next.insert_token(face_token) {
            debug!(face_token, "face token already recorded");
            return Ok(next);
        }
        self.backend.save(&next)?;
        debug!(
            face_token,
            registered = next.registered_face_tokens.len(),
            "recorded face token"
        );
        Ok(next)
    }
}

impl<S: StateStore> TokenRecorder for FaceSetStore<S> {
    fn record_token(&self, state: &FaceSetState, face_token: &str) -> AppResult<FaceSetState> {
        self.lock()?.record_token(state, face_token)
    }

    fn describe(&self) -> String {
        self.backend.describe()
    }
}

impl<S: StateStore> StoreSession<'_, S> {
    pub fn load_or_create<P: FaceProvider>(&self, provider: &P) -> FaceSetState {
        self.store.load_or_create_locked(provider)
    }

    /// `state` updated with face tokens other writers have persisted.
    pub fn refresh(&self, state: &FaceSetState) -> FaceSetState {
        self.store.merge_persisted(state)
    }
}

impl<S: StateStore> TokenRecorder for StoreSession<'_, S> {
    fn record_token(&self, state: &FaceSetState, face_token: &str) -> AppResult<FaceSetState> {
        self.store.record_token_locked(state, face_token)
    }

    fn describe(&self) -> String {
        self.store.backend.describe()
    }
}
