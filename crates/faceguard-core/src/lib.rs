pub mod errors;
pub mod provider;
pub mod registration;
pub mod registry;
pub mod store;

pub use errors::{AppError, AppResult};
pub use provider::{
    DetectedFace, FacePlusPlusProvider, FaceProvider, ProviderError, SimilarityMatch,
};
pub use registration::{
    register_user_with, RegistrationOutcome, RegistrationPolicy, RegistrationReport,
    RejectionReason,
};
pub use registry::{open_from_config, read_image, DefaultRegistry, FaceSetRegistry};
pub use store::{
    FaceSetState, FaceSetStore, FilesystemStateStore, StateLock, StateStore, StoreSession,
    TokenRecorder,
};
