use faceguard_config::{ResolvedConfig, DEFAULT_SIMILARITY_THRESHOLD};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::provider::{FaceProvider, ProviderError};
use crate::store::{FaceSetState, TokenRecorder};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistrationPolicy {
    /// Matches scoring strictly above this confidence are the same person.
    pub similarity_threshold: f64,
}

impl RegistrationPolicy {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
        }
    }

    pub fn is_duplicate(&self, confidence: f64) -> bool {
        confidence > self.similarity_threshold
    }
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RejectionReason {
    #[error("Cannot proceed with registration due to face set creation failure")]
    FaceSetUnavailable,

    #[error("Face set state is unavailable")]
    StateUnavailable,

    #[error("Image file not found at the specified path")]
    ImageUnreadable,

    #[error("{}", describe_provider_failure(.0, "Failed to detect face"))]
    DetectFailed(ProviderError),

    #[error("No face detected in the image")]
    NoFaceDetected,

    #[error("Multiple faces detected in the image")]
    MultipleFacesDetected { count: usize },

    #[error("This user is already registered")]
    AlreadyRegistered,

    #[error("{}", describe_provider_failure(.0, "Failed to search for duplicates"))]
    SearchFailed(ProviderError),

    #[error("Duplicate face detected with {confidence:?}% confidence. Registration denied.")]
    DuplicateFace { confidence: f64 },

    #[error("Failed to add face to the set.")]
    CommitFailed(ProviderError),
}

fn describe_provider_failure(err: &ProviderError, fallback: &'static str) -> &'static str {
    match err {
        ProviderError::MalformedResponse { .. } => "Invalid response from API",
        _ => fallback,
    }
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::FaceSetUnavailable => "faceset_unavailable",
            RejectionReason::StateUnavailable => "state_unavailable",
            RejectionReason::ImageUnreadable => "image_unreadable",
            RejectionReason::DetectFailed(ProviderError::MalformedResponse { .. })
            | RejectionReason::SearchFailed(ProviderError::MalformedResponse { .. })
            | RejectionReason::CommitFailed(ProviderError::MalformedResponse { .. }) => {
                "provider_malformed_response"
            }
            RejectionReason::DetectFailed(_) => "detect_failed",
            RejectionReason::NoFaceDetected => "no_face_detected",
            RejectionReason::MultipleFacesDetected { .. } => "multiple_faces_detected",
            RejectionReason::AlreadyRegistered => "already_registered",
            RejectionReason::SearchFailed(_) => "search_failed",
            RejectionReason::DuplicateFace { .. } => "duplicate_face",
            RejectionReason::CommitFailed(_) => "commit_failed",
        }
    }
}

/// The single verdict a registration attempt produces.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Registered { face_token: String },
    /// The face entered the remote face-set but the local record could not be
    /// saved. The remote commit stands.
    RegisteredUnrecorded { face_token: String, reason: String },
    Rejected(RejectionReason),
}

impl RegistrationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RegistrationOutcome::Rejected(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            RegistrationOutcome::Registered { .. } => "success",
            RegistrationOutcome::RegisteredUnrecorded { .. } => "success_unrecorded",
            RegistrationOutcome::Rejected(_) => "rejected",
        }
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            RegistrationOutcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            RegistrationOutcome::Registered { .. } => {
                "Registration successful. Face added to the set.".to_string()
            }
            RegistrationOutcome::RegisteredUnrecorded { .. } => {
                "Registration successful but failed to save user token.".to_string()
            }
            RegistrationOutcome::Rejected(reason @ RejectionReason::DuplicateFace { .. }) => {
                reason.to_string()
            }
            RegistrationOutcome::Rejected(reason) => format!("Error: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationReport {
    pub outcome: RegistrationOutcome,
    /// The state to adopt, present only when the new face was recorded.
    pub updated_state: Option<FaceSetState>,
}

impl RegistrationReport {
    fn rejected(reason: RejectionReason) -> Self {
        Self {
            outcome: RegistrationOutcome::Rejected(reason),
            updated_state: None,
        }
    }
}

/// Runs detect, local check, similarity search and commit for one image.
///
/// Callers sharing a face-set must pass a [`crate::store::StoreSession`] held
/// for the whole call; see [`crate::registry::FaceSetRegistry`].
pub fn register_user_with<P, R>(
    image: &[u8],
    state: &FaceSetState,
    provider: &P,
    recorder: &R,
    policy: &RegistrationPolicy,
) -> RegistrationReport
where
    P: FaceProvider,
    R: TokenRecorder,
{
    let Some(faceset_token) = state.faceset_token.as_deref() else {
        warn!("registration refused: no face-set token");
        return RegistrationReport::rejected(RejectionReason::FaceSetUnavailable);
    };

    let faces = match provider.detect_faces(image) {
        Ok(faces) => faces,
        Err(err) => {
            warn!(provider = provider.name(), error = %err, "face detection failed");
            return RegistrationReport::rejected(RejectionReason::DetectFailed(err));
        }
    };
    debug!(faces = faces.len(), "detection finished");

    let face_token = match faces.as_slice() {
        [] => return RegistrationReport::rejected(RejectionReason::NoFaceDetected),
        [face] => face.face_token.as_str(),
        many => {
            return RegistrationReport::rejected(RejectionReason::MultipleFacesDetected {
                count: many.len(),
            })
        }
    };

    if state.is_registered(face_token) {
        debug!(face_token, "face token already recorded locally");
        return RegistrationReport::rejected(RejectionReason::AlreadyRegistered);
    }

    match provider.search_similar(face_token, faceset_token) {
        Ok(Some(found)) => {
            debug!(confidence = found.confidence, "closest enrolled face");
            if policy.is_duplicate(found.confidence) {
                info!(
                    confidence = found.confidence,
                    threshold = policy.similarity_threshold,
                    "registration refused: duplicate face"
                );
                return RegistrationReport::rejected(RejectionReason::DuplicateFace {
                    confidence: found.confidence,
                });
            }
        }
        Ok(None) => debug!("no similar face in face-set"),
        Err(ProviderError::EmptyFaceSet) => {
            info!("face-set is empty; first registration proceeds to commit");
        }
        Err(err) => {
            warn!(provider = provider.name(), error = %err, "duplicate search failed");
            return RegistrationReport::rejected(RejectionReason::SearchFailed(err));
        }
    }

    if let Err(err) = provider.add_face(face_token, faceset_token) {
        warn!(provider = provider.name(), error = %err, "adding face to face-set failed");
        return RegistrationReport::rejected(RejectionReason::CommitFailed(err));
    }
    info!(face_token, "face added to face-set");

    match recorder.record_token(state, face_token) {
        Ok(next) => RegistrationReport {
            outcome: RegistrationOutcome::Registered {
                face_token: face_token.to_string(),
            },
            updated_state: Some(next),
        },
        Err(err) => {
            // The remote face-set now holds a face this store does not know about.
            warn!(
                face_token,
                store = %recorder.describe(),
                error = %err,
                "face enrolled remotely but local record failed"
            );
            RegistrationReport {
                outcome: RegistrationOutcome::RegisteredUnrecorded {
                    face_token: face_token.to_string(),
                    reason: err.human_message(),
                },
                updated_state: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_is_exclusive() {
        let policy = RegistrationPolicy::default();
        assert!(!policy.is_duplicate(70.0));
        assert!(!policy.is_duplicate(69.99));
        assert!(policy.is_duplicate(70.001));
    }

    #[test]
    fn policy_follows_config() {
        let config = ResolvedConfig {
            similarity_threshold: 80.0,
            ..ResolvedConfig::default()
        };
        let policy = RegistrationPolicy::from_config(&config);
        assert!(!policy.is_duplicate(75.0));
    }

    #[test]
    fn messages_hide_provider_details() {
        let outcome = RegistrationOutcome::Rejected(RejectionReason::DetectFailed(
            ProviderError::Unavailable {
                operation: "detect",
                status: Some(500),
                message: "internal trace id 0xdead".into(),
            },
        ));
        assert_eq!(outcome.message(), "Error: Failed to detect face");

        let outcome = RegistrationOutcome::Rejected(RejectionReason::SearchFailed(
            ProviderError::MalformedResponse {
                operation: "search",
                message: "expected value at line 1".into(),
            },
        ));
        assert_eq!(outcome.message(), "Error: Invalid response from API");
        assert_eq!(
            outcome.rejection().map(RejectionReason::code),
            Some("provider_malformed_response")
        );
    }

    #[test]
    fn duplicate_message_reports_confidence() {
        let outcome =
            RegistrationOutcome::Rejected(RejectionReason::DuplicateFace { confidence: 85.5 });
        assert_eq!(
            outcome.message(),
            "Duplicate face detected with 85.5% confidence. Registration denied."
        );
        assert!(!outcome.is_success());

        let whole =
            RegistrationOutcome::Rejected(RejectionReason::DuplicateFace { confidence: 85.0 });
        assert_eq!(
            whole.message(),
            "Duplicate face detected with 85.0% confidence. Registration denied."
        );
    }

    #[test]
    fn degraded_success_is_still_success() {
        let outcome = RegistrationOutcome::RegisteredUnrecorded {
            face_token: "f".into(),
            reason: "disk full".into(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.status(), "success_unrecorded");
        assert_eq!(
            outcome.message(),
            "Registration successful but failed to save user token."
        );
    }
}
