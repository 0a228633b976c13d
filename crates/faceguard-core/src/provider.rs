pub mod facepp;

use thiserror::Error;

pub use facepp::FacePlusPlusProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedFace {
    pub face_token: String,
}

impl DetectedFace {
    pub fn new(face_token: impl Into<String>) -> Self {
        Self {
            face_token: face_token.into(),
        }
    }
}

/// Closest face in the face-set; confidence is on the provider's 0..100 scale.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    pub confidence: f64,
    pub face_token: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error(
        "{operation} request failed{}: {message}",
        .status.map(|code| format!(" with status {code}")).unwrap_or_default()
    )]
    Unavailable {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("{operation} returned an unusable response: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },

    #[error("face-set is empty")]
    EmptyFaceSet,
}

/// Remote face-recognition capabilities the registration workflow drives.
pub trait FaceProvider {
    fn create_face_set(&self) -> Result<String, ProviderError>;

    /// Every face found in the image; an empty list is not an error.
    fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError>;

    /// Best match for `face_token` inside the face-set. A face-set with no
    /// members must surface as [`ProviderError::EmptyFaceSet`].
    fn search_similar(
        &self,
        face_token: &str,
        faceset_token: &str,
    ) -> Result<Option<SimilarityMatch>, ProviderError>;

    fn add_face(&self, face_token: &str, faceset_token: &str) -> Result<(), ProviderError>;

    fn name(&self) -> &'static str;
}

impl<P: FaceProvider + ?Sized> FaceProvider for &P {
    fn create_face_set(&self) -> Result<String, ProviderError> {
        (**self).create_face_set()
    }

    fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError> {
        (**self).detect_faces(image)
    }

    fn search_similar(
        &self,
        face_token: &str,
        faceset_token: &str,
    ) -> Result<Option<SimilarityMatch>, ProviderError> {
        (**self).search_similar(face_token, faceset_token)
    }

    fn add_face(&self, face_token: &str, faceset_token: &str) -> Result<(), ProviderError> {
        (**self).add_face(face_token, faceset_token)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_message_includes_status_when_known() {
        let err = ProviderError::Unavailable {
            operation: "detect",
            status: Some(403),
            message: "AUTHENTICATION_ERROR".into(),
        };
        assert_eq!(
            err.to_string(),
            "detect request failed with status 403: AUTHENTICATION_ERROR"
        );

        let err = ProviderError::Unavailable {
            operation: "search",
            status: None,
            message: "operation timed out".into(),
        };
        assert_eq!(err.to_string(), "search request failed: operation timed out");
    }
}
