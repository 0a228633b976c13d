use std::time::Duration;

use faceguard_config::{ResolvedConfig, API_KEY_ENV, API_SECRET_ENV};
use reqwest::blocking::{multipart, Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{AppError, AppResult};
use crate::provider::{DetectedFace, FaceProvider, ProviderError, SimilarityMatch};

const EMPTY_FACESET_CODE: &str = "EMPTY_FACESET";
const USER_AGENT: &str = concat!("faceguard/", env!("CARGO_PKG_VERSION"));

const OP_CREATE: &str = "faceset/create";
const OP_DETECT: &str = "detect";
const OP_SEARCH: &str = "search";
const OP_ADD_FACE: &str = "faceset/addface";

/// Face++ v3 REST adapter.
pub struct FacePlusPlusProvider {
    api_base_url: String,
    api_key: String,
    api_secret: String,
    display_name: String,
    http_client: Client,
}

impl FacePlusPlusProvider {
    pub fn new(
        api_base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        display_name: impl Into<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> AppResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AppError::MissingCredentials {
                name: "api_key",
                env: API_KEY_ENV,
            });
        }
        let api_secret = api_secret.into();
        if api_secret.trim().is_empty() {
            return Err(AppError::MissingCredentials {
                name: "api_secret",
                env: API_SECRET_ENV,
            });
        }
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(AppError::ProviderSetup(
                "api_base_url must not be empty".into(),
            ));
        }

        let http_client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| AppError::ProviderSetup(err.to_string()))?;

        Ok(Self {
            api_base_url,
            api_key,
            api_secret,
            display_name: display_name.into(),
            http_client,
        })
    }

    pub fn from_config(config: &ResolvedConfig) -> AppResult<Self> {
        let api_key = config.api_key.clone().ok_or(AppError::MissingCredentials {
            name: "api_key",
            env: API_KEY_ENV,
        })?;
        let api_secret = config
            .api_secret
            .clone()
            .ok_or(AppError::MissingCredentials {
                name: "api_secret",
                env: API_SECRET_ENV,
            })?;
        Self::new(
            config.api_base_url.clone(),
            api_key,
            api_secret,
            config.faceset_display_name.clone(),
            config.request_timeout,
            config.connect_timeout,
        )
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}", self.api_base_url.trim_end_matches('/'), operation)
    }

    fn post_form(
        &self,
        operation: &'static str,
        fields: &[(&str, &str)],
    ) -> Result<RawResponse, ProviderError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("api_secret", self.api_secret.as_str()),
        ];
        form.extend_from_slice(fields);
        let request = self.http_client.post(self.endpoint(operation)).form(&form);
        send(operation, request)
    }
}

impl FaceProvider for FacePlusPlusProvider {
    fn create_face_set(&self) -> Result<String, ProviderError> {
        let response = self.post_form(OP_CREATE, &[("display_name", self.display_name.as_str())])?;
        parse_create_response(&response)
    }

    fn detect_faces(&self, image: &[u8]) -> Result<Vec<DetectedFace>, ProviderError> {
        let form = multipart::Form::new()
            .text("api_key", self.api_key.clone())
            .text("api_secret", self.api_secret.clone())
            .part(
                "image_file",
                multipart::Part::bytes(image.to_vec()).file_name("upload"),
            );
        let request = self
            .http_client
            .post(self.endpoint(OP_DETECT))
            .multipart(form);
        let response = send(OP_DETECT, request)?;
        parse_detect_response(&response)
    }

    fn search_similar(
        &self,
        face_token: &str,
        faceset_token: &str,
    ) -> Result<Option<SimilarityMatch>, ProviderError> {
        let response = self.post_form(
            OP_SEARCH,
            &[
                ("face_token", face_token),
                ("faceset_token", faceset_token),
                ("return_result_count", "1"),
            ],
        )?;
        parse_search_response(&response)
    }

    fn add_face(&self, face_token: &str, faceset_token: &str) -> Result<(), ProviderError> {
        let response = self.post_form(
            OP_ADD_FACE,
            &[("faceset_token", faceset_token), ("face_tokens", face_token)],
        )?;
        parse_add_face_response(&response)
    }

    fn name(&self) -> &'static str {
        "faceplusplus"
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_unavailable(self, operation: &'static str) -> ProviderError {
        warn!(
            operation,
            status = self.status,
            body = %self.body,
            "provider returned a non-success status"
        );
        ProviderError::Unavailable {
            operation,
            status: Some(self.status),
            message: error_message(&self.body).unwrap_or(self.body),
        }
    }
}

fn send(operation: &'static str, request: RequestBuilder) -> Result<RawResponse, ProviderError> {
    let response = request.send().map_err(|err| {
        warn!(operation, error = %err, "provider request did not complete");
        ProviderError::Unavailable {
            operation,
            status: None,
            message: if err.is_timeout() {
                format!("request timed out: {err}")
            } else {
                err.to_string()
            },
        }
    })?;
    let status = response.status().as_u16();
    let body = response.text().map_err(|err| ProviderError::Unavailable {
        operation,
        status: Some(status),
        message: format!("failed to read response body: {err}"),
    })?;
    debug!(operation, status, "provider responded");
    Ok(RawResponse { status, body })
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateFaceSetBody {
    faceset_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetectBody {
    #[serde(default)]
    faces: Vec<DetectFaceBody>,
}

#[derive(Debug, Deserialize)]
struct DetectFaceBody {
    face_token: String,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    results: Vec<SearchResultBody>,
}

#[derive(Debug, Deserialize)]
struct SearchResultBody {
    confidence: f64,
    face_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddFaceBody {
    face_added: Option<u64>,
    #[serde(default)]
    failure_detail: Vec<FailureDetailBody>,
}

#[derive(Debug, Deserialize)]
struct FailureDetailBody {
    reason: String,
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error_message)
}

fn parse_body<'a, T: Deserialize<'a>>(
    operation: &'static str,
    body: &'a str,
) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|err| ProviderError::MalformedResponse {
        operation,
        message: err.to_string(),
    })
}

pub(crate) fn parse_create_response(response: &RawResponse) -> Result<String, ProviderError> {
    if !response.is_success() {
        return Err(response.clone().into_unavailable(OP_CREATE));
    }
    let parsed: CreateFaceSetBody = parse_body(OP_CREATE, &response.body)?;
    parsed
        .faceset_token
        .filter(|token| !token.is_empty())
        .ok_or(ProviderError::MalformedResponse {
            operation: OP_CREATE,
            message: "response carried no faceset_token".into(),
        })
}

pub(crate) fn parse_detect_response(
    response: &RawResponse,
) -> Result<Vec<DetectedFace>, ProviderError> {
    if !response.is_success() {
        return Err(response.clone().into_unavailable(OP_DETECT));
    }
    let parsed: DetectBody = parse_body(OP_DETECT, &response.body)?;
    Ok(parsed
        .faces
        .into_iter()
        .map(|face| DetectedFace::new(face.face_token))
        .collect())
}

pub(crate) fn parse_search_response(
    response: &RawResponse,
) -> Result<Option<SimilarityMatch>, ProviderError> {
    if !response.is_success() {
        if error_message(&response.body).as_deref() == Some(EMPTY_FACESET_CODE) {
            return Err(ProviderError::EmptyFaceSet);
        }
        return Err(response.clone().into_unavailable(OP_SEARCH));
    }
    let parsed: SearchBody = parse_body(OP_SEARCH, &response.body)?;
    Ok(parsed.results.into_iter().next().map(|best| SimilarityMatch {
        confidence: best.confidence,
        face_token: best.face_token,
    }))
}

pub(crate) fn parse_add_face_response(response: &RawResponse) -> Result<(), ProviderError> {
    if !response.is_success() {
        return Err(response.clone().into_unavailable(OP_ADD_FACE));
    }
    // Older responses may omit the counters entirely; only an explicit zero is a refusal.
    let parsed: AddFaceBody = parse_body(OP_ADD_FACE, &response.body)?;
    match parsed.face_added {
        Some(0) => {
            let reason = parsed
                .failure_detail
                .first()
                .map(|detail| detail.reason.clone())
                .unwrap_or_else(|| "face was not added".to_string());
            Err(ProviderError::Unavailable {
                operation: OP_ADD_FACE,
                status: Some(response.status),
                message: reason,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    fn failed(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn create_returns_faceset_token() {
        let token = parse_create_response(&ok(
            r#"{"faceset_token":"fs-123","time_used":40,"face_added":0}"#,
        ))
        .unwrap();
        assert_eq!(token, "fs-123");
    }

    #[test]
    fn create_without_token_is_malformed() {
        let err = parse_create_response(&ok(r#"{"time_used":40}"#)).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    }

    #[test]
    fn create_failure_keeps_status_and_provider_message() {
        let err =
            parse_create_response(&failed(401, r#"{"error_message":"AUTHENTICATION_ERROR"}"#))
                .unwrap_err();
        assert_eq!(
            err,
            ProviderError::Unavailable {
                operation: OP_CREATE,
                status: Some(401),
                message: "AUTHENTICATION_ERROR".into(),
            }
        );
    }

    #[test]
    fn detect_lists_face_tokens() {
        let faces = parse_detect_response(&ok(
            r#"{"faces":[{"face_token":"a","face_rectangle":{}},{"face_token":"b"}],"face_num":2}"#,
        ))
        .unwrap();
        assert_eq!(faces, vec![DetectedFace::new("a"), DetectedFace::new("b")]);
    }

    #[test]
    fn detect_without_faces_field_is_empty() {
        let faces = parse_detect_response(&ok(r#"{"image_id":"x"}"#)).unwrap();
        assert!(faces.is_empty());
    }

    #[test]
    fn detect_with_non_json_body_is_malformed() {
        let err = parse_detect_response(&ok("<html>gateway</html>")).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::MalformedResponse {
                operation: OP_DETECT,
                ..
            }
        ));
    }

    #[test]
    fn search_returns_best_match() {
        let found = parse_search_response(&ok(
            r#"{"results":[{"confidence":85.2,"face_token":"old","user_id":""}],"thresholds":{}}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(found.confidence, 85.2);
        assert_eq!(found.face_token.as_deref(), Some("old"));
    }

    #[test]
    fn search_without_results_is_no_match() {
        assert!(parse_search_response(&ok(r#"{"results":[]}"#))
            .unwrap()
            .is_none());
    }

    #[test]
    fn search_distinguishes_empty_faceset() {
        let err =
            parse_search_response(&failed(400, r#"{"error_message":"EMPTY_FACESET"}"#)).unwrap_err();
        assert_eq!(err, ProviderError::EmptyFaceSet);

        let err = parse_search_response(&failed(400, r#"{"error_message":"INVALID_FACESET_TOKEN"}"#))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable { .. }));

        let err = parse_search_response(&failed(502, "bad gateway")).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Unavailable {
                status: Some(502),
                ..
            }
        ));
    }

    #[test]
    fn add_face_succeeds_with_or_without_counters() {
        parse_add_face_response(&ok(r#"{"face_added":1,"face_count":3,"failure_detail":[]}"#))
            .unwrap();
        parse_add_face_response(&ok(r#"{"faceset_token":"fs"}"#)).unwrap();
    }

    #[test]
    fn add_face_reporting_zero_added_is_a_failure() {
        let err = parse_add_face_response(&ok(
            r#"{"face_added":0,"failure_detail":[{"reason":"INVALID_FACE_TOKEN","face_token":"x"}]}"#,
        ))
        .unwrap_err();
        match err {
            ProviderError::Unavailable { message, .. } => {
                assert_eq!(message, "INVALID_FACE_TOKEN")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn from_config_requires_credentials() {
        let config = ResolvedConfig::default();
        let err = FacePlusPlusProvider::from_config(&config).err().unwrap();
        assert!(matches!(
            err,
            AppError::MissingCredentials {
                name: "api_key",
                ..
            }
        ));
    }

    #[test]
    fn endpoint_joins_base_url_without_double_slash() {
        let provider = FacePlusPlusProvider::new(
            "https://example.invalid/facepp/v3/",
            "key",
            "secret",
            "UserFaceSet",
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            provider.endpoint(OP_ADD_FACE),
            "https://example.invalid/facepp/v3/faceset/addface"
        );
    }
}
