//! Google Cloud Vision `TEXT_DETECTION` over the REST API.
//!
//! One `images:annotate` request per page, with the PNG inlined as base64.
//! Authentication is either an API key (`?key=`) or an OAuth access token
//! (`Authorization: Bearer`). Credentials are resolved once, before the
//! first page, so a missing or unusable credential aborts the run up front
//! instead of failing every page.

use crate::detector::{TextAnnotation, TextDetector};
use crate::error::{BookscanError, DetectionError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Public REST endpoint for batch image annotation.
pub const VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

const SERVICE: &str = "google-vision";

/// Credentials accepted by [`VisionDetector`].
#[derive(Clone, PartialEq, Eq)]
pub enum VisionCredentials {
    /// API key, sent as the `key` query parameter.
    ApiKey(String),
    /// OAuth 2.0 access token, sent as a bearer token.
    AccessToken(String),
}

impl fmt::Debug for VisionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionCredentials::ApiKey(_) => f.write_str("ApiKey(<redacted>)"),
            VisionCredentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
        }
    }
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl VisionCredentials {
    /// Load credentials from a JSON file holding `api_key` or
    /// `access_token`.
    ///
    /// Service-account key files are rejected: exchanging them for a token
    /// needs an OAuth flow this crate does not perform. Mint a token with
    /// `gcloud auth print-access-token` and store it as `access_token`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BookscanError> {
        let path = path.as_ref();
        let invalid = |reason: String| BookscanError::InvalidCredentials {
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BookscanError::CredentialsMissing {
                hint: format!("Credentials file '{}' does not exist.", path.display()),
            },
            _ => invalid(e.to_string()),
        })?;

        let file: CredentialsFile =
            serde_json::from_str(&raw).map_err(|e| invalid(format!("not valid JSON: {e}")))?;

        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if let Some(key) = non_empty(file.api_key) {
            return Ok(VisionCredentials::ApiKey(key));
        }
        if let Some(token) = non_empty(file.access_token) {
            return Ok(VisionCredentials::AccessToken(token));
        }
        if file.kind.as_deref() == Some("service_account") {
            return Err(invalid(
                "service-account key files are not supported; store an \
                 `access_token` (gcloud auth print-access-token) or an `api_key`"
                    .into(),
            ));
        }
        Err(invalid("expected an `api_key` or `access_token` field".into()))
    }

    /// Resolve credentials from the environment.
    ///
    /// `GOOGLE_VISION_API_KEY` wins; otherwise the file named by
    /// `GOOGLE_APPLICATION_CREDENTIALS` is loaded with [`Self::from_file`].
    pub fn from_env() -> Result<Self, BookscanError> {
        if let Ok(key) = std::env::var("GOOGLE_VISION_API_KEY") {
            if !key.trim().is_empty() {
                return Ok(VisionCredentials::ApiKey(key.trim().to_string()));
            }
        }
        match std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(PathBuf::from(path.trim())),
            _ => Err(BookscanError::CredentialsMissing {
                hint: "Set GOOGLE_VISION_API_KEY, or point GOOGLE_APPLICATION_CREDENTIALS \
                       at a JSON file with an `api_key` or `access_token`."
                    .into(),
            }),
        }
    }
}

/// Google Cloud Vision text detector.
pub struct VisionDetector {
    client: reqwest::Client,
    credentials: VisionCredentials,
    endpoint: String,
    timeout_secs: u64,
}

impl fmt::Debug for VisionDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionDetector")
            .field("credentials", &self.credentials)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl VisionDetector {
    pub fn new(credentials: VisionCredentials, timeout_secs: u64) -> Result<Self, BookscanError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| BookscanError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            credentials,
            endpoint: VISION_ENDPOINT.to_string(),
            timeout_secs,
        })
    }

    /// Build a detector from [`VisionCredentials::from_env`].
    pub fn from_env(timeout_secs: u64) -> Result<Self, BookscanError> {
        Self::new(VisionCredentials::from_env()?, timeout_secs)
    }

    /// Point the detector at another endpoint (regional endpoint, proxy).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TextDetector for VisionDetector {
    async fn detect_text(
        &self,
        png: &[u8],
        language_hints: &[String],
    ) -> Result<Vec<TextAnnotation>, DetectionError> {
        let body = AnnotateRequest::text_detection(png, language_hints);

        let mut request = self.client.post(&self.endpoint).json(&body);
        request = match &self.credentials {
            VisionCredentials::ApiKey(key) => request.query(&[("key", key)]),
            VisionCredentials::AccessToken(token) => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DetectionError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                DetectionError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                DetectionError::Timeout {
                    secs: self.timeout_secs,
                }
            } else {
                DetectionError::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(map_http_error(status, retry_after, &text));
        }

        let annotations = parse_annotate_response(&text)?;
        debug!("{}: {} annotations", SERVICE, annotations.len());
        Ok(annotations)
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest<'a> {
    image: ImageContent,
    features: [Feature; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    image_context: Option<ImageContext<'a>>,
}

#[derive(Debug, Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext<'a> {
    language_hints: &'a [String],
}

impl<'a> AnnotateRequest<'a> {
    fn text_detection(png: &[u8], language_hints: &'a [String]) -> Self {
        let image_context = if language_hints.is_empty() {
            None
        } else {
            Some(ImageContext { language_hints })
        };
        Self {
            requests: [ImageRequest {
                image: ImageContent {
                    content: STANDARD.encode(png),
                },
                features: [Feature {
                    kind: "TEXT_DETECTION",
                }],
                image_context,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default)]
    text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    error: Option<RpcStatus>,
}

#[derive(Debug, Deserialize)]
struct RpcStatus {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: RpcStatus,
}

/// Extract the annotations of the single image in an `images:annotate`
/// response body.
///
/// Annotations win over a per-image `error`; an error with no annotations
/// becomes [`DetectionError::Api`]; neither means the page has no text.
fn parse_annotate_response(body: &str) -> Result<Vec<TextAnnotation>, DetectionError> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

    let Some(image) = parsed.responses.into_iter().next() else {
        return Ok(Vec::new());
    };

    if !image.text_annotations.is_empty() {
        return Ok(image.text_annotations);
    }

    match image.error {
        Some(status) if !status.message.is_empty() => Err(DetectionError::Api {
            code: status.code,
            message: status.message,
        }),
        _ => Ok(Vec::new()),
    }
}

fn map_http_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> DetectionError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    match status {
        StatusCode::TOO_MANY_REQUESTS => DetectionError::RateLimited {
            service: SERVICE.to_string(),
            retry_after_secs: retry_after,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DetectionError::Auth {
            service: SERVICE.to_string(),
            detail,
        },
        s if s.is_server_error() => DetectionError::Server {
            service: SERVICE.to_string(),
            status: s.as_u16(),
            detail,
        },
        s => DetectionError::Api {
            code: i32::from(s.as_u16()),
            message: detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn request_body_shape() {
        let hints = vec!["ur".to_string()];
        let body = serde_json::to_value(AnnotateRequest::text_detection(b"png", &hints)).unwrap();
        let req = &body["requests"][0];
        assert_eq!(req["image"]["content"], STANDARD.encode(b"png"));
        assert_eq!(req["features"][0]["type"], "TEXT_DETECTION");
        assert_eq!(req["imageContext"]["languageHints"][0], "ur");

        let body = serde_json::to_value(AnnotateRequest::text_detection(b"png", &[])).unwrap();
        assert!(body["requests"][0].get("imageContext").is_none());
    }

    #[test]
    fn parse_annotations() {
        let body = r#"{"responses":[{"textAnnotations":[
            {"locale":"ur","description":"پہلا صفحہ\nدوسری سطر","boundingPoly":{"vertices":[]}},
            {"description":"پہلا"}
        ]}]}"#;
        let anns = parse_annotate_response(body).unwrap();
        assert_eq!(anns.len(), 2);
        assert_eq!(anns[0].locale.as_deref(), Some("ur"));
        assert!(anns[0].description.starts_with("پہلا صفحہ"));
    }

    #[test]
    fn parse_empty_page() {
        assert!(parse_annotate_response(r#"{"responses":[{}]}"#).unwrap().is_empty());
        assert!(parse_annotate_response(r#"{"responses":[]}"#).unwrap().is_empty());
        assert!(parse_annotate_response(r#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn parse_per_image_error() {
        let body = r#"{"responses":[{"error":{"code":3,"message":"Bad image data."}}]}"#;
        match parse_annotate_response(body) {
            Err(DetectionError::Api { code, message }) => {
                assert_eq!(code, 3);
                assert_eq!(message, "Bad image data.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parse_garbage_is_invalid_response() {
        assert!(matches!(
            parse_annotate_response("<html>"),
            Err(DetectionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn http_error_mapping() {
        let body = r#"{"error":{"code":403,"message":"API key not valid."}}"#;
        match map_http_error(StatusCode::FORBIDDEN, None, body) {
            DetectionError::Auth { detail, .. } => assert_eq!(detail, "API key not valid."),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            map_http_error(StatusCode::TOO_MANY_REQUESTS, Some(4), ""),
            DetectionError::RateLimited {
                retry_after_secs: Some(4),
                ..
            }
        ));
        assert!(map_http_error(StatusCode::BAD_GATEWAY, None, "oops").is_retryable());
        assert!(!map_http_error(StatusCode::BAD_REQUEST, None, "bad").is_retryable());
    }

    fn write_creds(json: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(json.as_bytes()).unwrap();
        f
    }

    #[test]
    fn credentials_from_file() {
        let f = write_creds(r#"{"api_key":" abc "}"#);
        assert_eq!(
            VisionCredentials::from_file(f.path()).unwrap(),
            VisionCredentials::ApiKey("abc".into())
        );

        let f = write_creds(r#"{"access_token":"ya29.token"}"#);
        assert_eq!(
            VisionCredentials::from_file(f.path()).unwrap(),
            VisionCredentials::AccessToken("ya29.token".into())
        );
    }

    #[test]
    fn service_account_file_rejected() {
        let f = write_creds(r#"{"type":"service_account","private_key":"-----BEGIN"}"#);
        let err = VisionCredentials::from_file(f.path()).unwrap_err();
        assert!(matches!(err, BookscanError::InvalidCredentials { .. }));
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn missing_credentials_file() {
        let err = VisionCredentials::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BookscanError::CredentialsMissing { .. }));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let dbg = format!("{:?}", VisionCredentials::ApiKey("secret".into()));
        assert!(!dbg.contains("secret"));
    }
}
