//! Error types for {json:api} operations.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::http::HttpError;

/// One entry of an `{"errors": [...]}` envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorItem {
    pub status: String,
    pub code: String,
    pub title: String,
    pub detail: String,
    /// `source.pointer`, or `source.parameter` when no pointer is given.
    pub source_pointer: Option<String>,
}

/// Structured error returned for any response with status >= 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status_code: u16,
    pub items: Vec<ApiErrorItem>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.items.is_empty() {
            return write!(f, "API error (status {})", self.status_code);
        }
        let details: Vec<String> = self
            .items
            .iter()
            .map(|item| format!("{}: {}", item.code, item.detail))
            .collect();
        write!(f, "API error ({}): {}", self.status_code, details.join(", "))
    }
}

impl std::error::Error for ApiError {}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    errors: Vec<RawErrorItem>,
}

#[derive(Deserialize)]
struct RawErrorItem {
    #[serde(default)]
    status: Option<serde_json::Value>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    source: Option<RawErrorSource>,
}

#[derive(Deserialize)]
struct RawErrorSource {
    pointer: Option<String>,
    parameter: Option<String>,
}

impl ApiError {
    /// Build an `ApiError` from a response status and body.
    ///
    /// Bodies that are not an error envelope yield a single item whose detail
    /// is the raw body text, so nothing the server said is dropped.
    pub fn from_response(status_code: u16, body: &[u8]) -> Self {
        let items = match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => envelope
                .errors
                .into_iter()
                .map(|raw| ApiErrorItem {
                    status: match raw.status {
                        Some(serde_json::Value::String(s)) => s,
                        Some(other) => other.to_string(),
                        None => status_code.to_string(),
                    },
                    code: raw.code.unwrap_or_default(),
                    title: raw.title.unwrap_or_default(),
                    detail: raw.detail.unwrap_or_default(),
                    source_pointer: raw.source.and_then(|s| s.pointer.or(s.parameter)),
                })
                .collect(),
            Err(_) if body.is_empty() => Vec::new(),
            Err(_) => vec![ApiErrorItem {
                status: status_code.to_string(),
                detail: String::from_utf8_lossy(body).trim().to_string(),
                ..ApiErrorItem::default()
            }],
        };
        Self { status_code, items }
    }
}

/// Errors that can occur when talking to a {json:api} backend.
#[derive(Debug, Error)]
pub enum JsonApiError {
    /// Transport-level failure.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A response or attribute map could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with an error envelope.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// HTTP 429. Handled by the client's retry loop and never returned to callers.
    #[error("Throttled, retry after {retry_after}s")]
    Throttled { retry_after: u64 },

    /// A 3xx response. Not followed automatically; async jobs signal
    /// completion with a 303.
    #[error("Redirected to {location}")]
    Redirect { location: String },

    /// `get` on an object the server does not know.
    #[error("{resource_type} '{id}' not found")]
    NotFound { resource_type: String, id: String },

    #[error("Relationship '{0}' is not present on the resource")]
    UnknownRelationship(String),

    #[error("Plural relationship '{0}' has no related link")]
    MissingRelatedLink(String),

    #[error("Unexpected payload: {0}")]
    UnexpectedPayload(String),

    #[error("Attributes must serialize to a JSON object")]
    AttributesNotObject,
}

impl JsonApiError {
    #[inline]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedPayload(message.into())
    }

    /// True for `NotFound` and for API errors with status 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Api(api) => api.status_code == 404,
            _ => false,
        }
    }

    /// Delay requested by a throttle response.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => Some(Duration::from_secs(*retry_after)),
            _ => None,
        }
    }
}

/// Get a short error message suitable for display.
pub fn short_error_message(err: &JsonApiError) -> String {
    match err {
        JsonApiError::Http(_) => "Network error".to_string(),
        JsonApiError::Json(_) => "JSON parse error".to_string(),
        JsonApiError::Api(api) => match api.items.first() {
            Some(item) if !item.code.is_empty() => {
                format!("HTTP {}: {}", api.status_code, item.code)
            }
            _ => format!("HTTP {}", api.status_code),
        },
        JsonApiError::Throttled { .. } => "Throttled".to_string(),
        JsonApiError::Redirect { .. } => "Unexpected redirect".to_string(),
        JsonApiError::NotFound { resource_type, id } => {
            format!("{resource_type} not found: {id}")
        }
        other => other.to_string(),
    }
}
