use axum::response::{IntoResponse, Response};
use http::StatusCode;

/// Failures surfaced at the HTTP boundary. Upstream semantic errors (non-2xx
/// bodies) are not represented here; those are passed through verbatim with
/// the upstream status code.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Unknown client-facing model name. Detected before any upstream call.
    #[error("model `{model}` is not served by this proxy")]
    DisallowedModel { model: String, allowed: Vec<String> },

    /// A content-block kind the translator refuses (currently only images).
    #[error("unsupported content block type `{0}`")]
    UnsupportedContent(&'static str),

    /// Neither the request nor the environment supplied a bearer credential.
    #[error("no bearer credential available for the upstream call")]
    MissingCredential,

    /// The upstream call exceeded its timeout budget.
    #[error("upstream request timed out")]
    UpstreamTimeout,

    /// Connection-level upstream failure (DNS, refused, reset).
    #[error("upstream transport failure: {0}")]
    Transport(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::DisallowedModel { .. } | Self::UnsupportedContent(_) => StatusCode::BAD_REQUEST,
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::DisallowedModel { .. } | Self::UnsupportedContent(_) => "invalid_request_error",
            Self::MissingCredential => "authentication_error",
            Self::UpstreamTimeout => "timeout_error",
            Self::Transport(_) => "api_error",
        }
    }

    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::UpstreamTimeout
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut error = serde_json::json!({
            "type": self.error_type(),
            "message": self.to_string(),
        });
        if let ProxyError::DisallowedModel { allowed, .. } = &self {
            error["allowed_models"] = serde_json::json!(allowed);
        }
        let body = serde_json::json!({ "type": "error", "error": error });
        (self.status(), axum::Json(body)).into_response()
    }
}
