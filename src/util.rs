use std::time::Duration;

use axum::response::{IntoResponse, Response};
use http::StatusCode;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::models::responses::{InputItem, ResponsesRequest};

/// Initialize dotenv and structured tracing based on RUST_LOG.
pub fn init_tracing() {
    let env_source = match dotenvy::dotenv() {
        Ok(path) => path.display().to_string(),
        Err(_) => "none".to_string(),
    };

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Shared application state used by the HTTP server and handlers.
pub struct AppState {
    pub http: reqwest::Client,
    pub config: ProxyConfig,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            http: build_http_client(),
            config,
        }
    }
}

/// Build the outbound HTTP client. Per-request timeouts are applied at the
/// call sites (streaming and non-streaming calls have distinct budgets), so
/// only the connect timeout lives here.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(format!("msg2response/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Build a JSON error response with the given HTTP status and message.
pub fn error_response(status: StatusCode, msg: &str) -> Response {
    let body = serde_json::json!({
        "type": "error",
        "error": { "type": "api_error", "message": msg }
    });
    (status, axum::Json(body)).into_response()
}

/// Extract the bearer token from an Authorization header value.
pub fn bearer_from_headers(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// POST a JSON payload upstream with a bounded retry on HTTP 429.
///
/// The retry delay comes from the `retry-after` header when present, else a
/// structured `retryDelay`/`retry_after` field in the error body, else one
/// second. After `max_retries` additional attempts the last 429 is returned
/// as-is for passthrough.
pub async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
    bearer: &str,
    timeout: Duration,
    max_retries: u32,
) -> Result<reqwest::Response, ProxyError> {
    post_with_retry(client, url, payload, bearer, timeout, max_retries, false).await
}

/// Streaming variant: identical retry behavior, but asks for an SSE body.
pub async fn post_sse_with_retry(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
    bearer: &str,
    timeout: Duration,
    max_retries: u32,
) -> Result<reqwest::Response, ProxyError> {
    post_with_retry(client, url, payload, bearer, timeout, max_retries, true).await
}

async fn post_with_retry(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
    bearer: &str,
    timeout: Duration,
    max_retries: u32,
    sse: bool,
) -> Result<reqwest::Response, ProxyError> {
    let mut attempt = 0u32;
    loop {
        let mut rb = client
            .post(url)
            .header(http::header::CONTENT_TYPE, "application/json")
            .bearer_auth(bearer)
            .json(payload);
        if sse {
            // The streaming budget covers time-to-headers only; the body may
            // flow for much longer than any sane request timeout.
            rb = rb.header(http::header::ACCEPT, "text/event-stream");
        } else {
            rb = rb.timeout(timeout);
        }

        let resp = if sse {
            match tokio::time::timeout(timeout, rb.send()).await {
                Ok(res) => res.map_err(ProxyError::from_reqwest)?,
                Err(_) => return Err(ProxyError::UpstreamTimeout),
            }
        } else {
            rb.send().await.map_err(ProxyError::from_reqwest)?
        };

        if resp.status() != StatusCode::TOO_MANY_REQUESTS || attempt >= max_retries {
            return Ok(resp);
        }

        let delay = rate_limit_delay(resp).await;
        attempt += 1;
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "upstream rate limited; retrying"
        );
        tokio::time::sleep(delay).await;
    }
}

/// Derive the retry delay from a 429 response. Consumes the response body,
/// which is fine because the request is about to be retried.
async fn rate_limit_delay(resp: reqwest::Response) -> Duration {
    if let Some(secs) = resp
        .headers()
        .get(http::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        return Duration::from_secs(secs);
    }

    if let Ok(body) = resp.json::<serde_json::Value>().await {
        for candidate in [
            body.get("error").and_then(|e| e.get("retry_after")),
            body.get("retryDelay"),
            body.pointer("/error/details/0/retryDelay"),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(secs) = candidate.as_u64() {
                return Duration::from_secs(secs);
            }
            // Providers also encode delays as strings like "3s".
            if let Some(secs) = candidate
                .as_str()
                .and_then(|s| s.trim_end_matches('s').parse::<u64>().ok())
            {
                return Duration::from_secs(secs);
            }
        }
    }

    Duration::from_secs(1)
}

/// Pass an upstream failure through unchanged: same status, same body.
pub async fn passthrough_response(resp: reqwest::Response) -> Response {
    let status = StatusCode::from_u16(resp.status().as_u16())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    let bytes = resp.bytes().await.unwrap_or_default();
    (status, bytes).into_response()
}

/// Wrap an SSE byte stream in an event-stream HTTP response.
pub fn sse_response<S>(stream: S) -> Response
where
    S: futures_util::Stream<Item = Result<bytes::Bytes, std::convert::Infallible>>
        + Send
        + 'static,
{
    http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, "text/event-stream")
        .header(http::header::CACHE_CONTROL, "no-cache")
        .header(http::header::CONNECTION, "keep-alive")
        .body(axum::body::Body::from_stream(stream))
        .unwrap()
}

/// Build a CORS layer from environment variables.
///
/// CORS_ALLOWED_ORIGINS: "*" or comma-separated origins. Defaults permissive.
pub fn cors_layer_from_env() -> tower_http::cors::CorsLayer {
    let mut layer = tower_http::cors::CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(origins) if origins.trim() != "*" => {
            let vals: Vec<http::HeaderValue> = origins
                .split(',')
                .filter_map(|p| http::HeaderValue::from_str(p.trim()).ok())
                .collect();
            if vals.is_empty() {
                layer = layer.allow_origin(tower_http::cors::Any);
            } else {
                layer = layer.allow_origin(tower_http::cors::AllowOrigin::list(vals));
            }
        }
        _ => layer = layer.allow_origin(tower_http::cors::Any),
    }

    layer
}

// ============================================================================
// Startup self-checks
// ============================================================================

/// Probe each configured backend model with a minimal request, and probe
/// tool-choice support once. Failures are logged, never fatal: a backend that
/// is briefly down should not prevent the proxy from starting.
pub async fn startup_probe(state: &AppState) {
    let Some(bearer) = state.config.api_key.clone() else {
        tracing::info!("no upstream API key configured; skipping startup probes");
        return;
    };
    let url = state.config.responses_url();

    for model in state.config.models.backend_models() {
        let probe = probe_request(&model, None);
        match send_probe(state, &url, &probe, &bearer).await {
            Ok(status) if status.is_success() => {
                tracing::info!(%model, "backend model available");
            }
            Ok(status) => {
                tracing::warn!(%model, %status, "backend model probe rejected");
            }
            Err(e) => {
                tracing::warn!(%model, error = %e, "backend model probe failed");
            }
        }
    }

    // Tool-choice support check on the big model only.
    let model = state.config.models.big.clone();
    let probe = probe_request(&model, Some(serde_json::json!("auto")));
    match send_probe(state, &url, &probe, &bearer).await {
        Ok(status) if status.is_success() => {
            tracing::info!(%model, "backend supports tool_choice");
        }
        Ok(status) => {
            tracing::warn!(%model, %status, "backend may not support tool_choice");
        }
        Err(e) => {
            tracing::warn!(%model, error = %e, "tool_choice probe failed");
        }
    }
}

fn probe_request(model: &str, tool_choice: Option<serde_json::Value>) -> serde_json::Value {
    let tools = tool_choice.as_ref().map(|_| {
        vec![crate::models::responses::ResponsesToolDefinition::Function {
            name: "ping".into(),
            description: Some("Connectivity probe".into()),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }]
    });
    let req = ResponsesRequest {
        model: model.to_string(),
        input: vec![InputItem {
            role: "user".into(),
            content: "ping".into(),
        }],
        max_output_tokens: Some(16),
        temperature: None,
        top_p: None,
        stream: Some(false),
        tools,
        tool_choice,
        reasoning: None,
    };
    // All-owned data serializes infallibly.
    serde_json::to_value(&req).unwrap_or_default()
}

async fn send_probe(
    state: &AppState,
    url: &str,
    payload: &serde_json::Value,
    bearer: &str,
) -> Result<StatusCode, ProxyError> {
    let resp = post_json_with_retry(
        &state.http,
        url,
        payload,
        bearer,
        Duration::from_secs(20),
        0,
    )
    .await?;
    Ok(StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_extraction_requires_the_scheme_prefix() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer sk-test-123"),
        );
        assert_eq!(bearer_from_headers(&headers).as_deref(), Some("sk-test-123"));

        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Basic abc"),
        );
        assert_eq!(bearer_from_headers(&headers), None);
    }

    #[test]
    fn probe_request_is_minimal() {
        let v = probe_request("gpt-4o", None);
        assert_eq!(v["model"], "gpt-4o");
        assert_eq!(v["max_output_tokens"], 16);
        assert!(v.get("tools").is_none());

        let v = probe_request("gpt-4o", Some(serde_json::json!("auto")));
        assert_eq!(v["tool_choice"], "auto");
        assert_eq!(v["tools"][0]["name"], "ping");
    }
}
