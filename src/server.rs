use std::sync::Arc;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use http::HeaderMap;

use crate::conversion::{to_responses_request, unsupported_content};
use crate::error::ProxyError;
use crate::models::messages::MessagesRequest;
use crate::models::responses::ResponsesResponse;
use crate::response::to_messages_response;
use crate::streaming::reconstruct_stream;
use crate::util::{
    bearer_from_headers, cors_layer_from_env, error_response, passthrough_response,
    post_json_with_retry, post_sse_with_retry, sse_response, AppState,
};

/// Build the Axum router with `/v1/messages` and `/status`.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/v1/messages", post(messages))
        .with_state(state)
        .layer(cors_layer_from_env())
}

/// Service status endpoint exposing the configured model mapping.
async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "msg2response",
        "version": env!("CARGO_PKG_VERSION"),
        "routes": ["/status", "/v1/messages"],
        "big_model": state.config.models.big,
        "small_model": state.config.models.small,
    }))
}

/// Serve one Messages API request: translate, forward, translate back.
/// Streaming requests get a reconstructed `text/event-stream`; everything
/// else gets a JSON roundtrip.
async fn messages(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<MessagesRequest>,
) -> Response {
    let backend_model = match state.config.models.resolve(&req.model) {
        Ok(m) => m,
        Err(e) => return e.into_response(),
    };

    if let Some(kind) = unsupported_content(&req) {
        return ProxyError::UnsupportedContent(kind).into_response();
    }

    // Inbound bearer wins; the configured upstream key is the fallback.
    let bearer = bearer_from_headers(&headers).or_else(|| state.config.api_key.clone());
    let Some(bearer) = bearer else {
        return ProxyError::MissingCredential.into_response();
    };

    let converted = to_responses_request(&req, &backend_model);
    let payload = match serde_json::to_value(&converted) {
        Ok(v) => v,
        Err(e) => {
            return error_response(
                http::StatusCode::INTERNAL_SERVER_ERROR,
                &format!("serialize error: {e}"),
            )
        }
    };
    let url = state.config.responses_url();
    let stream = converted.stream.unwrap_or(false);

    if stream {
        let upstream = match post_sse_with_retry(
            &state.http,
            &url,
            &payload,
            &bearer,
            state.config.stream_timeout,
            state.config.max_retries,
        )
        .await
        {
            Ok(resp) => resp,
            Err(e) => return e.into_response(),
        };

        if !upstream.status().is_success() {
            return passthrough_response(upstream).await;
        }
        sse_response(reconstruct_stream(
            upstream.bytes_stream().boxed(),
            req.model.clone(),
        ))
    } else {
        let upstream = match post_json_with_retry(
            &state.http,
            &url,
            &payload,
            &bearer,
            state.config.http_timeout,
            state.config.max_retries,
        )
        .await
        {
            Ok(resp) => resp,
            Err(e) => return e.into_response(),
        };

        if !upstream.status().is_success() {
            return passthrough_response(upstream).await;
        }
        match upstream.json::<ResponsesResponse>().await {
            Ok(parsed) => Json(to_messages_response(&parsed, &req.model)).into_response(),
            Err(e) => error_response(
                http::StatusCode::BAD_GATEWAY,
                &format!("invalid upstream response body: {e}"),
            ),
        }
    }
}
