#![forbid(unsafe_code)]
#![doc = r#"
Msg2Response

Translate Anthropic Messages API requests into Responses API payloads, proxy
them to a configured backend, and translate the reply (complete JSON or live
SSE feed) back into Messages form.

Crate highlights
- Library: pure conversion via `to_responses_request(&MessagesRequest, &str)`
  and `to_messages_response(&ResponsesResponse, &str)`.
- Streaming: `streaming::StreamTranslator` rebuilds the Messages SSE event
  grammar from the backend's `data:` frame feed.
- HTTP server (in `server`): `POST /v1/messages` (always available; forwards
  to `OPENAI_BASE_URL`).

Modules
- `models`: Data structures for the Messages and Responses dialects.
- `conversion`: Request mapping, Messages -> Responses.
- `response`: Complete-response mapping, Responses -> Messages.
- `streaming`: The streaming reconstruction engine.
- `config`: Model mapping and token-limit tables, env/CLI configuration.
- `error`: Boundary error taxonomy.
- `server`: Axum router/handlers (optional binary uses this).
- `util`: Shared helpers (tracing, HTTP client, upstream retry, SSE plumbing).

Note: keep the mapping rules aligned with both providers' docs; the Responses
API evolves over time.
"#]

pub mod config;
pub mod conversion;
pub mod error;
pub mod models;
pub mod response;
pub mod server;
pub mod streaming;
pub mod util;

// Re-export the primary conversion functions for ergonomic library use.
pub use crate::conversion::to_responses_request;
pub use crate::response::to_messages_response;
pub use crate::streaming::StreamTranslator;

// Re-export model namespaces for convenience (downstream users can do
// `use msg2response::messages`).
pub use crate::models::{messages, responses};
