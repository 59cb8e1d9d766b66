use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Messages API role enumeration.
///
/// Uses lowercase serialization to match the Messages wire format:
/// "user" | "assistant"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One typed fragment of message content.
///
/// Notes:
/// - `tool_result.content` may be a string or an array of content parts; we
///   accept `serde_json::Value` to allow both shapes.
/// - `image` is accepted by the deserializer so malformed requests fail with a
///   proper 400 instead of a serde error, but it is rejected before translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        source: serde_json::Value,
    },
    /// An invocation the assistant wants performed.
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The result of a prior invocation, supplied by the caller.
    ToolResult {
        tool_use_id: String,
        content: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// A reasoning trace. The signature is an opaque provenance token: passed
    /// through unmodified if present, never generated here.
    Thinking {
        thinking: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// An encrypted reasoning trace; `data` must round-trip byte-for-byte.
    RedactedThinking {
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
}

/// Message content: either a bare string or an ordered block sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single conversation turn. Role alternation is the caller's
/// responsibility, not enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

/// System prompt: a plain string or a sequence of text blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<SystemBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemBlock {
    Text { text: String },
}

impl SystemPrompt {
    /// Concatenate the prompt into one string (blocks joined by newlines).
    pub fn joined_text(&self) -> String {
        match self {
            SystemPrompt::Text(s) => s.clone(),
            SystemPrompt::Blocks(blocks) => blocks
                .iter()
                .map(|SystemBlock::Text { text }| text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Reasoning directive: either a token budget or an explicit effort level.
/// Both shapes arrive under the `thinking` request field, so every field is
/// optional and resolution happens in the request translator.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingDirective {
    /// "enabled" | "disabled"
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub budget_tokens: Option<u64>,
    #[serde(default)]
    pub effort: Option<String>,
}

/// Tool declaration. `name` is optional only because nameless entries must be
/// dropped (and reported) rather than rejected; the web-search parameters and
/// `metadata` feed the sourcing chain when the declaration is re-expressed as
/// the backend's native web-search tool.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub max_results: Option<u32>,
    #[serde(default)]
    pub search_context_size: Option<String>,
    #[serde(default)]
    pub user_location: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Messages API request (the subset this proxy serves).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    pub messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,

    // Sampling / decoding
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,

    // Streaming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    // Tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,

    // Reasoning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingDirective>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

// ============================================================================
// Messages API Response Models
// ============================================================================

/// Server-side tool usage counters. Currently only web search is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerToolUsage {
    pub web_search_requests: u64,
}

/// Usage statistics reported to the client.
///
/// Token fields are counts, not estimates, when supplied by the backend; the
/// translators never fabricate counts, only pass through or leave absent.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagesUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default)]
    pub server_tool_use: Option<ServerToolUsage>,
}

/// Complete Messages API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub id: String,
    /// Always "message".
    #[serde(rename = "type")]
    pub kind: String,
    /// Always "assistant".
    pub role: Role,
    pub content: Vec<ContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<MessagesUsage>,
}

// ============================================================================
// Messages API Streaming Models
// ============================================================================

/// Incremental update to an open content block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    ThinkingDelta { thinking: String },
    SignatureDelta { signature: String },
    /// Incremental opaque payload for a redacted reasoning block.
    DataDelta { data: String },
}

/// Payload of a `message_delta` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDelta {
    pub stop_reason: Option<String>,
    pub stop_sequence: Option<String>,
}

/// Messages API server-sent event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        message: MessagesResponse,
    },
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    ContentBlockDelta {
        index: usize,
        delta: BlockDelta,
    },
    ContentBlockStop {
        index: usize,
    },
    MessageDelta {
        delta: MessageDelta,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<MessagesUsage>,
    },
    MessageStop,
    Ping,
}

impl StreamEvent {
    /// SSE event name for this event type.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageStart { .. } => "message_start",
            Self::ContentBlockStart { .. } => "content_block_start",
            Self::ContentBlockDelta { .. } => "content_block_delta",
            Self::ContentBlockStop { .. } => "content_block_stop",
            Self::MessageDelta { .. } => "message_delta",
            Self::MessageStop => "message_stop",
            Self::Ping => "ping",
        }
    }

    /// Encode as one SSE frame: `event: <name>\ndata: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".into());
        format!("event: {}\ndata: {}\n\n", self.event_name(), data)
    }
}

// ============================================================================
// Flattening
// ============================================================================

/// Flatten a tool invocation into the bracketed marker used when the target
/// protocol has no structural slot for tool calls.
pub fn flatten_tool_use(id: &str, name: &str, input: &serde_json::Value) -> String {
    let args = serde_json::to_string(input).unwrap_or_else(|_| "{}".into());
    format!("[tool_use {id}: {name}] {args}")
}

/// Flatten a tool result into its bracketed marker: the call id followed by
/// the raw result text.
pub fn flatten_tool_result(tool_use_id: &str, content: &serde_json::Value) -> String {
    format!("[tool_result {tool_use_id}] {}", tool_result_text(content))
}

/// Extract the raw text of a tool result payload: strings pass through,
/// block arrays contribute their `text` fields, anything else is JSON-encoded.
pub fn tool_result_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(parts) => {
            let mut pieces: Vec<String> = Vec::new();
            for p in parts {
                match p {
                    serde_json::Value::String(s) => pieces.push(s.clone()),
                    serde_json::Value::Object(obj) => {
                        if let Some(t) = obj.get("text").and_then(|t| t.as_str()) {
                            pieces.push(t.to_string());
                        }
                    }
                    _ => {}
                }
            }
            pieces.join("\n")
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
