use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Responses API input item. Content is always flattened text by the time it
/// reaches this model; tool calls and results have already been rewritten as
/// bracketed markers by the request translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputItem {
    /// "system" | "user" | "assistant"
    pub role: String,
    pub content: String,
}

/// Tool definition variants accepted by the Responses API: function-shaped
/// declarations plus the native web-search tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsesToolDefinition {
    Function {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// JSON Schema object describing the function parameters, forwarded
        /// opaquely.
        parameters: serde_json::Value,
    },
    WebSearch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_results: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_context_size: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_location: Option<serde_json::Value>,
    },
}

/// Reasoning directive in Responses form: a coarse effort tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    pub effort: String,
}

/// Responses API request.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<InputItem>,

    // Sampling / decoding
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,

    // Streaming
    #[serde(default)]
    pub stream: Option<bool>,

    // Tools
    #[serde(default)]
    pub tools: Option<Vec<ResponsesToolDefinition>>,
    #[serde(default)]
    pub tool_choice: Option<serde_json::Value>,

    // Reasoning
    #[serde(default)]
    pub reasoning: Option<ReasoningConfig>,
}

// ============================================================================
// Responses API Response Models
// ============================================================================

/// Content block nested inside a message-type output item.
///
/// The same content kinds may also appear as standalone top-level output items
/// (see [`OutputItem`]); this dual placement is a quirk of the protocol, not a
/// modeling shortcut, and both unions carry the full set of variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputContent {
    #[serde(alias = "output_text")]
    Text {
        #[serde(default)]
        text: Option<String>,
    },
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        /// JSON-encoded arguments string.
        #[serde(default)]
        arguments: Option<String>,
    },
    WebSearchCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        max_results: Option<u64>,
        #[serde(default)]
        search_context_size: Option<String>,
        #[serde(default)]
        user_location: Option<serde_json::Value>,
    },
    WebSearchResult {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        result: Option<serde_json::Value>,
        #[serde(default)]
        content: Option<serde_json::Value>,
    },
    #[serde(alias = "output_reasoning")]
    Reasoning {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        reasoning: Option<String>,
        #[serde(default)]
        summary: Option<serde_json::Value>,
        #[serde(default)]
        signature: Option<String>,
    },
    RedactedReasoning {
        #[serde(default)]
        data: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
    /// Anything we do not model; tolerated without failing deserialization.
    #[serde(other)]
    Unknown,
}

/// Top-level element of a Responses API response `output` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputItem {
    Message {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Vec<OutputContent>,
    },
    FunctionCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
    },
    WebSearchCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        max_results: Option<u64>,
        #[serde(default)]
        search_context_size: Option<String>,
        #[serde(default)]
        user_location: Option<serde_json::Value>,
    },
    WebSearchResult {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
        #[serde(default)]
        result: Option<serde_json::Value>,
        #[serde(default)]
        content: Option<serde_json::Value>,
    },
    #[serde(alias = "output_reasoning")]
    Reasoning {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        reasoning: Option<String>,
        #[serde(default)]
        summary: Option<serde_json::Value>,
        #[serde(default)]
        signature: Option<String>,
    },
    RedactedReasoning {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        data: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

/// Usage statistics as reported by the backend. Field names vary between
/// providers, so both spellings of each token pair are modeled and the
/// translators take the first non-absent.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub reasoning_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

/// Complete Responses API response.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default, alias = "stop_reason")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub usage: Option<ResponsesUsage>,
}
