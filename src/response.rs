use std::collections::HashSet;

use crate::config::model_limits;
use crate::models::messages as msg;
use crate::models::responses::{OutputContent, OutputItem, ResponsesResponse, ResponsesUsage};
use serde_json::{json, Value};
use uuid::Uuid;

/// Convert a complete Responses API response into a Messages API response.
///
/// `model` is the client-facing model name to report; it also selects the
/// token-limit entry used for the truncation override.
///
/// Content may appear nested inside the (at most one) message-type output item
/// or as standalone top-level items; both placements are merged into one
/// ordered sequence, message content first, then top-level items.
pub fn to_messages_response(src: &ResponsesResponse, model: &str) -> msg::MessagesResponse {
    let mut content: Vec<msg::ContentBlock> = Vec::new();

    if let Some(OutputItem::Message { content: parts, .. }) = src
        .output
        .iter()
        .find(|i| matches!(i, OutputItem::Message { .. }))
    {
        for part in parts {
            if let Some(block) = content_part_to_block(part) {
                content.push(block);
            }
        }
    }
    for item in &src.output {
        if let Some(block) = output_item_to_block(item) {
            content.push(block);
        }
    }

    let mut stats = SearchStats::default();
    for item in &src.output {
        scan_item(item, &mut stats);
    }

    if src.usage.is_none() {
        tracing::debug!("backend response carried no usage block");
    }
    let usage = map_usage(src.usage.as_ref(), stats.web_search_requests());

    let mut stop_reason = map_stop_reason(src.finish_reason.as_deref());
    if output_hit_token_limit(model, usage.as_ref()) {
        stop_reason = Some("max_tokens".into());
    }

    msg::MessagesResponse {
        id: src
            .id
            .clone()
            .unwrap_or_else(|| format!("msg_{}", Uuid::new_v4().simple())),
        kind: "message".into(),
        role: msg::Role::Assistant,
        content,
        model: model.to_string(),
        stop_reason,
        // The Responses side has no stop-sequence signal.
        stop_sequence: None,
        usage,
    }
}

/// Fixed finish-reason table. Unknown values pass through unchanged and
/// absent maps to absent.
pub fn map_stop_reason(reason: Option<&str>) -> Option<String> {
    reason.map(|r| {
        match r {
            "stop" => "end_turn",
            "length" => "max_tokens",
            "tool_calls" => "tool_use",
            other => other,
        }
        .to_string()
    })
}

/// Some backends do not reliably signal truncation; when the reported output
/// token count meets the configured maximum for the reported model, the stop
/// reason is forced to `max_tokens`.
fn output_hit_token_limit(model: &str, usage: Option<&msg::MessagesUsage>) -> bool {
    let Some(limits) = model_limits(model) else {
        return false;
    };
    usage
        .and_then(|u| u.output_tokens)
        .is_some_and(|n| n >= limits.max_output_tokens)
}

/// Map a backend usage block (if any) to client-facing usage, attaching the
/// web-search request counter when search activity was observed. Token counts
/// are passed through, never fabricated.
pub(crate) fn map_usage(
    usage: Option<&ResponsesUsage>,
    web_search_requests: Option<u64>,
) -> Option<msg::MessagesUsage> {
    if usage.is_none() && web_search_requests.is_none() {
        return None;
    }
    Some(msg::MessagesUsage {
        input_tokens: usage.and_then(|u| u.input_tokens.or(u.prompt_tokens)),
        output_tokens: usage.and_then(|u| u.output_tokens.or(u.completion_tokens)),
        reasoning_tokens: usage.and_then(|u| u.reasoning_tokens),
        cache_creation_input_tokens: None,
        cache_read_input_tokens: None,
        server_tool_use: web_search_requests.map(|n| msg::ServerToolUsage {
            web_search_requests: n,
        }),
    })
}

/// Map one content part nested in a message output item.
pub fn content_part_to_block(part: &OutputContent) -> Option<msg::ContentBlock> {
    match part {
        OutputContent::Text { text } => Some(msg::ContentBlock::Text {
            text: text.clone().unwrap_or_default(),
        }),
        OutputContent::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } => function_call_block(id.as_deref(), call_id.as_deref(), name.as_deref(), arguments.as_deref()),
        OutputContent::WebSearchCall {
            id,
            call_id,
            arguments,
            query,
            max_results,
            search_context_size,
            user_location,
        } => Some(web_search_call_block(
            id.as_deref(),
            call_id.as_deref(),
            arguments.as_deref(),
            query.as_deref(),
            *max_results,
            search_context_size.as_deref(),
            user_location.as_ref(),
        )),
        OutputContent::WebSearchResult {
            id,
            call_id,
            result,
            content,
        } => Some(web_search_result_block(
            id.as_deref(),
            call_id.as_deref(),
            result.as_ref().or(content.as_ref()),
        )),
        OutputContent::Reasoning {
            text,
            reasoning,
            summary,
            signature,
        } => reasoning_block(
            text.as_deref(),
            reasoning.as_deref(),
            summary.as_ref(),
            signature.clone(),
        ),
        OutputContent::RedactedReasoning { data, signature } => {
            data.as_ref().map(|d| msg::ContentBlock::RedactedThinking {
                data: d.clone(),
                signature: signature.clone(),
            })
        }
        OutputContent::Unknown => None,
    }
}

/// Map one standalone top-level output item. Message items are handled by the
/// nested pass and yield nothing here.
pub fn output_item_to_block(item: &OutputItem) -> Option<msg::ContentBlock> {
    match item {
        OutputItem::Message { .. } => None,
        OutputItem::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } => function_call_block(id.as_deref(), call_id.as_deref(), name.as_deref(), arguments.as_deref()),
        OutputItem::WebSearchCall {
            id,
            call_id,
            arguments,
            query,
            max_results,
            search_context_size,
            user_location,
        } => Some(web_search_call_block(
            id.as_deref(),
            call_id.as_deref(),
            arguments.as_deref(),
            query.as_deref(),
            *max_results,
            search_context_size.as_deref(),
            user_location.as_ref(),
        )),
        OutputItem::WebSearchResult {
            id,
            call_id,
            result,
            content,
        } => Some(web_search_result_block(
            id.as_deref(),
            call_id.as_deref(),
            result.as_ref().or(content.as_ref()),
        )),
        OutputItem::Reasoning {
            text,
            reasoning,
            summary,
            signature,
            ..
        } => reasoning_block(
            text.as_deref(),
            reasoning.as_deref(),
            summary.as_ref(),
            signature.clone(),
        ),
        OutputItem::RedactedReasoning { data, signature, .. } => {
            data.as_ref().map(|d| msg::ContentBlock::RedactedThinking {
                data: d.clone(),
                signature: signature.clone(),
            })
        }
        OutputItem::Unknown => None,
    }
}

fn function_call_block(
    id: Option<&str>,
    call_id: Option<&str>,
    name: Option<&str>,
    arguments: Option<&str>,
) -> Option<msg::ContentBlock> {
    let id = call_id.or(id).filter(|s| !s.is_empty())?;
    let name = name.filter(|s| !s.is_empty())?;
    Some(msg::ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input: parse_arguments(arguments),
    })
}

/// Parse a JSON-encoded arguments string, degrading to an empty object on
/// absence or parse failure.
pub fn parse_arguments(arguments: Option<&str>) -> Value {
    arguments
        .and_then(|a| serde_json::from_str(a).ok())
        .unwrap_or_else(|| json!({}))
}

#[allow(clippy::too_many_arguments)]
fn web_search_call_block(
    id: Option<&str>,
    call_id: Option<&str>,
    arguments: Option<&str>,
    query: Option<&str>,
    max_results: Option<u64>,
    search_context_size: Option<&str>,
    user_location: Option<&Value>,
) -> msg::ContentBlock {
    let input = match arguments {
        Some(args) => parse_arguments(Some(args)),
        None => {
            let mut obj = serde_json::Map::new();
            if let Some(q) = query {
                obj.insert("query".into(), json!(q));
            }
            if let Some(n) = max_results {
                obj.insert("max_results".into(), json!(n));
            }
            if let Some(s) = search_context_size {
                obj.insert("search_context_size".into(), json!(s));
            }
            if let Some(loc) = user_location {
                obj.insert("user_location".into(), loc.clone());
            }
            Value::Object(obj)
        }
    };
    msg::ContentBlock::ToolUse {
        id: call_id.or(id).unwrap_or_default().to_string(),
        name: "web_search".into(),
        input,
    }
}

fn web_search_result_block(
    id: Option<&str>,
    call_id: Option<&str>,
    payload: Option<&Value>,
) -> msg::ContentBlock {
    msg::ContentBlock::ToolResult {
        tool_use_id: call_id.or(id).unwrap_or_default().to_string(),
        content: Value::String(stringify_payload(payload)),
        is_error: None,
    }
}

/// Stringify a result payload: strings pass through, absent/null becomes the
/// empty string, everything else is JSON-encoded.
pub fn stringify_payload(payload: Option<&Value>) -> String {
    match payload {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn reasoning_block(
    text: Option<&str>,
    reasoning: Option<&str>,
    summary: Option<&Value>,
    signature: Option<String>,
) -> Option<msg::ContentBlock> {
    let thinking = [
        text.map(|s| s.to_string()),
        reasoning.map(|s| s.to_string()),
        summary.and_then(summary_text),
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.is_empty())?;
    Some(msg::ContentBlock::Thinking {
        thinking,
        signature,
    })
}

/// Extract text from a reasoning summary, which may be a string or an array
/// of strings / `{text}` objects.
fn summary_text(summary: &Value) -> Option<String> {
    match summary {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let pieces: Vec<String> = parts
                .iter()
                .filter_map(|p| match p {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => obj
                        .get("text")
                        .and_then(|t| t.as_str())
                        .map(|t| t.to_string()),
                    _ => None,
                })
                .collect();
            if pieces.is_empty() {
                None
            } else {
                Some(pieces.join("\n"))
            }
        }
        _ => None,
    }
}

// ============================================================================
// Web-search accounting
// ============================================================================

/// Running tally of web-search activity across output items.
///
/// The request count prefers distinct call ids; the raw occurrence count is a
/// fallback for backends that omit ids and is a known approximation.
#[derive(Debug, Default)]
pub(crate) struct SearchStats {
    ids: HashSet<String>,
    occurrences: u64,
}

impl SearchStats {
    pub(crate) fn record(&mut self, id: Option<&str>) {
        self.occurrences += 1;
        if let Some(id) = id.filter(|s| !s.is_empty()) {
            self.ids.insert(id.to_string());
        }
    }

    pub(crate) fn web_search_requests(&self) -> Option<u64> {
        if self.occurrences == 0 && self.ids.is_empty() {
            return None;
        }
        if self.ids.is_empty() {
            Some(self.occurrences)
        } else {
            Some(self.ids.len() as u64)
        }
    }
}

pub(crate) fn scan_item(item: &OutputItem, stats: &mut SearchStats) {
    match item {
        OutputItem::Message { content, .. } => {
            for part in content {
                scan_part(part, stats);
            }
        }
        OutputItem::WebSearchCall { id, call_id, .. }
        | OutputItem::WebSearchResult { id, call_id, .. } => {
            stats.record(call_id.as_deref().or(id.as_deref()));
        }
        _ => {}
    }
}

pub(crate) fn scan_part(part: &OutputContent, stats: &mut SearchStats) {
    match part {
        OutputContent::WebSearchCall { id, call_id, .. }
        | OutputContent::WebSearchResult { id, call_id, .. } => {
            stats.record(call_id.as_deref().or(id.as_deref()));
        }
        _ => {}
    }
}
