use crate::models::messages as msg;
use crate::models::messages::{
    flatten_tool_result, flatten_tool_use, ContentBlock, MessageContent,
};
use crate::models::responses as resp;
use serde_json::{json, Value};

/// Convert a Messages API request into a Responses API request.
///
/// Deterministic and total: every accepted request converts, with lossy parts
/// (reasoning traces, stop sequences) dropped and logged rather than rejected.
///
/// Mapping highlights:
/// - system prompt (string or text blocks) -> at most one "system" input item.
/// - user/assistant messages -> one flattened input item each; tool calls and
///   tool results become bracketed text markers, empty messages are dropped.
/// - max_tokens -> max_output_tokens, floored at 16 (backend minimum).
/// - tools: the reserved web-search tool becomes the backend's native
///   web-search shape; everything else becomes a function declaration.
/// - thinking directive -> reasoning effort (explicit effort wins, otherwise
///   the token budget is bucketed into low/medium/high).
pub fn to_responses_request(src: &msg::MessagesRequest, backend_model: &str) -> resp::ResponsesRequest {
    let mut input: Vec<resp::InputItem> = Vec::new();

    if let Some(system) = &src.system {
        let text = system.joined_text();
        if !text.trim().is_empty() {
            input.push(resp::InputItem {
                role: "system".into(),
                content: text,
            });
        }
    }

    for m in &src.messages {
        let item = match m.role {
            msg::Role::User => user_item(&m.content),
            msg::Role::Assistant => assistant_item(&m.content),
        };
        if let Some(item) = item {
            input.push(item);
        }
    }

    if src
        .stop_sequences
        .as_ref()
        .is_some_and(|s| !s.is_empty())
    {
        tracing::debug!("dropping stop_sequences: no equivalent on the Responses side");
    }

    resp::ResponsesRequest {
        model: backend_model.to_string(),
        input,
        max_output_tokens: src.max_tokens.map(|n| n.max(16)),
        temperature: src.temperature,
        top_p: src.top_p,
        stream: src.stream,
        tools: src.tools.as_deref().and_then(map_tools),
        tool_choice: src.tool_choice.clone(),
        reasoning: reasoning_config(src.thinking.as_ref()),
    }
}

/// Scan a request for content kinds this proxy refuses to translate.
/// Returns the offending block type name, checked before any upstream call.
pub fn unsupported_content(src: &msg::MessagesRequest) -> Option<&'static str> {
    for m in &src.messages {
        if let MessageContent::Blocks(blocks) = &m.content {
            for b in blocks {
                if matches!(b, ContentBlock::Image { .. }) {
                    return Some("image");
                }
            }
        }
    }
    None
}

/// Bucket a thinking token budget into a reasoning effort tier.
pub fn effort_for_budget(budget: u64) -> &'static str {
    if budget >= 10_000 {
        "high"
    } else if budget >= 5_000 {
        "medium"
    } else {
        "low"
    }
}

fn reasoning_config(thinking: Option<&msg::ThinkingDirective>) -> Option<resp::ReasoningConfig> {
    let t = thinking?;
    if t.kind.as_deref() == Some("disabled") {
        return None;
    }
    if let Some(effort) = t.effort.as_deref() {
        if !effort.is_empty() {
            return Some(resp::ReasoningConfig {
                effort: effort.to_string(),
            });
        }
    }
    let budget = t.budget_tokens?;
    Some(resp::ReasoningConfig {
        effort: effort_for_budget(budget).to_string(),
    })
}

/// Build the input item for a user message: extracted plain text, followed by
/// a newline-joined block of flattened tool-result markers when any tool
/// results are present. Empty messages produce no item.
fn user_item(content: &MessageContent) -> Option<resp::InputItem> {
    let text = match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Blocks(blocks) => {
            let plain: Vec<&str> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            let results: Vec<String> = blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => Some(flatten_tool_result(tool_use_id, content)),
                    _ => None,
                })
                .collect();

            let mut text = plain.join("\n");
            if !results.is_empty() {
                let joined = results.join("\n");
                if text.is_empty() {
                    text = joined;
                } else {
                    text.push('\n');
                    text.push_str(&joined);
                }
            }
            text
        }
    };

    if text.is_empty() {
        return None;
    }
    Some(resp::InputItem {
        role: "user".into(),
        content: text,
    })
}

/// Build the input item for an assistant message. Structured content is
/// rebuilt line by line: text as-is, tool calls as flattened markers,
/// reasoning traces skipped (the backend has no slot for caller-supplied
/// reasoning).
fn assistant_item(content: &MessageContent) -> Option<resp::InputItem> {
    let text = match content {
        MessageContent::Text(s) => s.clone(),
        MessageContent::Blocks(blocks) => {
            let mut lines: Vec<String> = Vec::new();
            for b in blocks {
                match b {
                    ContentBlock::Text { text } => lines.push(text.clone()),
                    ContentBlock::ToolUse { id, name, input } => {
                        lines.push(flatten_tool_use(id, name, input));
                    }
                    ContentBlock::Thinking { .. } | ContentBlock::RedactedThinking { .. } => {
                        tracing::debug!("skipping assistant reasoning block on the request path");
                    }
                    _ => {
                        tracing::debug!("skipping unexpected assistant content block");
                    }
                }
            }
            lines.join("\n")
        }
    };

    if text.is_empty() {
        return None;
    }
    Some(resp::InputItem {
        role: "assistant".into(),
        content: text,
    })
}

fn map_tools(tools: &[msg::ToolDefinition]) -> Option<Vec<resp::ResponsesToolDefinition>> {
    let mapped: Vec<resp::ResponsesToolDefinition> = tools
        .iter()
        .filter_map(|t| {
            let Some(name) = t.name.as_deref().filter(|n| !n.is_empty()) else {
                tracing::warn!("dropping tool declaration without a name");
                return None;
            };
            if is_web_search_tool(name, t.kind.as_deref()) {
                Some(web_search_tool(t))
            } else {
                Some(resp::ResponsesToolDefinition::Function {
                    name: name.to_string(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone().unwrap_or_else(|| json!({})),
                })
            }
        })
        .collect();

    if mapped.is_empty() {
        None
    } else {
        Some(mapped)
    }
}

fn is_web_search_tool(name: &str, kind: Option<&str>) -> bool {
    name == "web_search" || kind.is_some_and(|k| k.contains("web_search"))
}

/// Re-express the reserved web-search tool in the backend's native shape.
/// Each parameter is sourced with priority: explicit tool field, then the
/// tool's metadata object, then the JSON-schema property default/const.
fn web_search_tool(t: &msg::ToolDefinition) -> resp::ResponsesToolDefinition {
    let max_results = web_search_param(t, "max_results", t.max_results.map(|n| json!(n)))
        .and_then(|v| v.as_u64())
        .map(|n| n as u32);
    let search_context_size = web_search_param(
        t,
        "search_context_size",
        t.search_context_size.as_deref().map(|s| json!(s)),
    )
    .and_then(|v| v.as_str().map(|s| s.to_string()));
    let user_location = web_search_param(t, "user_location", t.user_location.clone());

    resp::ResponsesToolDefinition::WebSearch {
        max_results,
        search_context_size,
        user_location,
    }
}

fn web_search_param(
    t: &msg::ToolDefinition,
    key: &str,
    explicit: Option<Value>,
) -> Option<Value> {
    if let Some(v) = explicit.filter(|v| !v.is_null()) {
        return Some(v);
    }
    if let Some(v) = t
        .metadata
        .as_ref()
        .and_then(|m| m.get(key))
        .filter(|v| !v.is_null())
    {
        return Some(v.clone());
    }
    let prop = t
        .input_schema
        .as_ref()
        .and_then(|s| s.get("properties"))
        .and_then(|p| p.get(key))?;
    prop.get("default")
        .or_else(|| prop.get("const"))
        .filter(|v| !v.is_null())
        .cloned()
}
