//! Streaming reconstruction engine.
//!
//! Consumes the backend's SSE feed (newline-delimited `data: <json>` frames,
//! terminated by `data: [DONE]` or stream closure) and rebuilds an equivalent
//! Messages API event stream: `message_start`, paired
//! `content_block_start`/`content_block_stop` events with strictly increasing
//! indices, one delta per discovered block, and a final
//! `message_delta`/`message_stop` sequence carrying the accumulated stop
//! reason and usage.
//!
//! The per-frame state machine ([`StreamTranslator`]) is synchronous and owns
//! all cross-frame state, so it can be unit-tested by feeding synthetic frames
//! and asserting the emitted event sequence. The async driver
//! ([`reconstruct_stream`]) owns line buffering over the inbound byte stream
//! and finalization on every end condition.

use std::collections::HashSet;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::messages::{
    BlockDelta, ContentBlock, MessageDelta, MessagesResponse, Role, StreamEvent,
};
use crate::models::responses::{OutputContent, OutputItem, ResponsesUsage};
use crate::response::{map_stop_reason, map_usage, parse_arguments, stringify_payload};

/// Renderable content discovered on a frame, normalized from either placement
/// (nested in a message item or standalone).
#[derive(Debug)]
enum Renderable {
    Text(String),
    Thinking {
        text: String,
        signature: Option<String>,
    },
    Redacted {
        data: String,
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        arguments: String,
    },
    WebSearch {
        id: String,
        input: String,
    },
    SearchResult {
        id: String,
        content: String,
    },
}

/// Kind of the currently open content block, used to route continuation
/// deltas to the right slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Text,
    Thinking,
    Redacted,
    ToolUse,
    ToolResult,
}

/// The state carried across frames. One instance per client connection;
/// nothing is shared.
#[derive(Debug)]
pub struct StreamTranslator {
    model: String,
    started: bool,
    finished: bool,
    message_id: Option<String>,
    next_index: usize,
    /// Index and kind of the currently open content block, if any. At most
    /// one block is open at a time.
    open_block: Option<(usize, OpenKind)>,
    usage: Option<ResponsesUsage>,
    stop_reason: Option<String>,
    search_ids: HashSet<String>,
    search_occurrences: u64,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            started: false,
            finished: false,
            message_id: None,
            next_index: 0,
            open_block: None,
            usage: None,
            stop_reason: None,
            search_ids: HashSet::new(),
            search_occurrences: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process the payload of one `data:` frame and return the events to emit.
    pub fn process_data(&mut self, payload: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let payload = payload.trim();
        if payload.is_empty() {
            return Vec::new();
        }
        if payload == "[DONE]" {
            return self.finish();
        }

        let v: Value = match serde_json::from_str(payload) {
            Ok(v) => v,
            Err(e) => {
                // The one place parse failures are swallowed: a bad frame must
                // not break an in-flight response.
                tracing::warn!(error = %e, "skipping malformed stream frame");
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        let frame_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");

        if self.message_id.is_none() {
            self.message_id = find_message_id(&v);
        }

        // Reasoning continuation: an incremental update to the currently open
        // block. Reuses the open index, opens nothing, and ends frame handling.
        if (frame_type.contains("reasoning") || frame_type.contains("redacted"))
            && v.get("delta").is_some()
        {
            if let (Some((index, _)), Some(delta)) = (self.open_block, v.get("delta")) {
                for d in reasoning_deltas(delta) {
                    out.push(StreamEvent::ContentBlockDelta { index, delta: d });
                }
            }
            return out;
        }

        // Carry the latest stop reason and usage snapshot.
        if let Some(reason) = v
            .get("stop_reason")
            .or_else(|| v.get("finish_reason"))
            .or_else(|| v.get("response").and_then(|r| r.get("stop_reason")))
            .or_else(|| v.get("response").and_then(|r| r.get("finish_reason")))
            .and_then(|r| r.as_str())
        {
            self.stop_reason = map_stop_reason(Some(reason));
        }
        if let Some(usage) = v
            .get("usage")
            .or_else(|| v.get("response").and_then(|r| r.get("usage")))
        {
            if let Ok(parsed) = serde_json::from_value::<ResponsesUsage>(usage.clone()) {
                self.usage = Some(parsed);
            }
        }

        self.scan_web_search(&v);

        // A pure block-boundary marker: closes the open block, opens none.
        if frame_type == "response.output_text.done" {
            if let Some((index, _)) = self.open_block.take() {
                out.push(StreamEvent::ContentBlockStop { index });
            }
            return out;
        }

        // Successive bare text deltas extend the open text block; the
        // `response.output_text.done` marker above is what closes it.
        if frame_type.contains("output_text") && frame_type.ends_with(".delta") {
            if let (Some((index, OpenKind::Text)), Some(text)) =
                (self.open_block, v.get("delta").and_then(|d| d.as_str()))
            {
                out.push(StreamEvent::ContentBlockDelta {
                    index,
                    delta: BlockDelta::TextDelta {
                        text: text.to_string(),
                    },
                });
                return out;
            }
        }

        for r in collect_renderables(&v, frame_type) {
            self.ensure_started(&mut out);
            if let Some((index, _)) = self.open_block.take() {
                out.push(StreamEvent::ContentBlockStop { index });
            }
            let index = self.next_index;
            self.next_index += 1;
            let kind = open_kind(&r);
            let (block, delta) = open_events(r);
            out.push(StreamEvent::ContentBlockStart {
                index,
                content_block: block,
            });
            out.push(StreamEvent::ContentBlockDelta { index, delta });
            self.open_block = Some((index, kind));
        }

        out
    }

    /// Terminal sequence: close any open block, emit the final
    /// `message_delta` with the accumulated stop reason and usage, then
    /// `message_stop`. Applied exactly once no matter which end condition
    /// triggered it.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut out = Vec::new();
        self.ensure_started(&mut out);
        if let Some((index, _)) = self.open_block.take() {
            out.push(StreamEvent::ContentBlockStop { index });
        }
        out.push(StreamEvent::MessageDelta {
            delta: MessageDelta {
                stop_reason: self.stop_reason.clone(),
                stop_sequence: None,
            },
            usage: map_usage(self.usage.as_ref(), self.web_search_requests()),
        });
        out.push(StreamEvent::MessageStop);
        out
    }

    fn ensure_started(&mut self, out: &mut Vec<StreamEvent>) {
        if self.started {
            return;
        }
        self.started = true;
        let id = self
            .message_id
            .get_or_insert_with(|| format!("msg_{}", Uuid::new_v4().simple()))
            .clone();
        out.push(StreamEvent::MessageStart {
            message: MessagesResponse {
                id,
                kind: "message".into(),
                role: Role::Assistant,
                content: Vec::new(),
                model: self.model.clone(),
                stop_reason: None,
                stop_sequence: None,
                usage: map_usage(self.usage.as_ref(), self.web_search_requests()),
            },
        });
    }

    fn web_search_requests(&self) -> Option<u64> {
        if self.search_occurrences == 0 && self.search_ids.is_empty() {
            return None;
        }
        if self.search_ids.is_empty() {
            Some(self.search_occurrences)
        } else {
            Some(self.search_ids.len() as u64)
        }
    }

    /// Update the running web-search tally from every output item on the
    /// frame, independent of whether the frame also carries renderable
    /// content. A final `response.output` recap contributes ids only, so the
    /// occurrence fallback is not inflated by items already counted live.
    fn scan_web_search(&mut self, v: &Value) {
        let mut record = |item: &Value, id_only: bool| {
            let Some(t) = item.get("type").and_then(|t| t.as_str()) else {
                return;
            };
            if t != "web_search_call" && t != "web_search_result" {
                return;
            }
            let id = item
                .get("call_id")
                .or_else(|| item.get("id"))
                .and_then(|i| i.as_str())
                .filter(|s| !s.is_empty());
            if let Some(id) = id {
                self.search_ids.insert(id.to_string());
            } else if !id_only {
                self.search_occurrences += 1;
            }
        };

        if let Some(item) = v.get("item") {
            record(item, false);
        }
        if let Some(items) = v.get("output").and_then(|o| o.as_array()) {
            for item in items {
                record(item, false);
            }
        }
        if let Some(items) = v
            .get("response")
            .and_then(|r| r.get("output"))
            .and_then(|o| o.as_array())
        {
            for item in items {
                record(item, true);
            }
        }
    }
}

/// Extract the message id from whichever spot the frame supplies one.
fn find_message_id(v: &Value) -> Option<String> {
    for candidate in [
        v.get("response").and_then(|r| r.get("id")),
        v.get("message").and_then(|m| m.get("id")),
        v.get("id"),
    ]
    .into_iter()
    .flatten()
    {
        if let Some(id) = candidate.as_str().filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
    }
    None
}

/// Split a reasoning delta payload into Front-Protocol delta sub-events.
fn reasoning_deltas(delta: &Value) -> Vec<BlockDelta> {
    let mut out = Vec::new();
    match delta {
        Value::String(s) => out.push(BlockDelta::ThinkingDelta {
            thinking: s.clone(),
        }),
        Value::Object(obj) => {
            if let Some(t) = obj
                .get("thinking")
                .or_else(|| obj.get("text"))
                .and_then(|t| t.as_str())
            {
                out.push(BlockDelta::ThinkingDelta {
                    thinking: t.to_string(),
                });
            }
            if let Some(d) = obj.get("data").and_then(|d| d.as_str()) {
                out.push(BlockDelta::DataDelta {
                    data: d.to_string(),
                });
            }
            if let Some(s) = obj.get("signature").and_then(|s| s.as_str()) {
                out.push(BlockDelta::SignatureDelta {
                    signature: s.to_string(),
                });
            }
        }
        _ => {}
    }
    out
}

/// Gather renderable content from a frame, wherever it appears: a bare text
/// delta, a standalone item, or items nested in an `output` array.
fn collect_renderables(v: &Value, frame_type: &str) -> Vec<Renderable> {
    let mut out = Vec::new();

    if frame_type.contains("output_text") && frame_type.ends_with(".delta") {
        if let Some(text) = v.get("delta").and_then(|d| d.as_str()) {
            out.push(Renderable::Text(text.to_string()));
            return out;
        }
    }

    if let Some(item) = v.get("item") {
        push_item_renderables(item, &mut out);
    }
    if let Some(items) = v.get("output").and_then(|o| o.as_array()) {
        for item in items {
            push_item_renderables(item, &mut out);
        }
    }
    out
}

fn push_item_renderables(item: &Value, out: &mut Vec<Renderable>) {
    let Ok(parsed) = serde_json::from_value::<OutputItem>(item.clone()) else {
        return;
    };
    match parsed {
        OutputItem::Message { content, .. } => {
            for part in content {
                if let Some(r) = part_renderable(part) {
                    out.push(r);
                }
            }
        }
        OutputItem::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } => {
            // A call missing either id or name has no renderable payload.
            let id = call_id.or(id).filter(|s| !s.is_empty());
            let name = name.filter(|s| !s.is_empty());
            if let (Some(id), Some(name)) = (id, name) {
                out.push(Renderable::ToolUse {
                    id,
                    name,
                    arguments: arguments.unwrap_or_else(|| "{}".into()),
                });
            }
        }
        OutputItem::WebSearchCall {
            id,
            call_id,
            arguments,
            query,
            max_results,
            search_context_size,
            user_location,
        } => {
            let input = web_search_input(
                arguments.as_deref(),
                query.as_deref(),
                max_results,
                search_context_size.as_deref(),
                user_location.as_ref(),
            );
            out.push(Renderable::WebSearch {
                id: call_id.or(id).unwrap_or_default(),
                input,
            });
        }
        OutputItem::WebSearchResult {
            id,
            call_id,
            result,
            content,
        } => {
            out.push(Renderable::SearchResult {
                id: call_id.or(id).unwrap_or_default(),
                content: stringify_payload(result.as_ref().or(content.as_ref())),
            });
        }
        OutputItem::Reasoning {
            text,
            reasoning,
            summary,
            signature,
            ..
        } => {
            out.push(Renderable::Thinking {
                text: reasoning_text(text.as_deref(), reasoning.as_deref(), summary.as_ref()),
                signature,
            });
        }
        OutputItem::RedactedReasoning {
            data, signature, ..
        } => {
            out.push(Renderable::Redacted {
                data: data.unwrap_or_default(),
                signature,
            });
        }
        OutputItem::Unknown => {}
    }
}

fn part_renderable(part: OutputContent) -> Option<Renderable> {
    match part {
        OutputContent::Text { text } => Some(Renderable::Text(text.unwrap_or_default())),
        OutputContent::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } => {
            let id = call_id.or(id).filter(|s| !s.is_empty())?;
            let name = name.filter(|s| !s.is_empty())?;
            Some(Renderable::ToolUse {
                id,
                name,
                arguments: arguments.unwrap_or_else(|| "{}".into()),
            })
        }
        OutputContent::WebSearchCall {
            id,
            call_id,
            arguments,
            query,
            max_results,
            search_context_size,
            user_location,
        } => Some(Renderable::WebSearch {
            id: call_id.or(id).unwrap_or_default(),
            input: web_search_input(
                arguments.as_deref(),
                query.as_deref(),
                max_results,
                search_context_size.as_deref(),
                user_location.as_ref(),
            ),
        }),
        OutputContent::WebSearchResult {
            id,
            call_id,
            result,
            content,
        } => Some(Renderable::SearchResult {
            id: call_id.or(id).unwrap_or_default(),
            content: stringify_payload(result.as_ref().or(content.as_ref())),
        }),
        OutputContent::Reasoning {
            text,
            reasoning,
            summary,
            signature,
        } => Some(Renderable::Thinking {
            text: reasoning_text(text.as_deref(), reasoning.as_deref(), summary.as_ref()),
            signature,
        }),
        OutputContent::RedactedReasoning { data, signature } => Some(Renderable::Redacted {
            data: data.unwrap_or_default(),
            signature,
        }),
        OutputContent::Unknown => None,
    }
}

fn reasoning_text(text: Option<&str>, reasoning: Option<&str>, summary: Option<&Value>) -> String {
    [
        text.map(|s| s.to_string()),
        reasoning.map(|s| s.to_string()),
        summary.and_then(|s| match s {
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
                (!pieces.is_empty()).then(|| pieces.join("\n"))
            }
            _ => None,
        }),
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.is_empty())
    .unwrap_or_default()
}

fn web_search_input(
    arguments: Option<&str>,
    query: Option<&str>,
    max_results: Option<u64>,
    search_context_size: Option<&str>,
    user_location: Option<&Value>,
) -> String {
    let input = match arguments {
        Some(args) => parse_arguments(Some(args)),
        None => {
            let mut obj = serde_json::Map::new();
            if let Some(q) = query {
                obj.insert("query".into(), Value::String(q.to_string()));
            }
            if let Some(n) = max_results {
                obj.insert("max_results".into(), n.into());
            }
            if let Some(s) = search_context_size {
                obj.insert("search_context_size".into(), Value::String(s.to_string()));
            }
            if let Some(loc) = user_location {
                obj.insert("user_location".into(), loc.clone());
            }
            Value::Object(obj)
        }
    };
    serde_json::to_string(&input).unwrap_or_else(|_| "{}".into())
}

fn open_kind(r: &Renderable) -> OpenKind {
    match r {
        Renderable::Text(_) => OpenKind::Text,
        Renderable::Thinking { .. } => OpenKind::Thinking,
        Renderable::Redacted { .. } => OpenKind::Redacted,
        Renderable::ToolUse { .. } | Renderable::WebSearch { .. } => OpenKind::ToolUse,
        Renderable::SearchResult { .. } => OpenKind::ToolResult,
    }
}

/// Opening events for a renderable: the block to start and the single delta
/// carrying the available payload. Tool-call arguments and web-search inputs
/// go out as one JSON-encoded delta; the upstream grammar does not guarantee
/// incremental argument chunks.
fn open_events(r: Renderable) -> (ContentBlock, BlockDelta) {
    match r {
        Renderable::Text(text) => (
            ContentBlock::Text {
                text: String::new(),
            },
            BlockDelta::TextDelta { text },
        ),
        Renderable::Thinking { text, signature } => (
            ContentBlock::Thinking {
                thinking: String::new(),
                signature,
            },
            BlockDelta::ThinkingDelta { thinking: text },
        ),
        Renderable::Redacted { data, signature } => (
            ContentBlock::RedactedThinking {
                data: String::new(),
                signature,
            },
            BlockDelta::DataDelta { data },
        ),
        Renderable::ToolUse {
            id,
            name,
            arguments,
        } => (
            ContentBlock::ToolUse {
                id,
                name,
                input: serde_json::json!({}),
            },
            BlockDelta::InputJsonDelta {
                partial_json: arguments,
            },
        ),
        Renderable::WebSearch { id, input } => (
            ContentBlock::ToolUse {
                id,
                name: "web_search".into(),
                input: serde_json::json!({}),
            },
            BlockDelta::InputJsonDelta {
                partial_json: input,
            },
        ),
        Renderable::SearchResult { id, content } => (
            ContentBlock::ToolResult {
                tool_use_id: id,
                content: Value::String(String::new()),
                is_error: None,
            },
            BlockDelta::TextDelta { text: content },
        ),
    }
}

// ============================================================================
// Async driver
// ============================================================================

/// Drive a [`StreamTranslator`] over a live upstream byte stream, producing
/// SSE-encoded Messages events.
///
/// One engine instance per connection; the pump task owns the only reader and
/// the only writer. If the upstream ends or errors, the engine finalizes
/// (terminal events are always emitted); if the downstream consumer is gone,
/// the pump stops without draining the upstream further.
pub fn reconstruct_stream<S, E>(
    upstream: S,
    model: String,
) -> impl Stream<Item = Result<Bytes, std::convert::Infallible>>
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(16);
    tokio::spawn(pump(upstream, StreamTranslator::new(model), tx));
    futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|bytes| (Ok(bytes), rx))
    })
}

async fn pump<S, E>(mut upstream: S, mut translator: StreamTranslator, tx: mpsc::Sender<Bytes>)
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin,
    E: std::fmt::Display,
{
    let mut buf: Vec<u8> = Vec::new();

    'read: while let Some(next) = upstream.next().await {
        match next {
            Ok(chunk) => {
                buf.extend_from_slice(&chunk);
                while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    let events = handle_line(&mut translator, &line);
                    if !send_events(&tx, events).await {
                        return;
                    }
                    if translator.is_finished() {
                        break 'read;
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "upstream stream failed; finalizing");
                break;
            }
        }
    }

    if !translator.is_finished() {
        // A trailing partial line without a newline still counts.
        if !buf.is_empty() {
            let line = std::mem::take(&mut buf);
            let events = handle_line(&mut translator, &line);
            if !send_events(&tx, events).await {
                return;
            }
        }
        let events = translator.finish();
        send_events(&tx, events).await;
    }
}

fn handle_line(translator: &mut StreamTranslator, line: &[u8]) -> Vec<StreamEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);
    let Some(payload) = line.strip_prefix("data:") else {
        // Comment lines, `event:` lines and blank separators carry nothing.
        return Vec::new();
    };
    translator.process_data(payload.trim_start())
}

async fn send_events(tx: &mpsc::Sender<Bytes>, events: Vec<StreamEvent>) -> bool {
    for ev in events {
        if tx.send(Bytes::from(ev.to_sse())).await.is_err() {
            // Consumer disconnected; abandon further writes.
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feed(translator: &mut StreamTranslator, frames: &[Value]) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        for f in frames {
            out.extend(translator.process_data(&f.to_string()));
        }
        out
    }

    fn names(events: &[StreamEvent]) -> Vec<&'static str> {
        events.iter().map(|e| e.event_name()).collect()
    }

    #[test]
    fn text_then_tool_call_emits_paired_blocks_in_order() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let mut events = feed(
            &mut t,
            &[
                json!({"type": "response.created", "response": {"id": "resp_1"}}),
                json!({"type": "response.output_text.delta", "delta": "hello"}),
                json!({"type": "response.output_item.added", "item": {
                    "type": "function_call", "call_id": "call_1", "name": "lookup",
                    "arguments": "{\"q\":\"x\"}"
                }}),
            ],
        );
        events.extend(t.process_data("[DONE]"));

        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );

        // Indices strictly increase and every start is paired with a stop.
        match (&events[1], &events[3], &events[4], &events[6]) {
            (
                StreamEvent::ContentBlockStart { index: s0, .. },
                StreamEvent::ContentBlockStop { index: e0 },
                StreamEvent::ContentBlockStart { index: s1, .. },
                StreamEvent::ContentBlockStop { index: e1 },
            ) => {
                assert_eq!((s0, e0), (&0, &0));
                assert_eq!((s1, e1), (&1, &1));
            }
            _ => panic!("unexpected event shapes"),
        }
    }

    #[test]
    fn message_id_is_taken_from_first_frame_that_supplies_one() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let events = feed(
            &mut t,
            &[
                json!({"type": "response.created", "response": {"id": "resp_abc"}}),
                json!({"type": "response.output_text.delta", "delta": "hi"}),
            ],
        );
        match &events[0] {
            StreamEvent::MessageStart { message } => assert_eq!(message.id, "resp_abc"),
            other => panic!("expected message_start, got {other:?}"),
        }
    }

    #[test]
    fn reasoning_delta_reuses_open_block() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let events = feed(
            &mut t,
            &[
                json!({"type": "response.output_item.added", "item": {
                    "type": "reasoning", "summary": []
                }}),
                json!({"type": "response.reasoning_summary_text.delta", "delta": {"text": "step one"}}),
                json!({"type": "response.reasoning.delta", "delta": {"signature": "sig_9"}}),
            ],
        );

        // One block opened, then two continuation deltas on the same index.
        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_delta",
            ]
        );
        match &events[3] {
            StreamEvent::ContentBlockDelta { index, delta } => {
                assert_eq!(*index, 0);
                assert_eq!(
                    delta,
                    &BlockDelta::ThinkingDelta {
                        thinking: "step one".into()
                    }
                );
            }
            other => panic!("expected delta, got {other:?}"),
        }
        match &events[4] {
            StreamEvent::ContentBlockDelta { delta, .. } => assert_eq!(
                delta,
                &BlockDelta::SignatureDelta {
                    signature: "sig_9".into()
                }
            ),
            other => panic!("expected delta, got {other:?}"),
        }
    }

    #[test]
    fn redacted_delta_forwards_data_payload() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let events = feed(
            &mut t,
            &[
                json!({"type": "response.output_item.added", "item": {
                    "type": "redacted_reasoning", "data": ""
                }}),
                json!({"type": "response.redacted_reasoning.delta", "delta": {"data": "AAEC"}}),
            ],
        );
        match events.last() {
            Some(StreamEvent::ContentBlockDelta { delta, .. }) => {
                assert_eq!(delta, &BlockDelta::DataDelta { data: "AAEC".into() });
            }
            other => panic!("expected data delta, got {other:?}"),
        }
    }

    #[test]
    fn successive_text_deltas_extend_one_block() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let mut events = feed(
            &mut t,
            &[
                json!({"type": "response.output_text.delta", "delta": "hel"}),
                json!({"type": "response.output_text.delta", "delta": "lo"}),
                json!({"type": "response.output_text.done", "text": "hello"}),
            ],
        );
        events.extend(t.process_data("[DONE]"));

        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_delta",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
    }

    #[test]
    fn output_text_done_is_a_pure_boundary() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let events = feed(
            &mut t,
            &[
                json!({"type": "response.output_text.delta", "delta": "hi"}),
                json!({"type": "response.output_text.done", "text": "hi"}),
            ],
        );
        assert_eq!(
            names(&events),
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
            ]
        );
    }

    #[test]
    fn malformed_frames_are_skipped_without_breaking_the_stream() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        assert!(t.process_data("{not json").is_empty());
        let mut events = t.process_data(&json!({"type": "response.output_text.delta", "delta": "ok"}).to_string());
        events.extend(t.process_data("[DONE]"));
        let n = names(&events);
        assert_eq!(n.first(), Some(&"message_start"));
        assert_eq!(n.last(), Some(&"message_stop"));
    }

    #[test]
    fn termination_is_applied_exactly_once() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let first = t.process_data("[DONE]");
        assert_eq!(
            names(&first),
            vec!["message_start", "message_delta", "message_stop"]
        );
        assert!(t.finish().is_empty());
        assert!(t.process_data("[DONE]").is_empty());
    }

    #[test]
    fn stop_reason_and_usage_reach_the_final_delta() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let mut events = feed(
            &mut t,
            &[
                json!({"type": "response.output_text.delta", "delta": "hi"}),
                json!({"type": "response.completed",
                       "finish_reason": "tool_calls",
                       "usage": {"input_tokens": 11, "output_tokens": 4}}),
            ],
        );
        events.extend(t.process_data("[DONE]"));

        let delta = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::MessageDelta { delta, usage } => Some((delta.clone(), usage.clone())),
                _ => None,
            })
            .expect("message_delta");
        assert_eq!(delta.0.stop_reason.as_deref(), Some("tool_use"));
        let usage = delta.1.expect("usage");
        assert_eq!(usage.input_tokens, Some(11));
        assert_eq!(usage.output_tokens, Some(4));
    }

    #[test]
    fn web_search_ids_are_counted_distinctly() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let mut events = feed(
            &mut t,
            &[
                json!({"type": "response.output_item.added", "item": {
                    "type": "web_search_call", "call_id": "ws_1", "query": "rust"
                }}),
                json!({"type": "response.output_item.added", "item": {
                    "type": "web_search_result", "call_id": "ws_1", "result": "ten crates"
                }}),
                json!({"type": "response.completed", "response": {
                    "output": [
                        {"type": "web_search_call", "call_id": "ws_1"},
                        {"type": "web_search_call", "call_id": "ws_2"}
                    ]
                }}),
            ],
        );
        events.extend(t.process_data("[DONE]"));

        let usage = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::MessageDelta { usage, .. } => usage.clone(),
                _ => None,
            })
            .expect("usage");
        assert_eq!(
            usage.server_tool_use.map(|s| s.web_search_requests),
            Some(2)
        );
    }

    #[test]
    fn stream_end_without_done_still_finalizes() {
        let mut t = StreamTranslator::new("claude-sonnet-4");
        let mut events = t.process_data(
            &json!({"type": "response.output_text.delta", "delta": "partial"}).to_string(),
        );
        events.extend(t.finish());
        let n = names(&events);
        assert!(n.contains(&"content_block_stop"));
        assert_eq!(n.last(), Some(&"message_stop"));
    }
}
