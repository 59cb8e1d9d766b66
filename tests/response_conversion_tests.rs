/// Response body conversion tests
///
/// Validates conversion of complete Responses API bodies into Messages API
/// responses:
/// - content mapping for every kind, in both placements (nested in a message
///   item and standalone at the top level)
/// - finish-reason mapping and the token-limit truncation override
/// - usage token mapping including the web-search request counter
use msg2response::messages::ContentBlock;
use msg2response::responses::ResponsesResponse;
use msg2response::to_messages_response;
use serde_json::json;

fn parse(v: serde_json::Value) -> ResponsesResponse {
    serde_json::from_value(v).expect("valid responses body")
}

// ============================================================================
// SECTION 1: Basic text and usage
// ============================================================================

#[test]
fn simple_text_response_converts() {
    let src = parse(json!({
        "id": "resp_123",
        "model": "gpt-4o",
        "output": [{
            "type": "message",
            "id": "msg_1",
            "content": [{"type": "output_text", "text": "hello"}]
        }],
        "finish_reason": "stop",
        "usage": {"input_tokens": 5, "output_tokens": 7}
    }));

    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(out.id, "resp_123");
    assert_eq!(out.kind, "message");
    assert_eq!(out.model, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![ContentBlock::Text {
            text: "hello".into()
        }]
    );
    assert_eq!(out.stop_reason.as_deref(), Some("end_turn"));
    assert_eq!(out.stop_sequence, None);

    let usage = out.usage.expect("usage");
    assert_eq!(usage.input_tokens, Some(5));
    assert_eq!(usage.output_tokens, Some(7));
}

#[test]
fn chat_style_usage_names_are_accepted() {
    let src = parse(json!({
        "id": "resp_1",
        "output": [],
        "usage": {"prompt_tokens": 11, "completion_tokens": 3, "reasoning_tokens": 64}
    }));
    let usage = to_messages_response(&src, "claude-sonnet-4")
        .usage
        .expect("usage");
    assert_eq!(usage.input_tokens, Some(11));
    assert_eq!(usage.output_tokens, Some(3));
    assert_eq!(usage.reasoning_tokens, Some(64));
}

#[test]
fn missing_usage_degrades_to_absent() {
    let src = parse(json!({
        "id": "resp_1",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": "hi"}]
        }]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert!(out.usage.is_none());
}

#[test]
fn missing_id_gets_a_generated_one() {
    let src = parse(json!({"output": []}));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert!(out.id.starts_with("msg_"));
}

// ============================================================================
// SECTION 2: Reasoning passthrough
// ============================================================================

#[test]
fn reasoning_variants_map_to_thinking_blocks() {
    let src = parse(json!({
        "id": "resp_r",
        "output": [{
            "type": "message",
            "content": [
                {"type": "output_text", "text": "answer"},
                {"type": "reasoning", "text": "trace"},
                {"type": "output_reasoning", "reasoning": "summary", "signature": "sig_1"},
                {"type": "redacted_reasoning", "data": "REDACTED", "signature": "sig_2"}
            ]
        }]
    }));

    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![
            ContentBlock::Text {
                text: "answer".into()
            },
            ContentBlock::Thinking {
                thinking: "trace".into(),
                signature: None
            },
            ContentBlock::Thinking {
                thinking: "summary".into(),
                signature: Some("sig_1".into())
            },
            ContentBlock::RedactedThinking {
                data: "REDACTED".into(),
                signature: Some("sig_2".into())
            },
        ]
    );
}

#[test]
fn reasoning_summary_array_joins_text_parts() {
    let src = parse(json!({
        "id": "resp_r2",
        "output": [{
            "type": "reasoning",
            "summary": [
                {"type": "summary_text", "text": "step one"},
                {"type": "summary_text", "text": "step two"}
            ]
        }]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![ContentBlock::Thinking {
            thinking: "step one\nstep two".into(),
            signature: None
        }]
    );
}

#[test]
fn redacted_reasoning_without_data_is_skipped() {
    let src = parse(json!({
        "id": "resp_r3",
        "output": [{"type": "redacted_reasoning", "signature": "sig"}]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert!(out.content.is_empty());
}

// ============================================================================
// SECTION 3: Tool calls, both placements
// ============================================================================

#[test]
fn function_call_maps_to_tool_use_in_both_placements() {
    // Standalone top-level item.
    let src = parse(json!({
        "id": "resp_t1",
        "output": [{
            "type": "function_call",
            "call_id": "call_abc",
            "name": "get_weather",
            "arguments": "{\"location\":\"NYC\"}"
        }],
        "finish_reason": "tool_calls"
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(out.stop_reason.as_deref(), Some("tool_use"));
    assert_eq!(
        out.content,
        vec![ContentBlock::ToolUse {
            id: "call_abc".into(),
            name: "get_weather".into(),
            input: json!({"location": "NYC"})
        }]
    );

    // Nested inside the message item.
    let src = parse(json!({
        "id": "resp_t2",
        "output": [{
            "type": "message",
            "content": [{
                "type": "function_call",
                "call_id": "call_abc",
                "name": "get_weather",
                "arguments": "{\"location\":\"NYC\"}"
            }]
        }]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![ContentBlock::ToolUse {
            id: "call_abc".into(),
            name: "get_weather".into(),
            input: json!({"location": "NYC"})
        }]
    );
}

#[test]
fn message_content_precedes_top_level_items() {
    let src = parse(json!({
        "id": "resp_order",
        "output": [
            {"type": "function_call", "call_id": "call_1", "name": "first", "arguments": "{}"},
            {"type": "message", "content": [{"type": "output_text", "text": "body"}]},
            {"type": "function_call", "call_id": "call_2", "name": "second", "arguments": "{}"}
        ]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(out.content.len(), 3);
    assert!(matches!(&out.content[0], ContentBlock::Text { text } if text == "body"));
    assert!(matches!(&out.content[1], ContentBlock::ToolUse { name, .. } if name == "first"));
    assert!(matches!(&out.content[2], ContentBlock::ToolUse { name, .. } if name == "second"));
}

#[test]
fn function_call_missing_id_or_name_never_produces_tool_use() {
    let src = parse(json!({
        "id": "resp_t3",
        "output": [
            {"type": "function_call", "name": "orphan", "arguments": "{}"},
            {"type": "function_call", "call_id": "call_1", "arguments": "{}"},
            {"type": "message", "content": [
                {"type": "function_call", "name": "nested_orphan"}
            ]}
        ]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert!(out.content.is_empty());
}

#[test]
fn unparsable_arguments_degrade_to_empty_object() {
    let src = parse(json!({
        "id": "resp_t4",
        "output": [{
            "type": "function_call",
            "call_id": "call_1",
            "name": "broken",
            "arguments": "{not json"
        }]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![ContentBlock::ToolUse {
            id: "call_1".into(),
            name: "broken".into(),
            input: json!({})
        }]
    );
}

// ============================================================================
// SECTION 4: Web search
// ============================================================================

#[test]
fn web_search_call_builds_input_from_discrete_fields() {
    let src = parse(json!({
        "id": "resp_ws",
        "output": [{
            "type": "web_search_call",
            "call_id": "ws_1",
            "query": "rust proxies",
            "max_results": 5
        }]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![ContentBlock::ToolUse {
            id: "ws_1".into(),
            name: "web_search".into(),
            input: json!({"query": "rust proxies", "max_results": 5})
        }]
    );
    assert_eq!(
        out.usage
            .expect("usage")
            .server_tool_use
            .expect("server tool use")
            .web_search_requests,
        1
    );
}

#[test]
fn web_search_result_payload_is_stringified() {
    let src = parse(json!({
        "id": "resp_wsr",
        "output": [
            {"type": "web_search_result", "call_id": "ws_1", "result": "plain text"},
            {"type": "web_search_result", "call_id": "ws_2", "result": {"hits": 3}},
            {"type": "web_search_result", "call_id": "ws_3"}
        ]
    }));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(
        out.content,
        vec![
            ContentBlock::ToolResult {
                tool_use_id: "ws_1".into(),
                content: json!("plain text"),
                is_error: None
            },
            ContentBlock::ToolResult {
                tool_use_id: "ws_2".into(),
                content: json!("{\"hits\":3}"),
                is_error: None
            },
            ContentBlock::ToolResult {
                tool_use_id: "ws_3".into(),
                content: json!(""),
                is_error: None
            },
        ]
    );
}

#[test]
fn web_search_requests_count_distinct_call_ids() {
    let src = parse(json!({
        "id": "resp_count",
        "output": [
            {"type": "web_search_call", "call_id": "ws_1"},
            {"type": "web_search_result", "call_id": "ws_1", "result": "a"},
            {"type": "web_search_call", "call_id": "ws_2"}
        ],
        "usage": {"input_tokens": 1, "output_tokens": 1}
    }));
    let usage = to_messages_response(&src, "claude-sonnet-4")
        .usage
        .expect("usage");
    assert_eq!(
        usage.server_tool_use.expect("counter").web_search_requests,
        2
    );
}

#[test]
fn web_search_requests_fall_back_to_occurrence_count() {
    let src = parse(json!({
        "id": "resp_count2",
        "output": [
            {"type": "web_search_call"},
            {"type": "web_search_call"}
        ]
    }));
    let usage = to_messages_response(&src, "claude-sonnet-4")
        .usage
        .expect("usage");
    assert_eq!(
        usage.server_tool_use.expect("counter").web_search_requests,
        2
    );
}

// ============================================================================
// SECTION 5: Finish reasons
// ============================================================================

#[test]
fn finish_reason_table_is_fixed_and_total() {
    for (from, to) in [
        ("stop", "end_turn"),
        ("length", "max_tokens"),
        ("tool_calls", "tool_use"),
        ("content_filter", "content_filter"),
    ] {
        let src = parse(json!({
            "id": "resp_fr",
            "output": [],
            "finish_reason": from
        }));
        let out = to_messages_response(&src, "claude-sonnet-4");
        assert_eq!(out.stop_reason.as_deref(), Some(to), "for {from}");
    }

    let src = parse(json!({"id": "resp_fr_null", "output": []}));
    let out = to_messages_response(&src, "claude-sonnet-4");
    assert_eq!(out.stop_reason, None);
}

#[test]
fn token_limit_override_forces_max_tokens() {
    // claude-3-5-sonnet caps output at 8192; reported output meets it.
    let src = parse(json!({
        "id": "resp_trunc",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": "long"}]
        }],
        "finish_reason": "stop",
        "usage": {"input_tokens": 10, "output_tokens": 8192}
    }));
    let out = to_messages_response(&src, "claude-3-5-sonnet-20241022");
    assert_eq!(out.stop_reason.as_deref(), Some("max_tokens"));

    // Below the cap the backend's reason stands.
    let src = parse(json!({
        "id": "resp_ok",
        "output": [],
        "finish_reason": "stop",
        "usage": {"input_tokens": 10, "output_tokens": 100}
    }));
    let out = to_messages_response(&src, "claude-3-5-sonnet-20241022");
    assert_eq!(out.stop_reason.as_deref(), Some("end_turn"));
}

// ============================================================================
// SECTION 6: Round trip
// ============================================================================

#[test]
fn text_survives_request_then_response_translation() {
    use msg2response::messages::{Message, MessageContent, MessagesRequest, Role};
    use msg2response::to_responses_request;

    let req = MessagesRequest {
        model: "claude-sonnet-4".into(),
        messages: vec![Message {
            role: Role::User,
            content: MessageContent::Text("ping".into()),
        }],
        system: None,
        max_tokens: None,
        temperature: None,
        top_p: None,
        stop_sequences: None,
        stream: None,
        tools: None,
        tool_choice: None,
        thinking: None,
        metadata: None,
    };
    let back_req = to_responses_request(&req, "gpt-4o");
    assert_eq!(back_req.input[0].content, "ping");

    let back_resp = parse(json!({
        "id": "resp_rt",
        "output": [{
            "type": "message",
            "content": [{"type": "output_text", "text": "pong"}]
        }],
        "finish_reason": "stop"
    }));
    let front = to_messages_response(&back_resp, &req.model);
    assert_eq!(
        front.content,
        vec![ContentBlock::Text {
            text: "pong".into()
        }]
    );
    assert_eq!(front.model, "claude-sonnet-4");
}
