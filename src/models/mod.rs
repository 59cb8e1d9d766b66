//! Data models for the Messages and Responses APIs.
//!
//! This module groups two submodules:
//! - `messages`: Types for the Messages API dialect served to clients,
//!   including the content-block model and the SSE streaming event grammar.
//! - `responses`: Types for the Responses API dialect spoken to the backend.
//!
//! The mapping logic that converts between the two lives in
//! `crate::conversion` (requests), `crate::response` (complete responses) and
//! `crate::streaming` (live event feeds).

pub mod messages;
pub mod responses;

// Optional convenience re-exports for downstream users.
pub use messages::{
    ContentBlock, Message, MessageContent, MessagesRequest, MessagesResponse, MessagesUsage, Role,
    StreamEvent, SystemPrompt, ThinkingDirective, ToolDefinition,
};
pub use responses::{
    InputItem, OutputContent, OutputItem, ResponsesRequest, ResponsesResponse,
    ResponsesToolDefinition, ResponsesUsage,
};
