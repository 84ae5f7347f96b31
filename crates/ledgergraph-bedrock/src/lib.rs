//! Claude-on-Bedrock integration for LedgerGraph.
//!
//! Provides the [`CompletionModel`] trait the pipeline's LLM passes are
//! written against, the [`ChatBedrock`] implementation backed by the
//! Bedrock Converse API with ordered model fallback on throttling, and the
//! resilient JSON payload extractor for model responses.

mod client;
mod document;
pub mod jsonx;

pub use client::{
    ChatBedrock, Completion, CompletionModel, CompletionRequest, ContentBlock, ConversationTurn,
    ToolDefinition, TurnRole,
};
pub use document::{document_to_json, json_to_document};
