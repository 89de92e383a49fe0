//! LLM client trait exposing the two wire shapes the completion normalizer speaks

use crate::completion::{ChatCompletionPayload, ResponsesPayload};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A provider reachable through a Responses-style and a Chat-Completions-style endpoint.
///
/// Replies are returned as raw JSON; [`crate::completion::complete`] owns the
/// parsing so that every client gets the same shape handling.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Call the Responses-style endpoint
    async fn create_response(&self, payload: &ResponsesPayload) -> Result<Value>;

    /// Call the Chat-Completions-style endpoint
    async fn create_chat_completion(&self, payload: &ChatCompletionPayload) -> Result<Value>;

    /// Short client name, attached to completion spans
    fn client_type(&self) -> &str;
}
