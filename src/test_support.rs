//! Scripted collaborators shared by unit tests

use crate::completion::{ChatCompletionPayload, ResponsesPayload};
use crate::error::{Error, Result};
use crate::llm_client::LlmClient;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// LLM client replaying queued replies.
///
/// When a queue runs dry the client answers with `"<default> #n"` if a default
/// is set (n counts default replies), otherwise with a provider error.
#[derive(Default)]
pub(crate) struct ScriptedClient {
    responses: Mutex<VecDeque<Result<Value>>>,
    chat: Mutex<VecDeque<Result<Value>>>,
    responses_requests: Mutex<Vec<ResponsesPayload>>,
    chat_requests: Mutex<Vec<ChatCompletionPayload>>,
    default_text: Option<String>,
    default_count: AtomicUsize,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Client whose Responses endpoint always answers with a numbered default text
    pub(crate) fn answering(text: impl Into<String>) -> Self {
        Self {
            default_text: Some(text.into()),
            ..Self::default()
        }
    }

    pub(crate) fn push_response(&self, reply: Value) {
        self.responses.lock().unwrap().push_back(Ok(reply));
    }

    pub(crate) fn push_response_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::provider(message)));
    }

    pub(crate) fn push_chat(&self, reply: Value) {
        self.chat.lock().unwrap().push_back(Ok(reply));
    }

    pub(crate) fn push_chat_error(&self, message: &str) {
        self.chat
            .lock()
            .unwrap()
            .push_back(Err(Error::provider(message)));
    }

    pub(crate) fn responses_requests(&self) -> Vec<ResponsesPayload> {
        self.responses_requests.lock().unwrap().clone()
    }

    pub(crate) fn chat_requests(&self) -> Vec<ChatCompletionPayload> {
        self.chat_requests.lock().unwrap().clone()
    }

    fn default_reply(&self) -> Result<Value> {
        match &self.default_text {
            Some(text) => {
                let n = self.default_count.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(text_reply(&format!("{} #{}", text, n), 10))
            }
            None => Err(Error::provider("no scripted reply")),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn create_response(&self, payload: &ResponsesPayload) -> Result<Value> {
        self.responses_requests.lock().unwrap().push(payload.clone());
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default_reply())
    }

    async fn create_chat_completion(&self, payload: &ChatCompletionPayload) -> Result<Value> {
        self.chat_requests.lock().unwrap().push(payload.clone());
        let next = self.chat.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(Error::provider("no scripted chat reply")))
    }

    fn client_type(&self) -> &str {
        "scripted"
    }
}

/// Responses reply carrying only text and a total token count
pub(crate) fn text_reply(text: &str, total_tokens: u64) -> Value {
    json!({ "output_text": text, "usage": { "total_tokens": total_tokens } })
}

/// Responses reply requesting one `context_search` call
pub(crate) fn tool_call_reply(call_id: &str, term: &str) -> Value {
    json!({
        "output_text": "",
        "usage": { "total_tokens": 5 },
        "tool_calls": [{
            "id": call_id,
            "type": "function",
            "function": { "name": "context_search", "arguments": json!({ "term": term }).to_string() }
        }]
    })
}
