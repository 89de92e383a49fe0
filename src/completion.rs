//! Completion normalizer
//!
//! Sends a chat-style request to the provider's Responses endpoint and, if that
//! fails for any reason, to its Chat-Completions endpoint. Whichever answers, the
//! reply is parsed into one [`CompletionResponse`]; callers never learn which
//! endpoint was used.
//!
//! Parsing is split into explicit per-shape steps ([`parse_responses_reply`],
//! [`parse_chat_reply`]) so that each reply layout has its own tests.

use crate::error::{Error, Result};
use crate::llm_client::LlmClient;
use crate::tools::{ToolCall, ToolSchema};
use crate::types::TokenUsage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Tool calls (assistant turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    /// Answered call id (tool turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Create an assistant turn that requested tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, calls: &[ToolCall]) -> Self {
        Self {
            tool_calls: Some(calls.iter().map(WireToolCall::from).collect()),
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Create a tool result turn
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// Tool definition in the provider's function-calling format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
}

impl From<&ToolSchema> for ToolDefinition {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters.to_value(),
            },
        }
    }
}

/// Tool call as it travels inside an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            tool_type: "function".to_string(),
            function: FunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        }
    }
}

/// Payload for the Responses-style endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesPayload {
    pub model: String,
    pub temperature: f32,
    pub input: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Payload for the Chat-Completions-style endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionPayload {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

/// Chat-style completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Used with `user_prompt` when `messages` is not set
    pub system_prompt: String,
    pub user_prompt: String,
    /// Explicit conversation; takes precedence over the prompts
    pub messages: Option<Vec<Message>>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub stop: Option<Vec<String>>,
    /// Tools offered to the model
    pub tools: Vec<ToolSchema>,
}

impl CompletionRequest {
    /// Create a new completion request from a system and a user prompt
    pub fn new(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            messages: None,
            temperature,
            max_tokens: None,
            stop: None,
            tools: Vec::new(),
        }
    }

    /// Use an explicit message list
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    /// Set the maximum tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set stop sequences
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Set the tools
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }

    /// Messages to send: the explicit list verbatim, else `[system, user]`
    pub fn build_messages(&self) -> Vec<Message> {
        match &self.messages {
            Some(messages) => messages.clone(),
            None => vec![
                Message::system(&self.system_prompt),
                Message::user(&self.user_prompt),
            ],
        }
    }

    fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.tools.is_empty() {
            None
        } else {
            Some(self.tools.iter().map(ToolDefinition::from).collect())
        }
    }
}

/// Canonical completion result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    pub text: String,
    /// Absent when the provider reported no usage
    pub usage: Option<TokenUsage>,
    /// Absent when the reply requested no tools
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl CompletionResponse {
    /// Tool calls requested by this reply (empty when none)
    pub fn requested_tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// Send `request`, preferring the Responses endpoint and falling back to Chat Completions
#[instrument(skip_all, fields(model = %request.model, client = client.client_type()))]
pub async fn complete(client: &dyn LlmClient, request: &CompletionRequest) -> Result<CompletionResponse> {
    let messages = request.build_messages();
    let tools = request.tool_definitions();

    let primary = ResponsesPayload {
        model: request.model.clone(),
        temperature: request.temperature,
        input: messages.clone(),
        max_output_tokens: request.max_tokens,
        stop: request.stop.clone(),
        tools: tools.clone(),
    };

    let primary_error = match client
        .create_response(&primary)
        .await
        .and_then(|reply| parse_responses_reply(&reply))
    {
        Ok(response) => return Ok(response),
        Err(e) => e,
    };
    debug!(error = %primary_error, "Responses endpoint failed, falling back to chat completions");

    let fallback = ChatCompletionPayload {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stop: request.stop.clone(),
        tools,
    };

    client
        .create_chat_completion(&fallback)
        .await
        .and_then(|reply| parse_chat_reply(&reply))
        .map_err(|fallback_error| Error::CompletionFailed {
            primary: primary_error.to_string(),
            fallback: fallback_error.to_string(),
        })
}

/// Layout of a Responses reply's `output` field
enum OutputShape<'a> {
    Absent,
    Array(&'a [Value]),
    Object(&'a Map<String, Value>),
    Scalar,
}

impl<'a> OutputShape<'a> {
    fn of(reply: &'a Value) -> Self {
        match reply.get("output") {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::Array(items)) => Self::Array(items),
            Some(Value::Object(map)) => Self::Object(map),
            Some(_) => Self::Scalar,
        }
    }

    /// `output[0].content[0]`, only reachable through an array
    fn first_content(&self) -> Option<&'a Value> {
        match self {
            Self::Array(items) => items.first()?.get("content")?.as_array()?.first(),
            _ => None,
        }
    }

    /// Usage nested in `output`; array-shaped output never carries usage
    fn usage(&self) -> Option<TokenUsage> {
        match self {
            Self::Object(map) => map.get("usage").and_then(parse_usage),
            _ => None,
        }
    }
}

/// Parse a Responses-style reply
pub fn parse_responses_reply(reply: &Value) -> Result<CompletionResponse> {
    let output = OutputShape::of(reply);
    let first_content = output.first_content();

    let text = match reply.get("output_text") {
        Some(Value::String(text)) => text.clone(),
        _ => first_content
            .and_then(|content| content.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::unexpected_response("Responses reply has neither output_text nor output[0].content[0].text")
            })?,
    };

    let usage = match reply.get("usage") {
        Some(usage) if usage.is_object() => parse_usage(usage),
        _ => output.usage(),
    };

    let raw_calls = match reply.get("tool_calls").and_then(Value::as_array) {
        Some(calls) => Some(calls),
        None => first_content
            .and_then(|content| content.get("tool_calls"))
            .and_then(Value::as_array),
    };

    Ok(CompletionResponse {
        text,
        usage,
        tool_calls: raw_calls.and_then(|calls| extract_tool_calls(calls)),
    })
}

/// Parse a Chat-Completions-style reply
pub fn parse_chat_reply(reply: &Value) -> Result<CompletionResponse> {
    let choice = reply
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| Error::unexpected_response("Chat completion reply has no choices"))?;
    let message = choice.get("message");

    let text = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let tool_calls = message
        .and_then(|m| m.get("tool_calls"))
        .and_then(Value::as_array)
        .and_then(|calls| extract_tool_calls(calls));

    Ok(CompletionResponse {
        text,
        usage: reply.get("usage").and_then(parse_usage),
        tool_calls,
    })
}

/// Read usage, preferring `prompt_tokens/completion_tokens` over `input_tokens/output_tokens`
fn parse_usage(usage: &Value) -> Option<TokenUsage> {
    if !usage.is_object() {
        return None;
    }
    let field = |name: &str| usage.get(name).and_then(Value::as_u64);

    let parsed = TokenUsage {
        prompt_tokens: field("prompt_tokens").or_else(|| field("input_tokens")),
        completion_tokens: field("completion_tokens").or_else(|| field("output_tokens")),
        total_tokens: field("total_tokens"),
    };
    (!parsed.is_empty()).then_some(parsed)
}

fn extract_tool_calls(raw: &[Value]) -> Option<Vec<ToolCall>> {
    let calls: Vec<ToolCall> = raw.iter().map(extract_tool_call).collect();
    (!calls.is_empty()).then_some(calls)
}

fn extract_tool_call(raw: &Value) -> ToolCall {
    let function = raw.get("function");
    let function_name = function
        .and_then(|f| f.get("name"))
        .and_then(Value::as_str);

    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .or(function_name)
        .unwrap_or_default()
        .to_string();
    let name = function_name
        .or_else(|| raw.get("name").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();
    let arguments = match function.and_then(|f| f.get("arguments")) {
        Some(Value::String(arguments)) => arguments.clone(),
        None | Some(Value::Null) => "{}".to_string(),
        Some(other) => other.to_string(),
    };

    ToolCall { id, name, arguments }
}
