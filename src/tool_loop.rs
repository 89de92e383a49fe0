//! Bounded tool-calling loop
//!
//! `AWAITING_MODEL -> EXECUTING_TOOLS -> AWAITING_MODEL -> ... -> DONE`. The loop ends
//! when a reply carries no tool calls or `max_iterations` tool rounds have run. Every
//! requested call receives exactly one result before the conversation is resubmitted.

use crate::completion::{complete, CompletionRequest, Message};
use crate::error::Result;
use crate::llm_client::LlmClient;
use crate::tools::{ToolCall, ToolContext, ToolRegistry, ToolResult};
use crate::types::TokenUsage;
use tracing::{debug, instrument};

/// Aggregated outcome of a tool loop run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolLoopOutcome {
    /// Text of the last model reply
    pub final_text: String,
    /// Tool calls across all iterations
    pub tool_calls: Vec<ToolCall>,
    /// Tool results across all iterations, one per call
    pub tool_results: Vec<ToolResult>,
    /// Iterations that executed tools
    pub iterations: u32,
    /// Summed token usage of every model call; absent when none reported usage
    pub usage: Option<TokenUsage>,
}

/// Run `request` to completion, executing requested tools against `registry`
#[instrument(skip_all, fields(model = %request.model, agent = %ctx.agent_id, max_iterations = max_iterations))]
pub async fn run_with_tools(
    client: &dyn LlmClient,
    request: CompletionRequest,
    registry: &ToolRegistry,
    max_iterations: u32,
    ctx: &ToolContext,
) -> Result<ToolLoopOutcome> {
    let mut messages = request.build_messages();
    let mut request = request.with_messages(messages.clone());
    let mut outcome = ToolLoopOutcome::default();

    let mut response = complete(client, &request).await?;
    accumulate_usage(&mut outcome.usage, response.usage);

    while !response.requested_tool_calls().is_empty() && outcome.iterations < max_iterations {
        outcome.iterations += 1;
        let calls = response.requested_tool_calls().to_vec();
        debug!(iteration = outcome.iterations, calls = calls.len(), "Executing tool calls");

        messages.push(Message::assistant_tool_calls(&response.text, &calls));
        for call in &calls {
            let result = registry.execute_call(call, ctx).await;
            messages.push(Message::tool(&result.content, &result.tool_call_id));
            outcome.tool_results.push(result);
        }
        outcome.tool_calls.extend(calls);

        request = request.with_messages(messages.clone());
        response = complete(client, &request).await?;
        accumulate_usage(&mut outcome.usage, response.usage);
    }

    outcome.final_text = response.text;
    Ok(outcome)
}

fn accumulate_usage(total: &mut Option<TokenUsage>, usage: Option<TokenUsage>) {
    let Some(usage) = usage else {
        return;
    };
    let sum = |a: Option<u64>, b: Option<u64>| match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    };
    let current = total.unwrap_or_default();
    *total = Some(TokenUsage {
        prompt_tokens: sum(current.prompt_tokens, usage.prompt_tokens),
        completion_tokens: sum(current.completion_tokens, usage.completion_tokens),
        total_tokens: sum(current.total_tokens, usage.total_or_sum()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Role;
    use crate::test_support::{text_reply, tool_call_reply, ScriptedClient};

    fn request() -> CompletionRequest {
        CompletionRequest::new("gpt-4", "You are an architect.", "Design a cache", 0.5)
            .with_tools(ToolRegistry::with_builtin_tools().schemas())
    }

    #[tokio::test]
    async fn test_no_tool_calls_finishes_immediately() {
        let client = ScriptedClient::new();
        client.push_response(text_reply("final", 7));

        let outcome = run_with_tools(
            &client,
            request(),
            &ToolRegistry::with_builtin_tools(),
            3,
            &ToolContext::new("a1"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.final_text, "final");
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.tool_calls.is_empty());
        assert_eq!(outcome.usage, Some(TokenUsage::total(7)));
    }

    #[tokio::test]
    async fn test_iterations_are_capped() {
        let client = ScriptedClient::new();
        client.push_response(tool_call_reply("c1", "cache"));
        client.push_response(tool_call_reply("c2", "cache"));
        client.push_response(tool_call_reply("c3", "cache"));

        let outcome = run_with_tools(
            &client,
            request(),
            &ToolRegistry::with_builtin_tools(),
            2,
            &ToolContext::new("a1"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.tool_calls.len(), 2);
        assert_eq!(outcome.tool_results.len(), 2);
        assert_eq!(client.responses_requests().len(), 3);
        assert_eq!(outcome.usage.unwrap().total_tokens, Some(15));
    }

    #[tokio::test]
    async fn test_tool_turns_are_threaded_back() {
        let client = ScriptedClient::new();
        client.push_response(tool_call_reply("c1", "cache"));
        client.push_response(text_reply("done", 3));

        let outcome = run_with_tools(
            &client,
            request(),
            &ToolRegistry::with_builtin_tools(),
            5,
            &ToolContext::new("a1"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.final_text, "done");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.tool_results[0].tool_call_id, "c1");

        let second = &client.responses_requests()[1];
        let roles: Vec<Role> = second.input.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(second.input[2].tool_calls.as_ref().unwrap()[0].id, "c1");
        assert_eq!(second.input[3].tool_call_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn test_unknown_tool_still_gets_a_result() {
        let client = ScriptedClient::new();
        client.push_response(serde_json::json!({
            "output_text": "",
            "tool_calls": [
                { "id": "x1", "function": { "name": "missing_tool", "arguments": "{}" } },
                { "id": "x2", "function": { "name": "context_search", "arguments": "{\"term\":\"q\"}" } }
            ]
        }));
        client.push_response(text_reply("recovered", 1));

        let outcome = run_with_tools(
            &client,
            request(),
            &ToolRegistry::with_builtin_tools(),
            3,
            &ToolContext::new("a1"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.final_text, "recovered");
        assert_eq!(outcome.tool_results.len(), outcome.tool_calls.len());
        assert!(outcome.tool_results[0].content.contains("Tool not found"));
    }
}
