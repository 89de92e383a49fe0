//! Tool trait, registry and the built-in debate tools

use crate::error::{Error, Result};
use crate::types::DebateRound;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, echoed back in the matching result
    pub id: String,
    /// Tool name
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

/// Role marker for tool result turns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolRole {
    #[default]
    Tool,
}

/// Result of one tool call, fed back to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the call this answers
    pub tool_call_id: String,
    /// Always `tool`
    pub role: ToolRole,
    /// JSON-encoded result
    pub content: String,
}

impl ToolResult {
    /// Create a result for `tool_call_id`
    pub fn new(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            role: ToolRole::Tool,
            content: content.into(),
        }
    }

    /// Create an error result; the model sees the message instead of a payload
    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        let content = json!({ "status": "error", "error": message.into() }).to_string();
        Self::new(tool_call_id, content)
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSchema {
    /// Schema type
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Schema properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, Value>>,
    /// Required properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Additional properties
    #[serde(flatten)]
    pub additional: HashMap<String, Value>,
}

impl JsonSchema {
    /// Create an empty object schema
    pub fn empty() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
            additional: HashMap::new(),
        }
    }

    /// Create an object schema with properties
    pub fn object(properties: HashMap<String, Value>) -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: Some(properties),
            required: None,
            additional: HashMap::new(),
        }
    }

    /// Set required properties
    pub fn with_required(mut self, required: Vec<String>) -> Self {
        self.required = Some(required);
        self
    }

    /// Render as a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!({ "type": "object" }))
    }
}

/// Provider-independent description of a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: JsonSchema,
}

/// Context provided to tools during execution
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Agent executing the tool
    pub agent_id: String,
    /// Owning debate, if any
    pub debate_id: Option<String>,
    /// Debate rounds visible to the agent
    pub history: Vec<DebateRound>,
}

impl ToolContext {
    /// Create a new tool context
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ..Self::default()
        }
    }

    /// Attach the debate history
    pub fn with_history(mut self, debate_id: Option<String>, history: Vec<DebateRound>) -> Self {
        self.debate_id = debate_id;
        self.history = history;
        self
    }
}

/// Tool trait defining the interface for agent capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses to call this tool
    fn name(&self) -> &str;

    /// Schema advertised to the model
    fn schema(&self) -> ToolSchema;

    /// Execute with parsed arguments, returning a JSON-encoded string
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}

/// Read-only set of tools, shared by every agent task in a debate
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in debate tools
    pub fn with_builtin_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ContextSearchTool));
        registry
    }

    /// Add a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Schemas of all registered tools, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Execute one call. Never fails: lookup, argument and execution errors all
    /// become an error `ToolResult` carrying the call's id.
    pub async fn execute_call(&self, call: &ToolCall, ctx: &ToolContext) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Tool not found");
            return ToolResult::error(&call.id, format!("Tool not found: {}", call.name));
        };

        let args: Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Invalid tool arguments");
                return ToolResult::error(&call.id, format!("Invalid arguments: {}", e));
            }
        };

        if let Err(e) = validate_arguments(&tool.schema(), &args) {
            warn!(tool = %call.name, error = %e, "Tool arguments failed validation");
            return ToolResult::error(&call.id, e.to_string());
        }

        debug!(tool = %call.name, call_id = %call.id, "Executing tool");
        match tool.execute(args, ctx).await {
            Ok(content) => ToolResult::new(&call.id, content),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::error(&call.id, e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

fn validate_arguments(schema: &ToolSchema, args: &Value) -> Result<()> {
    let validator = jsonschema::validator_for(&schema.parameters.to_value())
        .map_err(|e| Error::JsonSchema(format!("Invalid schema for {}: {}", schema.name, e)))?;
    if validator.is_valid(args) {
        Ok(())
    } else {
        Err(Error::JsonSchema(format!(
            "Arguments for {} do not match its schema",
            schema.name
        )))
    }
}

const SNIPPET_CHARS: usize = 200;

/// Searches the debate history for contributions mentioning a term
pub struct ContextSearchTool;

#[async_trait]
impl Tool for ContextSearchTool {
    fn name(&self) -> &str {
        "context_search"
    }

    fn schema(&self) -> ToolSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "term".to_string(),
            json!({
                "type": "string",
                "description": "Term to search for in previous debate contributions"
            }),
        );

        ToolSchema {
            name: self.name().to_string(),
            description: "Search the debate history for contributions containing a term"
                .to_string(),
            parameters: JsonSchema::object(properties).with_required(vec!["term".to_string()]),
        }
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String> {
        let term = args
            .get("term")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::InvalidInput("Missing 'term'".to_string()))?;
        let needle = term.to_lowercase();

        let matches: Vec<Value> = ctx
            .history
            .iter()
            .flat_map(|round| {
                round.contributions.iter().filter_map(|c| {
                    let line = c
                        .content
                        .lines()
                        .find(|line| line.to_lowercase().contains(&needle))?;
                    Some(json!({
                        "roundNumber": round.round_number,
                        "agentId": c.agent_id,
                        "role": c.agent_role,
                        "type": c.kind,
                        "snippet": line.trim().chars().take(SNIPPET_CHARS).collect::<String>(),
                    }))
                })
            })
            .collect();

        Ok(json!({ "status": "success", "result": { "matches": matches } }).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AgentRole, Contribution, ContributionMetadata, Proposal};

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "explode"
        }

        fn schema(&self) -> ToolSchema {
            ToolSchema {
                name: "explode".to_string(),
                description: "Always fails".to_string(),
                parameters: JsonSchema::empty(),
            }
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
            Err(Error::tool_execution("explode", "boom"))
        }
    }

    fn history() -> Vec<DebateRound> {
        let mut round = DebateRound::new(1);
        round.contributions.push(Contribution::proposal(
            "agent-architect",
            AgentRole::Architect,
            Proposal {
                content: "Overview\nUse a write-through Redis cache in front of Postgres".to_string(),
                metadata: ContributionMetadata::default(),
            },
        ));
        vec![round]
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_context_search_finds_matching_line() {
        let registry = ToolRegistry::with_builtin_tools();
        let ctx = ToolContext::new("agent-security").with_history(None, history());

        let result = registry
            .execute_call(&call("context_search", r#"{"term":"redis"}"#), &ctx)
            .await;

        assert_eq!(result.tool_call_id, "call_1");
        let body: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(body["status"], "success");
        let matches = body["result"]["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0]["agentId"], "agent-architect");
        assert!(matches[0]["snippet"].as_str().unwrap().contains("Redis"));
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_error_result() {
        let registry = ToolRegistry::new();
        let result = registry
            .execute_call(&call("nope", "{}"), &ToolContext::new("a"))
            .await;

        assert_eq!(result.tool_call_id, "call_1");
        assert!(result.content.contains("Tool not found: nope"));
    }

    #[tokio::test]
    async fn test_failing_tool_degrades_to_error_content() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));

        let result = registry
            .execute_call(&call("explode", "{}"), &ToolContext::new("a"))
            .await;

        let body: Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_schema_violation_and_bad_json_are_reported() {
        let registry = ToolRegistry::with_builtin_tools();
        let ctx = ToolContext::new("a");

        let missing = registry
            .execute_call(&call("context_search", r#"{"other":1}"#), &ctx)
            .await;
        assert!(missing.content.contains("do not match its schema"));

        let malformed = registry
            .execute_call(&call("context_search", "{not json"), &ctx)
            .await;
        assert!(malformed.content.contains("Invalid arguments"));
    }
}
