//! # Dialectic
//!
//! A multi-agent debate engine. Role-specialized agents (architect, security,
//! performance, testing, generalist) propose solutions to a design problem, critique
//! each other, refine their own proposals, and a judge synthesizes the final answer.
//!
//! ## Features
//!
//! - **Round/phase state machine**: summarization, proposal, critique, refinement, synthesis
//! - **Context summarization**: per-agent, length-based, once per round
//! - **Bounded tool loop**: agents may call tools such as `context_search` between replies
//! - **Dual-endpoint completions**: Responses API first, Chat Completions as fallback
//! - **Pluggable state**: in-memory or JSON files, behind one trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dialectic::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> dialectic::Result<()> {
//!     init_tracing(LogFormat::Pretty)?;
//!
//!     let client: Arc<dyn LlmClient> = Arc::new(OpenAiClient::from_env()?);
//!     let tools = ToolRegistry::with_builtin_tools();
//!     let debate = DebateConfig::default();
//!
//!     let agents: Vec<Arc<dyn DebateAgent>> = vec![
//!         Arc::new(RoleAgent::new(
//!             AgentConfig::new("agent-architect", "System Architect", AgentRole::Architect, "gpt-4o"),
//!             client.clone(),
//!             tools.clone(),
//!             &debate.summarization,
//!         )),
//!         Arc::new(RoleAgent::new(
//!             AgentConfig::new("agent-security", "Security Engineer", AgentRole::Security, "gpt-4o"),
//!             client.clone(),
//!             tools.clone(),
//!             &debate.summarization,
//!         )),
//!     ];
//!     let judge = Arc::new(JudgeAgent::new(
//!         AgentConfig::new("judge-main", "Technical Judge", AgentRole::Generalist, "gpt-4o"),
//!         client,
//!         tools,
//!         &debate.summarization,
//!     ));
//!
//!     let orchestrator =
//!         DebateOrchestrator::new(agents, judge, Arc::new(InMemoryStateManager::new()), debate);
//!     let result = orchestrator.run_debate("Design a caching layer for a product catalog", None).await?;
//!     println!("{}", result.solution.description);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod agent;
pub mod completion;
pub mod config;
pub mod error;
pub mod judge;
pub mod llm_client;
pub mod openai;
pub mod orchestrator;
pub mod state;
pub mod tool_loop;
pub mod tools;
pub mod tracing_ext;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use agent::{DebateAgent, PreparedContext, RoleAgent, RoleStrategy};
pub use completion::{complete, CompletionRequest, CompletionResponse};
pub use config::{
    AgentConfig, DebateConfig, Participants, ProviderConfig, SummarizationConfig,
    SummarizationOverride, SystemConfig,
};
pub use error::{Error, Result};
pub use judge::{Judge, JudgeAgent};
pub use llm_client::LlmClient;
pub use openai::OpenAiClient;
pub use orchestrator::{DebateOrchestrator, DebatePhase, DebateResult, OrchestratorHooks};
pub use state::{InMemoryStateManager, JsonFileStateManager, StateManager};
pub use tool_loop::{run_with_tools, ToolLoopOutcome};
pub use tools::{ContextSearchTool, Tool, ToolCall, ToolContext, ToolRegistry, ToolResult};
pub use tracing_ext::{init_tracing, LogFormat};
pub use types::{
    AgentRole, Contribution, ContributionType, DebateContext, DebateRound, DebateState,
    DebateSummary, Solution,
};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::agent::{DebateAgent, RoleAgent};
    pub use crate::config::{AgentConfig, DebateConfig, SystemConfig};
    pub use crate::error::{Error, Result};
    pub use crate::judge::{Judge, JudgeAgent};
    pub use crate::llm_client::LlmClient;
    pub use crate::openai::OpenAiClient;
    pub use crate::orchestrator::{DebateOrchestrator, DebateResult, OrchestratorHooks};
    pub use crate::state::{InMemoryStateManager, JsonFileStateManager, StateManager};
    pub use crate::tools::{Tool, ToolRegistry};
    pub use crate::tracing_ext::{init_tracing, LogFormat};
    pub use crate::types::AgentRole;
}
