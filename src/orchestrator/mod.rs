//! Orchestrator module - drives debates between role agents and a judge
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dialectic::orchestrator::DebateOrchestrator;
//! use dialectic::{InMemoryStateManager, OpenAiClient, SystemConfig, ToolRegistry};
//!
//! # async fn run() -> dialectic::Result<()> {
//! let config = SystemConfig::from_file("debate.yaml")?;
//! let client = Arc::new(OpenAiClient::from_env()?);
//! let participants = config.build(client, ToolRegistry::with_builtin_tools())?;
//! let orchestrator = DebateOrchestrator::from_participants(
//!     participants,
//!     Arc::new(InMemoryStateManager::new()),
//!     config.debate.clone(),
//! );
//! let result = orchestrator.run_debate("Design a rate limiter", None).await?;
//! println!("{}", result.solution.description);
//! # Ok(())
//! # }
//! ```

pub mod debate;
pub mod hooks;

pub use debate::{DebateOrchestrator, DebateResult, DebateResultMetadata};
pub use hooks::{DebatePhase, OrchestratorHooks};
