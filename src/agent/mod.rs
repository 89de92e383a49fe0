//! Debate agents
//!
//! One capability interface, [`DebateAgent`], and one implementation, [`RoleAgent`],
//! whose behaviour per role comes from a [`RoleStrategy`] rather than subclassing.

pub mod context;
pub mod roles;

use crate::completion::{complete, CompletionRequest};
use crate::config::{AgentConfig, SummarizationConfig};
use crate::error::Result;
use crate::llm_client::LlmClient;
use crate::tool_loop::run_with_tools;
use crate::tools::{ToolContext, ToolRegistry};
use crate::types::{
    ContributionMetadata, Critique, DebateContext, DebateSummary, Proposal, SummaryMetadata,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use context::{format_context_section, prepend_context};
pub use roles::{strategy_for, RoleStrategy};

/// Maximum clarifying questions kept per agent
pub const MAX_CLARIFICATIONS: usize = 5;

/// Context after the summarization step
#[derive(Debug, Clone)]
pub struct PreparedContext {
    /// Context to use for this round (with the new summary spliced in, if any)
    pub context: DebateContext,
    /// Summary produced this round, to be persisted by the caller
    pub summary: Option<DebateSummary>,
}

/// What the orchestrator needs from a debate participant
#[async_trait]
pub trait DebateAgent: Send + Sync {
    /// Agent configuration (id, role, model, ...)
    fn config(&self) -> &AgentConfig;

    /// Propose a solution to `problem`
    async fn propose(&self, problem: &str, context: &DebateContext) -> Result<Proposal>;

    /// Critique another agent's proposal
    async fn critique(&self, proposal: &Proposal, context: &DebateContext) -> Result<Critique>;

    /// Refine this agent's own proposal in light of critiques aimed at it
    async fn refine(
        &self,
        original: &Proposal,
        critiques: &[Critique],
        context: &DebateContext,
    ) -> Result<Proposal>;

    /// Whether this agent's context has outgrown its summarization threshold
    fn should_summarize(&self, context: &DebateContext) -> bool;

    /// Summarize when needed, once per round before proposals
    async fn prepare_context(&self, context: &DebateContext, round_number: u32) -> Result<PreparedContext>;

    /// Questions the agent wants answered before the debate starts
    async fn ask_clarifying_questions(&self, _problem: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// An LLM-backed agent playing one role
pub struct RoleAgent {
    config: AgentConfig,
    strategy: Arc<dyn RoleStrategy>,
    client: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    summarization: SummarizationConfig,
}

impl RoleAgent {
    /// Create an agent; its summarization settings are the debate defaults with the
    /// agent's own override applied.
    pub fn new(
        config: AgentConfig,
        client: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        debate_summarization: &SummarizationConfig,
    ) -> Self {
        let summarization = debate_summarization.merged(config.summarization.as_ref());
        Self {
            strategy: strategy_for(config.role),
            config,
            client,
            tools,
            summarization,
        }
    }

    /// Replace the role strategy
    pub fn with_strategy(mut self, strategy: Arc<dyn RoleStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Effective summarization settings
    pub fn summarization(&self) -> &SummarizationConfig {
        &self.summarization
    }

    pub fn strategy(&self) -> &dyn RoleStrategy {
        self.strategy.as_ref()
    }

    /// System prompt: the configured override, else the role's default
    pub fn system_prompt(&self) -> &str {
        self.config
            .system_prompt
            .as_deref()
            .unwrap_or_else(|| self.strategy.system_prompt())
    }

    /// Run `prompt` through the tool loop and package the reply with its metadata
    pub(crate) async fn call_llm(
        &self,
        prompt: String,
        context: &DebateContext,
    ) -> Result<(String, ContributionMetadata)> {
        let start = Instant::now();
        let request = CompletionRequest::new(
            &self.config.model,
            self.system_prompt(),
            prompt,
            self.config.temperature,
        )
        .with_tools(self.tools.schemas());
        let tool_ctx = ToolContext::new(&self.config.id)
            .with_history(context.debate_id.clone(), context.history.clone());

        let outcome = run_with_tools(
            self.client.as_ref(),
            request,
            &self.tools,
            self.config.max_tool_iterations,
            &tool_ctx,
        )
        .await?;

        let metadata = ContributionMetadata {
            latency_ms: start.elapsed().as_millis() as u64,
            model: self.config.model.clone(),
            tokens_used: outcome.usage.and_then(|u| u.total_or_sum()),
            tool_calls: (!outcome.tool_calls.is_empty()).then_some(outcome.tool_calls),
            tool_results: (!outcome.tool_results.is_empty()).then_some(outcome.tool_results),
            tool_call_iterations: Some(outcome.iterations),
        };
        Ok((outcome.final_text, metadata))
    }

    /// Summarize `content` (the agent's current context), hard-capped at `max_length` characters
    pub async fn summarize(&self, content: &str) -> Result<DebateSummary> {
        let start = Instant::now();
        let max_length = self.summarization.max_length;
        let request = CompletionRequest::new(
            &self.config.model,
            self.system_prompt(),
            self.strategy.summarization_prompt(content, max_length),
            self.config.temperature,
        );
        let response = complete(self.client.as_ref(), &request).await?;

        let summary: String = response.text.chars().take(max_length).collect();
        let after_chars = summary.chars().count();
        Ok(DebateSummary {
            agent_id: self.config.id.clone(),
            agent_role: self.config.role,
            summary,
            metadata: SummaryMetadata {
                before_chars: content.chars().count(),
                after_chars,
                method: self.summarization.method,
                timestamp: Utc::now(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
                tokens_used: response.usage.and_then(|u| u.total_or_sum()),
                model: Some(self.config.model.clone()),
                temperature: Some(self.config.temperature),
                provider: Some(self.config.provider.clone()),
            },
        })
    }
}

#[derive(Deserialize)]
struct ClarificationReply {
    #[serde(default)]
    questions: Vec<ClarificationQuestion>,
}

#[derive(Deserialize)]
struct ClarificationQuestion {
    text: String,
}

/// Pull `{"questions": [...]}` out of a reply that may wrap it in prose or fences
fn parse_clarification_reply(text: &str) -> Option<Vec<String>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let reply: ClarificationReply = serde_json::from_str(&text[start..=end]).ok()?;
    Some(
        reply
            .questions
            .into_iter()
            .map(|q| q.text.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(MAX_CLARIFICATIONS)
            .collect(),
    )
}

#[async_trait]
impl DebateAgent for RoleAgent {
    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn propose(&self, problem: &str, context: &DebateContext) -> Result<Proposal> {
        debug!(agent = %self.config.id, "Proposing");
        let prompt = prepend_context(&self.strategy.proposal_prompt(problem), context, &self.config.id);
        let (content, metadata) = self.call_llm(prompt, context).await?;
        Ok(Proposal { content, metadata })
    }

    async fn critique(&self, proposal: &Proposal, context: &DebateContext) -> Result<Critique> {
        debug!(agent = %self.config.id, "Critiquing");
        let prompt = prepend_context(
            &self.strategy.critique_prompt(&proposal.content),
            context,
            &self.config.id,
        );
        let (content, metadata) = self.call_llm(prompt, context).await?;
        Ok(Critique { content, metadata })
    }

    async fn refine(
        &self,
        original: &Proposal,
        critiques: &[Critique],
        context: &DebateContext,
    ) -> Result<Proposal> {
        debug!(agent = %self.config.id, critiques = critiques.len(), "Refining");
        let critique_texts: Vec<String> = critiques.iter().map(|c| c.content.clone()).collect();
        let prompt = prepend_context(
            &self.strategy.refinement_prompt(&original.content, &critique_texts),
            context,
            &self.config.id,
        );
        let (content, metadata) = self.call_llm(prompt, context).await?;
        Ok(Proposal { content, metadata })
    }

    fn should_summarize(&self, context: &DebateContext) -> bool {
        if !self.summarization.enabled {
            return false;
        }
        let perspective = context::agent_perspective(&context.history, &self.config.id);
        !perspective.is_empty() && perspective.chars().count() >= self.summarization.threshold
    }

    async fn prepare_context(&self, context: &DebateContext, round_number: u32) -> Result<PreparedContext> {
        if !self.should_summarize(context) {
            return Ok(PreparedContext {
                context: context.clone(),
                summary: None,
            });
        }

        let content = context::agent_perspective(&context.history, &self.config.id);
        let summary = self.summarize(&content).await?;
        info!(
            agent = %self.config.id,
            round = round_number,
            before_chars = summary.metadata.before_chars,
            after_chars = summary.metadata.after_chars,
            "Summarized debate history"
        );

        let mut prepared = context.clone();
        if let Some(round) = prepared
            .history
            .iter_mut()
            .find(|r| r.round_number == round_number)
        {
            round.summaries.insert(self.config.id.clone(), summary.clone());
        }
        Ok(PreparedContext {
            context: prepared,
            summary: Some(summary),
        })
    }

    async fn ask_clarifying_questions(&self, problem: &str) -> Result<Vec<String>> {
        let request = CompletionRequest::new(
            &self.config.model,
            self.system_prompt(),
            self.strategy.clarification_prompt(problem),
            self.config.temperature,
        );
        let response = complete(self.client.as_ref(), &request).await?;
        match parse_clarification_reply(&response.text) {
            Some(questions) => Ok(questions),
            None => {
                warn!(agent = %self.config.id, "Clarification reply was not valid JSON; ignoring");
                Ok(Vec::new())
            }
        }
    }
}
