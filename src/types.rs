//! Core data model shared by agents, the orchestrator and state managers

use crate::tools::{ToolCall, ToolResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Role an agent plays in the debate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// System architecture and component design
    Architect,
    /// Threat modelling and vulnerabilities
    Security,
    /// Latency, throughput and resource usage
    Performance,
    /// Test strategy and verifiability
    Testing,
    /// Broad, balanced engineering perspective (also used by the judge)
    Generalist,
}

impl AgentRole {
    /// Lowercase identifier used in prompts and transcripts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Architect => "architect",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Testing => "testing",
            Self::Generalist => "generalist",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token usage statistics. Fields are absent when the provider did not report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Number of prompt tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    /// Number of completion tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    /// Total tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl TokenUsage {
    /// Usage with only a total
    pub fn total(total_tokens: u64) -> Self {
        Self {
            total_tokens: Some(total_tokens),
            ..Self::default()
        }
    }

    /// Total tokens, derived from prompt + completion when no total was reported
    pub fn total_or_sum(&self) -> Option<u64> {
        match (self.total_tokens, self.prompt_tokens, self.completion_tokens) {
            (Some(total), _, _) => Some(total),
            (None, Some(prompt), Some(completion)) => Some(prompt + completion),
            _ => None,
        }
    }

    /// True when no field was reported
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none() && self.completion_tokens.is_none() && self.total_tokens.is_none()
    }
}

/// Kind of contribution recorded in a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContributionType {
    /// Initial (or carried-forward) proposal
    Proposal,
    /// Critique of another agent's proposal
    Critique,
    /// Refinement of the agent's own proposal
    Refinement,
}

impl ContributionType {
    /// Lowercase identifier used in transcripts
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposal => "proposal",
            Self::Critique => "critique",
            Self::Refinement => "refinement",
        }
    }
}

impl fmt::Display for ContributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to a contribution.
///
/// Presence of each optional field is meaningful: `tokens_used` is only set when the
/// provider reported usage, and the tool fields only when the tool loop ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionMetadata {
    /// Wall-clock latency of producing the contribution
    pub latency_ms: u64,
    /// Model that produced the content
    pub model: String,
    /// Total tokens consumed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    /// Tool calls requested across all tool-loop iterations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Tool results produced across all tool-loop iterations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    /// Number of tool-loop iterations executed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_iterations: Option<u32>,
}

/// Output of an agent's propose/refine step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal text
    pub content: String,
    /// Production metadata
    pub metadata: ContributionMetadata,
}

/// Output of an agent's critique step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    /// Critique text
    pub content: String,
    /// Production metadata
    pub metadata: ContributionMetadata,
}

/// A single persisted contribution. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    /// Author agent id
    pub agent_id: String,
    /// Author role
    pub agent_role: AgentRole,
    /// Contribution kind
    #[serde(rename = "type")]
    pub kind: ContributionType,
    /// Text content
    pub content: String,
    /// For critiques: whose proposal is critiqued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<String>,
    /// Production metadata
    pub metadata: ContributionMetadata,
}

impl Contribution {
    /// Wrap a proposal
    pub fn proposal(agent_id: impl Into<String>, role: AgentRole, proposal: Proposal) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_role: role,
            kind: ContributionType::Proposal,
            content: proposal.content,
            target_agent_id: None,
            metadata: proposal.metadata,
        }
    }

    /// Wrap a critique of `target_agent_id`'s proposal
    pub fn critique(
        agent_id: impl Into<String>,
        role: AgentRole,
        target_agent_id: impl Into<String>,
        critique: Critique,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_role: role,
            kind: ContributionType::Critique,
            content: critique.content,
            target_agent_id: Some(target_agent_id.into()),
            metadata: critique.metadata,
        }
    }

    /// Wrap a refinement
    pub fn refinement(agent_id: impl Into<String>, role: AgentRole, refined: Proposal) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_role: role,
            kind: ContributionType::Refinement,
            content: refined.content,
            target_agent_id: None,
            metadata: refined.metadata,
        }
    }

    /// View this contribution as a proposal value
    pub fn as_proposal(&self) -> Proposal {
        Proposal {
            content: self.content.clone(),
            metadata: self.metadata.clone(),
        }
    }

    /// View this contribution as a critique value
    pub fn as_critique(&self) -> Critique {
        Critique {
            content: self.content.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// How a summary was produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummarizationMethod {
    /// Threshold on character count of the agent's context
    #[default]
    LengthBased,
}

impl SummarizationMethod {
    /// Identifier recorded in summary metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LengthBased => "length-based",
        }
    }
}

/// Metadata recorded alongside a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetadata {
    /// Size of the context before summarization
    pub before_chars: usize,
    /// Size of the stored summary after truncation
    pub after_chars: usize,
    /// Summarization method
    pub method: SummarizationMethod,
    /// When the summary was produced
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

/// Compressed view of an agent's debate history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateSummary {
    pub agent_id: String,
    pub agent_role: AgentRole,
    pub summary: String,
    pub metadata: SummaryMetadata,
}

/// One round of the debate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateRound {
    /// 1-indexed round number, equal to position + 1
    pub round_number: u32,
    /// Contributions in completion order
    pub contributions: Vec<Contribution>,
    /// When the round began
    pub timestamp: DateTime<Utc>,
    /// Per-agent summaries produced before this round's proposals
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub summaries: HashMap<String, DebateSummary>,
}

impl DebateRound {
    /// Create an empty round
    pub fn new(round_number: u32) -> Self {
        Self {
            round_number,
            contributions: Vec::new(),
            timestamp: Utc::now(),
            summaries: HashMap::new(),
        }
    }

    /// Contributions of one kind
    pub fn of_kind(&self, kind: ContributionType) -> impl Iterator<Item = &Contribution> {
        self.contributions.iter().filter(move |c| c.kind == kind)
    }

    /// The contribution of `kind` authored by `agent_id`, if any
    pub fn find(&self, agent_id: &str, kind: ContributionType) -> Option<&Contribution> {
        self.contributions
            .iter()
            .find(|c| c.kind == kind && c.agent_id == agent_id)
    }
}

/// Lifecycle status of a debate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebateStatus {
    Running,
    Completed,
}

/// A clarifying question and its (possibly blank) answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarificationItem {
    /// Question id, unique within the debate (e.g. `q1`)
    pub id: String,
    pub question: String,
    /// Empty until answered
    #[serde(default)]
    pub answer: String,
}

/// Clarifying questions raised by one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentClarifications {
    pub agent_id: String,
    pub agent_name: String,
    pub role: AgentRole,
    pub items: Vec<ClarificationItem>,
}

/// Final synthesized answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
    pub tradeoffs: Vec<String>,
    pub recommendations: Vec<String>,
    /// 0-100
    pub confidence: u8,
    /// Judge id
    pub synthesized_by: String,
}

/// Persisted state of one debate, owned by a state manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateState {
    pub id: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub status: DebateStatus,
    pub current_round: u32,
    pub rounds: Vec<DebateRound>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarifications: Option<Vec<AgentClarifications>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_solution: Option<Solution>,
}

/// What an agent sees when producing a contribution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebateContext {
    /// Problem statement
    pub problem: String,
    /// Owning debate, when running under an orchestrator
    pub debate_id: Option<String>,
    /// Rounds recorded so far (the in-progress round included)
    pub history: Vec<DebateRound>,
    /// Clarification Q&A collected before the debate
    pub clarifications: Vec<AgentClarifications>,
    /// Whether to render the raw transcript when no summary exists
    pub include_full_history: bool,
}

impl DebateContext {
    /// Context for a bare problem with no history
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            ..Self::default()
        }
    }

    /// Attach history
    pub fn with_history(mut self, history: Vec<DebateRound>) -> Self {
        self.history = history;
        self
    }

    /// Attach clarifications
    pub fn with_clarifications(mut self, clarifications: Vec<AgentClarifications>) -> Self {
        self.clarifications = clarifications;
        self
    }

    /// Enable raw-transcript rendering
    pub fn with_full_history(mut self, include: bool) -> Self {
        self.include_full_history = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_total_or_sum() {
        assert_eq!(TokenUsage::total(7).total_or_sum(), Some(7));
        let usage = TokenUsage {
            prompt_tokens: Some(3),
            completion_tokens: Some(4),
            total_tokens: None,
        };
        assert_eq!(usage.total_or_sum(), Some(7));
        assert!(TokenUsage::default().is_empty());
    }

    #[test]
    fn test_contribution_serializes_type_and_skips_absent_metadata() {
        let contribution = Contribution::critique(
            "agent-security",
            AgentRole::Security,
            "agent-architect",
            Critique {
                content: "Missing auth".to_string(),
                metadata: ContributionMetadata {
                    latency_ms: 12,
                    model: "gpt-4".to_string(),
                    ..ContributionMetadata::default()
                },
            },
        );

        let json = serde_json::to_value(&contribution).unwrap();
        assert_eq!(json["type"], "critique");
        assert_eq!(json["targetAgentId"], "agent-architect");
        assert_eq!(json["agentRole"], "security");
        assert!(json["metadata"].get("tokensUsed").is_none());
        assert!(json["metadata"].get("toolCalls").is_none());
    }

    #[test]
    fn test_round_find_by_agent_and_kind() {
        let mut round = DebateRound::new(1);
        round.contributions.push(Contribution::proposal(
            "a1",
            AgentRole::Architect,
            Proposal {
                content: "p".to_string(),
                metadata: ContributionMetadata::default(),
            },
        ));
        assert!(round.find("a1", ContributionType::Proposal).is_some());
        assert!(round.find("a1", ContributionType::Refinement).is_none());
        assert_eq!(round.of_kind(ContributionType::Proposal).count(), 1);
    }
}
