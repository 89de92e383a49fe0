//! Judge: synthesizes the final solution from the debate transcript

use crate::agent::context::preview;
use crate::agent::{prepend_context, RoleAgent};
use crate::config::{AgentConfig, SummarizationConfig};
use crate::error::Result;
use crate::llm_client::LlmClient;
use crate::tools::ToolRegistry;
use crate::types::{ContributionType, DebateContext, DebateRound, Solution};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Confidence used when the judge does not state one
pub const DEFAULT_CONFIDENCE: u8 = 75;

const JUDGE_SYSTEM_PROMPT: &str = "You are an impartial technical judge. You weigh the \
    arguments of several expert engineers, resolve their disagreements on the merits and \
    produce one coherent, actionable solution.";

/// Produces the final solution of a debate
#[async_trait]
pub trait Judge: Send + Sync {
    fn config(&self) -> &AgentConfig;

    /// Synthesize a solution from every round of the debate
    async fn synthesize(
        &self,
        problem: &str,
        rounds: &[DebateRound],
        context: &DebateContext,
    ) -> Result<Solution>;
}

/// LLM-backed judge
pub struct JudgeAgent {
    agent: RoleAgent,
}

impl JudgeAgent {
    pub fn new(
        mut config: AgentConfig,
        client: Arc<dyn LlmClient>,
        tools: ToolRegistry,
        debate_summarization: &SummarizationConfig,
    ) -> Self {
        if config.system_prompt.is_none() {
            config.system_prompt = Some(JUDGE_SYSTEM_PROMPT.to_string());
        }
        Self {
            agent: RoleAgent::new(config, client, tools, debate_summarization),
        }
    }

    /// Character budget for the rendered transcript, when summarization is on
    fn transcript_budget(&self) -> Option<usize> {
        let summarization = self.agent.summarization();
        summarization.enabled.then_some(summarization.threshold)
    }
}

/// Full transcript, or when it exceeds `budget`, earlier rounds as one-line previews
/// followed by the final round in full.
pub fn render_transcript(rounds: &[DebateRound], budget: Option<usize>) -> String {
    let full = render_rounds(rounds, rounds.len());
    match budget {
        Some(limit) if full.chars().count() > limit && rounds.len() > 1 => {
            render_rounds(rounds, 1)
        }
        _ => full,
    }
}

/// Render rounds, the last `full_rounds` of them verbatim and the rest as previews
fn render_rounds(rounds: &[DebateRound], full_rounds: usize) -> String {
    let verbatim_from = rounds.len().saturating_sub(full_rounds);
    let mut out = String::from("# Debate Transcript\n");
    for (i, round) in rounds.iter().enumerate() {
        out.push_str(&format!("\n## Round {}\n", round.round_number));
        for c in &round.contributions {
            let target = c
                .target_agent_id
                .as_deref()
                .map(|t| format!(" -> {}", t))
                .unwrap_or_default();
            if i >= verbatim_from {
                out.push_str(&format!(
                    "\n### {} ({}) {}{}\n{}\n",
                    c.agent_id, c.agent_role, c.kind, target, c.content
                ));
            } else {
                out.push_str(&format!(
                    "- [{}] {}{}: {}\n",
                    c.agent_role,
                    c.kind,
                    target,
                    preview(&c.content, 100)
                ));
            }
        }
    }
    out
}

fn synthesis_prompt(problem: &str, transcript: &str) -> String {
    format!(
        "Problem:\n{problem}\n\n{transcript}\n\n\
         Synthesize the strongest ideas above into a single recommended solution. \
         Prefer the latest refinements over earlier proposals.\n\n\
         Format your answer as:\n\
         - A description of the solution\n\
         - `## Implementation` with concrete steps\n\
         - `## Tradeoffs` as a bullet list\n\
         - `## Recommendations` as a bullet list\n\
         - A final line `Confidence: N` where N is 0-100"
    )
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Body,
    Implementation,
    Tradeoffs,
    Recommendations,
    Other,
}

fn section_for(heading: &str) -> Section {
    let heading = heading.trim_start_matches('#').trim().to_lowercase();
    if heading.starts_with("implementation") {
        Section::Implementation
    } else if heading.starts_with("tradeoff") || heading.starts_with("trade-off") {
        Section::Tradeoffs
    } else if heading.starts_with("recommendation") {
        Section::Recommendations
    } else {
        Section::Other
    }
}

fn bullet(line: &str) -> Option<&str> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Some(rest.trim());
        }
    }
    None
}

fn confidence(line: &str) -> Option<u8> {
    let line = line.trim().trim_matches('*').trim();
    let lower = line.to_lowercase();
    let rest = lower.strip_prefix("confidence")?;
    let rest = rest.trim_start_matches(|c: char| c == '*' || c == ':' || c.is_whitespace());
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let value: u32 = digits.parse().ok()?;
    Some(value.min(100) as u8)
}

/// Parse the judge's reply into a [`Solution`]
pub fn parse_solution(text: &str, judge_id: &str) -> Solution {
    let mut section = Section::Body;
    let mut implementation = Vec::new();
    let mut tradeoffs = Vec::new();
    let mut recommendations = Vec::new();
    let mut stated_confidence = None;

    for line in text.lines() {
        if line.trim_start().starts_with('#') {
            section = section_for(line.trim());
            continue;
        }
        if let Some(value) = confidence(line) {
            stated_confidence = Some(value);
            continue;
        }
        match section {
            Section::Implementation => implementation.push(line),
            Section::Tradeoffs => tradeoffs.extend(bullet(line).map(str::to_string)),
            Section::Recommendations => recommendations.extend(bullet(line).map(str::to_string)),
            Section::Body | Section::Other => {}
        }
    }

    let implementation = implementation.join("\n").trim().to_string();
    Solution {
        description: text.trim().to_string(),
        implementation: (!implementation.is_empty()).then_some(implementation),
        tradeoffs,
        recommendations,
        confidence: stated_confidence.unwrap_or(DEFAULT_CONFIDENCE),
        synthesized_by: judge_id.to_string(),
    }
}

#[async_trait]
impl Judge for JudgeAgent {
    fn config(&self) -> &AgentConfig {
        crate::agent::DebateAgent::config(&self.agent)
    }

    #[tracing::instrument(skip_all, fields(judge = %self.config().id, rounds = rounds.len()))]
    async fn synthesize(
        &self,
        problem: &str,
        rounds: &[DebateRound],
        context: &DebateContext,
    ) -> Result<Solution> {
        let refinements = rounds
            .iter()
            .flat_map(|r| r.of_kind(ContributionType::Refinement))
            .count();
        debug!(refinements, "Synthesizing solution");

        let transcript = render_transcript(rounds, self.transcript_budget());
        // Transcript already carries the history; only clarifications are prepended.
        let bare = DebateContext {
            history: Vec::new(),
            ..context.clone()
        };
        let prompt = prepend_context(&synthesis_prompt(problem, &transcript), &bare, &self.config().id);
        let (text, _) = self.agent.call_llm(prompt, context).await?;
        Ok(parse_solution(&text, &self.config().id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{text_reply, ScriptedClient};
    use crate::types::{AgentRole, Contribution, ContributionMetadata, Proposal};

    const REPLY: &str = "Use a write-through cache in front of the database.\n\n\
        ## Implementation\n\
        Deploy Redis next to each service.\n\
        Invalidate on write.\n\n\
        ## Tradeoffs\n\
        - Extra infrastructure to operate\n\
        * Possible stale reads during failover\n\n\
        ## Recommendations\n\
        1. Start with a 60s TTL\n\
        2. Add hit-rate metrics\n\n\
        **Confidence: 82**";

    fn round_with(n: u32, content: &str) -> DebateRound {
        let mut round = DebateRound::new(n);
        round.contributions.push(Contribution::proposal(
            "agent-architect",
            AgentRole::Architect,
            Proposal {
                content: content.to_string(),
                metadata: ContributionMetadata::default(),
            },
        ));
        round
    }

    #[test]
    fn test_parse_solution_sections() {
        let solution = parse_solution(REPLY, "judge-main");

        assert_eq!(solution.description, REPLY.trim());
        assert_eq!(
            solution.implementation.as_deref(),
            Some("Deploy Redis next to each service.\nInvalidate on write.")
        );
        assert_eq!(
            solution.tradeoffs,
            vec!["Extra infrastructure to operate", "Possible stale reads during failover"]
        );
        assert_eq!(
            solution.recommendations,
            vec!["Start with a 60s TTL", "Add hit-rate metrics"]
        );
        assert_eq!(solution.confidence, 82);
        assert_eq!(solution.synthesized_by, "judge-main");
    }

    #[test]
    fn test_parse_solution_defaults() {
        let solution = parse_solution("Just do it.", "j");
        assert_eq!(solution.confidence, DEFAULT_CONFIDENCE);
        assert!(solution.tradeoffs.is_empty());
        assert!(solution.implementation.is_none());

        assert_eq!(parse_solution("Confidence: 250", "j").confidence, 100);
    }

    #[test]
    fn test_transcript_compacts_earlier_rounds_over_budget() {
        let rounds = vec![
            round_with(1, &format!("first line\n{}", "x".repeat(500))),
            round_with(2, "final refinement"),
        ];

        let full = render_transcript(&rounds, None);
        assert!(full.contains(&"x".repeat(500)));

        let compact = render_transcript(&rounds, Some(200));
        assert!(!compact.contains(&"x".repeat(500)));
        assert!(compact.contains("- [architect] proposal: first line"));
        assert!(compact.contains("### agent-architect (architect) proposal\nfinal refinement"));
    }

    #[tokio::test]
    async fn test_synthesize_calls_llm_once() {
        let client = Arc::new(ScriptedClient::new());
        client.push_response(text_reply(REPLY, 30));
        let judge = JudgeAgent::new(
            AgentConfig::new("judge-main", "Judge", AgentRole::Generalist, "gpt-4"),
            client.clone(),
            ToolRegistry::new(),
            &SummarizationConfig::default(),
        );

        let rounds = vec![round_with(1, "proposal text")];
        let solution = judge
            .synthesize("Design a cache", &rounds, &DebateContext::new("Design a cache"))
            .await
            .unwrap();

        assert_eq!(solution.confidence, 82);
        let requests = client.responses_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].input[0].content.contains("impartial technical judge"));
        assert!(requests[0].input[1].content.contains("proposal text"));
    }
}
