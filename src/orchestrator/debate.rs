//! Debate orchestrator
//!
//! Role agents propose, critique each other and refine their own proposals over
//! several rounds; the judge then synthesizes the final solution. Each round runs
//! summarization, proposal, critique and refinement phases. A phase finishes only
//! when every agent's task for it has resolved, and every contribution is persisted
//! as soon as it exists.

use crate::agent::DebateAgent;
use crate::config::{DebateConfig, Participants};
use crate::error::{Error, Result};
use crate::judge::Judge;
use crate::orchestrator::hooks::{DebatePhase, OrchestratorHooks};
use crate::state::StateManager;
use crate::types::{
    AgentClarifications, ClarificationItem, Contribution, ContributionMetadata, ContributionType,
    Critique, DebateContext, DebateRound, Proposal, Solution,
};
use futures::future::try_join_all;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Summary figures of a finished debate
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateResultMetadata {
    pub total_rounds: u32,
    pub duration_ms: u64,
    /// Sum of contribution token usage; absent when no provider reported any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Outcome of [`DebateOrchestrator::run_debate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebateResult {
    pub debate_id: String,
    pub solution: Solution,
    pub rounds: Vec<DebateRound>,
    pub metadata: DebateResultMetadata,
}

/// Runs debates between a set of agents and a judge
pub struct DebateOrchestrator {
    agents: Vec<Arc<dyn DebateAgent>>,
    judge: Arc<dyn Judge>,
    state: Arc<dyn StateManager>,
    config: DebateConfig,
    hooks: OrchestratorHooks,
}

impl DebateOrchestrator {
    pub fn new(
        agents: Vec<Arc<dyn DebateAgent>>,
        judge: Arc<dyn Judge>,
        state: Arc<dyn StateManager>,
        config: DebateConfig,
    ) -> Self {
        Self {
            agents,
            judge,
            state,
            config,
            hooks: OrchestratorHooks::default(),
        }
    }

    /// Orchestrator over participants built by [`crate::config::SystemConfig::build`]
    pub fn from_participants(
        participants: Participants,
        state: Arc<dyn StateManager>,
        config: DebateConfig,
    ) -> Self {
        Self::new(participants.agents, participants.judge, state, config)
    }

    /// Set progress hooks
    pub fn with_hooks(mut self, hooks: OrchestratorHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &DebateConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Arc<dyn DebateAgent>] {
        &self.agents
    }

    /// Rounds actually executed.
    ///
    /// Critique needs `rounds >= 2` and refinement `rounds >= 3`; with fewer than
    /// three rounds nothing is refined, so there is nothing to carry into a second round.
    pub fn executed_rounds(&self) -> u32 {
        if self.config.rounds >= 3 {
            self.config.rounds
        } else {
            1
        }
    }

    /// Run a debate on `problem`
    #[instrument(skip_all, fields(rounds = self.config.rounds, agents = self.agents.len()))]
    pub async fn run_debate(&self, problem: &str, context: Option<&str>) -> Result<DebateResult> {
        self.run(problem, context, Vec::new()).await
    }

    /// Run a debate whose prompts carry answered clarification questions
    #[instrument(skip_all, fields(rounds = self.config.rounds, agents = self.agents.len()))]
    pub async fn run_debate_with_clarifications(
        &self,
        problem: &str,
        context: Option<&str>,
        clarifications: Vec<AgentClarifications>,
    ) -> Result<DebateResult> {
        self.run(problem, context, clarifications).await
    }

    /// Ask every agent for clarifying questions. Ids run `q1, q2, ...` across agents
    /// in agent order; answers start blank.
    pub async fn collect_clarifications(&self, problem: &str) -> Result<Vec<AgentClarifications>> {
        let asked = try_join_all(self.agents.iter().map(|agent| async move {
            let name = &agent.config().name;
            self.hooks.agent_start(name, "asking clarifying questions");
            let questions = agent.ask_clarifying_questions(problem).await?;
            self.hooks.agent_complete(name, "asking clarifying questions");
            Ok::<_, Error>((agent, questions))
        }))
        .await?;

        let mut next_id = 1;
        let mut collected = Vec::new();
        for (agent, questions) in asked {
            if questions.is_empty() {
                continue;
            }
            let config = agent.config();
            let items = questions
                .into_iter()
                .map(|question| {
                    let item = ClarificationItem {
                        id: format!("q{}", next_id),
                        question,
                        answer: String::new(),
                    };
                    next_id += 1;
                    item
                })
                .collect();
            collected.push(AgentClarifications {
                agent_id: config.id.clone(),
                agent_name: config.name.clone(),
                role: config.role,
                items,
            });
        }
        Ok(collected)
    }

    async fn run(
        &self,
        problem: &str,
        context: Option<&str>,
        clarifications: Vec<AgentClarifications>,
    ) -> Result<DebateResult> {
        if problem.trim().is_empty() {
            return Err(Error::InvalidInput("problem must not be empty".to_string()));
        }
        if self.agents.is_empty() {
            return Err(Error::config("a debate needs at least one agent"));
        }
        self.config.validate()?;

        let start = Instant::now();
        let debate = self.state.create_debate(problem, context).await?;
        let debate_id = debate.id.as_str();
        info!(debate_id = %debate_id, "Debate started");

        if !clarifications.is_empty() {
            self.state.add_clarifications(debate_id, clarifications).await?;
        }

        let total = self.executed_rounds();
        for round in 1..=total {
            self.within_round_timeout(round, self.run_round(debate_id, problem, round, total))
                .await?;
        }

        let solution = self.synthesis_phase(debate_id, problem, total).await?;
        let state = self.state.complete_debate(debate_id, solution.clone()).await?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let metadata = DebateResultMetadata {
            total_rounds: state.rounds.len() as u32,
            duration_ms,
            total_tokens: total_tokens(&state.rounds),
        };
        info!(
            debate_id = %debate_id,
            rounds = metadata.total_rounds,
            duration_ms,
            confidence = solution.confidence,
            "Debate completed"
        );

        Ok(DebateResult {
            debate_id: state.id,
            solution,
            rounds: state.rounds,
            metadata,
        })
    }

    async fn within_round_timeout<F>(&self, round: u32, phases: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        match self.config.timeout_per_round() {
            Some(limit) => tokio::time::timeout(limit, phases).await.map_err(|_| {
                Error::Timeout(format!("round {} exceeded {} ms", round, limit.as_millis()))
            })?,
            None => phases.await,
        }
    }

    /// Fresh snapshot of the debate as agents see it
    async fn context(&self, debate_id: &str) -> Result<DebateContext> {
        let state = self
            .state
            .get_debate(debate_id)
            .await?
            .ok_or_else(|| Error::DebateNotFound(debate_id.to_string()))?;
        Ok(DebateContext {
            problem: state.problem,
            debate_id: Some(state.id),
            history: state.rounds,
            clarifications: state.clarifications.unwrap_or_default(),
            include_full_history: self.config.include_full_history,
        })
    }

    async fn run_round(&self, debate_id: &str, problem: &str, round: u32, total: u32) -> Result<()> {
        self.state.begin_round(debate_id).await?;
        self.hooks.round_start(round, total);
        info!(debate_id = %debate_id, round, total, "Round started");

        self.summarization_phase(debate_id, round).await?;
        self.proposal_phase(debate_id, problem, round).await?;
        if self.config.rounds >= 2 {
            self.critique_phase(debate_id, round).await?;
        }
        if self.config.rounds >= 3 {
            self.refinement_phase(debate_id, round).await?;
        }
        Ok(())
    }

    async fn summarization_phase(&self, debate_id: &str, round: u32) -> Result<()> {
        let context = self.context(debate_id).await?;
        self.hooks
            .phase_start(round, DebatePhase::Summarization, self.agents.len());

        try_join_all(self.agents.iter().map(|agent| {
            let context = &context;
            async move {
                let prepared = agent.prepare_context(context, round).await?;
                if let Some(summary) = prepared.summary {
                    let (before, after) = (summary.metadata.before_chars, summary.metadata.after_chars);
                    self.state.add_summary(debate_id, summary).await?;
                    self.hooks
                        .summarization_complete(&agent.config().name, before, after);
                }
                Ok::<_, Error>(())
            }
        }))
        .await?;

        self.hooks.phase_complete(round, DebatePhase::Summarization);
        Ok(())
    }

    async fn proposal_phase(&self, debate_id: &str, problem: &str, round: u32) -> Result<()> {
        let context = self.context(debate_id).await?;
        let previous = context
            .history
            .iter()
            .find(|r| round > 1 && r.round_number == round - 1);
        self.hooks
            .phase_start(round, DebatePhase::Proposal, self.agents.len());

        try_join_all(self.agents.iter().map(|agent| {
            let context = &context;
            async move {
                let config = agent.config();
                let carried = previous
                    .and_then(|prev| prev.find(&config.id, ContributionType::Refinement));

                let contribution = match carried {
                    Some(refinement) => {
                        debug!(agent = %config.id, round, "Carrying refinement forward as proposal");
                        Contribution::proposal(
                            &config.id,
                            config.role,
                            Proposal {
                                content: refinement.content.clone(),
                                metadata: ContributionMetadata {
                                    latency_ms: 0,
                                    model: config.model.clone(),
                                    tokens_used: Some(0),
                                    ..ContributionMetadata::default()
                                },
                            },
                        )
                    }
                    None => {
                        if let Some(prev) = previous {
                            let message = format!(
                                "Missing previous refinement for agent {} in round {}; proposing fresh",
                                config.id, prev.round_number
                            );
                            warn!("{}", message);
                            self.hooks.warning(&message);
                        }
                        self.hooks.agent_start(&config.name, "proposing");
                        let proposal = agent.propose(problem, context).await?;
                        self.hooks.agent_complete(&config.name, "proposing");
                        Contribution::proposal(&config.id, config.role, proposal)
                    }
                };
                self.state.add_contribution(debate_id, contribution).await
            }
        }))
        .await?;

        self.hooks.phase_complete(round, DebatePhase::Proposal);
        Ok(())
    }

    async fn critique_phase(&self, debate_id: &str, round: u32) -> Result<()> {
        let context = self.context(debate_id).await?;
        let current = current_round(&context, round)?;
        let pairs: Vec<(&Arc<dyn DebateAgent>, &Contribution)> = self
            .agents
            .iter()
            .flat_map(move |agent| {
                current
                    .of_kind(ContributionType::Proposal)
                    .filter(move |p| p.agent_id != agent.config().id)
                    .map(move |p| (agent, p))
            })
            .collect();
        self.hooks
            .phase_start(round, DebatePhase::Critique, pairs.len());

        try_join_all(pairs.into_iter().map(|(agent, target)| {
            let context = &context;
            async move {
                let config = agent.config();
                let activity = format!("critiquing {}", target.agent_id);
                self.hooks.agent_start(&config.name, &activity);
                let critique = agent.critique(&target.as_proposal(), context).await?;
                self.hooks.agent_complete(&config.name, &activity);
                let contribution =
                    Contribution::critique(&config.id, config.role, &target.agent_id, critique);
                self.state.add_contribution(debate_id, contribution).await
            }
        }))
        .await?;

        self.hooks.phase_complete(round, DebatePhase::Critique);
        Ok(())
    }

    async fn refinement_phase(&self, debate_id: &str, round: u32) -> Result<()> {
        let context = self.context(debate_id).await?;
        let current = current_round(&context, round)?;
        self.hooks
            .phase_start(round, DebatePhase::Refinement, self.agents.len());

        try_join_all(self.agents.iter().map(|agent| {
            let context = &context;
            async move {
                let config = agent.config();
                let original = current
                    .find(&config.id, ContributionType::Proposal)
                    .ok_or_else(|| {
                        Error::agent(format!("agent {} has no proposal in round {}", config.id, round))
                    })?;
                let critiques: Vec<Critique> = current
                    .of_kind(ContributionType::Critique)
                    .filter(|c| c.target_agent_id.as_deref() == Some(config.id.as_str()))
                    .map(Contribution::as_critique)
                    .collect();

                self.hooks.agent_start(&config.name, "refining");
                let refined = agent
                    .refine(&original.as_proposal(), &critiques, context)
                    .await?;
                self.hooks.agent_complete(&config.name, "refining");
                self.state
                    .add_contribution(debate_id, Contribution::refinement(&config.id, config.role, refined))
                    .await
            }
        }))
        .await?;

        self.hooks.phase_complete(round, DebatePhase::Refinement);
        Ok(())
    }

    async fn synthesis_phase(&self, debate_id: &str, problem: &str, round: u32) -> Result<Solution> {
        let context = self.context(debate_id).await?;
        let judge_name = self.judge.config().name.clone();
        self.hooks.phase_start(round, DebatePhase::Synthesis, 1);
        self.hooks.agent_start(&judge_name, "synthesizing");

        let solution = self
            .judge
            .synthesize(problem, &context.history, &context)
            .await?;

        self.hooks.agent_complete(&judge_name, "synthesizing");
        self.hooks.phase_complete(round, DebatePhase::Synthesis);
        Ok(solution)
    }
}

fn current_round(context: &DebateContext, round: u32) -> Result<&DebateRound> {
    context
        .history
        .iter()
        .find(|r| r.round_number == round)
        .ok_or_else(|| Error::NoActiveRound(context.debate_id.clone().unwrap_or_default()))
}

fn total_tokens(rounds: &[DebateRound]) -> Option<u64> {
    rounds
        .iter()
        .flat_map(|r| &r.contributions)
        .filter_map(|c| c.metadata.tokens_used)
        .reduce(|a, b| a + b)
}
