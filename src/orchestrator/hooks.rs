//! Progress callbacks for debate runs

use std::fmt;
use std::sync::Arc;

/// Phase of a debate round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebatePhase {
    Summarization,
    Proposal,
    Critique,
    Refinement,
    Synthesis,
}

impl DebatePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarization => "summarization",
            Self::Proposal => "proposal",
            Self::Critique => "critique",
            Self::Refinement => "refinement",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for DebatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked when a round starts: `(round, total_rounds)`
pub type RoundHook = Arc<dyn Fn(u32, u32) + Send + Sync>;
/// Callback invoked when a phase starts: `(round, phase, expected_tasks)`
pub type PhaseStartHook = Arc<dyn Fn(u32, DebatePhase, usize) + Send + Sync>;
/// Callback invoked when a phase completes: `(round, phase)`
pub type PhaseCompleteHook = Arc<dyn Fn(u32, DebatePhase) + Send + Sync>;
/// Callback invoked around an agent call: `(agent_name, activity)`
pub type AgentHook = Arc<dyn Fn(&str, &str) + Send + Sync>;
/// Callback invoked after a summary: `(agent_name, before_chars, after_chars)`
pub type SummaryHook = Arc<dyn Fn(&str, usize, usize) + Send + Sync>;
/// Callback invoked for recoverable anomalies
pub type WarningHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional observers of a debate run. Hooks must not block; they run inline.
#[derive(Clone, Default)]
pub struct OrchestratorHooks {
    pub on_round_start: Option<RoundHook>,
    pub on_phase_start: Option<PhaseStartHook>,
    pub on_phase_complete: Option<PhaseCompleteHook>,
    pub on_agent_start: Option<AgentHook>,
    pub on_agent_complete: Option<AgentHook>,
    pub on_summarization_complete: Option<SummaryHook>,
    pub on_warning: Option<WarningHook>,
}

impl OrchestratorHooks {
    pub(crate) fn round_start(&self, round: u32, total: u32) {
        if let Some(hook) = &self.on_round_start {
            hook(round, total);
        }
    }

    pub(crate) fn phase_start(&self, round: u32, phase: DebatePhase, expected: usize) {
        if let Some(hook) = &self.on_phase_start {
            hook(round, phase, expected);
        }
    }

    pub(crate) fn phase_complete(&self, round: u32, phase: DebatePhase) {
        if let Some(hook) = &self.on_phase_complete {
            hook(round, phase);
        }
    }

    pub(crate) fn agent_start(&self, agent: &str, activity: &str) {
        if let Some(hook) = &self.on_agent_start {
            hook(agent, activity);
        }
    }

    pub(crate) fn agent_complete(&self, agent: &str, activity: &str) {
        if let Some(hook) = &self.on_agent_complete {
            hook(agent, activity);
        }
    }

    pub(crate) fn summarization_complete(&self, agent: &str, before: usize, after: usize) {
        if let Some(hook) = &self.on_summarization_complete {
            hook(agent, before, after);
        }
    }

    pub(crate) fn warning(&self, message: &str) {
        if let Some(hook) = &self.on_warning {
            hook(message);
        }
    }
}

impl fmt::Debug for OrchestratorHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorHooks")
            .field("on_round_start", &self.on_round_start.is_some())
            .field("on_phase_start", &self.on_phase_start.is_some())
            .field("on_phase_complete", &self.on_phase_complete.is_some())
            .field("on_agent_start", &self.on_agent_start.is_some())
            .field("on_agent_complete", &self.on_agent_complete.is_some())
            .field("on_summarization_complete", &self.on_summarization_complete.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .finish()
    }
}
