//! Debate state managers
//!
//! The orchestrator records every round, contribution, summary and the final
//! solution through a [`StateManager`]. Two backends ship: an in-memory map and a
//! JSON-file store that rewrites `<dir>/<debate-id>.json` after each change.

use crate::error::{Error, Result};
use crate::types::{
    AgentClarifications, Contribution, DebateRound, DebateState, DebateStatus, DebateSummary,
    Solution,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Persistence for debate state
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Create a running debate with no rounds
    async fn create_debate(&self, problem: &str, context: Option<&str>) -> Result<DebateState>;

    /// Open the next round and make it current
    async fn begin_round(&self, debate_id: &str) -> Result<DebateRound>;

    /// Append a contribution to the current round
    async fn add_contribution(&self, debate_id: &str, contribution: Contribution) -> Result<()>;

    /// Attach a summary to the current round; one per agent per round
    async fn add_summary(&self, debate_id: &str, summary: DebateSummary) -> Result<()>;

    /// Store clarification Q&A
    async fn add_clarifications(
        &self,
        debate_id: &str,
        clarifications: Vec<AgentClarifications>,
    ) -> Result<()>;

    /// Mark the debate completed with its solution
    async fn complete_debate(&self, debate_id: &str, solution: Solution) -> Result<DebateState>;

    async fn get_debate(&self, debate_id: &str) -> Result<Option<DebateState>>;
}

/// `deb-YYYYMMDD-HHMMSS-xxxxxx`
pub fn new_debate_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("deb-{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..6])
}

fn new_state(problem: &str, context: Option<&str>) -> DebateState {
    let now = Utc::now();
    DebateState {
        id: new_debate_id(),
        problem: problem.to_string(),
        context: context.map(str::to_string),
        status: DebateStatus::Running,
        current_round: 0,
        rounds: Vec::new(),
        created_at: now,
        updated_at: now,
        clarifications: None,
        final_solution: None,
    }
}

fn ensure_running(state: &DebateState) -> Result<()> {
    if state.status == DebateStatus::Completed {
        return Err(Error::state(format!("debate {} is already completed", state.id)));
    }
    Ok(())
}

fn current_round_mut(state: &mut DebateState) -> Result<&mut DebateRound> {
    let id = state.id.clone();
    state
        .rounds
        .last_mut()
        .ok_or(Error::NoActiveRound(id))
}

/// In-memory state, lost when the process exits
#[derive(Debug, Default)]
pub struct InMemoryStateManager {
    debates: DashMap<String, DebateState>,
}

impl InMemoryStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, state: DebateState) {
        self.debates.insert(state.id.clone(), state);
    }

    /// Insert unless the debate is already held; returns the held snapshot
    fn insert_if_absent(&self, state: DebateState) -> DebateState {
        self.debates
            .entry(state.id.clone())
            .or_insert(state)
            .value()
            .clone()
    }

    /// Apply `f` to a debate and return the updated snapshot
    fn update<F>(&self, debate_id: &str, f: F) -> Result<DebateState>
    where
        F: FnOnce(&mut DebateState) -> Result<()>,
    {
        let mut entry = self
            .debates
            .get_mut(debate_id)
            .ok_or_else(|| Error::DebateNotFound(debate_id.to_string()))?;
        f(&mut *entry)?;
        entry.updated_at = Utc::now();
        Ok(entry.value().clone())
    }

    fn snapshot(&self, debate_id: &str) -> Option<DebateState> {
        self.debates.get(debate_id).map(|entry| entry.value().clone())
    }

    fn begin_round_sync(&self, debate_id: &str) -> Result<DebateState> {
        self.update(debate_id, |state| {
            ensure_running(state)?;
            state.current_round += 1;
            state.rounds.push(DebateRound::new(state.current_round));
            Ok(())
        })
    }

    fn add_contribution_sync(&self, debate_id: &str, contribution: Contribution) -> Result<DebateState> {
        self.update(debate_id, |state| {
            ensure_running(state)?;
            current_round_mut(state)?.contributions.push(contribution);
            Ok(())
        })
    }

    fn add_summary_sync(&self, debate_id: &str, summary: DebateSummary) -> Result<DebateState> {
        self.update(debate_id, |state| {
            ensure_running(state)?;
            let round = current_round_mut(state)?;
            if round.summaries.contains_key(&summary.agent_id) {
                return Err(Error::state(format!(
                    "summary for agent {} already recorded in round {}",
                    summary.agent_id, round.round_number
                )));
            }
            round.summaries.insert(summary.agent_id.clone(), summary);
            Ok(())
        })
    }

    fn add_clarifications_sync(
        &self,
        debate_id: &str,
        clarifications: Vec<AgentClarifications>,
    ) -> Result<DebateState> {
        self.update(debate_id, |state| {
            state.clarifications = Some(clarifications);
            Ok(())
        })
    }

    fn complete_sync(&self, debate_id: &str, solution: Solution) -> Result<DebateState> {
        self.update(debate_id, |state| {
            ensure_running(state)?;
            state.status = DebateStatus::Completed;
            state.final_solution = Some(solution);
            Ok(())
        })
    }
}

fn last_round(state: &DebateState) -> Result<DebateRound> {
    state
        .rounds
        .last()
        .cloned()
        .ok_or_else(|| Error::NoActiveRound(state.id.clone()))
}

#[async_trait]
impl StateManager for InMemoryStateManager {
    async fn create_debate(&self, problem: &str, context: Option<&str>) -> Result<DebateState> {
        let state = new_state(problem, context);
        self.insert(state.clone());
        Ok(state)
    }

    async fn begin_round(&self, debate_id: &str) -> Result<DebateRound> {
        last_round(&self.begin_round_sync(debate_id)?)
    }

    async fn add_contribution(&self, debate_id: &str, contribution: Contribution) -> Result<()> {
        self.add_contribution_sync(debate_id, contribution).map(|_| ())
    }

    async fn add_summary(&self, debate_id: &str, summary: DebateSummary) -> Result<()> {
        self.add_summary_sync(debate_id, summary).map(|_| ())
    }

    async fn add_clarifications(
        &self,
        debate_id: &str,
        clarifications: Vec<AgentClarifications>,
    ) -> Result<()> {
        self.add_clarifications_sync(debate_id, clarifications).map(|_| ())
    }

    async fn complete_debate(&self, debate_id: &str, solution: Solution) -> Result<DebateState> {
        self.complete_sync(debate_id, solution)
    }

    async fn get_debate(&self, debate_id: &str) -> Result<Option<DebateState>> {
        Ok(self.snapshot(debate_id))
    }
}

/// State kept in memory and mirrored to one pretty-printed JSON file per debate
#[derive(Debug)]
pub struct JsonFileStateManager {
    dir: PathBuf,
    memory: InMemoryStateManager,
    // Serializes mutate-then-write so the file always holds the newest snapshot
    write_lock: Mutex<()>,
}

impl JsonFileStateManager {
    /// Use `dir`, creating it if needed
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            memory: InMemoryStateManager::new(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a debate's file. Ids that could escape `dir` are rejected.
    pub fn path_for(&self, debate_id: &str) -> Result<PathBuf> {
        let unsafe_id = debate_id.is_empty()
            || debate_id.contains("..")
            || debate_id.contains(['/', '\\'])
            || Path::new(debate_id).is_absolute();
        if unsafe_id {
            return Err(Error::InvalidInput(format!("invalid debate id: {:?}", debate_id)));
        }
        Ok(self.dir.join(format!("{}.json", debate_id)))
    }

    /// Write through a temp file so readers never see a truncated snapshot
    async fn persist(&self, state: &DebateState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        let path = self.path_for(&state.id)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(debate_id = %state.id, path = %path.display(), "Persisted debate state");
        Ok(())
    }

    /// Read a debate from disk into memory, if its file exists.
    /// A debate already held in memory is never replaced by the file.
    async fn load(&self, debate_id: &str) -> Result<Option<DebateState>> {
        let path = self.path_for(debate_id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let state: DebateState = serde_json::from_str(&raw)?;
        Ok(Some(self.memory.insert_if_absent(state)))
    }

    async fn mutate<F>(&self, debate_id: &str, f: F) -> Result<DebateState>
    where
        F: FnOnce(&InMemoryStateManager) -> Result<DebateState>,
    {
        let _guard = self.write_lock.lock().await;
        if self.memory.snapshot(debate_id).is_none() && self.load(debate_id).await?.is_none() {
            return Err(Error::DebateNotFound(debate_id.to_string()));
        }
        let state = f(&self.memory)?;
        self.persist(&state).await?;
        Ok(state)
    }
}

#[async_trait]
impl StateManager for JsonFileStateManager {
    async fn create_debate(&self, problem: &str, context: Option<&str>) -> Result<DebateState> {
        let state = new_state(problem, context);
        let _guard = self.write_lock.lock().await;
        self.memory.insert(state.clone());
        self.persist(&state).await?;
        Ok(state)
    }

    async fn begin_round(&self, debate_id: &str) -> Result<DebateRound> {
        let state = self.mutate(debate_id, |m| m.begin_round_sync(debate_id)).await?;
        last_round(&state)
    }

    async fn add_contribution(&self, debate_id: &str, contribution: Contribution) -> Result<()> {
        self.mutate(debate_id, |m| m.add_contribution_sync(debate_id, contribution))
            .await
            .map(|_| ())
    }

    async fn add_summary(&self, debate_id: &str, summary: DebateSummary) -> Result<()> {
        self.mutate(debate_id, |m| m.add_summary_sync(debate_id, summary))
            .await
            .map(|_| ())
    }

    async fn add_clarifications(
        &self,
        debate_id: &str,
        clarifications: Vec<AgentClarifications>,
    ) -> Result<()> {
        self.mutate(debate_id, |m| m.add_clarifications_sync(debate_id, clarifications))
            .await
            .map(|_| ())
    }

    async fn complete_debate(&self, debate_id: &str, solution: Solution) -> Result<DebateState> {
        self.mutate(debate_id, |m| m.complete_sync(debate_id, solution)).await
    }

    async fn get_debate(&self, debate_id: &str) -> Result<Option<DebateState>> {
        match self.memory.snapshot(debate_id) {
            Some(state) => Ok(Some(state)),
            None => self.load(debate_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AgentRole, ContributionMetadata, Proposal, SummarizationMethod, SummaryMetadata,
    };
    use tokio_test::{assert_err, assert_ok};

    fn proposal(agent: &str) -> Contribution {
        Contribution::proposal(
            agent,
            AgentRole::Architect,
            Proposal {
                content: format!("proposal from {}", agent),
                metadata: ContributionMetadata::default(),
            },
        )
    }

    fn summary(agent: &str) -> DebateSummary {
        DebateSummary {
            agent_id: agent.to_string(),
            agent_role: AgentRole::Architect,
            summary: "short".to_string(),
            metadata: SummaryMetadata {
                before_chars: 6000,
                after_chars: 5,
                method: SummarizationMethod::LengthBased,
                timestamp: Utc::now(),
                latency_ms: None,
                tokens_used: None,
                model: None,
                temperature: None,
                provider: None,
            },
        }
    }

    fn solution() -> Solution {
        Solution {
            description: "done".to_string(),
            implementation: None,
            tradeoffs: vec![],
            recommendations: vec![],
            confidence: 75,
            synthesized_by: "judge".to_string(),
        }
    }

    #[test]
    fn test_debate_id_format() {
        let id = new_debate_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "deb");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert_eq!(parts[3].len(), 6);
    }

    #[tokio::test]
    async fn test_in_memory_lifecycle() {
        let manager = InMemoryStateManager::new();
        let debate = manager.create_debate("problem", Some("ctx")).await.unwrap();
        assert_eq!(debate.status, DebateStatus::Running);
        assert_eq!(debate.current_round, 0);

        let round = manager.begin_round(&debate.id).await.unwrap();
        assert_eq!(round.round_number, 1);
        assert_ok!(manager.add_contribution(&debate.id, proposal("a1")).await);
        assert_ok!(manager.add_summary(&debate.id, summary("a1")).await);
        manager.begin_round(&debate.id).await.unwrap();
        assert_ok!(manager.add_contribution(&debate.id, proposal("a2")).await);

        let done = manager.complete_debate(&debate.id, solution()).await.unwrap();
        assert_eq!(done.status, DebateStatus::Completed);
        assert_eq!(done.current_round, 2);
        assert_eq!(done.rounds[0].contributions.len(), 1);
        assert!(done.rounds[0].summaries.contains_key("a1"));
        assert_eq!(done.rounds[1].contributions[0].agent_id, "a2");
        assert_eq!(done.context.as_deref(), Some("ctx"));

        let fetched = manager.get_debate(&debate.id).await.unwrap().unwrap();
        assert_eq!(fetched, done);
    }

    #[tokio::test]
    async fn test_contribution_requires_round_and_debate() {
        let manager = InMemoryStateManager::new();
        let debate = manager.create_debate("problem", None).await.unwrap();

        let err = assert_err!(manager.add_contribution(&debate.id, proposal("a1")).await);
        assert!(matches!(err, Error::NoActiveRound(id) if id == debate.id));

        let err = assert_err!(manager.add_contribution("missing", proposal("a1")).await);
        assert!(matches!(err, Error::DebateNotFound(_)));

        assert!(manager.get_debate("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_summary_rejected() {
        let manager = InMemoryStateManager::new();
        let debate = manager.create_debate("problem", None).await.unwrap();
        manager.begin_round(&debate.id).await.unwrap();

        assert_ok!(manager.add_summary(&debate.id, summary("a1")).await);
        assert_err!(manager.add_summary(&debate.id, summary("a1")).await);

        manager.begin_round(&debate.id).await.unwrap();
        assert_ok!(manager.add_summary(&debate.id, summary("a1")).await);
    }

    #[tokio::test]
    async fn test_completed_debate_rejects_changes() {
        let manager = InMemoryStateManager::new();
        let debate = manager.create_debate("problem", None).await.unwrap();
        manager.begin_round(&debate.id).await.unwrap();
        manager.complete_debate(&debate.id, solution()).await.unwrap();

        assert_err!(manager.add_contribution(&debate.id, proposal("a1")).await);
        assert_err!(manager.begin_round(&debate.id).await);
    }

    #[tokio::test]
    async fn test_json_file_persists_every_change() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JsonFileStateManager::new(dir.path()).await.unwrap();
        let debate = manager.create_debate("problem", None).await.unwrap();
        let path = manager.path_for(&debate.id).unwrap();
        assert!(path.exists());

        manager.begin_round(&debate.id).await.unwrap();
        manager.add_contribution(&debate.id, proposal("a1")).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["currentRound"], 1);
        assert_eq!(json["status"], "running");
        assert_eq!(json["rounds"][0]["contributions"][0]["agentId"], "a1");
        assert_eq!(json["rounds"][0]["contributions"][0]["type"], "proposal");
        assert!(raw.contains("\n  "));

        // A fresh manager over the same directory picks the debate up from disk
        let reopened = JsonFileStateManager::new(dir.path()).await.unwrap();
        reopened.complete_debate(&debate.id, solution()).await.unwrap();
        let state = reopened.get_debate(&debate.id).await.unwrap().unwrap();
        assert_eq!(state.status, DebateStatus::Completed);
        assert_eq!(state.rounds[0].contributions.len(), 1);
    }

    #[tokio::test]
    async fn test_json_file_missing_debate() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JsonFileStateManager::new(dir.path().join("nested")).await.unwrap();
        assert!(manager.get_debate("deb-nope").await.unwrap().is_none());
        let err = manager.begin_round("deb-nope").await.unwrap_err();
        assert!(matches!(err, Error::DebateNotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_reopened_store_keeps_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let debate_id = {
            let manager = JsonFileStateManager::new(dir.path()).await.unwrap();
            let debate = manager.create_debate("problem", None).await.unwrap();
            manager.begin_round(&debate.id).await.unwrap();
            debate.id
        };

        let reopened = std::sync::Arc::new(JsonFileStateManager::new(dir.path()).await.unwrap());
        let writes = (0..8).map(|i| {
            let manager = reopened.clone();
            let id = debate_id.clone();
            tokio::spawn(async move { manager.add_contribution(&id, proposal(&format!("a{}", i))).await })
        });
        for handle in futures::future::join_all(writes).await {
            assert_ok!(handle.unwrap());
        }

        let in_memory = reopened.get_debate(&debate_id).await.unwrap().unwrap();
        assert_eq!(in_memory.rounds[0].contributions.len(), 8);

        let raw = std::fs::read_to_string(reopened.path_for(&debate_id).unwrap()).unwrap();
        let on_disk: DebateState = serde_json::from_str(&raw).unwrap();
        assert_eq!(on_disk.rounds[0].contributions.len(), 8);
    }

    #[tokio::test]
    async fn test_json_file_rejects_ids_outside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JsonFileStateManager::new(dir.path().join("store")).await.unwrap();
        std::fs::write(dir.path().join("x.json"), "{}").unwrap();

        for id in ["../x", "a/b", "..", ""] {
            let err = assert_err!(manager.get_debate(id).await);
            assert!(matches!(err, Error::InvalidInput(_)));
        }
        let err = assert_err!(manager.begin_round("../x").await);
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
