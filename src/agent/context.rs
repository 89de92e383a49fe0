//! Rendering of clarifications, prior rounds and summaries into agent prompts

use crate::types::{AgentClarifications, DebateContext, DebateRound, DebateSummary};

/// Transcript lines show at most this many characters of a contribution
pub const PREVIEW_CHARS: usize = 100;

/// Clarifications ahead of `prompt`, debate history (or summary) after it
pub fn prepend_context(prompt: &str, context: &DebateContext, agent_id: &str) -> String {
    let mut rendered = String::new();
    if has_clarifications(&context.clarifications) {
        rendered.push_str(&format_clarifications(&context.clarifications));
        rendered.push('\n');
    }
    rendered.push_str(prompt);
    rendered.push_str(&format_context_section(context, agent_id));
    rendered
}

fn has_clarifications(clarifications: &[AgentClarifications]) -> bool {
    clarifications.iter().any(|group| !group.items.is_empty())
}

/// `## Clarifications` block; blank answers render as `NA`
pub fn format_clarifications(clarifications: &[AgentClarifications]) -> String {
    let mut out = String::from("## Clarifications\n\n");
    for group in clarifications.iter().filter(|g| !g.items.is_empty()) {
        out.push_str(&format!("### {} ({})\n", group.agent_name, group.role));
        for item in &group.items {
            let answer = item.answer.trim();
            let answer = if answer.is_empty() { "NA" } else { answer };
            out.push_str(&format!("Question ({}): {}\nAnswer: {}\n\n", item.id, item.question, answer));
        }
    }
    out
}

/// History section for `agent_id`.
///
/// The agent's most recent summary wins over the raw transcript; the transcript is
/// only rendered when full-history inclusion is on and no summary exists.
pub fn format_context_section(context: &DebateContext, agent_id: &str) -> String {
    if context.history.is_empty() {
        return String::new();
    }
    if let Some((round_number, summary)) = latest_summary(&context.history, agent_id) {
        return format!(
            "\n\n=== Previous Debate Context ===\n\n[SUMMARY from Round {}]\n{}\n",
            round_number, summary.summary
        );
    }
    if context.include_full_history {
        return format_history(&context.history);
    }
    String::new()
}

/// Most recent round carrying a summary for `agent_id`
pub fn latest_summary<'a>(history: &'a [DebateRound], agent_id: &str) -> Option<(u32, &'a DebateSummary)> {
    history
        .iter()
        .rev()
        .find_map(|round| round.summaries.get(agent_id).map(|s| (round.round_number, s)))
}

/// One line per contribution: `[role] type: preview`
pub fn format_history(history: &[DebateRound]) -> String {
    let rounds: Vec<String> = history
        .iter()
        .filter(|round| !round.contributions.is_empty())
        .map(|round| {
            let lines: Vec<String> = round
                .contributions
                .iter()
                .map(|c| format!("[{}] {}: {}", c.agent_role, c.kind, preview(&c.content, PREVIEW_CHARS)))
                .collect();
            format!("Round {}:\n{}", round.round_number, lines.join("\n"))
        })
        .collect();

    if rounds.is_empty() {
        return String::new();
    }
    format!("\n\n=== Previous Debate Rounds ===\n\n{}\n", rounds.join("\n\n"))
}

/// First non-empty line of `content`, cut to `max_chars` with `...` when longer
pub fn preview(content: &str, max_chars: usize) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    if line.chars().count() > max_chars {
        let cut: String = line.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

/// The slice of history an agent carries: what it wrote plus critiques aimed at it
pub fn agent_perspective(history: &[DebateRound], agent_id: &str) -> String {
    let mut sections = Vec::new();
    for round in history {
        for c in &round.contributions {
            let relevant =
                c.agent_id == agent_id || c.target_agent_id.as_deref() == Some(agent_id);
            if relevant {
                sections.push(format!(
                    "Round {} - {} {}:\n{}",
                    round.round_number, c.agent_role, c.kind, c.content
                ));
            }
        }
    }
    sections.join("\n\n")
}
