//! Role strategies: the prompts that make an agent an architect, a security reviewer, ...

use crate::types::AgentRole;
use std::sync::Arc;

/// Supplies every prompt an agent renders. Roles differ in their system prompt,
/// their focus areas and what their summaries must preserve; the templates are shared.
pub trait RoleStrategy: Send + Sync {
    /// Role this strategy speaks for
    fn role(&self) -> AgentRole;

    /// Default system prompt
    fn system_prompt(&self) -> &'static str;

    /// Aspects the role evaluates, woven into proposal and critique prompts
    fn focus(&self) -> &'static str;

    /// What a summary written by this role must keep
    fn summary_emphasis(&self) -> &'static str;

    fn proposal_prompt(&self, problem: &str) -> String {
        format!(
            "Problem to solve:\n{problem}\n\n\
             As a {role} expert, propose a complete solution. Focus on {focus}.\n\n\
             Structure your answer with:\n\
             - Overview\n\
             - Key decisions and their rationale\n\
             - Risks and how they are mitigated",
            role = self.role(),
            focus = self.focus(),
        )
    }

    fn critique_prompt(&self, proposal: &str) -> String {
        format!(
            "Review the following proposal from your {role} perspective, focusing on {focus}.\n\n\
             Proposal:\n{proposal}\n\n\
             Identify strengths, weaknesses and concrete improvements. Be specific.",
            role = self.role(),
            focus = self.focus(),
        )
    }

    fn refinement_prompt(&self, original: &str, critiques: &[String]) -> String {
        let critiques = if critiques.is_empty() {
            "(no critiques received)".to_string()
        } else {
            critiques
                .iter()
                .enumerate()
                .map(|(i, c)| format!("Critique {}:\n{}", i + 1, c))
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        format!(
            "Your original proposal:\n{original}\n\n\
             Critiques received:\n{critiques}\n\n\
             Refine your proposal. Address valid concerns, defend decisions you still \
             believe in, and keep the focus on {focus}. Return the complete refined proposal.",
            focus = self.focus(),
        )
    }

    fn summarization_prompt(&self, content: &str, max_length: usize) -> String {
        format!(
            "Summarize the debate history below from a {role} perspective. Preserve {emphasis}. \
             Drop repetition and pleasantries.\n\n\
             The summary must not exceed {max_length} characters.\n\n\
             Debate history:\n{content}",
            role = self.role(),
            emphasis = self.summary_emphasis(),
        )
    }

    fn clarification_prompt(&self, problem: &str) -> String {
        format!(
            "Problem:\n{problem}\n\n\
             Before proposing a solution, list up to 5 clarifying questions a {role} expert \
             would need answered, focusing on {focus}. If nothing is unclear, return an empty list.\n\n\
             Respond with JSON only: {{\"questions\": [{{\"text\": \"...\"}}]}}",
            role = self.role(),
            focus = self.focus(),
        )
    }
}

pub struct ArchitectStrategy;

impl RoleStrategy for ArchitectStrategy {
    fn role(&self) -> AgentRole {
        AgentRole::Architect
    }

    fn system_prompt(&self) -> &'static str {
        "You are an expert software architect. You design systems as clear components with \
         well-defined interfaces, reason about scalability and maintainability, and justify \
         every structural decision."
    }

    fn focus(&self) -> &'static str {
        "components, interfaces, data flow and overall design"
    }

    fn summary_emphasis(&self) -> &'static str {
        "architectural decisions, components, design trade-offs and unresolved design questions"
    }
}

pub struct SecurityStrategy;

impl RoleStrategy for SecurityStrategy {
    fn role(&self) -> AgentRole {
        AgentRole::Security
    }

    fn system_prompt(&self) -> &'static str {
        "You are a security engineer. You model threats, look for vulnerabilities and insist \
         on authentication, authorization, data protection and safe failure modes."
    }

    fn focus(&self) -> &'static str {
        "threats, vulnerabilities, authentication and data protection"
    }

    fn summary_emphasis(&self) -> &'static str {
        "identified threats, vulnerabilities, agreed mitigations and open security risks"
    }
}

pub struct PerformanceStrategy;

impl RoleStrategy for PerformanceStrategy {
    fn role(&self) -> AgentRole {
        AgentRole::Performance
    }

    fn system_prompt(&self) -> &'static str {
        "You are a performance engineer. You reason about latency, throughput, resource usage \
         and how designs behave under load."
    }

    fn focus(&self) -> &'static str {
        "latency, throughput, resource usage and scalability under load"
    }

    fn summary_emphasis(&self) -> &'static str {
        "latency and throughput targets, bottlenecks, caching and optimization decisions"
    }
}

pub struct TestingStrategy;

impl RoleStrategy for TestingStrategy {
    fn role(&self) -> AgentRole {
        AgentRole::Testing
    }

    fn system_prompt(&self) -> &'static str {
        "You are a quality engineer. You care about testability, verification strategy and \
         how failures are detected before they reach production."
    }

    fn focus(&self) -> &'static str {
        "testability, test strategy, edge cases and observability"
    }

    fn summary_emphasis(&self) -> &'static str {
        "test strategy, coverage gaps, edge cases and verification decisions"
    }
}

pub struct GeneralistStrategy;

impl RoleStrategy for GeneralistStrategy {
    fn role(&self) -> AgentRole {
        AgentRole::Generalist
    }

    fn system_prompt(&self) -> &'static str {
        "You are a pragmatic senior engineer. You weigh competing concerns and favour simple, \
         well-reasoned solutions."
    }

    fn focus(&self) -> &'static str {
        "overall feasibility, simplicity and balance between competing concerns"
    }

    fn summary_emphasis(&self) -> &'static str {
        "key decisions, points of agreement and disagreement, and open questions"
    }
}

/// Built-in strategy for `role`
pub fn strategy_for(role: AgentRole) -> Arc<dyn RoleStrategy> {
    match role {
        AgentRole::Architect => Arc::new(ArchitectStrategy),
        AgentRole::Security => Arc::new(SecurityStrategy),
        AgentRole::Performance => Arc::new(PerformanceStrategy),
        AgentRole::Testing => Arc::new(TestingStrategy),
        AgentRole::Generalist => Arc::new(GeneralistStrategy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarization_prompts_use_role_keywords() {
        let architect = strategy_for(AgentRole::Architect).summarization_prompt("h", 2500);
        let performance = strategy_for(AgentRole::Performance).summarization_prompt("h", 2500);
        let security = strategy_for(AgentRole::Security).summarization_prompt("h", 2500);

        assert!(architect.contains("components") && architect.contains("design"));
        assert!(performance.contains("latency") && performance.contains("throughput"));
        assert!(security.contains("threats") && security.contains("vulnerabilities"));
        assert!(architect.contains("2500 characters"));
    }

    #[test]
    fn test_strategy_matches_role() {
        for role in [
            AgentRole::Architect,
            AgentRole::Security,
            AgentRole::Performance,
            AgentRole::Testing,
            AgentRole::Generalist,
        ] {
            assert_eq!(strategy_for(role).role(), role);
        }
    }

    #[test]
    fn test_refinement_prompt_lists_critiques() {
        let prompt = TestingStrategy.refinement_prompt(
            "original plan",
            &["too slow".to_string(), "no auth".to_string()],
        );
        assert!(prompt.contains("Critique 1:\ntoo slow"));
        assert!(prompt.contains("Critique 2:\nno auth"));
        assert!(TestingStrategy
            .refinement_prompt("p", &[])
            .contains("(no critiques received)"));
    }
}
