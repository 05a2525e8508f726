//! Hard gate: deterministic rule checks a candidate `ReplyPlan` must pass
//! before it is worth spending a judge call on.

use rp_domain::ReplyPlan;

pub struct Requirements {
    pub max_messages: usize,
    pub min_first_len: usize,
    pub word_budget: u32,
    pub word_budget_slack: u32,
}

const FORBIDDEN_PATTERNS: [&str; 3] = ["as an ai", "as a language model", "i cannot assist with"];

/// Structural validity, message-count cap, first-message length floor,
/// a word-budget ceiling with slack, and a forbidden-pattern scan for
/// assistant-style boilerplate.
pub fn passes_hard_gate(plan: &ReplyPlan, requirements: &Requirements) -> bool {
    if plan.messages.is_empty() {
        return false;
    }
    if plan.messages.len() > requirements.max_messages {
        return false;
    }
    if plan.messages.iter().any(|m| m.content.trim().is_empty()) {
        return false;
    }

    let first_len = plan.messages[0].content.chars().count();
    if plan.messages.len() > 1 && first_len < requirements.min_first_len {
        return false;
    }

    let total_words: usize = plan.messages.iter().map(|m| m.content.split_whitespace().count()).sum();
    if total_words as u32 > requirements.word_budget + requirements.word_budget_slack {
        return false;
    }

    let lowered: String = plan.messages.iter().map(|m| m.content.to_lowercase()).collect::<Vec<_>>().join(" ");
    if FORBIDDEN_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::SegmentDraft;

    fn reqs() -> Requirements {
        Requirements { max_messages: 4, min_first_len: 2, word_budget: 40, word_budget_slack: 10 }
    }

    fn plan_with(messages: Vec<&str>) -> ReplyPlan {
        ReplyPlan {
            messages: messages.into_iter().map(|c| SegmentDraft { content: c.into(), delay_seconds: None }).collect(),
            attempted_task_ids: vec![],
            completed_task_ids: vec![],
        }
    }

    #[test]
    fn empty_plan_fails() {
        assert!(!passes_hard_gate(&plan_with(vec![]), &reqs()));
    }

    #[test]
    fn too_many_messages_fails() {
        assert!(!passes_hard_gate(&plan_with(vec!["a", "b", "c", "d", "e"]), &reqs()));
    }

    #[test]
    fn forbidden_pattern_fails() {
        assert!(!passes_hard_gate(&plan_with(vec!["As an AI, I can help."]), &reqs()));
    }

    #[test]
    fn reasonable_plan_passes() {
        assert!(passes_hard_gate(&plan_with(vec!["hey there", "how's it going"]), &reqs()));
    }
}
