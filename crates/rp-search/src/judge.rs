//! Batch LLM gate and soft scorer, both via the `judge` invoker role
//!, bounded by a `soft_max_concurrency` semaphore.

use std::sync::Arc;

use rp_domain::{CancelToken, ReplyPlan};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy)]
pub struct GateVerdict {
    pub assistantiness_ok: bool,
    pub identity_ok: bool,
    pub immersion_ok: bool,
}

impl GateVerdict {
    pub fn passes(&self) -> bool {
        self.assistantiness_ok && self.identity_ok && self.immersion_ok
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SoftScore {
    pub assistantiness: f32,
    pub immersion_break: f32,
    pub persona_consistency: f32,
    pub relationship_fit: f32,
    pub mode_behavior_fit: f32,
    pub overall_score: f32,
}

impl SoftScore {
    /// Hard rule: if `assistantiness > 0.5` or `immersion_break > 0.2`,
    /// clamp `overall_score` below `0.3`.
    fn clamp_overall(mut self) -> Self {
        if self.assistantiness > 0.5 || self.immersion_break > 0.2 {
            self.overall_score = self.overall_score.min(0.29);
        }
        self
    }
}

fn gate_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "assistantiness_ok": {"type": "boolean"},
            "identity_ok": {"type": "boolean"},
            "immersion_ok": {"type": "boolean"}
        }
    })
}

fn soft_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "assistantiness": {"type": "number"},
            "immersion_break": {"type": "number"},
            "persona_consistency": {"type": "number"},
            "relationship_fit": {"type": "number"},
            "mode_behavior_fit": {"type": "number"},
            "overall_score": {"type": "number"}
        }
    })
}

fn plan_text(plan: &ReplyPlan) -> String {
    plan.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n")
}

/// Run the batch LLM gate on every candidate concurrently, bounded by
/// `max_concurrency`. A candidate whose judge call errors or fails to
/// parse is treated as not passing (discarded per §4.2's error policy).
pub async fn batch_llm_gate(
    invoker: &dyn Invoker,
    candidates: &[ReplyPlan],
    max_concurrency: usize,
    cancel: &CancelToken,
) -> Vec<bool> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futures = Vec::with_capacity(candidates.len());
    for plan in candidates {
        let sem = semaphore.clone();
        let text = plan_text(plan);
        futures.push(async move {
            let _permit = sem.acquire().await.expect("semaphore never closed");
            judge_gate_one(invoker, &text, cancel).await
        });
    }
    futures_util::future::join_all(futures).await
}

async fn judge_gate_one(invoker: &dyn Invoker, text: &str, cancel: &CancelToken) -> bool {
    let request = InvokeRequest::structured(
        "Judge whether this reply stays in character and avoids assistant-speak.",
        text,
        gate_schema(),
    );
    let response = match invoker.invoke(Role::Judge, request, cancel).await {
        Ok(r) => r,
        Err(_) => return false,
    };
    let value = match response {
        InvokeResponse::Json(v) => v,
        InvokeResponse::Text(t) => match rp_invoker::parse_best_effort(&t) {
            Some(v) => v,
            None => return false,
        },
    };
    let verdict = GateVerdict {
        assistantiness_ok: value.get("assistantiness_ok").and_then(|v| v.as_bool()).unwrap_or(false),
        identity_ok: value.get("identity_ok").and_then(|v| v.as_bool()).unwrap_or(false),
        immersion_ok: value.get("immersion_ok").and_then(|v| v.as_bool()).unwrap_or(false),
    };
    verdict.passes()
}

/// Score the top-N survivors with the soft scorer, bounded the same way.
pub async fn soft_score(
    invoker: &dyn Invoker,
    candidates: &[ReplyPlan],
    max_concurrency: usize,
    cancel: &CancelToken,
) -> Vec<Option<SoftScore>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut futures = Vec::with_capacity(candidates.len());
    for plan in candidates {
        let sem = semaphore.clone();
        let text = plan_text(plan);
        futures.push(async move {
            let _permit = sem.acquire().await.expect("semaphore never closed");
            soft_score_one(invoker, &text, cancel).await
        });
    }
    futures_util::future::join_all(futures).await
}

async fn soft_score_one(invoker: &dyn Invoker, text: &str, cancel: &CancelToken) -> Option<SoftScore> {
    let request = InvokeRequest::structured(
        "Score this candidate reply on assistantiness, immersion break, persona consistency, relationship fit, and mode/behavior fit.",
        text,
        soft_schema(),
    );
    let response = invoker.invoke(Role::Judge, request, cancel).await.ok()?;
    let value = match response {
        InvokeResponse::Json(v) => v,
        InvokeResponse::Text(t) => rp_invoker::parse_best_effort(&t)?,
    };
    let field = |k: &str| value.get(k).and_then(|v| v.as_f64()).map(|v| v as f32);
    Some(
        SoftScore {
            assistantiness: field("assistantiness")?,
            immersion_break: field("immersion_break")?,
            persona_consistency: field("persona_consistency")?,
            relationship_fit: field("relationship_fit")?,
            mode_behavior_fit: field("mode_behavior_fit")?,
            overall_score: field("overall_score")?,
        }
        .clamp_overall(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::SegmentDraft;
    use rp_invoker::MockInvoker;

    fn plan(content: &str) -> ReplyPlan {
        ReplyPlan {
            messages: vec![SegmentDraft { content: content.into(), delay_seconds: None }],
            attempted_task_ids: vec![],
            completed_task_ids: vec![],
        }
    }

    #[test]
    fn clamp_overall_enforces_hard_rule_on_high_assistantiness() {
        let score = SoftScore {
            assistantiness: 0.9,
            immersion_break: 0.0,
            persona_consistency: 0.5,
            relationship_fit: 0.5,
            mode_behavior_fit: 0.5,
            overall_score: 0.95,
        }
        .clamp_overall();
        assert!(score.overall_score < 0.3);
    }

    #[tokio::test]
    async fn batch_gate_drops_candidate_on_invoker_error() {
        let mock = MockInvoker::new();
        let cancel = CancelToken::new();
        let results = batch_llm_gate(&mock, &[plan("hi")], 2, &cancel).await;
        assert_eq!(results, vec![false]);
    }

    #[tokio::test]
    async fn batch_gate_passes_when_all_flags_true() {
        let mock = MockInvoker::new();
        mock.push_response(
            Role::Judge,
            InvokeResponse::Json(serde_json::json!({"assistantiness_ok": true, "identity_ok": true, "immersion_ok": true})),
        );
        let cancel = CancelToken::new();
        let results = batch_llm_gate(&mock, &[plan("hi")], 2, &cancel).await;
        assert_eq!(results, vec![true]);
    }
}
