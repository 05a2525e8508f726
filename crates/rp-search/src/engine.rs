//! The Search Engine: tree search with early exit.

use rp_domain::config::SearchConfig;
use rp_domain::{CancelToken, RelationshipStage, ReplyPlan, StageError, TraceEvent, TurnState};
use rp_invoker::Invoker;

use crate::gate::{passes_hard_gate, Requirements};
use crate::judge::{batch_llm_gate, soft_score, SoftScore};
use crate::plan_gen::{generate_degenerate_plan, generate_plan, generate_variants};
use crate::tree::SearchTree;

pub struct SearchOutcome {
    pub reply_plan: ReplyPlan,
    pub stage_error: Option<StageError>,
}

/// `(R, K)` defaults by relationship-stage class.
fn rollouts_and_expand_k(stage: RelationshipStage) -> (u32, u32) {
    if stage.is_early() {
        (4, 2)
    } else if stage.is_mid() {
        (2, 1)
    } else {
        (3, 1)
    }
}

fn min_rollouts_before_early_exit(stage: RelationshipStage, cfg: &SearchConfig) -> u32 {
    if stage.is_early() {
        cfg.min_rollouts_before_early_exit.early
    } else if stage.is_mid() {
        cfg.min_rollouts_before_early_exit.mid
    } else {
        cfg.min_rollouts_before_early_exit.late
    }
}

/// Strict early-exit check: every breakdown field must be present (a
/// missing field counts as failure, preventing spurious early-exit from
/// malformed judge output).
fn passes_early_exit(score: &SoftScore, cfg: &SearchConfig) -> bool {
    score.overall_score >= cfg.early_exit.root_score
        && score.persona_consistency >= cfg.early_exit.plan_alignment_min
        && score.assistantiness <= cfg.early_exit.assistantiness_max
        && score.mode_behavior_fit >= cfg.early_exit.mode_fit_min
}

pub struct SearchEngine<'a> {
    invoker: &'a dyn Invoker,
    config: &'a SearchConfig,
}

impl<'a> SearchEngine<'a> {
    pub fn new(invoker: &'a dyn Invoker, config: &'a SearchConfig) -> Self {
        Self { invoker, config }
    }

    pub async fn search(
        &self,
        turn: &TurnState,
        context: &str,
        requirements: &Requirements,
        cancel: &CancelToken,
    ) -> SearchOutcome {
        let root_plan = match generate_plan(self.invoker, context, requirements, cancel).await {
            Some(p) => p,
            None => {
                let plan = generate_degenerate_plan(self.invoker, context, cancel).await;
                return SearchOutcome { reply_plan: plan, stage_error: Some(StageError::SearchDegenerate) };
            }
        };

        let stage = turn.current_stage;
        let (rollouts, expand_k) = rollouts_and_expand_k(stage);
        let min_rollouts = min_rollouts_before_early_exit(stage, self.config);

        let (prefetched_variants, root_score) = tokio::join!(
            generate_variants(self.invoker, context, &root_plan, requirements, expand_k, cancel),
            single_score(self.invoker, &root_plan, cancel),
        );

        let mut tree = SearchTree::new(root_plan);

        if let Some(score) = &root_score {
            if min_rollouts == 0 && passes_early_exit(score, self.config) {
                TraceEvent::SearchRollout {
                    turn_id: turn.turn_id,
                    rollout: 0,
                    best_score: score.overall_score,
                    early_exit: true,
                }
                .emit();
                return SearchOutcome { reply_plan: tree.node(tree.root()).plan.clone(), stage_error: None };
            }
        }

        let mut next_expansion = Some(prefetched_variants);
        let mut rollouts_done = 0u32;

        for _ in 0..rollouts {
            if cancel.is_cancelled() {
                break;
            }

            let leaf = tree.select_leaf(self.config.ucb_exploration_constant);
            let leaf_plan = tree.node(leaf).plan.clone();

            let variants = if leaf == tree.root() {
                next_expansion.take().unwrap_or(Vec::new())
            } else {
                generate_variants(self.invoker, context, &leaf_plan, requirements, expand_k, cancel).await
            };
            next_expansion = None;

            let survivors: Vec<ReplyPlan> = variants.into_iter().filter(|p| passes_hard_gate(p, requirements)).collect();
            if survivors.is_empty() {
                continue;
            }

            let gate_results = batch_llm_gate(self.invoker, &survivors, self.config.soft.max_concurrency, cancel).await;
            let gated: Vec<ReplyPlan> = survivors
                .into_iter()
                .zip(gate_results)
                .filter_map(|(plan, ok)| ok.then_some(plan))
                .collect();
            if gated.is_empty() {
                continue;
            }

            let top_n: Vec<ReplyPlan> = gated.into_iter().take(self.config.soft.top_n).collect();
            let scores = soft_score(self.invoker, &top_n, self.config.soft.max_concurrency, cancel).await;

            let mut best: Option<(ReplyPlan, f32)> = None;
            for (plan, score) in top_n.into_iter().zip(scores) {
                if let Some(s) = score {
                    let better = best.as_ref().map(|(_, b)| s.overall_score > *b).unwrap_or(true);
                    if better {
                        best = Some((plan, s.overall_score));
                    }
                }
            }

            let Some((best_child, best_child_score)) = best else { continue };
            let child_idx = tree.add_child(leaf, best_child);
            tree.backpropagate(child_idx, best_child_score);
            rollouts_done += 1;

            let root_path_score = tree.root_path_score();
            let early_exit = rollouts_done >= min_rollouts && root_path_score >= self.config.early_exit.root_score;
            TraceEvent::SearchRollout {
                turn_id: turn.turn_id,
                rollout: rollouts_done,
                best_score: root_path_score,
                early_exit,
            }
            .emit();
            if early_exit {
                break;
            }
        }

        let best_plan = tree.best_plan().clone();
        let final_score = single_score(self.invoker, &best_plan, cancel).await;
        if final_score.map(|s| s.overall_score).unwrap_or(0.0) < self.config.final_score_threshold {
            tracing::warn!(turn_id = %turn.turn_id, "search: final plan below final_score_threshold, returning anyway");
        }

        SearchOutcome { reply_plan: best_plan, stage_error: None }
    }
}

async fn single_score(invoker: &dyn Invoker, plan: &ReplyPlan, cancel: &CancelToken) -> Option<SoftScore> {
    soft_score(invoker, std::slice::from_ref(plan), 1, cancel).await.into_iter().next().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_invoker::{InvokeResponse, MockInvoker, Role};
    use uuid::Uuid;

    fn turn() -> TurnState {
        TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "hi".into())
    }

    fn reqs() -> Requirements {
        Requirements { max_messages: 4, min_first_len: 2, word_budget: 40, word_budget_slack: 10 }
    }

    #[tokio::test]
    async fn root_parse_failure_falls_back_to_degenerate_plan() {
        let mock = MockInvoker::new();
        mock.push_response(Role::Main, InvokeResponse::Json(serde_json::json!({"messages": []})));
        mock.push_response(Role::Main, InvokeResponse::Text("plain fallback reply".into()));
        let cfg = SearchConfig::default();
        let engine = SearchEngine::new(&mock, &cfg);
        let cancel = CancelToken::new();
        let outcome = engine.search(&turn(), "ctx", &reqs(), &cancel).await;
        assert!(matches!(outcome.stage_error, Some(StageError::SearchDegenerate)));
        assert_eq!(outcome.reply_plan.messages[0].content, "plain fallback reply");
    }

    #[tokio::test]
    async fn root_early_exit_returns_root_when_thresholds_pass_and_min_rollouts_zero() {
        let mock = MockInvoker::new();
        mock.push_response(
            Role::Main,
            InvokeResponse::Json(serde_json::json!({"messages": [{"content": "hey!", "delay_seconds": 0.0}]})),
        );
        // prefetch variants (expand_k calls) — supply enough for the mid-stage K=1
        mock.push_response(
            Role::Main,
            InvokeResponse::Json(serde_json::json!({"messages": [{"content": "variant", "delay_seconds": 0.0}]})),
        );
        for _ in 0..2 {
            mock.push_response(
                Role::Judge,
                InvokeResponse::Json(serde_json::json!({
                    "assistantiness": 0.1, "immersion_break": 0.0, "persona_consistency": 0.9,
                    "relationship_fit": 0.9, "mode_behavior_fit": 0.9, "overall_score": 0.95
                })),
            );
        }
        let mut cfg = SearchConfig::default();
        cfg.min_rollouts_before_early_exit.mid = 0;
        let engine = SearchEngine::new(&mock, &cfg);
        let cancel = CancelToken::new();
        let mut t = turn();
        t.current_stage = RelationshipStage::Intensifying;
        let outcome = engine.search(&t, "ctx", &reqs(), &cancel).await;
        assert_eq!(outcome.reply_plan.messages[0].content, "hey!");
        assert!(outcome.stage_error.is_none());
    }
}
