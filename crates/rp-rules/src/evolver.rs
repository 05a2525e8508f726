//! Evolver: relationship deltas, user-profile updates, and
//! task attempt/completion bookkeeping.

use std::collections::HashMap;

use rp_domain::{ChatBuffer, DetectionOutput, RelationshipDelta, ReplyPlan, DELTA_MAX};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

/// Whether a task counts as "attempted" when the turn fell back to a
/// degenerate/static reply instead of really trying it. Default `true`
/// (see DESIGN.md).
#[derive(Debug, Clone, Copy)]
pub struct EvolverConfig {
    pub mark_attempted_on_fallback: bool,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self { mark_attempted_on_fallback: true }
    }
}

pub struct Evolver<'a> {
    invoker: &'a dyn Invoker,
    config: EvolverConfig,
}

pub struct EvolveOutput {
    pub delta: RelationshipDelta,
    pub user_basic_info_updates: HashMap<String, String>,
    pub user_inferred_profile_updates: HashMap<String, String>,
}

impl<'a> Evolver<'a> {
    pub fn new(invoker: &'a dyn Invoker, config: EvolverConfig) -> Self {
        Self { invoker, config }
    }

    pub async fn evolve(
        &self,
        chat_buffer: &ChatBuffer,
        detection: Option<&DetectionOutput>,
        reply_plan: Option<&ReplyPlan>,
        cancel: &rp_domain::CancelToken,
    ) -> (EvolveOutput, Option<rp_domain::StageError>) {
        let recent: String = chat_buffer
            .as_slice()
            .iter()
            .rev()
            .take(10)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let brief = detection.map(|d| d.brief.clone()).unwrap_or_default();

        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "delta": {"type": "object", "properties": {
                    "closeness": {"type": "number"}, "trust": {"type": "number"},
                    "liking": {"type": "number"}, "respect": {"type": "number"},
                    "warmth": {"type": "number"}, "power": {"type": "number"}
                }},
                "user_basic_info": {"type": "object"},
                "user_inferred_profile": {"type": "object"}
            }
        });
        let user_prompt = format!("recent exchange:\n{recent}\ndetection brief: {brief}");
        let request = InvokeRequest::structured("Infer relationship deltas.", user_prompt, schema);

        match self.invoker.invoke(Role::Fast, request, cancel).await {
            Ok(InvokeResponse::Json(value)) => (parse_evolve_output(&value), None),
            Ok(InvokeResponse::Text(t)) => match rp_invoker::parse_best_effort(&t) {
                Some(value) => (parse_evolve_output(&value), None),
                None => (
                    EvolveOutput {
                        delta: RelationshipDelta::default(),
                        user_basic_info_updates: HashMap::new(),
                        user_inferred_profile_updates: HashMap::new(),
                    },
                    Some(rp_domain::StageError::StageFallback { stage: "Evolve".into() }),
                ),
            },
            Err(_) => (
                EvolveOutput {
                    delta: RelationshipDelta::default(),
                    user_basic_info_updates: HashMap::new(),
                    user_inferred_profile_updates: HashMap::new(),
                },
                Some(rp_domain::StageError::StageFallback { stage: "Evolve".into() }),
            ),
        }
    }

    /// Which `tasks_for_lats` were attempted/completed this turn, per
    /// `reply_plan.{attempted,completed}_task_ids`, with
    /// O1's fallback-attribution rule applied when the reply itself was a
    /// degenerate fallback (no attempted ids reported at all despite tasks
    /// having been offered).
    pub fn attempted_ids(&self, reply_plan: Option<&ReplyPlan>, offered_task_ids: &[String]) -> Vec<String> {
        match reply_plan {
            Some(plan) if !plan.attempted_task_ids.is_empty() => plan.attempted_task_ids.clone(),
            _ if self.config.mark_attempted_on_fallback => offered_task_ids.to_vec(),
            _ => Vec::new(),
        }
    }

    pub fn completed_ids(&self, reply_plan: Option<&ReplyPlan>) -> Vec<String> {
        reply_plan.map(|p| p.completed_task_ids.clone()).unwrap_or_default()
    }
}

fn parse_evolve_output(value: &serde_json::Value) -> EvolveOutput {
    let d = &value["delta"];
    let field = |k: &str| d.get(k).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
    let delta = RelationshipDelta {
        closeness: field("closeness").clamp(-DELTA_MAX, DELTA_MAX),
        trust: field("trust").clamp(-DELTA_MAX, DELTA_MAX),
        liking: field("liking").clamp(-DELTA_MAX, DELTA_MAX),
        respect: field("respect").clamp(-DELTA_MAX, DELTA_MAX),
        warmth: field("warmth").clamp(-DELTA_MAX, DELTA_MAX),
        power: field("power").clamp(-DELTA_MAX, DELTA_MAX),
    };
    let to_map = |v: &serde_json::Value| -> HashMap<String, String> {
        v.as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                    .collect()
            })
            .unwrap_or_default()
    };
    EvolveOutput {
        delta,
        user_basic_info_updates: to_map(&value["user_basic_info"]),
        user_inferred_profile_updates: to_map(&value["user_inferred_profile"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::CancelToken;
    use rp_invoker::MockInvoker;

    #[tokio::test]
    async fn falls_back_to_zero_delta_on_unparseable_response() {
        let mock = MockInvoker::new();
        mock.push_response(Role::Fast, InvokeResponse::Text("not json".into()));
        let evolver = Evolver::new(&mock, EvolverConfig::default());
        let cancel = CancelToken::new();
        let (output, err) = evolver.evolve(&ChatBuffer::default(), None, None, &cancel).await;
        assert_eq!(output.delta.closeness, 0.0);
        assert!(err.is_some());
    }

    #[test]
    fn attempted_ids_falls_back_to_offered_when_configured() {
        let mock = MockInvoker::new();
        let evolver = Evolver::new(&mock, EvolverConfig { mark_attempted_on_fallback: true });
        let offered = vec!["t1".to_string()];
        assert_eq!(evolver.attempted_ids(None, &offered), offered);
    }

    #[test]
    fn attempted_ids_respects_disabled_fallback() {
        let mock = MockInvoker::new();
        let evolver = Evolver::new(&mock, EvolverConfig { mark_attempted_on_fallback: false });
        let offered = vec!["t1".to_string()];
        assert!(evolver.attempted_ids(None, &offered).is_empty());
    }
}
