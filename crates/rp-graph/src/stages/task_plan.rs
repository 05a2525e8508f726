//! Stage 7 — TaskPlan.

use rp_domain::{CancelToken, TaskPlanOutput, TurnState};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "word_budget": {"type": "integer"},
            "task_budget_max": {"type": "integer"},
            "tasks_for_lats": {"type": "array", "items": {"type": "string"}}
        }
    })
}

pub async fn run(turn: &mut TurnState, invoker: &dyn Invoker, cancel: &CancelToken) {
    let brief = turn.detection.as_ref().map(|d| d.brief.as_str()).unwrap_or_default();
    let prompt = format!(
        "detection brief: {brief}\nrelationship dimensions: {:?}",
        turn.relationship_state.as_array()
    );
    let request = InvokeRequest::structured("Decide this turn's word budget, task budget, and candidate tasks.", prompt, schema());

    let parsed = match invoker.invoke(Role::Fast, request, cancel).await {
        Ok(InvokeResponse::Json(v)) => parse(&v),
        Ok(InvokeResponse::Text(t)) => rp_invoker::parse_best_effort(&t).and_then(|v| parse(&v)),
        Err(_) => None,
    };

    turn.task_plan = Some(match parsed {
        Some(output) => output.clamped(),
        None => {
            turn.record_error("TaskPlan", "StageFallback", "no usable task plan, defaulting");
            TaskPlanOutput::default()
        }
    });
}

fn parse(value: &serde_json::Value) -> Option<TaskPlanOutput> {
    Some(TaskPlanOutput {
        word_budget: value.get("word_budget")?.as_u64()? as u32,
        task_budget_max: value.get("task_budget_max")?.as_u64()? as u32,
        tasks_for_lats: value
            .get("tasks_for_lats")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
    })
}
