//! Stage 4 — Detection: scores, brief, implied stage, task extraction.

use std::collections::HashMap;

use rp_domain::{CancelToken, DetectionOutput, RelationshipStage, TurnState};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "scores": {"type": "object"},
            "brief": {"type": "string"},
            "implied_stage": {"type": "string"},
            "immediate_tasks": {"type": "array", "items": {"type": "string"}},
            "urgent_tasks": {"type": "array", "items": {"type": "string"}}
        }
    })
}

pub async fn run(turn: &mut TurnState, invoker: &dyn Invoker, cancel: &CancelToken) {
    let recent: String = turn
        .chat_buffer
        .as_slice()
        .iter()
        .rev()
        .take(10)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "relationship dimensions: {:?}\nrecent context:\n{recent}\nlatest message: {}",
        turn.relationship_state.as_array(),
        turn.user_input
    );
    let request = InvokeRequest::structured("Analyze the message for scores, brief, and implied relationship stage.", prompt, schema());

    let parsed = match invoker.invoke(Role::Main, request, cancel).await {
        Ok(InvokeResponse::Json(v)) => Some(parse_detection(&v)),
        Ok(InvokeResponse::Text(t)) => rp_invoker::parse_best_effort(&t).map(|v| parse_detection(&v)),
        Err(_) => None,
    };

    match parsed {
        Some(output) => turn.detection = Some(output),
        None => {
            turn.record_error("Detection", "StageFallback", "no usable detection output, defaulting to zero scores");
            turn.detection = Some(DetectionOutput::default());
        }
    }
}

fn parse_detection(value: &serde_json::Value) -> DetectionOutput {
    let scores: HashMap<String, f32> = value
        .get("scores")
        .and_then(|v| v.as_object())
        .map(|obj| obj.iter().filter_map(|(k, v)| v.as_f64().map(|f| (k.clone(), f as f32))).collect())
        .unwrap_or_default();
    let implied_stage = value
        .get("implied_stage")
        .and_then(|v| v.as_str())
        .and_then(parse_stage_name);
    let str_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    };
    DetectionOutput {
        scores,
        brief: value.get("brief").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
        implied_stage,
        immediate_tasks: str_list("immediate_tasks"),
        urgent_tasks: str_list("urgent_tasks"),
    }
}

fn parse_stage_name(name: &str) -> Option<RelationshipStage> {
    RelationshipStage::ALL_IN_ORDER.into_iter().find(|s| s.to_string() == name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::CancelToken;
    use rp_invoker::MockInvoker;
    use uuid::Uuid;

    fn turn() -> TurnState {
        TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "hello".into())
    }

    #[tokio::test]
    async fn parses_implied_stage_by_name() {
        let mock = MockInvoker::new();
        mock.push_response(
            Role::Main,
            InvokeResponse::Json(serde_json::json!({"brief": "friendly hello", "implied_stage": "experimenting"})),
        );
        let mut t = turn();
        let cancel = CancelToken::new();
        run(&mut t, &mock, &cancel).await;
        assert_eq!(t.detection.unwrap().implied_stage, Some(RelationshipStage::Experimenting));
    }

    #[tokio::test]
    async fn falls_back_to_default_on_invoker_error() {
        let mock = MockInvoker::new();
        let mut t = turn();
        let cancel = CancelToken::new();
        run(&mut t, &mock, &cancel).await;
        assert!(t.detection.is_some());
        assert_eq!(t.errors.len(), 1);
    }
}
