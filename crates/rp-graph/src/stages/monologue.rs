//! Stage 5 — Monologue.

use rp_domain::{CancelToken, MonologueOutput, TurnState};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "inner_monologue": {"type": "string"},
            "selected_profile_keys": {"type": "array", "items": {"type": "string"}}
        }
    })
}

pub async fn run(turn: &mut TurnState, invoker: &dyn Invoker, cancel: &CancelToken) {
    let brief = turn.detection.as_ref().map(|d| d.brief.as_str()).unwrap_or_default();
    let prompt = format!("detection brief: {brief}\npersona attributes: {:?}", turn.bot_persona.attributes);
    let request = InvokeRequest::structured("Write a short inner monologue and pick relevant persona keys.", prompt, schema());

    let parsed = match invoker.invoke(Role::Main, request, cancel).await {
        Ok(InvokeResponse::Json(v)) => Some(parse(&v)),
        Ok(InvokeResponse::Text(t)) => rp_invoker::parse_best_effort(&t).map(|v| parse(&v)),
        Err(_) => None,
    };

    match parsed {
        Some(output) => turn.monologue = Some(output),
        None => {
            turn.record_error("Monologue", "StageFallback", "no usable monologue, defaulting to empty");
            turn.monologue = Some(MonologueOutput::default());
        }
    }
}

fn parse(value: &serde_json::Value) -> MonologueOutput {
    MonologueOutput {
        inner_monologue: value.get("inner_monologue").and_then(|v| v.as_str()).unwrap_or_default().to_owned(),
        selected_profile_keys: value
            .get("selected_profile_keys")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_invoker::MockInvoker;
    use uuid::Uuid;

    #[tokio::test]
    async fn falls_back_to_empty_monologue_on_error() {
        let mock = MockInvoker::new();
        let mut t = TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "hi".into());
        let cancel = CancelToken::new();
        run(&mut t, &mock, &cancel).await;
        assert_eq!(t.monologue.unwrap().inner_monologue, "");
        assert_eq!(t.errors.len(), 1);
    }
}
