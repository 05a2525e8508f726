//! Stage 2 — Security, and stage 3 — SecurityReply.

use rp_domain::{CancelToken, SecurityFlags, SegmentAction, TurnState};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

fn schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "needs_security_response": {"type": "boolean"},
            "reasons": {"type": "array", "items": {"type": "string"}}
        }
    })
}

pub async fn run(turn: &mut TurnState, invoker: &dyn Invoker, cancel: &CancelToken) {
    let recent: String = turn
        .chat_buffer
        .as_slice()
        .iter()
        .rev()
        .take(6)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!("recent context:\n{recent}\nlatest message: {}", turn.user_input);
    let request = InvokeRequest::structured("Flag messages that require a safety response.", prompt, schema());

    let flags = match invoker.invoke(Role::Fast, request, cancel).await {
        Ok(InvokeResponse::Json(v)) => Some(parse_flags(&v)),
        Ok(InvokeResponse::Text(t)) => rp_invoker::parse_best_effort(&t).map(|v| parse_flags(&v)),
        Err(_) => None,
    };

    match flags {
        Some(f) => turn.security_flags = f,
        None => {
            turn.record_error("Security", "StageFallback", "no usable security verdict, defaulting to unflagged");
            turn.security_flags = SecurityFlags::default();
        }
    }
}

fn parse_flags(value: &serde_json::Value) -> SecurityFlags {
    SecurityFlags {
        needs_security_response: value.get("needs_security_response").and_then(|v| v.as_bool()).unwrap_or(false),
        reasons: value
            .get("reasons")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
    }
}

/// SecurityReply short-circuits directly to `final_segments`/`final_response`,
/// bypassing Detection..FinalValidate entirely.
pub async fn run_reply(turn: &mut TurnState, invoker: &dyn Invoker, cancel: &CancelToken) {
    let reasons = turn.security_flags.reasons.join("; ");
    let prompt = format!("Write a brief, in-character safety response. Reasons flagged: {reasons}");
    let request = InvokeRequest::plain("Respond safely and briefly, staying in character.", prompt);

    let content = match invoker.invoke(Role::Fast, request, cancel).await {
        Ok(InvokeResponse::Text(t)) => t,
        Ok(InvokeResponse::Json(v)) => v.get("content").and_then(|c| c.as_str()).unwrap_or_default().to_owned(),
        Err(_) => rp_rules::APOLOGY_FALLBACK.to_owned(),
    };

    turn.security_response = Some(content.clone());
    turn.final_response = content.clone();
    turn.final_segments = vec![rp_domain::FinalSegment {
        content,
        delay_seconds: 0.0,
        action: SegmentAction::Idle,
    }];
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_invoker::MockInvoker;
    use uuid::Uuid;

    fn turn() -> TurnState {
        TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "hello".into())
    }

    #[tokio::test]
    async fn flags_when_invoker_says_so() {
        let mock = MockInvoker::new();
        mock.push_response(
            Role::Fast,
            InvokeResponse::Json(serde_json::json!({"needs_security_response": true, "reasons": ["self-harm"]})),
        );
        let mut t = turn();
        let cancel = CancelToken::new();
        run(&mut t, &mock, &cancel).await;
        assert!(t.security_flags.needs_security_response);
        assert_eq!(t.security_flags.reasons, vec!["self-harm".to_string()]);
    }

    #[tokio::test]
    async fn defaults_to_unflagged_on_invoker_error() {
        let mock = MockInvoker::new();
        let mut t = turn();
        let cancel = CancelToken::new();
        run(&mut t, &mock, &cancel).await;
        assert!(!t.security_flags.needs_security_response);
        assert_eq!(t.errors.len(), 1);
    }

    #[tokio::test]
    async fn security_reply_produces_single_idle_segment() {
        let mock = MockInvoker::new();
        mock.push_response(Role::Fast, InvokeResponse::Text("let's talk about something else".into()));
        let mut t = turn();
        t.security_flags.needs_security_response = true;
        let cancel = CancelToken::new();
        run_reply(&mut t, &mock, &cancel).await;
        assert_eq!(t.final_segments.len(), 1);
        assert_eq!(t.final_segments[0].delay_seconds, 0.0);
    }
}
