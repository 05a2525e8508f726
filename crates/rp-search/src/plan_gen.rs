//! Plan generation: root plan, K-variant expansion, and the degenerate
//! plain-text fallback.

use rp_domain::{CancelToken, ReplyPlan, SegmentDraft};
use rp_invoker::{InvokeRequest, InvokeResponse, Invoker, Role};

use crate::gate::Requirements;

fn plan_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "messages": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "content": {"type": "string"},
                        "delay_seconds": {"type": "number"}
                    }
                }
            },
            "attempted_task_ids": {"type": "array", "items": {"type": "string"}},
            "completed_task_ids": {"type": "array", "items": {"type": "string"}}
        }
    })
}

fn parse_plan(value: &serde_json::Value) -> Option<ReplyPlan> {
    let messages = value.get("messages")?.as_array()?;
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        let content = m.get("content")?.as_str()?.to_owned();
        let delay_seconds = m.get("delay_seconds").and_then(|v| v.as_f64()).map(|v| v as f32);
        out.push(SegmentDraft { content, delay_seconds });
    }
    if out.is_empty() {
        return None;
    }
    let str_list = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default()
    };
    Some(ReplyPlan {
        messages: out,
        attempted_task_ids: str_list("attempted_task_ids"),
        completed_task_ids: str_list("completed_task_ids"),
    })
}

fn requirements_prompt(requirements: &Requirements, context: &str) -> String {
    format!(
        "{context}\nconstraints: max_messages={}, min_first_len={}, word_budget={}",
        requirements.max_messages, requirements.min_first_len, requirements.word_budget
    )
}

/// Ask `main` for a single plan matching `requirements`, given `context`
/// (a caller-built summary of persona/history/task plan).
pub async fn generate_plan(
    invoker: &dyn Invoker,
    context: &str,
    requirements: &Requirements,
    cancel: &CancelToken,
) -> Option<ReplyPlan> {
    let request = InvokeRequest::structured(
        "Produce a reply plan as structured chat bubbles matching the given constraints.",
        requirements_prompt(requirements, context),
        plan_schema(),
    );
    let response = invoker.invoke(Role::Main, request, cancel).await.ok()?;
    match response {
        InvokeResponse::Json(v) => parse_plan(&v),
        InvokeResponse::Text(t) => parse_plan(&rp_invoker::parse_best_effort(&t)?),
    }
}

/// Ask `main` for `k` variant plans of `base`, run concurrently.
pub async fn generate_variants(
    invoker: &dyn Invoker,
    context: &str,
    base: &ReplyPlan,
    requirements: &Requirements,
    k: u32,
    cancel: &CancelToken,
) -> Vec<ReplyPlan> {
    let base_text = base.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("\n");
    let variant_context = format!("{context}\nvary this candidate reply:\n{base_text}");
    let mut futures = Vec::with_capacity(k as usize);
    for _ in 0..k {
        futures.push(generate_plan(invoker, &variant_context, requirements, cancel));
    }
    futures_util::future::join_all(futures).await.into_iter().flatten().collect()
}

/// `{messages: [plain-text fallback from main with reduced prompt]}` —
/// the degenerate path when the root plan itself fails to parse.
pub async fn generate_degenerate_plan(invoker: &dyn Invoker, context: &str, cancel: &CancelToken) -> ReplyPlan {
    let request = InvokeRequest::plain("Reply in plain text, briefly.", context);
    let text = match invoker.invoke(Role::Main, request, cancel).await {
        Ok(InvokeResponse::Text(t)) => t,
        Ok(InvokeResponse::Json(v)) => v.to_string(),
        Err(_) => String::new(),
    };
    ReplyPlan {
        messages: vec![SegmentDraft { content: text, delay_seconds: None }],
        attempted_task_ids: Vec::new(),
        completed_task_ids: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::CancelToken;
    use rp_invoker::MockInvoker;

    fn reqs() -> Requirements {
        Requirements { max_messages: 4, min_first_len: 2, word_budget: 40, word_budget_slack: 10 }
    }

    #[tokio::test]
    async fn generate_plan_parses_structured_json_response() {
        let mock = MockInvoker::new();
        mock.push_response(
            Role::Main,
            InvokeResponse::Json(serde_json::json!({"messages": [{"content": "hi", "delay_seconds": 0.0}]})),
        );
        let cancel = CancelToken::new();
        let plan = generate_plan(&mock, "ctx", &reqs(), &cancel).await.unwrap();
        assert_eq!(plan.messages.len(), 1);
        assert_eq!(plan.messages[0].content, "hi");
    }

    #[tokio::test]
    async fn generate_plan_returns_none_on_empty_messages() {
        let mock = MockInvoker::new();
        mock.push_response(Role::Main, InvokeResponse::Json(serde_json::json!({"messages": []})));
        let cancel = CancelToken::new();
        assert!(generate_plan(&mock, "ctx", &reqs(), &cancel).await.is_none());
    }

    #[tokio::test]
    async fn degenerate_plan_wraps_plain_text() {
        let mock = MockInvoker::new();
        mock.push_response(Role::Main, InvokeResponse::Text("sorry, got distracted".into()));
        let cancel = CancelToken::new();
        let plan = generate_degenerate_plan(&mock, "ctx", &cancel).await;
        assert_eq!(plan.messages[0].content, "sorry, got distracted");
    }
}
