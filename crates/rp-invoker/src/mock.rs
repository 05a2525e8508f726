//! A scripted [`Invoker`] for tests: returns queued responses per role in
//! order, and records every request it saw.

use std::sync::Mutex;

use async_trait::async_trait;
use rp_domain::{CancelToken, Error};

use crate::traits::{InvokeRequest, InvokeResponse, Invoker, Role};

pub struct MockInvoker {
    queued: Mutex<std::collections::HashMap<Role, std::collections::VecDeque<InvokeResponse>>>,
    seen: Mutex<Vec<(Role, InvokeRequest)>>,
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self {
            queued: Mutex::new(std::collections::HashMap::new()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, role: Role, response: InvokeResponse) {
        self.queued
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(response);
    }

    pub fn calls_for(&self, role: Role) -> usize {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == role)
            .count()
    }
}

#[async_trait]
impl Invoker for MockInvoker {
    async fn invoke(
        &self,
        role: Role,
        request: InvokeRequest,
        ctx: &CancelToken,
    ) -> rp_domain::Result<InvokeResponse> {
        if ctx.is_cancelled() {
            return Err(Error::Superseded { turn_id: uuid::Uuid::nil() });
        }
        self.seen.lock().unwrap().push((role, request));
        let mut queued = self.queued.lock().unwrap();
        queued
            .get_mut(&role)
            .and_then(|q| q.pop_front())
            .ok_or_else(|| Error::Invoker {
                role: role.to_string(),
                message: "MockInvoker has no queued response for this role".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_queued_responses_in_order() {
        let mock = MockInvoker::new();
        mock.push_response(Role::Fast, InvokeResponse::Text("first".into()));
        mock.push_response(Role::Fast, InvokeResponse::Text("second".into()));
        let ctx = CancelToken::new();

        let a = mock
            .invoke(Role::Fast, InvokeRequest::plain("s", "u"), &ctx)
            .await
            .unwrap();
        let b = mock
            .invoke(Role::Fast, InvokeRequest::plain("s", "u"), &ctx)
            .await
            .unwrap();
        assert_eq!(a.as_text(), Some("first"));
        assert_eq!(b.as_text(), Some("second"));
        assert_eq!(mock.calls_for(Role::Fast), 2);
    }

    #[tokio::test]
    async fn cancelled_context_short_circuits() {
        let mock = MockInvoker::new();
        let ctx = CancelToken::new();
        ctx.cancel();
        let err = mock
            .invoke(Role::Main, InvokeRequest::plain("s", "u"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Superseded { .. }));
    }
}
