//! `InvokerTimeout` local policy: "Retry once (same role); on
//! second failure → fallback." This wraps any [`Invoker`] so stage code
//! never has to implement the retry loop itself.

use async_trait::async_trait;
use rp_domain::{CancelToken, Error};

use crate::traits::{InvokeRequest, InvokeResponse, Invoker, Role};

pub struct RetryingInvoker<I> {
    inner: I,
}

impl<I: Invoker> RetryingInvoker<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I: Invoker> Invoker for RetryingInvoker<I> {
    async fn invoke(
        &self,
        role: Role,
        request: InvokeRequest,
        ctx: &CancelToken,
    ) -> rp_domain::Result<InvokeResponse> {
        match self.inner.invoke(role, request.clone(), ctx).await {
            Ok(response) => Ok(response),
            Err(Error::Timeout(_)) if !ctx.is_cancelled() => {
                tracing::warn!(%role, "invoker call timed out, retrying once");
                self.inner.invoke(role, request, ctx).await
            }
            Err(other) => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyOnce {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Invoker for FlakyOnce {
        async fn invoke(
            &self,
            _role: Role,
            _request: InvokeRequest,
            _ctx: &CancelToken,
        ) -> rp_domain::Result<InvokeResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(Error::Timeout("simulated".into()))
            } else {
                Ok(InvokeResponse::Text("ok".into()))
            }
        }
    }

    #[tokio::test]
    async fn retries_once_after_timeout_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let invoker = RetryingInvoker::new(FlakyOnce { calls: calls.clone() });
        let ctx = CancelToken::new();
        let resp = invoker
            .invoke(Role::Fast, InvokeRequest::plain("sys", "hi"), &ctx)
            .await
            .unwrap();
        assert_eq!(resp.as_text(), Some("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
