//! `InvokerRegistry`: resolves the per-role `Invoker` configured in
//! `[invoker.endpoints]`, grounded on `sa_providers::registry::ProviderRegistry`
//! — a role/provider-keyed map built once at startup, exposing which roles
//! came up without a working endpoint instead of panicking at the first
//! call site that needs one.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rp_domain::config::InvokerConfig;
use rp_domain::{CancelToken, Error};

use crate::http::HttpInvoker;
use crate::retry::RetryingInvoker;
use crate::traits::{InvokeRequest, InvokeResponse, Invoker, Role};

const ALL_ROLES: [Role; 4] = [Role::Main, Role::Fast, Role::Judge, Role::Processor];

fn role_timeout(config: &InvokerConfig, role: Role) -> Duration {
    let ms = match role {
        Role::Main => config.timeout.main,
        Role::Fast => config.timeout.fast,
        Role::Judge => config.timeout.judge,
        Role::Processor => config.timeout.processor,
    };
    Duration::from_millis(ms)
}

/// One `RetryingInvoker<HttpInvoker>` per configured role. Roles with no
/// `[invoker.endpoints.<role>]` entry have no invoker and every call to
/// them fails fast with `Error::Invoker`; `init_errors()` reports those up
/// front so the binary can log them at startup instead of failing deep
/// inside a turn.
pub struct InvokerRegistry {
    invokers: HashMap<&'static str, RetryingInvoker<HttpInvoker>>,
    init_errors: Vec<String>,
}

impl InvokerRegistry {
    pub fn from_config(config: &InvokerConfig) -> Self {
        let mut invokers = HashMap::new();
        let mut init_errors = Vec::new();

        for role in ALL_ROLES {
            match config.endpoints.get(role.as_str()) {
                Some(endpoint) => {
                    let api_key = endpoint
                        .api_key_env
                        .as_ref()
                        .and_then(|var| std::env::var(var).ok());
                    match HttpInvoker::new(&endpoint.base_url, &endpoint.model, api_key, role_timeout(config, role)) {
                        Ok(invoker) => {
                            invokers.insert(role.as_str(), RetryingInvoker::new(invoker));
                        }
                        Err(err) => {
                            init_errors.push(format!("role {role}: failed to build invoker: {err}"));
                        }
                    }
                }
                None => {
                    init_errors.push(format!("role {role}: no [invoker.endpoints.{role}] configured"));
                }
            }
        }

        Self { invokers, init_errors }
    }

    /// Roles that came up with no working invoker — log these at startup
    /// rather than discover them mid-turn (mirrors
    /// `ProviderRegistry::init_errors`).
    pub fn init_errors(&self) -> &[String] {
        &self.init_errors
    }
}

#[async_trait]
impl Invoker for InvokerRegistry {
    async fn invoke(
        &self,
        role: Role,
        request: InvokeRequest,
        ctx: &CancelToken,
    ) -> rp_domain::Result<InvokeResponse> {
        match self.invokers.get(role.as_str()) {
            Some(invoker) => invoker.invoke(role, request, ctx).await,
            None => Err(Error::Invoker {
                role: role.to_string(),
                message: "no invoker configured for this role".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_reports_an_init_error_per_role() {
        let registry = InvokerRegistry::from_config(&InvokerConfig::default());
        assert_eq!(registry.init_errors().len(), ALL_ROLES.len());
    }

    #[tokio::test]
    async fn unconfigured_role_fails_fast_with_invoker_error() {
        let registry = InvokerRegistry::from_config(&InvokerConfig::default());
        let ctx = CancelToken::new();
        let err = registry
            .invoke(Role::Main, InvokeRequest::plain("sys", "hi"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invoker { .. }));
    }
}
