//! The Invoker contract.
//!
//! One async method, a request/response pair, and a capability query —
//! collapsed around a single `role`-keyed call instead of per-provider
//! chat/stream/embeddings methods, since every call site in this system
//! wants exactly one shape: "ask this role for JSON or text, honoring
//! cancellation."

use async_trait::async_trait;
use rp_domain::CancelToken;
use serde_json::Value;

/// The four roles a call can be made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Main,
    Fast,
    Judge,
    Processor,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Main => "main",
            Role::Fast => "fast",
            Role::Judge => "judge",
            Role::Processor => "processor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

/// `{ system, messages, user }`.
#[derive(Debug, Clone)]
pub struct InvokeRequest {
    pub system: String,
    pub messages: Vec<PromptMessage>,
    pub user: String,
    /// `Some` when the caller wants structured output validated against a
    /// JSON schema; `None` for a plain-text reply.
    pub schema: Option<Value>,
}

impl InvokeRequest {
    pub fn plain(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
            user: user.into(),
            schema: None,
        }
    }

    pub fn structured(system: impl Into<String>, user: impl Into<String>, schema: Value) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
            user: user.into(),
            schema: Some(schema),
        }
    }

    pub fn with_history(mut self, messages: Vec<PromptMessage>) -> Self {
        self.messages = messages;
        self
    }
}

#[derive(Debug, Clone)]
pub enum InvokeResponse {
    Text(String),
    Json(Value),
}

impl InvokeResponse {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InvokeResponse::Text(s) => Some(s),
            InvokeResponse::Json(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            InvokeResponse::Json(v) => Some(v),
            InvokeResponse::Text(_) => None,
        }
    }
}

/// Implementations MUST cancel in-flight requests when `ctx` is tripped.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        role: Role,
        request: InvokeRequest,
        ctx: &CancelToken,
    ) -> rp_domain::Result<InvokeResponse>;
}
