//! Generic OpenAI-compatible HTTP invoker.
//!
//! A plain `reqwest::Client`, `Authorization: Bearer` header, and a single
//! error mapper for the transport. There's no provider-kind branching
//! (OpenAI, Azure, Ollama, ...) because every role in this system talks to
//! exactly one OpenAI-compatible endpoint per role, configured by
//! `rp_domain::config::EndpointConfig`.

use std::time::Duration;

use async_trait::async_trait;
use rp_domain::{CancelToken, Error};
use serde_json::json;

use crate::traits::{InvokeRequest, InvokeResponse, Invoker, Role};

fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

pub struct HttpInvoker {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpInvoker {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>, timeout: Duration) -> rp_domain::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            model: model.into(),
            api_key,
            timeout,
        })
    }

    fn build_messages(&self, request: &InvokeRequest) -> Vec<serde_json::Value> {
        let mut out = Vec::with_capacity(request.messages.len() + 2);
        if !request.system.is_empty() {
            out.push(json!({ "role": "system", "content": request.system }));
        }
        for m in &request.messages {
            out.push(json!({ "role": m.role, "content": m.content }));
        }
        out.push(json!({ "role": "user", "content": request.user }));
        out
    }
}

#[async_trait]
impl Invoker for HttpInvoker {
    async fn invoke(
        &self,
        role: Role,
        request: InvokeRequest,
        ctx: &CancelToken,
    ) -> rp_domain::Result<InvokeResponse> {
        if ctx.is_cancelled() {
            return Err(Error::Superseded { turn_id: uuid::Uuid::nil() });
        }

        let wants_json = request.schema.is_some();
        let mut body = json!({
            "model": self.model,
            "messages": self.build_messages(&request),
        });
        if wants_json {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .timeout(self.timeout);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let send_fut = builder.send();
        let response = tokio::select! {
            biased;
            _ = cancellation_watch(ctx) => {
                return Err(Error::Superseded { turn_id: uuid::Uuid::nil() });
            }
            result = send_fut => result.map_err(from_reqwest)?,
        };

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Invoker {
                role: role.to_string(),
                message: format!("{status}: {detail}"),
            });
        }

        let payload: serde_json::Value = response.json().await.map_err(from_reqwest)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| Error::Invoker {
                role: role.to_string(),
                message: "response missing choices[0].message.content".into(),
            })?
            .to_owned();

        if wants_json {
            let value = crate::parse::parse_best_effort(&content).ok_or_else(|| Error::Invoker {
                role: role.to_string(),
                message: "content did not contain parseable JSON".into(),
            })?;
            Ok(InvokeResponse::Json(value))
        } else {
            Ok(InvokeResponse::Text(content))
        }
    }
}

/// Poll the cancellation token while the HTTP call is in flight, so a
/// tripped token wakes an otherwise-blocked request.
async fn cancellation_watch(ctx: &CancelToken) {
    loop {
        if ctx.is_cancelled() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

