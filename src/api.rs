//! The thin HTTP adapter for the internal Turn API contract.
//!
//! Shaped like a typical `axum` API module (one
//! `router()` function, handlers taking `State<AppState>` plus a `Json`
//! body); this adapter does no business logic of its own — it only
//! translates between HTTP and `SessionController::submit`.

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::post;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rp_domain::{FinalSegment, SegmentAction};
use rp_sessions::TurnResult;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/turn", post(post_turn))
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub user_id: Uuid,
    pub bot_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub client_turn_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Success,
    Superseded,
    Error,
}

#[derive(Debug, Serialize)]
pub struct SegmentResponse {
    pub content: String,
    pub delay_seconds: f32,
    pub action: &'static str,
}

impl From<&FinalSegment> for SegmentResponse {
    fn from(segment: &FinalSegment) -> Self {
        Self {
            content: segment.content.clone(),
            delay_seconds: segment.delay_seconds,
            action: match segment.action {
                SegmentAction::Typing => "typing",
                SegmentAction::Idle => "idle",
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub status: TurnStatus,
    pub segments: Vec<SegmentResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_delay_seconds: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /turn`: "superseded MUST be returned ... the client
/// treats this as not-a-failure" — note the handler always answers `200`;
/// the distinction lives in the `status` field, not the HTTP status code,
/// since a superseded turn is not itself an error.
async fn post_turn(State(state): State<AppState>, Json(req): Json<TurnRequest>) -> impl IntoResponse {
    let rx = state.sessions.submit(req.user_id, req.bot_id, req.message).await;

    let response = match rx.await {
        Ok(TurnResult::Success { segments, user_created_at, ai_created_at, macro_delay_seconds, .. }) => {
            TurnResponse {
                status: TurnStatus::Success,
                segments: segments.iter().map(SegmentResponse::from).collect(),
                macro_delay_seconds,
                user_created_at,
                ai_created_at,
                error: None,
            }
        }
        Ok(TurnResult::Superseded) => TurnResponse {
            status: TurnStatus::Superseded,
            segments: Vec::new(),
            macro_delay_seconds: None,
            user_created_at: None,
            ai_created_at: None,
            error: None,
        },
        Ok(TurnResult::Error(message)) => TurnResponse {
            status: TurnStatus::Error,
            segments: Vec::new(),
            macro_delay_seconds: None,
            user_created_at: None,
            ai_created_at: None,
            error: Some(message),
        },
        Err(_) => TurnResponse {
            status: TurnStatus::Error,
            segments: Vec::new(),
            macro_delay_seconds: None,
            user_created_at: None,
            ai_created_at: None,
            error: Some("turn worker dropped its reply channel".into()),
        },
    };

    Json(response)
}
