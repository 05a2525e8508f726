//! Structured trace events emitted across the `rp-*` crates.
//!
//! One flat `TraceEvent` enum, serialized to JSON
//! and logged through `tracing` rather than routed through a bespoke
//! telemetry pipeline.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_key: String,
        turn_id: uuid::Uuid,
        is_new: bool,
    },
    SessionSuperseded {
        session_key: String,
        superseded_turn_id: uuid::Uuid,
        new_turn_id: uuid::Uuid,
        stage_at_cancel: String,
    },
    SessionEnqueued {
        session_key: String,
        turn_id: uuid::Uuid,
        queue_depth: usize,
    },
    StageCompleted {
        turn_id: uuid::Uuid,
        stage: String,
        duration_ms: u64,
    },
    StageFallback {
        turn_id: uuid::Uuid,
        stage: String,
        reason: String,
    },
    SearchRollout {
        turn_id: uuid::Uuid,
        rollout: u32,
        best_score: f32,
        early_exit: bool,
    },
    RelationshipStageTransition {
        turn_id: uuid::Uuid,
        from: String,
        to: String,
        kind: String,
    },
    TurnCommitted {
        turn_id: uuid::Uuid,
        session_key: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "rp_event");
    }
}
