//! `TurnState` — the single value threaded through every stage of the
//! graph executor.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bot::{BigFive, BotBasicInfo, BotPersona};
use crate::memory::{ChatBuffer, RetrievedMemory};
use crate::mood::MoodState;
use crate::relationship::{RelationshipStage, RelationshipState};
use crate::user::{UserBasicInfo, UserInferredProfile};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Security
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityFlags {
    pub needs_security_response: bool,
    pub reasons: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Detection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Output of the Detection stage: scores, a brief, a stage judgment, and
/// any tasks the message raises.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DetectionOutput {
    /// Free-form named scores (e.g. "affection", "hostility", "urgency").
    pub scores: HashMap<String, f32>,
    /// A short natural-language brief of what the user said/wants.
    pub brief: String,
    /// Detection's own judgment of which relationship stage the exchange
    /// implies — the only thing that can authorize a StageManager JUMP.
    pub implied_stage: Option<RelationshipStage>,
    pub immediate_tasks: Vec<String>,
    pub urgent_tasks: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Monologue / TaskPlan
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonologueOutput {
    pub inner_monologue: String,
    pub selected_profile_keys: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlanOutput {
    /// `0..=60`.
    pub word_budget: u32,
    /// `0..=2`.
    pub task_budget_max: u32,
    pub tasks_for_lats: Vec<String>,
}

impl Default for TaskPlanOutput {
    fn default() -> Self {
        Self {
            word_budget: 40,
            task_budget_max: 1,
            tasks_for_lats: Vec::new(),
        }
    }
}

impl TaskPlanOutput {
    /// Clamp `word_budget`/`task_budget_max` to their declared ranges
    /// — called wherever a stage writes this struct.
    pub fn clamped(mut self) -> Self {
        self.word_budget = self.word_budget.min(60);
        self.task_budget_max = self.task_budget_max.min(2);
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search output: ReplyPlan / SegmentDraft
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One bubble, either a raw candidate segment from Search or a finalized
/// segment ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDraft {
    pub content: String,
    /// `None` when Search produced an unsegmented plain-text reply and
    /// delay/timing is left to the Segment Processor's rule-split path.
    pub delay_seconds: Option<f32>,
}

/// The chosen output of Search.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReplyPlan {
    pub messages: Vec<SegmentDraft>,
    pub attempted_task_ids: Vec<String>,
    pub completed_task_ids: Vec<String>,
}

impl ReplyPlan {
    /// A ReplyPlan "has segmented messages with delays" when every message
    /// carries an explicit delay and there are at least two of them — this
    /// is the condition the Segment Processor uses to decide whether to
    /// skip the `processor` invoker (see DESIGN.md).
    pub fn is_pre_segmented(&self) -> bool {
        self.messages.len() >= 2 && self.messages.iter().all(|m| m.delay_seconds.is_some())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Final segments
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentAction {
    Typing,
    Idle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSegment {
    pub content: String,
    pub delay_seconds: f32,
    pub action: SegmentAction,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnState
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The single value threaded through all stages of one turn.
///
/// Cancellation is deliberately NOT a field here: the session controller
/// (`rp-sessions`) owns the `CancelToken` and passes it alongside the
/// `TurnState` to the executor, so this crate (the shared type crate every
/// other crate depends on) never has to depend on the session crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    // ── Control ──────────────────────────────────────────────────
    pub turn_id: uuid::Uuid,
    pub parent_turn_id: Option<uuid::Uuid>,
    pub bot_id: uuid::Uuid,
    pub user_id: uuid::Uuid,

    // ── Identity ─────────────────────────────────────────────────
    pub bot_basic_info: BotBasicInfo,
    pub bot_big_five: BigFive,
    pub bot_persona: BotPersona,

    // ── Perception ───────────────────────────────────────────────
    pub user_basic_info: UserBasicInfo,
    pub user_inferred_profile: UserInferredProfile,

    // ── Physics ──────────────────────────────────────────────────
    pub relationship_state: RelationshipState,
    pub mood_state: MoodState,
    pub current_stage: RelationshipStage,

    // ── Memory ───────────────────────────────────────────────────
    pub chat_buffer: ChatBuffer,
    pub conversation_summary: String,
    pub retrieved_memories: Vec<RetrievedMemory>,

    /// The bot's outstanding task backlog, loaded at `Load` and rewritten
    /// at `Persist` once this turn's reply plan has attempted/completed
    /// against it. Bot-owned, not user-owned: the same backlog is visible
    /// across every user the bot talks to.
    pub urgent_tasks: Vec<String>,

    // ── Turn IO ──────────────────────────────────────────────────
    pub user_input: String,
    pub detection: Option<DetectionOutput>,
    pub monologue: Option<MonologueOutput>,
    pub task_plan: Option<TaskPlanOutput>,
    pub reply_plan: Option<ReplyPlan>,
    pub final_segments: Vec<FinalSegment>,
    pub final_response: String,
    pub security_flags: SecurityFlags,
    pub security_response: Option<String>,
    /// `Some` only for a macro-delayed turn.
    pub macro_delay_seconds: Option<f32>,

    // ── Diagnostics ──────────────
    pub errors: Vec<TurnErrorRecord>,

    pub created_at: DateTime<Utc>,

    /// Set once `Persist` commits, for the Turn API's `user_created_at` /
    /// `ai_created_at` fields. `None` until then.
    pub user_message_created_at: Option<DateTime<Utc>>,
    pub ai_message_created_at: Option<DateTime<Utc>>,
}

/// A single absorbed stage error, recorded for the ai message's
/// `metadata` at persist time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnErrorRecord {
    pub stage: String,
    pub kind: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl TurnState {
    pub fn new(
        turn_id: uuid::Uuid,
        parent_turn_id: Option<uuid::Uuid>,
        bot_id: uuid::Uuid,
        user_id: uuid::Uuid,
        user_input: String,
    ) -> Self {
        Self {
            turn_id,
            parent_turn_id,
            bot_id,
            user_id,
            bot_basic_info: BotBasicInfo {
                name: String::new(),
                age: None,
                occupation: None,
                speaking_style: None,
            },
            bot_big_five: BigFive::default(),
            bot_persona: BotPersona::default(),
            user_basic_info: UserBasicInfo::default(),
            user_inferred_profile: UserInferredProfile::default(),
            relationship_state: RelationshipState::default(),
            mood_state: MoodState::default(),
            current_stage: RelationshipStage::default(),
            chat_buffer: ChatBuffer::default(),
            conversation_summary: String::new(),
            retrieved_memories: Vec::new(),
            urgent_tasks: Vec::new(),
            user_input,
            detection: None,
            monologue: None,
            task_plan: None,
            reply_plan: None,
            final_segments: Vec::new(),
            final_response: String::new(),
            security_flags: SecurityFlags::default(),
            security_response: None,
            macro_delay_seconds: None,
            errors: Vec::new(),
            created_at: Utc::now(),
            user_message_created_at: None,
            ai_message_created_at: None,
        }
    }

    /// Record an absorbed [`crate::error::StageError`].
    pub fn record_error(&mut self, stage: &str, kind: &str, detail: impl Into<String>) {
        let detail = detail.into();
        self.errors.push(TurnErrorRecord {
            stage: stage.to_owned(),
            kind: kind.to_owned(),
            detail: detail.clone(),
            at: Utc::now(),
        });
        tracing::warn!(turn_id = %self.turn_id, stage, kind, "absorbed stage error");
        crate::trace::TraceEvent::StageFallback {
            turn_id: self.turn_id,
            stage: stage.to_owned(),
            reason: detail,
        }
        .emit();
    }

    /// Merge another user message into this turn's input, preserving text
    /// order.
    pub fn merge_input(&mut self, additional: &str) {
        self.user_input.push('\n');
        self.user_input.push_str(additional);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> TurnState {
        TurnState::new(
            uuid::Uuid::new_v4(),
            None,
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            "hello".into(),
        )
    }

    #[test]
    fn merge_input_preserves_order() {
        let mut s = state();
        s.merge_input("world");
        assert_eq!(s.user_input, "hello\nworld");
    }

    #[test]
    fn pre_segmented_requires_two_plus_with_delays() {
        let mut plan = ReplyPlan::default();
        plan.messages.push(SegmentDraft { content: "a".into(), delay_seconds: Some(0.0) });
        assert!(!plan.is_pre_segmented());
        plan.messages.push(SegmentDraft { content: "b".into(), delay_seconds: Some(1.0) });
        assert!(plan.is_pre_segmented());
        plan.messages.push(SegmentDraft { content: "c".into(), delay_seconds: None });
        assert!(!plan.is_pre_segmented());
    }

    #[test]
    fn task_plan_output_clamps_ranges() {
        let tp = TaskPlanOutput {
            word_budget: 999,
            task_budget_max: 50,
            tasks_for_lats: vec![],
        }
        .clamped();
        assert_eq!(tp.word_budget, 60);
        assert_eq!(tp.task_budget_max, 2);
    }
}
