//! Shared types for the rapport conversational core: the data model
//! (bot/user/relationship/mood/memory), `TurnState`, the error taxonomy,
//! trace events, and layered configuration.
//!
//! Every other crate in the workspace depends on this one and none of its
//! types depend back on them — cancellation, invocation, search, and
//! persistence are all expressed here only as plain data.

pub mod bot;
pub mod cancel;
pub mod config;
pub mod error;
pub mod memory;
pub mod mood;
pub mod relationship;
pub mod trace;
pub mod turn;
pub mod user;

pub use bot::{BigFive, Bot, BotBasicInfo, BotPersona};
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result, StageError};
pub use memory::{ChatBuffer, ChatMessage, ChatRole, RetrievedMemory, CHAT_BUFFER_MAX};
pub use mood::MoodState;
pub use relationship::{
    RelationshipDelta, RelationshipStage, RelationshipState, StageTransition,
    StageTransitionKind, DELTA_MAX,
};
pub use trace::TraceEvent;
pub use turn::{
    DetectionOutput, FinalSegment, MonologueOutput, ReplyPlan, SecurityFlags, SegmentAction,
    SegmentDraft, TaskPlanOutput, TurnErrorRecord, TurnState,
};
pub use user::{User, UserBasicInfo, UserInferredProfile};
