//! The Load/MemoryRetrieve/Persist boundary, expressed as a trait this crate defines and `rp-persistence`
//! implements — the same dependency-inversion shape `rp-sessions` uses for
//! `TurnExecutor`, so `rp-graph` never depends on the concrete store.

use async_trait::async_trait;
use rp_domain::{
    BigFive, BotBasicInfo, BotPersona, ChatBuffer, DetectionOutput, MoodState, RelationshipStage,
    RelationshipState, RetrievedMemory, UserBasicInfo, UserInferredProfile,
};

/// Everything the Load stage needs, fetched with one row lookup per
/// `(bot_id, external_id)`.
#[derive(Debug, Clone)]
pub struct LoadedContext {
    pub bot_basic_info: BotBasicInfo,
    pub bot_big_five: BigFive,
    pub bot_persona: BotPersona,
    pub user_basic_info: UserBasicInfo,
    pub user_inferred_profile: UserInferredProfile,
    pub relationship_state: RelationshipState,
    pub mood_state: MoodState,
    pub current_stage: RelationshipStage,
    pub chat_buffer: ChatBuffer,
    pub conversation_summary: String,
    pub urgent_tasks: Vec<String>,
}

/// The single transactional write the Persist stage issues:
/// updated physics, new message/transcript/derived-note rows, and the
/// bot's resolved task backlog. All JSON columns are whole-value
/// replacements, not patches.
#[derive(Debug, Clone)]
pub struct PersistWrite {
    pub bot_id: uuid::Uuid,
    pub user_id: uuid::Uuid,
    pub relationship_state: RelationshipState,
    pub current_stage: RelationshipStage,
    pub mood_state: MoodState,
    pub conversation_summary: String,
    pub user_basic_info_updates: std::collections::HashMap<String, String>,
    pub user_inferred_profile_updates: std::collections::HashMap<String, String>,
    pub user_message: String,
    pub ai_message: String,
    pub ai_message_metadata: serde_json::Value,
    /// Final `bots.urgent_tasks` value for this turn: the backlog Load
    /// read, plus anything Detection just raised, minus whatever the
    /// chosen reply plan completed.
    pub urgent_tasks: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PersistedIds {
    pub user_message_created_at: chrono::DateTime<chrono::Utc>,
    pub ai_message_created_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait Repository: Send + Sync {
    async fn load(&self, bot_id: uuid::Uuid, user_id: uuid::Uuid) -> rp_domain::Result<LoadedContext>;

    async fn retrieve_memories(
        &self,
        bot_id: uuid::Uuid,
        user_id: uuid::Uuid,
        detection: Option<&DetectionOutput>,
    ) -> rp_domain::Result<Vec<RetrievedMemory>>;

    /// Retries with backoff on failure, surfacing `PersistError` only once
    /// retries are exhausted; implementations own the retry loop since only they know
    /// which errors are retryable.
    async fn persist(&self, write: PersistWrite) -> rp_domain::Result<PersistedIds>;
}
