//! `PgRepository`: the `sqlx`-backed implementation of `rp_graph::Repository`.
//!
//! A split of one repository struct per table family was considered, but
//! the five tables here are all written inside the single `Persist`
//! transaction, so `PgRepository` owns the pool and exposes the three
//! methods `rp_graph::Repository` names.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rp_domain::config::PersistenceConfig;
use rp_domain::{
    BigFive, BotBasicInfo, BotPersona, ChatBuffer, ChatMessage, ChatRole, DetectionOutput, Error,
    MoodState, RelationshipStage, RelationshipState, Result, RetrievedMemory, UserBasicInfo,
    UserInferredProfile, CHAT_BUFFER_MAX,
};
use rp_graph::repository::{LoadedContext, PersistWrite, PersistedIds, Repository};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

pub struct PgRepository {
    pool: PgPool,
    retry_attempts: u32,
    retry_backoff_ms: u64,
}

impl PgRepository {
    pub fn new(pool: PgPool, config: &PersistenceConfig) -> Self {
        Self {
            pool,
            retry_attempts: config.retry_attempts,
            retry_backoff_ms: config.retry_backoff_ms,
        }
    }

    fn parse_json<T: serde::de::DeserializeOwned + Default>(value: serde_json::Value) -> T {
        serde_json::from_value(value).unwrap_or_default()
    }

    fn parse_stage(raw: &str) -> RelationshipStage {
        serde_json::from_value(serde_json::Value::String(raw.to_owned()))
            .unwrap_or(RelationshipStage::Initiating)
    }
}

#[async_trait]
impl Repository for PgRepository {
    /// One-row lookup per table: the Load stage's reads are all single-row
    /// lookups keyed by (bot_id, external_id).
    async fn load(&self, bot_id: Uuid, user_id: Uuid) -> Result<LoadedContext> {
        let bot_row = sqlx::query(
            "SELECT name, basic_info, big_five, persona, mood_state, urgent_tasks FROM bots WHERE id = $1",
        )
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let (bot_basic_info, bot_big_five, bot_persona, mood_state, urgent_tasks) = match bot_row {
            Some(row) => {
                let name: String = row.try_get("name").unwrap_or_default();
                let basic_info_json: serde_json::Value = row.try_get("basic_info").unwrap_or_default();
                let mut basic_info: BotBasicInfo = serde_json::from_value(basic_info_json).unwrap_or(BotBasicInfo {
                    name: name.clone(),
                    age: None,
                    occupation: None,
                    speaking_style: None,
                });
                if basic_info.name.is_empty() {
                    basic_info.name = name;
                }
                let big_five: BigFive = Self::parse_json(row.try_get("big_five").unwrap_or_default());
                let persona: BotPersona = Self::parse_json(row.try_get("persona").unwrap_or_default());
                let mood: MoodState = Self::parse_json(row.try_get("mood_state").unwrap_or_default());
                let urgent_tasks: Vec<String> = Self::parse_json(row.try_get("urgent_tasks").unwrap_or_default());
                (basic_info, big_five, persona, mood.clamped(), urgent_tasks)
            }
            None => (
                BotBasicInfo { name: String::new(), age: None, occupation: None, speaking_style: None },
                BigFive::default(),
                BotPersona::default(),
                MoodState::default(),
                Vec::new(),
            ),
        };

        let user_row = sqlx::query(
            "SELECT basic_info, current_stage, dimensions, inferred_profile, conversation_summary \
             FROM users WHERE id = $1 AND bot_id = $2",
        )
        .bind(user_id)
        .bind(bot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let (user_basic_info, current_stage, relationship_state, user_inferred_profile, conversation_summary) =
            match user_row {
                Some(row) => {
                    let basic_info: UserBasicInfo = Self::parse_json(row.try_get("basic_info").unwrap_or_default());
                    let stage_raw: String = row.try_get("current_stage").unwrap_or_default();
                    let stage = Self::parse_stage(&stage_raw);
                    let dims: RelationshipState = serde_json::from_value(row.try_get("dimensions").unwrap_or_default())
                        .unwrap_or_default();
                    let inferred: UserInferredProfile = Self::parse_json(row.try_get("inferred_profile").unwrap_or_default());
                    let summary: String = row.try_get("conversation_summary").unwrap_or_default();
                    (basic_info, stage, dims, inferred, summary)
                }
                None => (
                    UserBasicInfo::default(),
                    RelationshipStage::default(),
                    RelationshipState::default(),
                    UserInferredProfile::default(),
                    String::new(),
                ),
            };

        let message_rows = sqlx::query(
            "SELECT role, content, created_at FROM messages WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(CHAT_BUFFER_MAX as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let mut messages: Vec<ChatMessage> = message_rows
            .into_iter()
            .map(|row| {
                let role_raw: String = row.try_get("role").unwrap_or_default();
                let role = match role_raw.as_str() {
                    "ai" => ChatRole::Ai,
                    "system" => ChatRole::System,
                    _ => ChatRole::User,
                };
                ChatMessage {
                    role,
                    content: row.try_get("content").unwrap_or_default(),
                    created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
                }
            })
            .collect();
        messages.reverse(); // DESC fetch, oldest-first for the buffer

        Ok(LoadedContext {
            bot_basic_info,
            bot_big_five,
            bot_persona,
            user_basic_info,
            user_inferred_profile,
            relationship_state,
            mood_state,
            current_stage,
            chat_buffer: ChatBuffer::from_tail(messages),
            conversation_summary,
            urgent_tasks,
        })
    }

    /// Pulls the most important recently-derived notes as the long-term
    /// memory surface `MemoryRetrieve` needs: no dedicated memories table
    /// exists, so `derived_notes` — created at Persist and never rewritten
    /// — is the store this reads from.
    async fn retrieve_memories(
        &self,
        _bot_id: Uuid,
        user_id: Uuid,
        _detection: Option<&DetectionOutput>,
    ) -> Result<Vec<RetrievedMemory>> {
        let rows = sqlx::query(
            "SELECT content, importance FROM derived_notes WHERE user_id = $1 \
             ORDER BY importance DESC, created_at DESC LIMIT 8",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| RetrievedMemory {
                content: row.try_get("content").unwrap_or_default(),
                importance: row.try_get::<f32, _>("importance").unwrap_or_default(),
            })
            .collect())
    }

    /// Single transactional write, retried twice with
    /// backoff on failure before surfacing `PersistError` to the caller.
    async fn persist(&self, write: PersistWrite) -> Result<PersistedIds> {
        let mut last_err = None;
        for attempt in 0..=self.retry_attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(self.retry_backoff_ms * 2u64.pow(attempt - 1));
                tokio::time::sleep(backoff).await;
            }
            match self.persist_once(&write).await {
                Ok(ids) => return Ok(ids),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "persist attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Database("persist failed with no error recorded".into())))
    }
}

impl PgRepository {
    async fn persist_once(&self, write: &PersistWrite) -> Result<PersistedIds> {
        let mut tx: Transaction<'_, Postgres> =
            self.pool.begin().await.map_err(|e| Error::Database(e.to_string()))?;

        // Row-level lock on the per-bot row before updating mood/urgent_tasks,
        // so two concurrent sessions for the same bot can't lose updates.
        sqlx::query("SELECT mood_state FROM bots WHERE id = $1 FOR UPDATE")
            .bind(write.bot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query("UPDATE bots SET mood_state = $1, urgent_tasks = $2 WHERE id = $3")
            .bind(serde_json::to_value(write.mood_state).unwrap_or_default())
            .bind(serde_json::to_value(&write.urgent_tasks).unwrap_or_default())
            .bind(write.bot_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            "UPDATE users SET dimensions = $1, current_stage = $2, basic_info = $3, \
             inferred_profile = $4, conversation_summary = $5 WHERE id = $6",
        )
        .bind(serde_json::to_value(write.relationship_state).unwrap_or_default())
        .bind(write.current_stage.to_string())
        .bind(serde_json::to_value(&write.user_basic_info_updates).unwrap_or_default())
        .bind(serde_json::to_value(&write.user_inferred_profile_updates).unwrap_or_default())
        .bind(&write.conversation_summary)
        .bind(write.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let user_message_id = Uuid::new_v4();
        let user_created_at = sqlx::query_scalar::<_, chrono::DateTime<Utc>>(
            "INSERT INTO messages (id, user_id, role, content, metadata) \
             VALUES ($1, $2, 'user', $3, '{}'::jsonb) RETURNING created_at",
        )
        .bind(user_message_id)
        .bind(write.user_id)
        .bind(&write.user_message)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let ai_message_id = Uuid::new_v4();
        let ai_created_at = sqlx::query_scalar::<_, chrono::DateTime<Utc>>(
            "INSERT INTO messages (id, user_id, role, content, metadata) \
             VALUES ($1, $2, 'ai', $3, $4) RETURNING created_at",
        )
        .bind(ai_message_id)
        .bind(write.user_id)
        .bind(&write.ai_message)
        .bind(&write.ai_message_metadata)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        let turn_index: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transcripts WHERE user_id = $1")
            .bind(write.user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let transcript_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO transcripts (id, user_id, turn_index, user_text, bot_text, entities, \
             topic, importance, short_context, created_at) \
             VALUES ($1, $2, $3, $4, $5, '[]'::jsonb, '', 0, $6, $7)",
        )
        .bind(transcript_id)
        .bind(write.user_id)
        .bind(turn_index)
        .bind(&write.user_message)
        .bind(&write.ai_message)
        .bind(truncate_chars(&write.conversation_summary, 280))
        .bind(ai_created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        // One derived note per inferred-profile update this turn — the
        // append-only long-term surface `retrieve_memories` reads back.
        for (trait_name, trait_value) in &write.user_inferred_profile_updates {
            sqlx::query(
                "INSERT INTO derived_notes (id, user_id, transcript_id, note_type, content, importance) \
                 VALUES ($1, $2, $3, 'inferred_trait', $4, 0.5)",
            )
            .bind(Uuid::new_v4())
            .bind(write.user_id)
            .bind(transcript_id)
            .bind(format!("{trait_name}: {trait_value}"))
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| Error::Database(e.to_string()))?;

        Ok(PersistedIds {
            user_message_created_at: user_created_at,
            ai_message_created_at: ai_created_at,
        })
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_owned()
    } else {
        s.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_leaves_short_strings_untouched() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn truncate_chars_cuts_on_char_boundaries() {
        let s = "你好世界，今天天气不错";
        let truncated = truncate_chars(s, 4);
        assert_eq!(truncated.chars().count(), 4);
        assert_eq!(truncated, "你好世界");
    }
}
