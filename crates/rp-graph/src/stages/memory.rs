//! Stage 6 — MemoryRetrieve: store lookup, no invoker call.

use rp_domain::TurnState;

use crate::repository::Repository;

pub async fn run(turn: &mut TurnState, repo: &dyn Repository) {
    match repo.retrieve_memories(turn.bot_id, turn.user_id, turn.detection.as_ref()).await {
        Ok(memories) => turn.retrieved_memories = memories,
        Err(err) => turn.record_error("MemoryRetrieve", "StageFallback", err.to_string()),
    }
}
