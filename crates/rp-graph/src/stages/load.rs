//! Stage 1 — Load: one row lookup, no invoker call.

use rp_domain::TurnState;

use crate::repository::Repository;

pub async fn run(turn: &mut TurnState, repo: &dyn Repository) {
    match repo.load(turn.bot_id, turn.user_id).await {
        Ok(ctx) => {
            turn.bot_basic_info = ctx.bot_basic_info;
            turn.bot_big_five = ctx.bot_big_five.clamped();
            turn.bot_persona = ctx.bot_persona;
            turn.user_basic_info = ctx.user_basic_info;
            turn.user_inferred_profile = ctx.user_inferred_profile;
            turn.relationship_state = ctx.relationship_state;
            turn.mood_state = ctx.mood_state.clamped();
            turn.current_stage = ctx.current_stage;
            turn.chat_buffer = ctx.chat_buffer;
            turn.conversation_summary = ctx.conversation_summary;
            turn.urgent_tasks = ctx.urgent_tasks;
        }
        Err(err) => {
            turn.record_error("Load", "StageFallback", err.to_string());
        }
    }
}
