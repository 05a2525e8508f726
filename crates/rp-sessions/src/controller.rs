//! Top-level session registry: one [`SessionDispatcher`] per `(user_id,
//! bot_id)` key, created lazily.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rp_domain::TraceEvent;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::cancel_map::CancelMap;
use crate::dispatcher::{SessionDispatcher, TurnExecutor, TurnResult};

fn session_key(user_id: Uuid, bot_id: Uuid) -> String {
    format!("{user_id}:{bot_id}")
}

pub struct SessionController {
    executor: Arc<dyn TurnExecutor>,
    cancel_map: Arc<CancelMap>,
    queue_depth: usize,
    sessions: Mutex<HashMap<String, Arc<SessionDispatcher>>>,
}

impl SessionController {
    pub fn new(executor: Arc<dyn TurnExecutor>, queue_depth: usize) -> Self {
        Self {
            executor,
            cancel_map: Arc::new(CancelMap::new()),
            queue_depth,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn dispatcher_for(&self, user_id: Uuid, bot_id: Uuid) -> Arc<SessionDispatcher> {
        let key = session_key(user_id, bot_id);
        let mut sessions = self.sessions.lock();
        sessions
            .entry(key.clone())
            .or_insert_with(|| {
                let dispatcher = SessionDispatcher::new(
                    user_id,
                    bot_id,
                    self.executor.clone(),
                    self.cancel_map.clone(),
                    self.queue_depth,
                );
                TraceEvent::SessionResolved { session_key: key, turn_id: Uuid::nil(), is_new: true }.emit();
                dispatcher
            })
            .clone()
    }

    /// Submit a user message for `(user_id, bot_id)` — the `POST /turn`
    /// entry point.
    pub async fn submit(&self, user_id: Uuid, bot_id: Uuid, message: String) -> oneshot::Receiver<TurnResult> {
        let dispatcher = self.dispatcher_for(user_id, bot_id);
        dispatcher.submit(message).await
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rp_domain::{CancelToken, FinalSegment, SegmentAction, TurnState};

    struct ImmediateExecutor;

    #[async_trait]
    impl TurnExecutor for ImmediateExecutor {
        async fn run_turn(
            &self,
            mut state: TurnState,
            _cancel: CancelToken,
            on_segments_ready: crate::dispatcher::SegmentsReadyCallback,
        ) -> crate::dispatcher::TurnOutcome {
            let segments = vec![FinalSegment {
                content: "ok".into(),
                delay_seconds: 0.0,
                action: SegmentAction::Idle,
            }];
            on_segments_ready(segments.clone());
            state.final_segments = segments;
            crate::dispatcher::TurnOutcome::Completed(state)
        }
    }

    #[tokio::test]
    async fn distinct_bot_user_pairs_get_distinct_dispatchers() {
        let controller = SessionController::new(Arc::new(ImmediateExecutor), 4);
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let bot = Uuid::new_v4();
        let rx1 = controller.submit(u1, bot, "hi".into()).await;
        let rx2 = controller.submit(u2, bot, "hi".into()).await;
        rx1.await.unwrap();
        rx2.await.unwrap();
        assert_eq!(controller.session_count(), 2);
    }
}
