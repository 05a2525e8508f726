//! The per-session dispatcher FSM.
//!
//! An explicit actor with a bounded inbox rather than a bare
//! `Semaphore(1)`: a single-permit semaphore only ever supports one
//! waiter, but sessions need a queue of depth N that
//! merges into its tail once full.
//!
//! State-machine notes: `Running(i<10)` is fully cancellable, so a new
//! message there cancels-and-merges in place. Once `FinalValidate`
//! produces `final_segments` (stage 10), the remaining stages
//! (Evolve/StageManage/Persist) are the irreversible tail — §5 says
//! outright that cancellation arriving during Persist just lets it
//! complete and queues the successor, so `Running(i>=10)` and `Emitting`
//! are treated here as one non-cancellable-compute phase: a new message
//! enqueues *unless* the background compute has already finished (nothing
//! left to lose), in which case it cancels the remaining segment delivery
//! and starts immediately — satisfying the `Emitting` row's "if current is
//! interruptible: cancel" without contradicting §5.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rp_domain::{CancelToken, FinalSegment, TraceEvent, TurnState};
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::cancel_map::CancelMap;
use crate::emitter;

/// What a turn produced, per the Graph Executor's contract:
/// "produce a TurnState containing final_segments... or a CanceledTurn
/// result if superseded."
#[derive(Debug)]
pub enum TurnOutcome {
    Completed(TurnState),
    Canceled,
    Fatal(rp_domain::Error),
}

pub type SegmentsReadyCallback = Box<dyn FnOnce(Vec<FinalSegment>) + Send>;

/// Implemented by the graph executor (`rp-graph`); kept as a trait here so
/// `rp-sessions` never depends on the crate that assembles the stage list.
#[async_trait]
pub trait TurnExecutor: Send + Sync + 'static {
    async fn run_turn(
        &self,
        state: TurnState,
        cancel: CancelToken,
        on_segments_ready: SegmentsReadyCallback,
    ) -> TurnOutcome;
}

#[derive(Debug, Clone)]
pub enum TurnResult {
    Success {
        segments: Vec<FinalSegment>,
        turn_id: Uuid,
        /// `None` for a macro-delayed turn, whose Persist step still runs
        /// but whose `final_segments` is empty.
        user_created_at: Option<chrono::DateTime<chrono::Utc>>,
        ai_created_at: Option<chrono::DateTime<chrono::Utc>>,
        macro_delay_seconds: Option<f32>,
    },
    Superseded,
    Error(String),
}

struct PendingTurn {
    message: String,
    reply_tx: oneshot::Sender<TurnResult>,
}

/// A bounded FIFO that merges into its tail instead of growing past
/// `capacity`.
struct SessionInbox {
    queue: VecDeque<PendingTurn>,
    capacity: usize,
}

impl SessionInbox {
    fn new(capacity: usize) -> Self {
        Self { queue: VecDeque::new(), capacity: capacity.max(1) }
    }

    fn push(&mut self, turn: PendingTurn) {
        if self.queue.len() >= self.capacity {
            if let Some(tail) = self.queue.back_mut() {
                tail.message.push('\n');
                tail.message.push_str(&turn.message);
                let _ = turn.reply_tx.send(TurnResult::Superseded);
                return;
            }
        }
        self.queue.push_back(turn);
    }

    fn pop(&mut self) -> Option<PendingTurn> {
        self.queue.pop_front()
    }
}

/// Shared state for the turn currently occupying this session, `None`
/// when the session is Idle.
struct ActiveTurn {
    turn_id: Uuid,
    compute_cancel: CancelToken,
    /// Set once `FinalValidate`-equivalent output is known; `None` while
    /// still in the cancellable `Running(i<10)` phase.
    emit_cancel: Option<CancelToken>,
    input_so_far: String,
    compute_done: Arc<AtomicBool>,
}

pub struct SessionDispatcher {
    user_id: Uuid,
    bot_id: Uuid,
    executor: Arc<dyn TurnExecutor>,
    cancel_map: Arc<CancelMap>,
    inbox: Mutex<SessionInbox>,
    active: Mutex<Option<ActiveTurn>>,
}

impl SessionDispatcher {
    pub fn new(
        user_id: Uuid,
        bot_id: Uuid,
        executor: Arc<dyn TurnExecutor>,
        cancel_map: Arc<CancelMap>,
        queue_depth: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            user_id,
            bot_id,
            executor,
            cancel_map,
            inbox: Mutex::new(SessionInbox::new(queue_depth)),
            active: Mutex::new(None),
        })
    }

    /// Submit a new user message.
    pub async fn submit(self: &Arc<Self>, message: String) -> oneshot::Receiver<TurnResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let pending = PendingTurn { message, reply_tx };
        let new_turn_id = Uuid::new_v4();

        let mut active = self.active.lock().await;
        match active.as_mut() {
            None => {
                drop(active);
                self.launch(pending).await;
            }
            Some(turn) if turn.emit_cancel.is_none() => {
                // Running(i<10): cancel and merge in place.
                self.cancel_map.cancel(turn.turn_id);
                turn.compute_cancel.cancel();
                let merged = format!("{}\n{}", turn.input_so_far, pending.message);
                TraceEvent::SessionSuperseded {
                    session_key: self.session_key(),
                    superseded_turn_id: turn.turn_id,
                    new_turn_id,
                    stage_at_cancel: "running".into(),
                }
                .emit();
                drop(active);
                self.launch(PendingTurn { message: merged, reply_tx: pending.reply_tx }).await;
            }
            Some(turn) if turn.compute_done.load(Ordering::SeqCst) => {
                // Emitting with nothing left to lose: cancel delivery, restart fresh.
                if let Some(emit_cancel) = &turn.emit_cancel {
                    emit_cancel.cancel();
                }
                TraceEvent::SessionSuperseded {
                    session_key: self.session_key(),
                    superseded_turn_id: turn.turn_id,
                    new_turn_id,
                    stage_at_cancel: "emitting".into(),
                }
                .emit();
                drop(active);
                self.launch(pending).await;
            }
            Some(_) => {
                // Running(i>=10), compute still in flight: enqueue.
                drop(active);
                let mut inbox = self.inbox.lock().await;
                inbox.push(pending);
                let queue_depth = inbox.queue.len();
                drop(inbox);
                TraceEvent::SessionEnqueued { session_key: self.session_key(), turn_id: new_turn_id, queue_depth }.emit();
            }
        }

        reply_rx
    }

    fn session_key(&self) -> String {
        format!("{}:{}", self.user_id, self.bot_id)
    }

    fn launch<'a>(
        self: &'a Arc<Self>,
        pending: PendingTurn,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
        Box::pin(self.launch_inner(pending))
    }

    async fn launch_inner(self: &Arc<Self>, pending: PendingTurn) {
        let turn_id = Uuid::new_v4();
        let cancel = self.cancel_map.register(turn_id);
        let compute_done = Arc::new(AtomicBool::new(false));

        {
            let mut active = self.active.lock().await;
            *active = Some(ActiveTurn {
                turn_id,
                compute_cancel: cancel.clone(),
                emit_cancel: None,
                input_so_far: pending.message.clone(),
                compute_done: compute_done.clone(),
            });
        }

        let dispatcher = self.clone();
        let state = TurnState::new(turn_id, None, self.bot_id, self.user_id, pending.message);
        let executor = self.executor.clone();

        tokio::spawn(async move {
            let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Vec<FinalSegment>>();
            let on_ready: SegmentsReadyCallback = Box::new(move |segments| {
                let _ = ready_tx.send(segments);
            });

            let run_fut = executor.run_turn(state, cancel.clone(), on_ready);
            tokio::pin!(run_fut);

            // Poll for the segments-ready signal without blocking the
            // executor future; a std::sync::mpsc is fine here since the
            // callback fires from synchronous executor code.
            let outcome = loop {
                if let Ok(segments) = ready_rx.try_recv() {
                    let emit_cancel = CancelToken::new();
                    {
                        let mut active = dispatcher.active.lock().await;
                        if let Some(turn) = active.as_mut() {
                            turn.emit_cancel = Some(emit_cancel.clone());
                        }
                    }
                    let compute_done_flag = compute_done.clone();
                    let delivery_emit_cancel = emit_cancel.clone();
                    let deliver = tokio::spawn(async move {
                        emitter::emit_segments(&segments, &delivery_emit_cancel, |_| {}).await;
                    });
                    let outcome = run_fut.await;
                    compute_done_flag.store(true, Ordering::SeqCst);
                    let _ = deliver.await;
                    break outcome;
                }
                tokio::select! {
                    outcome = &mut run_fut => break outcome,
                    _ = tokio::time::sleep(std::time::Duration::from_millis(5)) => {}
                }
            };

            dispatcher.cancel_map.remove(turn_id);

            let result = match outcome {
                TurnOutcome::Completed(state) => TurnResult::Success {
                    segments: state.final_segments.clone(),
                    turn_id,
                    user_created_at: state.user_message_created_at,
                    ai_created_at: state.ai_message_created_at,
                    macro_delay_seconds: state.macro_delay_seconds,
                },
                TurnOutcome::Canceled => TurnResult::Superseded,
                TurnOutcome::Fatal(err) => TurnResult::Error(err.to_string()),
            };
            let _ = pending.reply_tx.send(result);

            *dispatcher.active.lock().await = None;
            dispatcher.drain_queue().await;
        });
    }

    async fn drain_queue(self: &Arc<Self>) {
        let next = self.inbox.lock().await.pop();
        if let Some(pending) = next {
            self.launch(pending).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_domain::SegmentAction;

    struct ImmediateExecutor;

    #[async_trait]
    impl TurnExecutor for ImmediateExecutor {
        async fn run_turn(
            &self,
            mut state: TurnState,
            _cancel: CancelToken,
            on_segments_ready: SegmentsReadyCallback,
        ) -> TurnOutcome {
            let segments = vec![FinalSegment {
                content: format!("echo: {}", state.user_input),
                delay_seconds: 0.0,
                action: SegmentAction::Idle,
            }];
            on_segments_ready(segments.clone());
            state.final_segments = segments;
            TurnOutcome::Completed(state)
        }
    }

    #[tokio::test]
    async fn single_message_completes_successfully() {
        let dispatcher = SessionDispatcher::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Arc::new(ImmediateExecutor),
            Arc::new(CancelMap::new()),
            4,
        );
        let rx = dispatcher.submit("hello".into()).await;
        let result = rx.await.unwrap();
        match result {
            TurnResult::Success { segments, .. } => {
                assert_eq!(segments[0].content, "echo: hello");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
