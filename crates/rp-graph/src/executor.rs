//! The graph executor: one fixed sequential pipeline per
//! turn, implementing `rp_sessions::TurnExecutor` so the session layer
//! never needs to know how a turn is actually computed.

use std::sync::Arc;

use async_trait::async_trait;
use rp_domain::config::Config;
use rp_domain::{CancelToken, TraceEvent, TurnState};
use rp_invoker::Invoker;
use rp_rules::{Evolver, EvolverConfig, FinalValidatorRequirements, SegmentProcessor, StageManager};
use rp_search::{Requirements, SearchEngine};
use rp_sessions::{SegmentsReadyCallback, TurnExecutor, TurnOutcome};
use tracing::Instrument;

use crate::repository::{PersistWrite, Repository};

pub struct GraphExecutor {
    pub invoker: Arc<dyn Invoker>,
    pub repository: Arc<dyn Repository>,
    pub config: Config,
    pub stage_manager: StageManager,
}

impl GraphExecutor {
    pub fn new(invoker: Arc<dyn Invoker>, repository: Arc<dyn Repository>, config: Config, stage_manager: StageManager) -> Self {
        Self { invoker, repository, config, stage_manager }
    }

    fn search_context(&self, turn: &TurnState) -> String {
        let brief = turn.detection.as_ref().map(|d| d.brief.as_str()).unwrap_or_default();
        let memories: String = turn.retrieved_memories.iter().map(|m| m.content.as_str()).collect::<Vec<_>>().join("; ");
        format!(
            "persona: {:?}\nmood: pleasure={} arousal={} busyness={}\nrelationship stage: {}\ndetection brief: {brief}\nmemories: {memories}\nuser says: {}",
            turn.bot_persona.attributes,
            turn.mood_state.pleasure,
            turn.mood_state.arousal,
            turn.mood_state.busyness,
            turn.current_stage,
            turn.user_input,
        )
    }

    fn stage_done(turn_id: uuid::Uuid, stage: &str, started: std::time::Instant) {
        TraceEvent::StageCompleted {
            turn_id,
            stage: stage.to_owned(),
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();
    }

    async fn run_security_reply_path(&self, turn: &mut TurnState, cancel: &CancelToken) {
        let turn_id = turn.turn_id;
        let t0 = std::time::Instant::now();
        crate::stages::security::run_reply(turn, self.invoker.as_ref(), cancel)
            .instrument(tracing::info_span!("stage", stage = "SecurityReply", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "SecurityReply", t0);
    }

    async fn run_main_path(&self, turn: &mut TurnState, cancel: &CancelToken) {
        let turn_id = turn.turn_id;

        let t0 = std::time::Instant::now();
        crate::stages::detection::run(turn, self.invoker.as_ref(), cancel)
            .instrument(tracing::info_span!("stage", stage = "Detection", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Detection", t0);
        if cancel.is_cancelled() {
            return;
        }
        let t0 = std::time::Instant::now();
        crate::stages::monologue::run(turn, self.invoker.as_ref(), cancel)
            .instrument(tracing::info_span!("stage", stage = "Monologue", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Monologue", t0);
        if cancel.is_cancelled() {
            return;
        }
        let t0 = std::time::Instant::now();
        crate::stages::memory::run(turn, self.repository.as_ref())
            .instrument(tracing::info_span!("stage", stage = "MemoryRetrieve", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "MemoryRetrieve", t0);
        if cancel.is_cancelled() {
            return;
        }
        let t0 = std::time::Instant::now();
        crate::stages::task_plan::run(turn, self.invoker.as_ref(), cancel)
            .instrument(tracing::info_span!("stage", stage = "TaskPlan", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "TaskPlan", t0);
        if cancel.is_cancelled() {
            return;
        }

        let task_plan = turn.task_plan.clone().unwrap_or_default();
        let requirements = Requirements {
            max_messages: self.config.process.max_messages,
            min_first_len: self.config.process.min_bubble_length,
            word_budget: task_plan.word_budget,
            word_budget_slack: 10,
        };

        let search_context = self.search_context(turn);
        let engine = SearchEngine::new(self.invoker.as_ref(), &self.config.lats);
        let t0 = std::time::Instant::now();
        let outcome = engine
            .search(turn, &search_context, &requirements, cancel)
            .instrument(tracing::info_span!("stage", stage = "Search", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Search", t0);
        if let Some(err) = outcome.stage_error {
            turn.record_error("Search", err.kind(), err.to_string());
        }
        turn.reply_plan = Some(outcome.reply_plan.clone());
        if cancel.is_cancelled() {
            return;
        }

        if let Some(macro_delay) = rp_rules::process::roll_macro_delay(turn.current_stage, turn.mood_state.busyness) {
            turn.macro_delay_seconds = Some(macro_delay);
            turn.final_segments = Vec::new();
            turn.final_response.clear();
            return;
        }

        let processor = SegmentProcessor::new(
            self.invoker.as_ref(),
            self.config.process.typing_rate_secs_per_char,
            self.config.process.min_bubble_length,
        );
        let t0 = std::time::Instant::now();
        let (segments, process_err) = processor
            .process(&outcome.reply_plan, &turn.bot_big_five, &turn.relationship_state, &turn.mood_state, cancel)
            .instrument(tracing::info_span!("stage", stage = "Process", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Process", t0);
        if let Some(err) = process_err {
            turn.record_error("Process", err.kind(), err.to_string());
        }

        let validated = rp_rules::validate_final_segments(
            segments,
            &FinalValidatorRequirements {
                max_messages: self.config.process.max_messages,
                min_first_len: self.config.process.min_bubble_length,
            },
        );
        turn.final_response = validated.iter().map(|s| s.content.as_str()).collect::<Vec<_>>().join(" ");
        turn.final_segments = validated;
    }

    async fn run_evolve_and_stage_manage(&self, turn: &mut TurnState, cancel: &CancelToken) {
        let turn_id = turn.turn_id;
        let evolver = Evolver::new(self.invoker.as_ref(), EvolverConfig::default());
        let t0 = std::time::Instant::now();
        let (evolved, evolve_err) = evolver
            .evolve(&turn.chat_buffer, turn.detection.as_ref(), turn.reply_plan.as_ref(), cancel)
            .instrument(tracing::info_span!("stage", stage = "Evolve", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Evolve", t0);
        if let Some(err) = evolve_err {
            turn.record_error("Evolve", err.kind(), err.to_string());
        }
        turn.relationship_state.apply_delta(evolved.delta);
        turn.user_basic_info.fill_missing(evolved.user_basic_info_updates);
        turn.user_inferred_profile.append(evolved.user_inferred_profile_updates);

        let implied_stage = turn.detection.as_ref().and_then(|d| d.implied_stage);
        let transition = self.stage_manager.decide(turn.current_stage, &turn.relationship_state, implied_stage);
        if transition.kind != rp_domain::StageTransitionKind::Stay {
            TraceEvent::RelationshipStageTransition {
                turn_id,
                from: transition.from.to_string(),
                to: transition.to.to_string(),
                kind: format!("{:?}", transition.kind),
            }
            .emit();
        }
        turn.current_stage = transition.to;
    }

    async fn persist(&self, turn: &mut TurnState) -> rp_domain::Result<()> {
        turn.chat_buffer.truncate_to_tail();

        // Resolve the bot's task backlog from what the chosen reply plan
        // actually completed, not from what Detection merely flagged this
        // turn (see DESIGN.md).
        let evolver = Evolver::new(self.invoker.as_ref(), EvolverConfig::default());
        let completed = evolver.completed_ids(turn.reply_plan.as_ref());
        let mut urgent_tasks = turn.urgent_tasks.clone();
        if let Some(detection) = turn.detection.as_ref() {
            for task in detection.urgent_tasks.iter().chain(detection.immediate_tasks.iter()) {
                if !urgent_tasks.contains(task) {
                    urgent_tasks.push(task.clone());
                }
            }
        }
        urgent_tasks.retain(|t| !completed.contains(t));
        turn.urgent_tasks = urgent_tasks.clone();

        let write = PersistWrite {
            bot_id: turn.bot_id,
            user_id: turn.user_id,
            relationship_state: turn.relationship_state,
            current_stage: turn.current_stage,
            mood_state: turn.mood_state,
            conversation_summary: turn.conversation_summary.clone(),
            user_basic_info_updates: turn.user_basic_info.fields.clone(),
            user_inferred_profile_updates: turn.user_inferred_profile.traits.clone(),
            user_message: turn.user_input.clone(),
            ai_message: turn.final_response.clone(),
            ai_message_metadata: serde_json::json!({
                "errors": turn.errors.iter().map(|e| serde_json::json!({
                    "stage": e.stage, "kind": e.kind, "detail": e.detail,
                })).collect::<Vec<_>>(),
            }),
            urgent_tasks,
        };
        let ids = self.repository.persist(write).await?;
        turn.user_message_created_at = Some(ids.user_message_created_at);
        turn.ai_message_created_at = Some(ids.ai_message_created_at);
        TraceEvent::TurnCommitted { turn_id: turn.turn_id, session_key: format!("{}:{}", turn.user_id, turn.bot_id) }.emit();
        Ok(())
    }
}

#[async_trait]
impl TurnExecutor for GraphExecutor {
    async fn run_turn(&self, state: TurnState, cancel: CancelToken, on_segments_ready: SegmentsReadyCallback) -> TurnOutcome {
        let mut turn = state;
        let turn_id = turn.turn_id;

        let t0 = std::time::Instant::now();
        crate::stages::load::run(&mut turn, self.repository.as_ref())
            .instrument(tracing::info_span!("stage", stage = "Load", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Load", t0);
        if cancel.is_cancelled() {
            return TurnOutcome::Canceled;
        }

        let t0 = std::time::Instant::now();
        crate::stages::security::run(&mut turn, self.invoker.as_ref(), &cancel)
            .instrument(tracing::info_span!("stage", stage = "Security", turn_id = %turn_id))
            .await;
        Self::stage_done(turn_id, "Security", t0);
        if cancel.is_cancelled() {
            return TurnOutcome::Canceled;
        }

        if turn.security_flags.needs_security_response {
            self.run_security_reply_path(&mut turn, &cancel).await;
        } else {
            self.run_main_path(&mut turn, &cancel).await;
        }
        if cancel.is_cancelled() {
            return TurnOutcome::Canceled;
        }

        on_segments_ready(turn.final_segments.clone());

        self.run_evolve_and_stage_manage(&mut turn, &cancel).await;

        if let Err(err) = self.persist(&mut turn).await {
            return TurnOutcome::Fatal(err);
        }

        TurnOutcome::Completed(turn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{LoadedContext, PersistedIds};
    use rp_domain::{BigFive, BotBasicInfo, BotPersona, ChatBuffer, MoodState, RelationshipDelta, RelationshipStage, RelationshipState, UserBasicInfo, UserInferredProfile};
    use rp_invoker::{InvokeResponse, MockInvoker, Role};
    use uuid::Uuid;

    struct FakeRepo;

    #[async_trait]
    impl Repository for FakeRepo {
        async fn load(&self, _bot_id: Uuid, _user_id: Uuid) -> rp_domain::Result<LoadedContext> {
            Ok(LoadedContext {
                bot_basic_info: BotBasicInfo { name: "Aiko".into(), age: None, occupation: None, speaking_style: None },
                bot_big_five: BigFive::default(),
                bot_persona: BotPersona::default(),
                user_basic_info: UserBasicInfo::default(),
                user_inferred_profile: UserInferredProfile::default(),
                relationship_state: RelationshipState::default(),
                mood_state: MoodState { busyness: 0.1, ..MoodState::default() },
                current_stage: RelationshipStage::Initiating,
                chat_buffer: ChatBuffer::default(),
                conversation_summary: String::new(),
                urgent_tasks: Vec::new(),
            })
        }

        async fn retrieve_memories(&self, _bot_id: Uuid, _user_id: Uuid, _detection: Option<&rp_domain::DetectionOutput>) -> rp_domain::Result<Vec<rp_domain::RetrievedMemory>> {
            Ok(Vec::new())
        }

        async fn persist(&self, _write: PersistWrite) -> rp_domain::Result<PersistedIds> {
            Ok(PersistedIds { user_message_created_at: chrono::Utc::now(), ai_message_created_at: chrono::Utc::now() })
        }
    }

    fn queue_happy_path(mock: &MockInvoker) {
        mock.push_response(Role::Fast, InvokeResponse::Json(serde_json::json!({"needs_security_response": false}))); // Security
        mock.push_response(Role::Main, InvokeResponse::Json(serde_json::json!({"brief": "greeting"}))); // Detection
        mock.push_response(Role::Main, InvokeResponse::Json(serde_json::json!({"inner_monologue": "be warm"}))); // Monologue
        mock.push_response(Role::Fast, InvokeResponse::Json(serde_json::json!({"word_budget": 30, "task_budget_max": 0, "tasks_for_lats": []}))); // TaskPlan
        mock.push_response(Role::Main, InvokeResponse::Json(serde_json::json!({"messages": [{"content": "你好呀～", "delay_seconds": 0.0}]}))); // Search root
        mock.push_response(Role::Main, InvokeResponse::Json(serde_json::json!({"messages": [{"content": "variant", "delay_seconds": 0.0}]}))); // prefetch variant
        mock.push_response(Role::Judge, InvokeResponse::Json(serde_json::json!({"assistantiness": 0.1, "immersion_break": 0.0, "persona_consistency": 0.9, "relationship_fit": 0.9, "mode_behavior_fit": 0.9, "overall_score": 0.95}))); // root score
        mock.push_response(Role::Fast, InvokeResponse::Json(serde_json::json!({"delta": {}, "user_basic_info": {}, "user_inferred_profile": {}}))); // Evolve
    }

    #[tokio::test]
    async fn happy_path_produces_final_segments_and_completes() {
        let mock = Arc::new(MockInvoker::new());
        queue_happy_path(&mock);
        let mut config = Config::default();
        config.lats.min_rollouts_before_early_exit.early = 0;
        let executor = GraphExecutor::new(mock.clone(), Arc::new(FakeRepo), config, StageManager::default());

        let turn = TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "你好".into());
        let cancel = CancelToken::new();
        let outcome = executor.run_turn(turn, cancel, Box::new(|_segments| {})).await;

        match outcome {
            TurnOutcome::Completed(t) => {
                assert!(!t.final_segments.is_empty());
                assert_eq!(t.final_segments[0].delay_seconds, 0.0);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_before_first_stage_short_circuits() {
        let mock = Arc::new(MockInvoker::new());
        let executor = GraphExecutor::new(mock, Arc::new(FakeRepo), Config::default(), StageManager::default());
        let turn = TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "hi".into());
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = executor.run_turn(turn, cancel, Box::new(|_| {})).await;
        assert!(matches!(outcome, TurnOutcome::Canceled));
    }

    #[tokio::test]
    async fn evolve_clamps_relationship_delta_before_applying() {
        let mock = Arc::new(MockInvoker::new());
        mock.push_response(
            Role::Fast,
            InvokeResponse::Json(serde_json::json!({
                "delta": {"closeness": 10.0, "trust": -10.0, "liking": 0.0, "respect": 0.0, "warmth": 0.0, "power": 0.0},
                "user_basic_info": {},
                "user_inferred_profile": {}
            })),
        ); // Evolve

        let executor = GraphExecutor::new(mock, Arc::new(FakeRepo), Config::default(), StageManager::default());
        let mut turn = TurnState::new(Uuid::new_v4(), None, Uuid::new_v4(), Uuid::new_v4(), "hi".into());
        turn.relationship_state =
            RelationshipState { closeness: 0.5, trust: 0.5, liking: 0.5, respect: 0.5, warmth: 0.5, power: 0.5 };

        let mut expected = turn.relationship_state;
        expected.apply_delta(RelationshipDelta { closeness: 10.0, trust: -10.0, ..Default::default() });

        let cancel = CancelToken::new();
        executor.run_evolve_and_stage_manage(&mut turn, &cancel).await;

        assert_eq!(turn.relationship_state.closeness, expected.closeness);
        assert_eq!(turn.relationship_state.trust, expected.trust);
        assert!(turn.relationship_state.is_in_range());
    }
}
