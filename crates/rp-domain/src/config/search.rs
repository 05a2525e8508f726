//! `[lats]` — search-engine tuning.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyExitConfig {
    pub root_score: f32,
    pub plan_alignment_min: f32,
    pub assistantiness_max: f32,
    pub mode_fit_min: f32,
}

impl Default for EarlyExitConfig {
    fn default() -> Self {
        Self {
            root_score: 0.8,
            plan_alignment_min: 0.6,
            assistantiness_max: 0.5,
            mode_fit_min: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftScorerConfig {
    pub top_n: usize,
    pub max_concurrency: usize,
}

impl Default for SoftScorerConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_rollouts")]
    pub rollouts: u32,
    #[serde(default = "default_expand_k")]
    pub expand_k: u32,
    /// Minimum rollouts completed before early exit is even considered,
    /// keyed by stage class ("early", "mid", "late" per
    /// `RelationshipStage::is_early`/`is_mid`).
    #[serde(default = "default_min_rollouts_before_early_exit")]
    pub min_rollouts_before_early_exit: MinRolloutsByStageClass,
    #[serde(default)]
    pub early_exit: EarlyExitConfig,
    #[serde(default)]
    pub soft: SoftScorerConfig,
    #[serde(default = "default_final_score_threshold")]
    pub final_score_threshold: f32,
    #[serde(default = "default_ucb_exploration")]
    pub ucb_exploration_constant: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinRolloutsByStageClass {
    pub early: u32,
    pub mid: u32,
    pub late: u32,
}

fn default_rollouts() -> u32 {
    8
}

fn default_expand_k() -> u32 {
    3
}

fn default_min_rollouts_before_early_exit() -> MinRolloutsByStageClass {
    MinRolloutsByStageClass {
        early: 4,
        mid: 3,
        late: 2,
    }
}

fn default_final_score_threshold() -> f32 {
    0.4
}

fn default_ucb_exploration() -> f32 {
    std::f32::consts::SQRT_2
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rollouts: default_rollouts(),
            expand_k: default_expand_k(),
            min_rollouts_before_early_exit: default_min_rollouts_before_early_exit(),
            early_exit: EarlyExitConfig::default(),
            soft: SoftScorerConfig::default(),
            final_score_threshold: default_final_score_threshold(),
            ucb_exploration_constant: default_ucb_exploration(),
        }
    }
}
