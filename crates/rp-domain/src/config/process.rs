//! `[process]` — Segment Processor / FinalValidator limits.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    #[serde(default = "default_min_bubble_length")]
    pub min_bubble_length: usize,
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
    /// Characters-per-bubble threshold past which the rule-split path
    /// considers breaking a reply into multiple bubbles.
    #[serde(default = "default_split_threshold_chars")]
    pub split_threshold_chars: usize,
    /// Seconds of simulated typing per character, modulated by busyness.
    #[serde(default = "default_typing_rate")]
    pub typing_rate_secs_per_char: f32,
}

fn default_min_bubble_length() -> usize {
    2
}

fn default_max_messages() -> usize {
    4
}

fn default_split_threshold_chars() -> usize {
    40
}

fn default_typing_rate() -> f32 {
    0.2
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            min_bubble_length: default_min_bubble_length(),
            max_messages: default_max_messages(),
            split_threshold_chars: default_split_threshold_chars(),
            typing_rate_secs_per_char: default_typing_rate(),
        }
    }
}
