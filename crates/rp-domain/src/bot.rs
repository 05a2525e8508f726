//! Bot identity — immutable per-turn, created out-of-band.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Immutable per-turn identity facts about the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotBasicInfo {
    pub name: String,
    pub age: Option<u32>,
    pub occupation: Option<String>,
    pub speaking_style: Option<String>,
}

/// Five floats in `[-1, 1]`: openness, conscientiousness, extraversion,
/// agreeableness, neuroticism.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BigFive {
    pub openness: f32,
    pub conscientiousness: f32,
    pub extraversion: f32,
    pub agreeableness: f32,
    pub neuroticism: f32,
}

impl Default for BigFive {
    fn default() -> Self {
        Self {
            openness: 0.0,
            conscientiousness: 0.0,
            extraversion: 0.0,
            agreeableness: 0.0,
            neuroticism: 0.0,
        }
    }
}

impl BigFive {
    /// Clamp every dimension into `[-1, 1]`.
    pub fn clamped(self) -> Self {
        Self {
            openness: self.openness.clamp(-1.0, 1.0),
            conscientiousness: self.conscientiousness.clamp(-1.0, 1.0),
            extraversion: self.extraversion.clamp(-1.0, 1.0),
            agreeableness: self.agreeableness.clamp(-1.0, 1.0),
            neuroticism: self.neuroticism.clamp(-1.0, 1.0),
        }
    }
}

/// Freeform persona data: attributes, list-valued collections, and lore.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BotPersona {
    pub attributes: HashMap<String, String>,
    pub collections: HashMap<String, Vec<String>>,
    pub lore: HashMap<String, String>,
}

/// A bot as read at `Load`. Mutable fields (`mood_state`, `urgent_tasks`)
/// are carried separately on [`crate::turn::TurnState`] for the duration of
/// a turn — this struct is the immutable identity shell around them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub bot_id: uuid::Uuid,
    pub basic_info: BotBasicInfo,
    pub big_five: BigFive,
    pub persona: BotPersona,
    pub urgent_tasks: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn big_five_clamps_out_of_range_values() {
        let bf = BigFive {
            openness: 1.5,
            conscientiousness: -2.0,
            extraversion: 0.4,
            agreeableness: 0.0,
            neuroticism: -1.0,
        }
        .clamped();
        assert_eq!(bf.openness, 1.0);
        assert_eq!(bf.conscientiousness, -1.0);
        assert_eq!(bf.extraversion, 0.4);
    }
}
