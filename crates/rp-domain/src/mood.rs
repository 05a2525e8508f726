//! Per-bot mood state, shared across every user of that bot.
//! Updated exclusively during `Persist`, under a row lock.

use serde::{Deserialize, Serialize};

/// Pleasure, arousal, dominance in `[-1, 1]`; busyness in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoodState {
    pub pleasure: f32,
    pub arousal: f32,
    pub dominance: f32,
    pub busyness: f32,
}

impl Default for MoodState {
    fn default() -> Self {
        Self {
            pleasure: 0.0,
            arousal: 0.0,
            dominance: 0.0,
            busyness: 0.2,
        }
    }
}

impl MoodState {
    /// Clamp every field to its declared range. Called on every write
    /// path before it lands on the struct.
    pub fn clamped(self) -> Self {
        Self {
            pleasure: self.pleasure.clamp(-1.0, 1.0),
            arousal: self.arousal.clamp(-1.0, 1.0),
            dominance: self.dominance.clamp(-1.0, 1.0),
            busyness: self.busyness.clamp(0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_bounds_every_field() {
        let mood = MoodState {
            pleasure: 2.0,
            arousal: -5.0,
            dominance: 0.3,
            busyness: 1.5,
        }
        .clamped();
        assert_eq!(mood.pleasure, 1.0);
        assert_eq!(mood.arousal, -1.0);
        assert_eq!(mood.dominance, 0.3);
        assert_eq!(mood.busyness, 1.0);
    }
}
