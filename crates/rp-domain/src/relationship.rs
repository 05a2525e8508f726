//! Relationship physics: the six-dimensional relationship state, the ten
//! ordinal relationship stages, and the STAY/GROWTH/DECAY/JUMP transition
//! law.

use serde::{Deserialize, Serialize};

/// Per-turn delta cap: no relationship dimension may move by more than
/// this in absolute value in a single turn.
pub const DELTA_MAX: f32 = 0.30;

/// Six floats in `[0, 1]`, per-bot-per-user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelationshipState {
    pub closeness: f32,
    pub trust: f32,
    pub liking: f32,
    pub respect: f32,
    pub warmth: f32,
    pub power: f32,
}

impl Default for RelationshipState {
    fn default() -> Self {
        Self {
            closeness: 0.1,
            trust: 0.1,
            liking: 0.1,
            respect: 0.1,
            warmth: 0.1,
            power: 0.5,
        }
    }
}

/// A proposed per-turn change to each relationship dimension, produced by
/// the Evolver before clamping.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RelationshipDelta {
    pub closeness: f32,
    pub trust: f32,
    pub liking: f32,
    pub respect: f32,
    pub warmth: f32,
    pub power: f32,
}

impl RelationshipState {
    /// Apply a proposed delta, clamping the delta itself to
    /// `[-DELTA_MAX, DELTA_MAX]` and the resulting dimension to `[0, 1]`.
    /// This is the only way callers should mutate a `RelationshipState` —
    /// The delta-magnitude and range invariants are structurally enforced
    /// here rather than trusted of the caller.
    pub fn apply_delta(&mut self, delta: RelationshipDelta) {
        self.closeness = clamp_dim(self.closeness, delta.closeness);
        self.trust = clamp_dim(self.trust, delta.trust);
        self.liking = clamp_dim(self.liking, delta.liking);
        self.respect = clamp_dim(self.respect, delta.respect);
        self.warmth = clamp_dim(self.warmth, delta.warmth);
        self.power = clamp_dim(self.power, delta.power);
    }

    /// The six dimensions as a fixed-order array, used by [`crate::stage::StageProfile`]
    /// matching and by the UCB/scoring code that needs a generic vector view.
    pub fn as_array(&self) -> [f32; 6] {
        [
            self.closeness,
            self.trust,
            self.liking,
            self.respect,
            self.warmth,
            self.power,
        ]
    }

    /// `true` iff every dimension is within `[0, 1]`.
    pub fn is_in_range(&self) -> bool {
        self.as_array().iter().all(|v| (0.0..=1.0).contains(v))
    }
}

fn clamp_dim(current: f32, delta: f32) -> f32 {
    let bounded_delta = delta.clamp(-DELTA_MAX, DELTA_MAX);
    (current + bounded_delta).clamp(0.0, 1.0)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RelationshipStage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One of the ten ordered relationship stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStage {
    Initiating,
    Experimenting,
    Intensifying,
    Integrating,
    Bonding,
    Differentiating,
    Circumscribing,
    Stagnating,
    Avoiding,
    Terminating,
}

impl RelationshipStage {
    /// Declaration order, walked front-to-back by [`crate::StageManager`]-style
    /// logic when more than one stage profile's thresholds are crossed at
    /// once.
    pub const ALL_IN_ORDER: [RelationshipStage; 10] = [
        RelationshipStage::Initiating,
        RelationshipStage::Experimenting,
        RelationshipStage::Intensifying,
        RelationshipStage::Integrating,
        RelationshipStage::Bonding,
        RelationshipStage::Differentiating,
        RelationshipStage::Circumscribing,
        RelationshipStage::Stagnating,
        RelationshipStage::Avoiding,
        RelationshipStage::Terminating,
    ];

    pub fn ordinal(self) -> usize {
        Self::ALL_IN_ORDER
            .iter()
            .position(|s| *s == self)
            .expect("RelationshipStage::ALL_IN_ORDER is exhaustive")
    }

    pub fn from_ordinal(ordinal: usize) -> Option<RelationshipStage> {
        Self::ALL_IN_ORDER.get(ordinal).copied()
    }

    /// The earlier "forming" stages that use stricter search defaults.
    pub fn is_early(self) -> bool {
        matches!(self, Self::Initiating | Self::Experimenting)
    }

    pub fn is_mid(self) -> bool {
        matches!(self, Self::Intensifying | Self::Integrating)
    }
}

impl Default for RelationshipStage {
    fn default() -> Self {
        RelationshipStage::Initiating
    }
}

impl std::fmt::Display for RelationshipStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiating => "initiating",
            Self::Experimenting => "experimenting",
            Self::Intensifying => "intensifying",
            Self::Integrating => "integrating",
            Self::Bonding => "bonding",
            Self::Differentiating => "differentiating",
            Self::Circumscribing => "circumscribing",
            Self::Stagnating => "stagnating",
            Self::Avoiding => "avoiding",
            Self::Terminating => "terminating",
        };
        write!(f, "{s}")
    }
}

/// STAY / GROWTH (forward one step) / DECAY (backward one step) / JUMP
/// (forward by more than one step). JUMPs additionally require Detection's
/// implied stage to match the proposed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageTransitionKind {
    Stay,
    Growth,
    Decay,
    Jump,
}

/// A decided stage transition, produced by the StageManager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: RelationshipStage,
    pub to: RelationshipStage,
    pub kind: StageTransitionKind,
}

impl StageTransition {
    /// Classify a `from -> to` move by ordinal distance. Does not itself
    /// check the JUMP precondition (implied-stage match) — that is the
    /// caller's (`StageManager`'s) responsibility since it needs Detection
    /// output this type doesn't carry.
    pub fn classify(from: RelationshipStage, to: RelationshipStage) -> StageTransitionKind {
        let diff = to.ordinal() as i64 - from.ordinal() as i64;
        match diff {
            0 => StageTransitionKind::Stay,
            1 => StageTransitionKind::Growth,
            d if d < 0 => StageTransitionKind::Decay,
            _ => StageTransitionKind::Jump,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_delta_clamps_to_delta_max() {
        let mut state = RelationshipState {
            closeness: 0.5,
            trust: 0.5,
            liking: 0.5,
            respect: 0.5,
            warmth: 0.5,
            power: 0.5,
        };
        state.apply_delta(RelationshipDelta {
            closeness: 10.0,
            ..Default::default()
        });
        assert_eq!(state.closeness, 0.5 + DELTA_MAX);
    }

    #[test]
    fn apply_delta_clamps_resulting_dimension_to_unit_range() {
        let mut state = RelationshipState {
            closeness: 0.05,
            trust: 0.95,
            liking: 0.5,
            respect: 0.5,
            warmth: 0.5,
            power: 0.5,
        };
        state.apply_delta(RelationshipDelta {
            closeness: -0.3,
            trust: 0.3,
            ..Default::default()
        });
        assert_eq!(state.closeness, 0.0);
        assert_eq!(state.trust, 1.0);
        assert!(state.is_in_range());
    }

    #[test]
    fn stage_ordinal_round_trips() {
        for (i, stage) in RelationshipStage::ALL_IN_ORDER.iter().enumerate() {
            assert_eq!(stage.ordinal(), i);
            assert_eq!(RelationshipStage::from_ordinal(i), Some(*stage));
        }
    }

    #[test]
    fn classify_transition_kinds() {
        use RelationshipStage::*;
        assert_eq!(
            StageTransition::classify(Initiating, Initiating),
            StageTransitionKind::Stay
        );
        assert_eq!(
            StageTransition::classify(Initiating, Experimenting),
            StageTransitionKind::Growth
        );
        assert_eq!(
            StageTransition::classify(Experimenting, Initiating),
            StageTransitionKind::Decay
        );
        assert_eq!(
            StageTransition::classify(Initiating, Bonding),
            StageTransitionKind::Jump
        );
    }
}
