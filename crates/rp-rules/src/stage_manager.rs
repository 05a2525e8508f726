//! StageManager.

use rp_domain::{RelationshipStage, RelationshipState, StageTransition, StageTransitionKind};

/// Expected range of each relationship dimension for a given stage,
/// expressed here as a plain const table indexed by
/// `RelationshipStage::ordinal()` since this crate has no dedicated
/// config-asset loader.
#[derive(Debug, Clone, Copy)]
pub struct StageProfile {
    pub min: [f32; 6],
    pub max: [f32; 6],
}

impl StageProfile {
    pub fn matches(&self, dims: [f32; 6]) -> bool {
        (0..6).all(|i| dims[i] >= self.min[i] && dims[i] <= self.max[i])
    }
}

/// One profile per `RelationshipStage::ALL_IN_ORDER` entry. The early
/// stages require rising closeness/trust; the later ("declining") stages
/// require falling warmth/respect. Kept intentionally coarse — the
/// direction of movement matters far more than exact boundaries for the
/// STAY/GROWTH/DECAY/JUMP decision this feeds.
pub fn default_profiles() -> [StageProfile; 10] {
    [
        StageProfile { min: [0.0; 6], max: [0.2, 0.2, 0.2, 1.0, 1.0, 1.0] }, // Initiating
        StageProfile { min: [0.15, 0.1, 0.1, 0.0, 0.0, 0.0], max: [0.35, 0.3, 0.35, 1.0, 1.0, 1.0] }, // Experimenting
        StageProfile { min: [0.3, 0.25, 0.3, 0.0, 0.0, 0.0], max: [0.55, 0.5, 0.55, 1.0, 1.0, 1.0] }, // Intensifying
        StageProfile { min: [0.5, 0.45, 0.5, 0.0, 0.0, 0.0], max: [0.7, 0.65, 0.7, 1.0, 1.0, 1.0] }, // Integrating
        StageProfile { min: [0.65, 0.6, 0.65, 0.5, 0.5, 0.0], max: [1.0, 1.0, 1.0, 1.0, 1.0, 1.0] }, // Bonding
        StageProfile { min: [0.3, 0.3, 0.3, 0.0, 0.0, 0.0], max: [0.65, 0.6, 0.65, 0.6, 0.6, 1.0] }, // Differentiating
        StageProfile { min: [0.15, 0.15, 0.15, 0.0, 0.0, 0.0], max: [0.4, 0.4, 0.4, 0.4, 0.4, 1.0] }, // Circumscribing
        StageProfile { min: [0.05, 0.05, 0.05, 0.0, 0.0, 0.0], max: [0.25, 0.25, 0.25, 0.25, 0.25, 1.0] }, // Stagnating
        StageProfile { min: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0], max: [0.15, 0.15, 0.15, 0.15, 0.15, 1.0] }, // Avoiding
        StageProfile { min: [0.0; 6], max: [0.05, 0.05, 0.05, 0.05, 0.05, 1.0] }, // Terminating
    ]
}

pub struct StageManager {
    profiles: [StageProfile; 10],
}

impl Default for StageManager {
    fn default() -> Self {
        Self { profiles: default_profiles() }
    }
}

impl StageManager {
    pub fn new(profiles: [StageProfile; 10]) -> Self {
        Self { profiles }
    }

    /// Find the best-matching stage for the current dimensions by walking
    /// `RelationshipStage::ALL_IN_ORDER` front-to-back and taking the
    /// first whose profile matches (see DESIGN.md for the tie-break
    /// decision), falling back to the closest stage by Euclidean distance
    /// to the profile midpoint if no profile matches exactly.
    pub fn best_matching_stage(&self, state: &RelationshipState) -> RelationshipStage {
        let dims = state.as_array();
        for stage in RelationshipStage::ALL_IN_ORDER {
            if self.profiles[stage.ordinal()].matches(dims) {
                return stage;
            }
        }
        RelationshipStage::ALL_IN_ORDER
            .into_iter()
            .min_by(|a, b| {
                distance_to_profile(dims, &self.profiles[a.ordinal()])
                    .partial_cmp(&distance_to_profile(dims, &self.profiles[b.ordinal()]))
                    .unwrap()
            })
            .unwrap()
    }

    /// Decide the transition out of `current`, given the updated
    /// relationship dimensions and Detection's implied stage.
    pub fn decide(
        &self,
        current: RelationshipStage,
        state: &RelationshipState,
        implied_stage: Option<RelationshipStage>,
    ) -> StageTransition {
        let proposed = self.best_matching_stage(state);
        let kind = StageTransition::classify(current, proposed);

        if kind == StageTransitionKind::Jump && implied_stage != Some(proposed) {
            // P3: a JUMP without a matching implied stage is downgraded to
            // the nearest permissible step instead.
            let fallback = step_toward(current, proposed);
            let fallback_kind = StageTransition::classify(current, fallback);
            return StageTransition { from: current, to: fallback, kind: fallback_kind };
        }

        StageTransition { from: current, to: proposed, kind }
    }
}

fn distance_to_profile(dims: [f32; 6], profile: &StageProfile) -> f32 {
    (0..6)
        .map(|i| {
            let mid = (profile.min[i] + profile.max[i]) / 2.0;
            (dims[i] - mid).powi(2)
        })
        .sum::<f32>()
        .sqrt()
}

fn step_toward(current: RelationshipStage, proposed: RelationshipStage) -> RelationshipStage {
    let cur = current.ordinal();
    let tgt = proposed.ordinal();
    let next = if tgt > cur {
        cur + 1
    } else if tgt < cur {
        cur.saturating_sub(1)
    } else {
        cur
    };
    RelationshipStage::from_ordinal(next).unwrap_or(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stay_when_dimensions_match_current_stage_profile() {
        let manager = StageManager::default();
        let state = RelationshipState::default(); // matches Initiating
        let transition = manager.decide(RelationshipStage::Initiating, &state, None);
        assert_eq!(transition.kind, StageTransitionKind::Stay);
    }

    #[test]
    fn growth_advances_one_stage_without_implied_stage() {
        let manager = StageManager::default();
        let state = RelationshipState {
            closeness: 0.25,
            trust: 0.2,
            liking: 0.25,
            respect: 0.1,
            warmth: 0.1,
            power: 0.5,
        };
        let transition = manager.decide(RelationshipStage::Initiating, &state, None);
        assert_eq!(transition.kind, StageTransitionKind::Growth);
        assert_eq!(transition.to, RelationshipStage::Experimenting);
    }

    #[test]
    fn jump_without_matching_implied_stage_is_downgraded() {
        let manager = StageManager::default();
        let state = RelationshipState {
            closeness: 0.8,
            trust: 0.75,
            liking: 0.8,
            respect: 0.6,
            warmth: 0.6,
            power: 0.5,
        }; // matches Bonding, far from Initiating
        let transition = manager.decide(RelationshipStage::Initiating, &state, None);
        assert_ne!(transition.to, RelationshipStage::Bonding);
        assert_eq!(transition.kind, StageTransitionKind::Growth);
    }

    #[test]
    fn jump_with_matching_implied_stage_is_honored() {
        let manager = StageManager::default();
        let state = RelationshipState {
            closeness: 0.8,
            trust: 0.75,
            liking: 0.8,
            respect: 0.6,
            warmth: 0.6,
            power: 0.5,
        };
        let transition = manager.decide(RelationshipStage::Initiating, &state, Some(RelationshipStage::Bonding));
        assert_eq!(transition.to, RelationshipStage::Bonding);
        assert_eq!(transition.kind, StageTransitionKind::Jump);
    }
}
