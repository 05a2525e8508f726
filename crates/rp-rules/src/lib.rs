//! Deterministic and LLM-assisted turn-stage rules: segmentation, final
//! validation, relationship evolution, and stage transitions.

pub mod evolver;
pub mod final_validator;
pub mod process;
pub mod stage_manager;

pub use evolver::{EvolveOutput, Evolver, EvolverConfig};
pub use final_validator::{validate as validate_final_segments, Requirements as FinalValidatorRequirements, APOLOGY_FALLBACK};
pub use process::SegmentProcessor;
pub use stage_manager::{default_profiles, StageManager, StageProfile};
