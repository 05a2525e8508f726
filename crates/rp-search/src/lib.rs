//! Candidate-reply tree search: root generation, UCB rollouts, hard/soft
//! gating, and early exit.

pub mod engine;
pub mod gate;
pub mod judge;
pub mod plan_gen;
pub mod tree;

pub use engine::{SearchEngine, SearchOutcome};
pub use gate::{passes_hard_gate, Requirements};
pub use judge::{batch_llm_gate, soft_score, GateVerdict, SoftScore};
pub use plan_gen::{generate_degenerate_plan, generate_plan, generate_variants};
pub use tree::{SearchNode, SearchTree};
