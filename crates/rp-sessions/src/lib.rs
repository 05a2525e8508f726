//! The session controller: per-`(user, bot)` turn serialization, merge-and-
//! restart cancellation, bounded queueing, and segment emission.

mod cancel_map;
mod controller;
mod dispatcher;
mod emitter;

pub use cancel_map::CancelMap;
pub use controller::SessionController;
pub use dispatcher::{SegmentsReadyCallback, SessionDispatcher, TurnExecutor, TurnOutcome, TurnResult};
pub use emitter::{emit_segments, EmitOutcome};
