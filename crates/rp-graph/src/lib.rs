//! The per-turn graph executor: a fixed sequential pipeline
//! over `TurnState`, implementing `rp_sessions::TurnExecutor` so the
//! session layer never has to know how a turn is actually computed.

pub mod executor;
pub mod repository;
pub mod stages;

pub use executor::GraphExecutor;
pub use repository::{LoadedContext, PersistWrite, PersistedIds, Repository};
