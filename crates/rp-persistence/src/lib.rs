//! `sqlx`-postgres implementation of the `rp_graph::Repository` boundary.

pub mod pool;
pub mod repo;

pub use pool::connect;
pub use repo::PgRepository;
