//! Persistence layer (spec §4.5–§4.6): a dialect-aware repository backed
//! by a self-healing connection pool.

pub mod pool;
pub mod repository;

pub use pool::{DbPool, ManagedPool};
pub use repository::Repository;
