//! # storage-adapters
//!
//! Implementations of the `domains` repository ports.
//!
//! - [`memory::MemoryStore`]: always compiled, process-local.
//! - `postgres::PgStore`: behind the `db-postgres` feature.

pub mod memory;

#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;
