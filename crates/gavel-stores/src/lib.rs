//! Repository implementations for gavel.
//!
//! Two backends implement the [`gavel_core::store::Repository`] port with
//! identical atomicity semantics: a PostgreSQL store for production and an
//! in-memory store for development and testing.

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;
