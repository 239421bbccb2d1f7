//! Shared scaffolding for `PQO_DATABASE_URL`-gated scenario tests: a
//! connect-and-migrate helper plus fixture builders for the two aggregates
//! most tests need seeded. Deliberately has no dependency on `pqo-db`
//! itself, since `pqo-db`'s own scenario tests use this crate as a
//! dev-dependency.

pub mod db;
pub mod fixtures;

pub use db::{database_url, pool};
