//! `cuebus-store` — SQLite persistence for targets, groups and commands.
//!
//! The engine only talks to the [`Repository`] trait; [`SqliteRepository`]
//! is the production implementation. JSON-shaped columns (`trigger_json`,
//! `arguments_json`, `condition_json`) are decoded into typed values here, so
//! nothing above this crate ever sees a loosely-typed map.

pub mod db;
pub mod error;
pub mod repository;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use repository::{Dataset, Repository};
pub use sqlite::SqliteRepository;
