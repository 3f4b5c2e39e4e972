//! Storage layer for the Roost entity model (snapshot file + `PostgreSQL`).
//!
//! Two interchangeable engines implement one facade. The process picks one
//! at startup from configuration and keeps it for its whole life.
//!
//! # Architecture
//!
//! ```text
//! Application
//!     |
//!     +-- StorageEngine / RelationResolver --> Storage
//!                                                |
//!             +----------------------------------+------------------------+
//!             |                                                           |
//!      SnapshotStore                                              RelationalStore
//!      (in-memory cache,                                          (pending buffer,
//!       one JSON artifact)                                         one table per class)
//! ```
//!
//! # Modules
//!
//! - [`engine`] -- The CRUD facade trait
//! - [`resolver`] -- Relationship navigation between entities
//! - [`storage`] -- Backend selection and dispatch
//! - [`snapshot_store`] -- Flat-file engine
//! - [`relational_store`] -- `PostgreSQL` engine
//! - [`postgres`] -- Connection pool and migrations
//! - [`config`] -- YAML configuration with environment overrides
//! - [`error`] -- Shared error types

pub mod config;
pub mod engine;
pub mod error;
pub mod postgres;
pub mod relational_store;
pub mod resolver;
mod rows;
pub mod snapshot_store;
pub mod storage;

// Re-export primary types for convenience.
pub use config::{Backend, ConfigError, StorageConfig};
pub use engine::StorageEngine;
pub use error::StorageError;
pub use postgres::{PostgresConfig, PostgresPool};
pub use relational_store::RelationalStore;
pub use resolver::{ObjectMap, RelationResolver};
pub use snapshot_store::SnapshotStore;
pub use storage::Storage;
