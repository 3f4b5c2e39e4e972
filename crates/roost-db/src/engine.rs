//! The storage facade every engine implements.
//!
//! Application code holds one engine for the life of the process and only
//! talks to it through [`StorageEngine`]. Lifecycle of an entity:
//!
//! ```text
//! register ──> pending ──save──> durable ──delete──> gone
//!                 │                 ▲
//!                 └──── reload ─────┘  (pending state is discarded)
//! ```
//!
//! Engines differ in when a registered entity becomes visible: the
//! snapshot engine serves reads from its cache, so registration is visible
//! at once; the relational engine queries the database, so visibility
//! starts at the successful `save`.
//!
//! # Duplicates
//!
//! [`StorageEngine::register`] rejects an identity key that is already
//! known with [`StorageError::Validation`]. Use [`StorageEngine::update`]
//! to hand back a modified copy of a known entity.

use std::collections::BTreeMap;

use roost_types::{ClassTag, Entity, IdentityKey};

use crate::error::StorageError;

/// Uniform CRUD contract over one storage backend.
///
/// Mutating operations take `&mut self`: one logical writer per process.
#[allow(async_fn_in_trait)]
pub trait StorageEngine {
    /// Every live entity, optionally restricted to one class.
    ///
    /// Returns a fresh map; mutating it never affects the engine.
    async fn all(
        &self,
        class: Option<ClassTag>,
    ) -> Result<BTreeMap<IdentityKey, Entity>, StorageError>;

    /// Register a new entity under its identity key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Validation`] if the id is empty or the key
    /// is already known.
    async fn register(&mut self, entity: Entity) -> Result<(), StorageError>;

    /// Mark a new or modified entity for the next [`StorageEngine::save`].
    async fn update(&mut self, entity: Entity) -> Result<(), StorageError>;

    /// Durably persist every pending entity in one batch, refreshing each
    /// one's `updated_at`.
    ///
    /// On failure the durable store is left as it was before the call.
    async fn save(&mut self) -> Result<(), StorageError>;

    /// Remove the entity with this key (and everything that depends on
    /// it) from the cache and the durable store. Absent keys are a no-op.
    async fn delete_key(&mut self, key: &IdentityKey) -> Result<(), StorageError>;

    /// Remove `entity`, see [`StorageEngine::delete_key`].
    async fn delete(&mut self, entity: &Entity) -> Result<(), StorageError> {
        self.delete_key(&entity.identity_key()).await
    }

    /// Discard all process-local state and resynchronize from the durable
    /// store. The only operation that drops unsaved registrations.
    async fn reload(&mut self) -> Result<(), StorageError>;

    /// Point lookup; `None` for an unknown id.
    async fn get(&self, class: ClassTag, id: &str) -> Result<Option<Entity>, StorageError>;

    /// Point lookup by class name; `None` for an unknown class or id.
    async fn get_by_name(
        &self,
        class_name: &str,
        id: &str,
    ) -> Result<Option<Entity>, StorageError> {
        match class_name.parse::<ClassTag>() {
            Ok(class) => self.get(class, id).await,
            Err(_) => Ok(None),
        }
    }

    /// Number of live entities, optionally restricted to one class.
    ///
    /// Always equal to `all(class).len()`.
    async fn count(&self, class: Option<ClassTag>) -> Result<usize, StorageError>;
}

/// The classes a filter covers.
pub(crate) fn classes(filter: Option<ClassTag>) -> Vec<ClassTag> {
    filter.map_or_else(|| ClassTag::ALL.to_vec(), |class| vec![class])
}
