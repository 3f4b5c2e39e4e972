//! The process-wide storage handle.
//!
//! [`Storage`] is chosen once from [`StorageConfig::backend`] and then used
//! for the life of the process through [`StorageEngine`] and
//! [`RelationResolver`]. Callers never see which engine answers.

use roost_types::{Amenity, ClassTag, Entity, IdentityKey, Place};

use crate::config::{Backend, StorageConfig};
use crate::engine::StorageEngine;
use crate::error::StorageError;
use crate::relational_store::RelationalStore;
use crate::resolver::{ObjectMap, RelationResolver};
use crate::snapshot_store::SnapshotStore;

/// One of the two storage engines.
#[derive(Debug)]
pub enum Storage {
    /// Flat snapshot file.
    Snapshot(SnapshotStore),
    /// `PostgreSQL`.
    Relational(RelationalStore),
}

/// Forward a call to whichever engine is active.
macro_rules! dispatch {
    ($storage:expr, $engine:ident => $call:expr) => {
        match $storage {
            Storage::Snapshot($engine) => $call,
            Storage::Relational($engine) => $call,
        }
    };
}

impl Storage {
    /// Open the configured backend and load its durable state.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] or [`StorageError::Migration`]
    /// if the relational backend cannot be brought up. The snapshot backend
    /// always opens.
    pub async fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let storage = match config.backend {
            Backend::Snapshot => {
                Self::Snapshot(SnapshotStore::open(config.snapshot.path.clone()).await)
            }
            Backend::Relational => {
                let pool = config.relational.pool_config();
                Self::Relational(RelationalStore::connect(&pool).await?)
            }
        };
        tracing::info!(backend = ?storage.backend(), "Storage opened");
        Ok(storage)
    }

    /// Which backend this handle wraps.
    pub const fn backend(&self) -> Backend {
        match self {
            Self::Snapshot(_) => Backend::Snapshot,
            Self::Relational(_) => Backend::Relational,
        }
    }

    /// Release the backend. Unsaved entities are discarded.
    pub async fn close(self) {
        match self {
            Self::Snapshot(store) => {
                if store.pending_count() > 0 {
                    tracing::warn!(pending = store.pending_count(), "Closing with unsaved entities");
                }
            }
            Self::Relational(mut store) => store.close().await,
        }
    }
}

impl StorageEngine for Storage {
    async fn all(&self, class: Option<ClassTag>) -> Result<ObjectMap, StorageError> {
        dispatch!(self, engine => engine.all(class).await)
    }

    async fn register(&mut self, entity: Entity) -> Result<(), StorageError> {
        dispatch!(self, engine => engine.register(entity).await)
    }

    async fn update(&mut self, entity: Entity) -> Result<(), StorageError> {
        dispatch!(self, engine => engine.update(entity).await)
    }

    async fn save(&mut self) -> Result<(), StorageError> {
        dispatch!(self, engine => engine.save().await)
    }

    async fn delete_key(&mut self, key: &IdentityKey) -> Result<(), StorageError> {
        dispatch!(self, engine => engine.delete_key(key).await)
    }

    async fn reload(&mut self) -> Result<(), StorageError> {
        dispatch!(self, engine => engine.reload().await)
    }

    async fn get(&self, class: ClassTag, id: &str) -> Result<Option<Entity>, StorageError> {
        dispatch!(self, engine => engine.get(class, id).await)
    }

    async fn count(&self, class: Option<ClassTag>) -> Result<usize, StorageError> {
        dispatch!(self, engine => engine.count(class).await)
    }
}

impl RelationResolver for Storage {
    async fn parent_of(
        &self,
        child: &Entity,
        parent: ClassTag,
    ) -> Result<Option<Entity>, StorageError> {
        dispatch!(self, engine => engine.parent_of(child, parent).await)
    }

    async fn children_of(
        &self,
        parent: &Entity,
        child: ClassTag,
    ) -> Result<Vec<Entity>, StorageError> {
        dispatch!(self, engine => engine.children_of(parent, child).await)
    }

    async fn amenities_of(&self, place: &Place) -> Result<Vec<Amenity>, StorageError> {
        dispatch!(self, engine => engine.amenities_of(place).await)
    }

    async fn places_with_amenity(&self, amenity: &Amenity) -> Result<Vec<Place>, StorageError> {
        dispatch!(self, engine => engine.places_with_amenity(amenity).await)
    }
}
