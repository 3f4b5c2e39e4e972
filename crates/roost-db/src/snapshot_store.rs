//! Snapshot-file storage engine.
//!
//! The whole object set lives in an in-process cache keyed by identity key.
//! [`SnapshotStore::save`] writes every cached entity to a single JSON
//! artifact, one self-describing record per entity:
//!
//! ```json
//! {
//!   "User.0190f3c2-...": { "__class__": "User", "id": "0190f3c2-...", ... },
//!   "City.0190f3c4-...": { "__class__": "City", "state_id": "...", ... }
//! }
//! ```
//!
//! The artifact is replaced atomically (write to a sibling temp file, then
//! rename), so a failed save leaves the previous artifact intact.
//! [`SnapshotStore::reload`] rebuilds the cache from it, decoding each
//! record as the class its tag names; a missing or unreadable artifact
//! yields an empty cache.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use roost_types::{Amenity, ClassTag, Entity, IdentityKey, Place, now};

use crate::engine::{StorageEngine, classes};
use crate::error::StorageError;
use crate::resolver::{self, ObjectMap, RelationResolver};

/// File-backed engine serving every read from its cache.
#[derive(Debug)]
pub struct SnapshotStore {
    path: PathBuf,
    objects: ObjectMap,
    dirty: BTreeSet<IdentityKey>,
}

impl SnapshotStore {
    /// Open the store at `path` and load whatever the artifact holds.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            path: path.into(),
            objects: ObjectMap::new(),
            dirty: BTreeSet::new(),
        };
        store.load().await;
        store
    }

    /// Location of the snapshot artifact.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entities registered or updated since the last save.
    pub fn pending_count(&self) -> usize {
        self.dirty.len()
    }

    /// Replace the cache with the artifact's contents.
    async fn load(&mut self) {
        self.dirty.clear();
        self.objects = match read_artifact(&self.path).await {
            Ok(objects) => objects,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Snapshot artifact unreadable, starting empty"
                );
                ObjectMap::new()
            }
        };
        tracing::info!(
            path = %self.path.display(),
            objects = self.objects.len(),
            "Loaded snapshot"
        );
    }

    fn scan(&self, class: ClassTag) -> impl Iterator<Item = (&IdentityKey, &Entity)> {
        self.objects.iter().filter(move |(key, _)| key.class() == class)
    }
}

impl StorageEngine for SnapshotStore {
    async fn all(
        &self,
        class: Option<ClassTag>,
    ) -> Result<ObjectMap, StorageError> {
        Ok(classes(class)
            .into_iter()
            .flat_map(|class| self.scan(class))
            .map(|(key, entity)| (key.clone(), entity.clone()))
            .collect())
    }

    async fn register(&mut self, entity: Entity) -> Result<(), StorageError> {
        entity.validate()?;
        let key = entity.identity_key();
        if self.objects.contains_key(&key) {
            return Err(StorageError::Validation(format!("{key} is already registered")));
        }
        tracing::debug!(%key, "Registered entity");
        self.dirty.insert(key.clone());
        self.objects.insert(key, entity);
        Ok(())
    }

    async fn update(&mut self, entity: Entity) -> Result<(), StorageError> {
        entity.validate()?;
        let key = entity.identity_key();
        self.dirty.insert(key.clone());
        self.objects.insert(key, entity);
        Ok(())
    }

    async fn save(&mut self) -> Result<(), StorageError> {
        let at = now();
        let mut staged = self.objects.clone();
        for key in &self.dirty {
            if let Some(entity) = staged.get_mut(key) {
                entity.touch(at);
            }
        }

        resolver::check_references(&staged)?;
        write_artifact(&self.path, &staged).await?;

        self.objects = staged;
        let flushed = std::mem::take(&mut self.dirty).len();
        tracing::debug!(
            path = %self.path.display(),
            objects = self.objects.len(),
            flushed,
            "Saved snapshot"
        );
        Ok(())
    }

    async fn delete_key(&mut self, key: &IdentityKey) -> Result<(), StorageError> {
        match read_artifact(&self.path).await {
            Ok(mut durable) => {
                if resolver::remove_cascading(&mut durable, key) > 0 {
                    write_artifact(&self.path, &durable).await?;
                }
            }
            // An undecodable artifact holds nothing to remove; the next save replaces it.
            Err(StorageError::Serialization(e)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Snapshot artifact unreadable, deleting from cache only"
                );
            }
            Err(e) => return Err(e),
        }

        let removed = resolver::remove_cascading(&mut self.objects, key);
        let objects = &self.objects;
        self.dirty.retain(|k| objects.contains_key(k));
        if removed > 0 {
            tracing::debug!(%key, removed, "Deleted entity");
        }
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), StorageError> {
        self.load().await;
        Ok(())
    }

    async fn get(&self, class: ClassTag, id: &str) -> Result<Option<Entity>, StorageError> {
        Ok(self.objects.get(&IdentityKey::new(class, id)).cloned())
    }

    async fn count(&self, class: Option<ClassTag>) -> Result<usize, StorageError> {
        Ok(classes(class)
            .into_iter()
            .map(|class| self.scan(class).count())
            .sum())
    }
}

impl RelationResolver for SnapshotStore {
    async fn parent_of(
        &self,
        child: &Entity,
        parent: ClassTag,
    ) -> Result<Option<Entity>, StorageError> {
        resolver::parent_in(&self.objects, child, parent)
    }

    async fn children_of(
        &self,
        parent: &Entity,
        child: ClassTag,
    ) -> Result<Vec<Entity>, StorageError> {
        resolver::children_in(&self.objects, parent, child)
    }

    async fn amenities_of(&self, place: &Place) -> Result<Vec<Amenity>, StorageError> {
        resolver::amenities_in(&self.objects, place)
    }

    async fn places_with_amenity(&self, amenity: &Amenity) -> Result<Vec<Place>, StorageError> {
        Ok(resolver::places_linked_in(&self.objects, amenity))
    }
}

// ---------------------------------------------------------------------------
// Artifact I/O
// ---------------------------------------------------------------------------

/// Read and decode the artifact. A missing file is an empty store.
///
/// Records with an unknown class tag, undecodable attributes, or a key that
/// does not match their own identity are skipped with a warning.
async fn read_artifact(path: &Path) -> Result<ObjectMap, StorageError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ObjectMap::new()),
        Err(e) => {
            return Err(StorageError::Connection(format!(
                "cannot read {}: {e}",
                path.display()
            )));
        }
    };

    let records: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)?;
    let mut objects = ObjectMap::new();
    for (stored_key, record) in records {
        let entity = match Entity::from_record(record) {
            Ok(entity) => entity,
            Err(e) => {
                tracing::warn!(key = stored_key, error = %e, "Skipping snapshot record");
                continue;
            }
        };
        let key = entity.identity_key();
        if entity.validate().is_err() || key.to_string() != stored_key {
            tracing::warn!(key = stored_key, "Skipping snapshot record with mismatched key");
            continue;
        }
        objects.insert(key, entity);
    }
    Ok(objects)
}

/// Encode `objects` and atomically replace the artifact.
async fn write_artifact(path: &Path, objects: &ObjectMap) -> Result<(), StorageError> {
    let mut records = serde_json::Map::with_capacity(objects.len());
    for (key, entity) in objects {
        records.insert(key.to_string(), entity.to_record()?);
    }
    let bytes = serde_json::to_vec_pretty(&records)?;

    let staging = staging_path(path);
    tokio::fs::write(&staging, &bytes).await.map_err(|e| {
        StorageError::Connection(format!("cannot write {}: {e}", staging.display()))
    })?;
    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(StorageError::Connection(format!(
            "cannot replace {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

/// Sibling path the artifact is staged at before the rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use roost_types::{State, User};
    use tempfile::TempDir;

    use super::*;

    async fn open_in(dir: &TempDir) -> SnapshotStore {
        SnapshotStore::open(dir.path().join("roost.json")).await
    }

    #[tokio::test]
    async fn missing_artifact_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_in(&dir).await;
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn corrupt_artifact_reloads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roost.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = SnapshotStore::open(&path).await;
        assert_eq!(store.count(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_after_corrupt_artifact_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roost.json");
        tokio::fs::write(&path, b"[1, 2,").await.unwrap();

        let mut store = SnapshotStore::open(&path).await;
        store.delete(&Entity::from(State::new("Never"))).await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"[1, 2,");
    }

    #[tokio::test]
    async fn delete_after_corrupt_artifact_still_cascades_in_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roost.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let mut store = SnapshotStore::open(&path).await;
        let state = State::new("Oregon");
        let city = roost_types::City::new(&state.id, "Portland");
        store.register(Entity::from(state.clone())).await.unwrap();
        store.register(Entity::from(city)).await.unwrap();

        store.delete(&Entity::from(state)).await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert_eq!(store.pending_count(), 0);
    }

    #[tokio::test]
    async fn registration_is_visible_before_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_in(&dir).await;
        let user = User::new("a@roost.test", "pw");
        store.register(Entity::from(user.clone())).await.unwrap();

        assert_eq!(store.count(Some(ClassTag::User)).await.unwrap(), 1);
        assert_eq!(store.pending_count(), 1);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn save_refreshes_updated_at_of_pending_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_in(&dir).await;
        let old = State::new("Old");
        store.register(Entity::from(old.clone())).await.unwrap();
        store.save().await.unwrap();
        let first = store.get(ClassTag::State, old.id.as_str()).await.unwrap().unwrap();

        store.register(Entity::from(State::new("New"))).await.unwrap();
        store.save().await.unwrap();
        let second = store.get(ClassTag::State, old.id.as_str()).await.unwrap().unwrap();

        assert_eq!(first.updated_at(), second.updated_at());
        assert!(first.updated_at() >= old.updated_at);
    }

    #[tokio::test]
    async fn skips_records_with_unknown_class_or_wrong_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roost.json");
        let state = Entity::from(State::new("Kept"));
        let mut records = serde_json::Map::new();
        records.insert(state.identity_key().to_string(), state.to_record().unwrap());
        records.insert(
            "BaseModel.1".to_owned(),
            serde_json::json!({ "__class__": "BaseModel", "id": "1" }),
        );
        records.insert("State.wrong".to_owned(), state.to_record().unwrap());
        tokio::fs::write(&path, serde_json::to_vec(&records).unwrap()).await.unwrap();

        let store = SnapshotStore::open(&path).await;
        let all = store.all(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all.get(&state.identity_key()), Some(&state));
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_artifact_and_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open_in(&dir).await;
        let user = User::new("a@roost.test", "pw");
        store.register(Entity::from(user.clone())).await.unwrap();
        store.save().await.unwrap();
        let before = tokio::fs::read(store.path()).await.unwrap();

        let orphan = roost_types::City::new(&State::new("Unsaved").id, "Orphan");
        store.register(Entity::from(orphan)).await.unwrap();
        let err = store.save().await.unwrap_err();
        assert!(err.is_integrity());

        let after = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(store.pending_count(), 1);

        store.reload().await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 1);
    }

    #[test]
    fn staging_path_is_a_sibling() {
        let staged = staging_path(Path::new("/data/roost.json"));
        assert_eq!(staged, PathBuf::from("/data/roost.json.tmp"));
    }
}
