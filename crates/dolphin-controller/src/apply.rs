//! Create-or-patch over the backing store

use crate::error::{ControllerError, Result};
use chrono::Utc;
use dolphin_core::{DolphinError, ObjectKey, ObjectMeta, Resource, ResourceVersion};
use dolphin_storage::{KVStore, KeyEncoder};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// What a create-or-patch call did to the stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyVerb {
    Unchanged,
    Created,
    Patched,
}

impl fmt::Display for ApplyVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyVerb::Unchanged => write!(f, "unchanged"),
            ApplyVerb::Created => write!(f, "created"),
            ApplyVerb::Patched => write!(f, "patched"),
        }
    }
}

/// Read and create-or-patch access to stored objects
pub trait Applier {
    /// Fetch an object, `None` if it does not exist
    fn get<T: Resource>(&self, key: &ObjectKey) -> Result<Option<T>>;

    /// List objects of a kind, optionally within one namespace
    fn list<T: Resource>(&self, namespace: Option<&str>) -> Result<Vec<T>>;

    /// Fetch the object identified by `meta` (or a zero-valued object carrying
    /// `meta` when absent), run `mutate` on it and write the result back if
    /// anything changed.
    fn create_or_patch<T, F>(&self, meta: ObjectMeta, mutate: F) -> Result<(T, ApplyVerb)>
    where
        T: Resource,
        F: FnOnce(T) -> T;
}

/// `Applier` backed by a `KVStore`.
///
/// Objects are stored as JSON. Writes are compare-and-swap against the bytes
/// that were read, so a concurrent writer turns into a `Conflict`.
pub struct StoreApplier<S: KVStore> {
    store: S,
}

impl<S: KVStore> StoreApplier<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn decode<T: Resource>(key: &ObjectKey, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| ControllerError::serialization_error(key.to_string(), e.to_string()))
    }

    fn encode<T: Resource>(key: &ObjectKey, object: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(object)
            .map_err(|e| ControllerError::serialization_error(key.to_string(), e.to_string()))
    }

    fn to_value<T: Resource>(key: &ObjectKey, object: &T) -> Result<serde_json::Value> {
        serde_json::to_value(object)
            .map_err(|e| ControllerError::serialization_error(key.to_string(), e.to_string()))
    }

    /// Build the conflict error, reporting the version now in the store
    fn conflict<T: Resource>(
        &self,
        key: &ObjectKey,
        expected: Option<ResourceVersion>,
    ) -> ControllerError {
        let storage_key = KeyEncoder::encode_object_key(key);
        let stored = match self.store.get(storage_key.as_bytes()) {
            Ok(stored) => stored,
            Err(e) => {
                debug!("Failed to re-read {} after conflict: {}", key, e);
                None
            }
        };
        let actual = stored
            .and_then(|bytes| match Self::decode::<T>(key, &bytes) {
                Ok(object) => Some(object),
                Err(e) => {
                    debug!("Failed to decode {} after conflict: {}", key, e);
                    None
                }
            })
            .and_then(|object| object.resource_version());

        let err = DolphinError::conflict(key.to_string(), show(expected), show(actual));
        err.into()
    }

    fn create<T, F>(&self, key: &ObjectKey, meta: ObjectMeta, mutate: F) -> Result<(T, ApplyVerb)>
    where
        T: Resource,
        F: FnOnce(T) -> T,
    {
        let mut object = mutate(T::with_metadata(meta));
        check_identity(key, &object)?;

        let metadata = object.metadata_mut();
        if metadata.uid.is_none() {
            metadata.uid = Some(Uuid::new_v4().to_string());
        }
        metadata.creation_timestamp = Some(Time(Utc::now()));
        object.set_resource_version(ResourceVersion(1));

        let bytes = Self::encode(key, &object)?;
        let storage_key = KeyEncoder::encode_object_key(key);
        let swapped = self
            .store
            .compare_and_swap(storage_key.as_bytes(), None, &bytes)?;
        if !swapped {
            return Err(self.conflict::<T>(key, None));
        }

        debug!("Created {}", key);
        Ok((object, ApplyVerb::Created))
    }

    fn patch<T, F>(&self, key: &ObjectKey, stored: &[u8], mutate: F) -> Result<(T, ApplyVerb)>
    where
        T: Resource,
        F: FnOnce(T) -> T,
    {
        let current: T = Self::decode(key, stored)?;
        let base_version = current.resource_version();
        let original = Self::to_value(key, &current)?;

        let mut object = mutate(current);
        check_identity(key, &object)?;

        let patch = json_patch::diff(&original, &Self::to_value(key, &object)?);
        if patch.0.is_empty() {
            debug!("{} unchanged", key);
            return Ok((object, ApplyVerb::Unchanged));
        }

        let next = base_version.unwrap_or(ResourceVersion(0)).next();
        object.set_resource_version(next);

        let bytes = Self::encode(key, &object)?;
        let storage_key = KeyEncoder::encode_object_key(key);
        let swapped = self
            .store
            .compare_and_swap(storage_key.as_bytes(), Some(stored), &bytes)?;
        if !swapped {
            return Err(self.conflict::<T>(key, base_version));
        }

        debug!(
            "Patched {} ({} operations, resourceVersion {})",
            key,
            patch.0.len(),
            next
        );
        Ok((object, ApplyVerb::Patched))
    }
}

fn show(rv: Option<ResourceVersion>) -> String {
    rv.map_or_else(|| "none".to_string(), |rv| rv.to_string())
}

/// The mutation must not move the object to another key
fn check_identity<T: Resource>(key: &ObjectKey, object: &T) -> Result<()> {
    let after = object
        .object_key()
        .map_err(|e| ControllerError::invalid_identity(e.to_string()))?;
    if &after != key {
        return Err(ControllerError::invalid_identity(format!(
            "mutation changed identity from {} to {}",
            key, after
        )));
    }
    Ok(())
}

impl<S: KVStore> Applier for StoreApplier<S> {
    fn get<T: Resource>(&self, key: &ObjectKey) -> Result<Option<T>> {
        let storage_key = KeyEncoder::encode_object_key(key);
        match self.store.get(storage_key.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn list<T: Resource>(&self, namespace: Option<&str>) -> Result<Vec<T>> {
        let prefix = KeyEncoder::encode_prefix(&T::gvk(), namespace);
        let mut objects = Vec::new();
        for (raw_key, bytes) in self.store.scan(prefix.as_bytes())? {
            let raw_key = String::from_utf8_lossy(&raw_key);
            let key = KeyEncoder::parse_key(&raw_key).ok_or_else(|| {
                ControllerError::serialization_error(raw_key.to_string(), "malformed storage key")
            })?;
            objects.push(Self::decode(&key, &bytes)?);
        }
        Ok(objects)
    }

    fn create_or_patch<T, F>(&self, meta: ObjectMeta, mutate: F) -> Result<(T, ApplyVerb)>
    where
        T: Resource,
        F: FnOnce(T) -> T,
    {
        let key = T::with_metadata(meta.clone())
            .object_key()
            .map_err(|e| ControllerError::invalid_identity(e.to_string()))?;
        let storage_key = KeyEncoder::encode_object_key(&key);

        match self.store.get(storage_key.as_bytes())? {
            Some(stored) => self.patch(&key, &stored, mutate),
            None => self.create(&key, meta, mutate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dolphin_core::StatefulSet;
    use dolphin_storage::MemoryBackend;

    fn meta() -> ObjectMeta {
        ObjectMeta {
            name: Some("db-mysql".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        }
    }

    fn with_replicas(replicas: i32) -> impl FnOnce(StatefulSet) -> StatefulSet {
        move |mut sts| {
            sts.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
            sts
        }
    }

    #[test]
    fn test_create_then_unchanged_then_patched() {
        let applier = StoreApplier::new(MemoryBackend::new());

        let (created, verb) = applier.create_or_patch(meta(), with_replicas(3)).unwrap();
        assert_eq!(verb, ApplyVerb::Created);
        assert!(created.metadata.uid.is_some());
        assert_eq!(created.metadata.resource_version.as_deref(), Some("1"));

        let (same, verb) = applier.create_or_patch(meta(), with_replicas(3)).unwrap();
        assert_eq!(verb, ApplyVerb::Unchanged);
        assert_eq!(same.metadata.uid, created.metadata.uid);
        assert_eq!(same.metadata.resource_version.as_deref(), Some("1"));

        let (patched, verb) = applier.create_or_patch(meta(), with_replicas(5)).unwrap();
        assert_eq!(verb, ApplyVerb::Patched);
        assert_eq!(patched.metadata.resource_version.as_deref(), Some("2"));

        let key = patched.object_key().unwrap();
        let stored: StatefulSet = applier.get(&key).unwrap().unwrap();
        assert_eq!(stored.spec.unwrap().replicas, Some(5));
    }

    #[test]
    fn test_concurrent_write_is_conflict() {
        let applier = StoreApplier::new(MemoryBackend::new());
        applier
            .create_or_patch::<StatefulSet, _>(meta(), with_replicas(3))
            .unwrap();

        let result = applier.create_or_patch::<StatefulSet, _>(meta(), |mut sts| {
            // another writer lands between our read and our write
            applier
                .store()
                .put(
                    b"apps/v1/StatefulSet/default/db-mysql",
                    br#"{"apiVersion":"apps/v1","kind":"StatefulSet","metadata":{"name":"db-mysql","namespace":"default","resourceVersion":"9"}}"#,
                )
                .unwrap();
            sts.spec.get_or_insert_with(Default::default).replicas = Some(5);
            sts
        });

        let err = result.unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("expected resourceVersion 1"));

        // the interleaved write is left in place
        let key = StatefulSet::with_metadata(meta()).object_key().unwrap();
        let stored: StatefulSet = applier.get(&key).unwrap().unwrap();
        assert_eq!(stored.metadata.resource_version.as_deref(), Some("9"));
    }

    #[test]
    fn test_conflict_with_unreadable_winner() {
        let applier = StoreApplier::new(MemoryBackend::new());
        applier
            .create_or_patch::<StatefulSet, _>(meta(), with_replicas(3))
            .unwrap();

        let err = applier
            .create_or_patch::<StatefulSet, _>(meta(), |mut sts| {
                applier
                    .store()
                    .put(b"apps/v1/StatefulSet/default/db-mysql", b"not json")
                    .unwrap();
                sts.spec.get_or_insert_with(Default::default).replicas = Some(5);
                sts
            })
            .unwrap_err();

        assert!(err.is_conflict());
        assert!(err.to_string().ends_with("found none"));
    }

    #[test]
    fn test_missing_namespace_is_invalid_identity() {
        let applier = StoreApplier::new(MemoryBackend::new());
        let mut meta = meta();
        meta.namespace = None;

        let err = applier
            .create_or_patch::<StatefulSet, _>(meta, |sts| sts)
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidIdentity { .. }));
        assert!(applier.store().is_empty());
    }

    #[test]
    fn test_mutation_cannot_rename() {
        let applier = StoreApplier::new(MemoryBackend::new());
        let err = applier
            .create_or_patch::<StatefulSet, _>(meta(), |mut sts| {
                sts.metadata.name = Some("other".to_string());
                sts
            })
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidIdentity { .. }));
    }

    #[test]
    fn test_list_by_namespace() {
        let applier = StoreApplier::new(MemoryBackend::new());
        for ns in ["a", "b"] {
            let mut meta = meta();
            meta.namespace = Some(ns.to_string());
            applier
                .create_or_patch::<StatefulSet, _>(meta, with_replicas(1))
                .unwrap();
        }

        assert_eq!(applier.list::<StatefulSet>(None).unwrap().len(), 2);
        let in_a = applier.list::<StatefulSet>(Some("a")).unwrap();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].metadata.namespace.as_deref(), Some("a"));
    }
}
