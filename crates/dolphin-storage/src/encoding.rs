use dolphin_core::{GroupVersionKind, ObjectKey};

/// Key encoder for storage keys
pub struct KeyEncoder;

impl KeyEncoder {
    /// Encode an object key: {api_version}/{kind}/{namespace}/{name}
    pub fn encode_object_key(key: &ObjectKey) -> String {
        key.storage_key()
    }

    /// Encode a prefix for scanning objects of a kind, optionally within a namespace
    pub fn encode_prefix(gvk: &GroupVersionKind, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) => format!("{}/{}/{}/", gvk.api_version(), gvk.kind, ns),
            None => format!("{}/{}/", gvk.api_version(), gvk.kind),
        }
    }

    /// Parse a storage key back into an object key.
    ///
    /// The api version may itself contain a slash (`apps/v1`), so the key is
    /// split from the right.
    pub fn parse_key(key: &str) -> Option<ObjectKey> {
        let mut parts = key.rsplitn(4, '/');
        let name = parts.next()?;
        let namespace = parts.next()?;
        let kind = parts.next()?;
        let api_version = parts.next()?;

        if name.is_empty() || namespace.is_empty() || kind.is_empty() || api_version.is_empty() {
            return None;
        }

        Some(ObjectKey::new(
            GroupVersionKind::from_api_version_kind(api_version, kind),
            namespace,
            name,
        ))
    }
}
