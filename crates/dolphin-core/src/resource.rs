use crate::cluster::MysqlCluster;
use crate::types::{GroupVersionKind, ObjectKey, ResourceVersion};
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};

/// Trait for objects kept in the backing store
pub trait Resource: Serialize + for<'de> Deserialize<'de> + Default + Send + Sync {
    /// GroupVersionKind of this resource type
    fn gvk() -> GroupVersionKind;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    /// Build the store identity from metadata
    fn object_key(&self) -> Result<ObjectKey, ResourceError> {
        let metadata = self.metadata();
        let name = metadata
            .name
            .as_ref()
            .ok_or_else(|| ResourceError::MissingField("metadata.name".to_string()))?;
        let namespace = metadata
            .namespace
            .as_ref()
            .ok_or_else(|| ResourceError::MissingField("metadata.namespace".to_string()))?;

        Ok(ObjectKey::new(Self::gvk(), namespace.clone(), name.clone()))
    }

    fn resource_version(&self) -> Option<ResourceVersion> {
        self.metadata()
            .resource_version
            .as_deref()
            .and_then(ResourceVersion::parse)
    }

    fn set_resource_version(&mut self, version: ResourceVersion) {
        self.metadata_mut().resource_version = Some(version.to_string());
    }

    /// A zero-valued object carrying only the given metadata
    fn with_metadata(metadata: ObjectMeta) -> Self {
        let mut object = Self::default();
        *object.metadata_mut() = metadata;
        object
    }
}

/// Resource-related errors
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid resource name: {0}")]
    InvalidName(String),
}

/// Validate a Kubernetes resource name (DNS-1123 subdomain)
pub fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    let bytes = name.as_bytes();
    let alnum = |c: &u8| c.is_ascii_lowercase() || c.is_ascii_digit();

    alnum(&bytes[0])
        && alnum(&bytes[bytes.len() - 1])
        && bytes.iter().all(|c| alnum(c) || *c == b'-' || *c == b'.')
}

/// Validate the metadata every stored object must carry
pub fn validate_metadata(metadata: &ObjectMeta) -> Result<(), ResourceError> {
    let name = metadata
        .name
        .as_ref()
        .ok_or_else(|| ResourceError::MissingField("metadata.name".to_string()))?;

    if !is_valid_name(name) {
        return Err(ResourceError::InvalidName(name.clone()));
    }

    Ok(())
}

impl Resource for StatefulSet {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new("apps", "v1", "StatefulSet")
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl Resource for MysqlCluster {
    fn gvk() -> GroupVersionKind {
        GroupVersionKind::new(
            crate::cluster::API_GROUP,
            crate::cluster::API_VERSION,
            crate::cluster::KIND,
        )
    }

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("db"));
        assert!(is_valid_name("my-cluster"));
        assert!(is_valid_name("my.cluster-1"));

        assert!(!is_valid_name(""));
        assert!(!is_valid_name("MyCluster")); // uppercase
        assert!(!is_valid_name("-db")); // starts with dash
        assert!(!is_valid_name("db-")); // ends with dash
        assert!(!is_valid_name("my_db")); // underscore
    }

    #[test]
    fn test_stateful_set_object_key() {
        let sts = StatefulSet::with_metadata(ObjectMeta {
            name: Some("db-mysql".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        });

        let key = sts.object_key().unwrap();
        assert_eq!(key.name, "db-mysql");
        assert_eq!(key.namespace, "default");
        assert_eq!(key.gvk.kind, "StatefulSet");
        assert!(sts.spec.is_none());
    }

    #[test]
    fn test_object_key_requires_namespace() {
        let sts = StatefulSet::with_metadata(ObjectMeta {
            name: Some("db-mysql".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            sts.object_key(),
            Err(ResourceError::MissingField(_))
        ));
    }

    #[test]
    fn test_resource_version_round_trip() {
        let mut sts = StatefulSet::default();
        assert_eq!(sts.resource_version(), None);
        sts.set_resource_version(ResourceVersion(3));
        assert_eq!(sts.metadata.resource_version.as_deref(), Some("3"));
        assert_eq!(sts.resource_version(), Some(ResourceVersion(3)));
    }

    #[test]
    fn test_validate_metadata() {
        let meta = ObjectMeta {
            name: Some("Bad_Name".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            validate_metadata(&meta),
            Err(ResourceError::InvalidName(_))
        ));
        assert!(validate_metadata(&ObjectMeta::default()).is_err());
    }
}
