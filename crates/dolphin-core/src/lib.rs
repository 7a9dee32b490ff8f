//! Dolphin Core - Fundamental types for the Dolphin MySQL operator
//!
//! This crate provides:
//! - The `MysqlCluster` resource and its status conditions
//! - Names, labels and owner references of derived objects
//! - The configuration hash that drives rolling restarts
//! - Error types with miette diagnostics
//! - Serialization helpers

pub mod cluster;
pub mod config;
pub mod error;
pub mod names;
pub mod resource;
pub mod types;

// Re-export commonly used types
pub use cluster::{
    ClusterCondition, ClusterConditionType, ConditionStatus, MysqlCluster, MysqlClusterSpec,
    MysqlClusterStatus, PodSpecOverrides,
};
pub use config::{config_hash, render_my_cnf};
pub use error::{DolphinError, Result};
pub use names::ClusterResource;
pub use resource::{is_valid_name, Resource, ResourceError};
pub use types::{GroupVersionKind, ObjectKey, ResourceVersion};

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::apps::v1::StatefulSet;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Serialize a resource to YAML
pub fn to_yaml<T: serde::Serialize>(resource: &T) -> Result<String> {
    serde_yaml::to_string(resource).map_err(|e| {
        DolphinError::serialization_error(
            format!("Failed to serialize to YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}

/// Deserialize a resource from YAML
pub fn from_yaml<T: for<'de> serde::Deserialize<'de>>(data: &str) -> Result<T> {
    serde_yaml::from_str(data).map_err(|e| {
        DolphinError::serialization_error(
            format!("Failed to deserialize from YAML: {}", e),
            Some(Box::new(e)),
        )
    })
}
