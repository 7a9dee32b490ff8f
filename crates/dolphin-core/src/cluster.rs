//! The `MysqlCluster` custom resource.
//!
//! `spec` is the immutable-per-cycle input to reconciliation; the status
//! is written by the controller from what it observes on the StatefulSet.

use crate::error::{DolphinError, Result};
use crate::resource::validate_metadata;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    Affinity, LocalObjectReference, PersistentVolumeClaimSpec, ResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const API_GROUP: &str = "mysql.dolphin.io";
pub const API_VERSION: &str = "v1alpha1";
pub const KIND: &str = "MysqlCluster";

pub const DEFAULT_MYSQL_IMAGE: &str = "percona:5.7";
pub const DEFAULT_HELPER_IMAGE: &str = "ghcr.io/dolphin-operator/mysql-helper:latest";
pub const DEFAULT_METRICS_EXPORTER_IMAGE: &str = "prom/mysqld-exporter:latest";

/// A MySQL cluster definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MysqlCluster {
    pub metadata: ObjectMeta,
    pub spec: MysqlClusterSpec,
    #[serde(default)]
    pub status: MysqlClusterStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlClusterSpec {
    /// Number of MySQL instances
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Secret holding the root password and replication credentials.
    /// Injected into the mysql container with the `MYSQL_` prefix.
    pub secret_name: String,

    /// Secret with credentials for the initial clone bucket
    #[serde(default)]
    pub init_bucket_secret_name: String,

    /// Secret holding the orchestrator topology credentials
    #[serde(default)]
    pub orchestrator_topology_secret_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mysql_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_exporter_image: Option<String>,

    /// Extra `[mysqld]` settings rendered into the cluster config map
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mysql_conf: BTreeMap<String, String>,

    #[serde(default)]
    pub pod_spec: PodSpecOverrides,

    /// Storage for the per-instance data volume claim
    #[serde(default)]
    pub volume_spec: PersistentVolumeClaimSpec,
}

fn default_replicas() -> i32 {
    1
}

impl Default for MysqlClusterSpec {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            secret_name: String::new(),
            init_bucket_secret_name: String::new(),
            orchestrator_topology_secret_name: String::new(),
            mysql_image: None,
            helper_image: None,
            metrics_exporter_image: None,
            mysql_conf: BTreeMap::new(),
            pod_spec: PodSpecOverrides::default(),
            volume_spec: PersistentVolumeClaimSpec::default(),
        }
    }
}

impl MysqlClusterSpec {
    pub fn mysql_image(&self) -> &str {
        self.mysql_image.as_deref().unwrap_or(DEFAULT_MYSQL_IMAGE)
    }

    pub fn helper_image(&self) -> &str {
        self.helper_image.as_deref().unwrap_or(DEFAULT_HELPER_IMAGE)
    }

    pub fn metrics_exporter_image(&self) -> &str {
        self.metrics_exporter_image
            .as_deref()
            .unwrap_or(DEFAULT_METRICS_EXPORTER_IMAGE)
    }

    /// Whether the orchestrator topology secret is configured
    pub fn has_topology_secret(&self) -> bool {
        !self.orchestrator_topology_secret_name.is_empty()
    }
}

/// Pod-level settings copied onto the StatefulSet pod template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpecOverrides {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_pull_secrets: Vec<LocalObjectReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Resource requests and limits for the mysql container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MysqlClusterStatus {
    #[serde(default)]
    pub ready_nodes: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ClusterCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterConditionType {
    Ready,
}

impl fmt::Display for ClusterConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterConditionType::Ready => write!(f, "Ready"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    #[serde(rename = "type")]
    pub type_: ClusterConditionType,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,
    pub reason: String,
    pub message: String,
}

impl MysqlClusterStatus {
    pub fn condition(&self, type_: ClusterConditionType) -> Option<&ClusterCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Set a condition, moving `lastTransitionTime` only when the status flips.
    ///
    /// Returns true when the status value changed (or the condition is new).
    pub fn update_condition(
        &mut self,
        type_: ClusterConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let reason = reason.into();
        let message = message.into();

        match self.conditions.iter_mut().find(|c| c.type_ == type_) {
            Some(existing) => {
                let flipped = existing.status != status;
                if flipped {
                    existing.status = status;
                    existing.last_transition_time = Some(now);
                }
                existing.reason = reason;
                existing.message = message;
                flipped
            }
            None => {
                self.conditions.push(ClusterCondition {
                    type_,
                    status,
                    last_transition_time: Some(now),
                    reason,
                    message,
                });
                true
            }
        }
    }
}

impl MysqlCluster {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Admission-style checks the reconciler assumes have already passed
    pub fn validate(&self) -> Result<()> {
        validate_metadata(&self.metadata).map_err(|e| {
            DolphinError::invalid_resource(
                e.to_string(),
                "Set metadata.name to a lowercase DNS-1123 name",
            )
        })?;

        if self.spec.replicas < 0 {
            return Err(DolphinError::invalid_resource(
                format!("spec.replicas must not be negative, got {}", self.spec.replicas),
                "Set spec.replicas to 0 or more",
            ));
        }

        if self.spec.secret_name.is_empty() {
            return Err(DolphinError::invalid_resource(
                "spec.secretName is required",
                "Point spec.secretName at the secret holding the MySQL credentials",
            ));
        }

        Ok(())
    }

    /// Load a cluster definition from a YAML manifest
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            DolphinError::io_error(
                format!("Failed to read {}: {}", path.display(), e),
                Some(Box::new(e)),
            )
        })?;
        crate::from_yaml(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_spec_image_defaults() {
        let mut spec = MysqlClusterSpec::default();
        assert_eq!(spec.mysql_image(), DEFAULT_MYSQL_IMAGE);
        assert_eq!(spec.helper_image(), DEFAULT_HELPER_IMAGE);
        assert_eq!(
            spec.metrics_exporter_image(),
            DEFAULT_METRICS_EXPORTER_IMAGE
        );

        spec.mysql_image = Some("percona:8.0".to_string());
        assert_eq!(spec.mysql_image(), "percona:8.0");
    }

    #[test]
    fn test_update_condition_keeps_transition_time_when_status_unchanged() {
        let mut status = MysqlClusterStatus::default();
        assert!(status.update_condition(
            ClusterConditionType::Ready,
            ConditionStatus::False,
            "statefulset not ready",
            "Cluster is not ready.",
            at(100),
        ));

        assert!(!status.update_condition(
            ClusterConditionType::Ready,
            ConditionStatus::False,
            "statefulset not ready",
            "still waiting",
            at(200),
        ));
        let cond = status.condition(ClusterConditionType::Ready).unwrap();
        assert_eq!(cond.last_transition_time, Some(at(100)));
        assert_eq!(cond.message, "still waiting");

        assert!(status.update_condition(
            ClusterConditionType::Ready,
            ConditionStatus::True,
            "statefulset ready",
            "Cluster is ready.",
            at(300),
        ));
        let cond = status.condition(ClusterConditionType::Ready).unwrap();
        assert_eq!(cond.status, ConditionStatus::True);
        assert_eq!(cond.last_transition_time, Some(at(300)));
        assert_eq!(status.conditions.len(), 1);
    }

    #[test]
    fn test_validate() {
        let mut cluster = MysqlCluster::default();
        cluster.metadata.name = Some("db".to_string());
        cluster.spec.secret_name = "db-secret".to_string();
        assert!(cluster.validate().is_ok());

        cluster.spec.replicas = -1;
        assert!(cluster.validate().is_err());

        cluster.spec.replicas = 3;
        cluster.spec.secret_name.clear();
        assert!(cluster.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
apiVersion: mysql.dolphin.io/v1alpha1
kind: MysqlCluster
metadata:
  name: db
  namespace: prod
spec:
  replicas: 3
  secretName: db-secret
  initBucketSecretName: seed-creds
  mysqlConf:
    max_connections: "500"
  podSpec:
    labels:
      team: storage
  volumeSpec:
    accessModes: ["ReadWriteOnce"]
    resources:
      requests:
        storage: 10Gi
"#
        )
        .unwrap();

        let cluster = MysqlCluster::from_file(file.path()).unwrap();
        assert_eq!(cluster.name(), "db");
        assert_eq!(cluster.namespace(), "prod");
        assert_eq!(cluster.spec.replicas, 3);
        assert_eq!(cluster.spec.init_bucket_secret_name, "seed-creds");
        assert!(!cluster.spec.has_topology_secret());
        assert_eq!(cluster.spec.pod_spec.labels["team"], "storage");
        assert_eq!(cluster.spec.mysql_conf["max_connections"], "500");
        assert_eq!(
            cluster.spec.volume_spec.access_modes,
            Some(vec!["ReadWriteOnce".to_string()])
        );
    }

    #[test]
    fn test_from_file_missing() {
        let err = MysqlCluster::from_file("/nonexistent/cluster.yaml").unwrap_err();
        assert!(matches!(err, DolphinError::IoError { .. }));
    }
}
