//! Pod volumes and the data volume-claim template.

use crate::policy::PolicyConstants;
use dolphin_core::{ClusterResource, MysqlCluster};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, PersistentVolumeClaim,
    PersistentVolumeClaimVolumeSource, SecretVolumeSource, Volume, VolumeMount,
};

/// File mode for projected config map and secret files
const FILE_MODE: i32 = 0o644;

/// Structural identity of a pod volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeRole {
    /// Scratch space the init container renders the final config into
    ConfigScratch,
    /// Cluster config map with the rendered my.cnf
    ConfigSource,
    /// Per-instance data claim
    Data,
    /// Orchestrator topology credentials
    TopologyCredential,
}

impl VolumeRole {
    pub fn volume_name(self) -> &'static str {
        match self {
            VolumeRole::ConfigScratch => "conf",
            VolumeRole::ConfigSource => "config-map",
            VolumeRole::Data => DATA_VOLUME_NAME,
            VolumeRole::TopologyCredential => "orc-topology-secret",
        }
    }

    pub fn mount_path(self, constants: &PolicyConstants) -> &str {
        match self {
            VolumeRole::ConfigScratch => &constants.conf_mount_path,
            VolumeRole::ConfigSource => &constants.conf_map_mount_path,
            VolumeRole::Data => &constants.data_mount_path,
            VolumeRole::TopologyCredential => &constants.orc_topology_dir,
        }
    }

    pub fn mount(self, constants: &PolicyConstants) -> VolumeMount {
        VolumeMount {
            name: self.volume_name().to_string(),
            mount_path: self.mount_path(constants).to_string(),
            ..Default::default()
        }
    }
}

/// Name shared by the data volume and its claim template
pub const DATA_VOLUME_NAME: &str = "data";

/// Volume roles present for this cluster, in pod order
pub fn planned_roles(cluster: &MysqlCluster) -> Vec<VolumeRole> {
    let mut roles = vec![
        VolumeRole::ConfigScratch,
        VolumeRole::ConfigSource,
        VolumeRole::Data,
    ];
    if cluster.spec.has_topology_secret() {
        roles.push(VolumeRole::TopologyCredential);
    }
    roles
}

fn volume_for(role: VolumeRole, cluster: &MysqlCluster) -> Volume {
    let name = role.volume_name().to_string();
    match role {
        VolumeRole::ConfigScratch => Volume {
            name,
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
        VolumeRole::ConfigSource => Volume {
            name,
            config_map: Some(ConfigMapVolumeSource {
                name: cluster.name_for(ClusterResource::ConfigMap),
                default_mode: Some(FILE_MODE),
                ..Default::default()
            }),
            ..Default::default()
        },
        VolumeRole::Data => Volume {
            name,
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: DATA_VOLUME_NAME.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        },
        VolumeRole::TopologyCredential => Volume {
            name,
            secret: Some(SecretVolumeSource {
                secret_name: Some(cluster.spec.orchestrator_topology_secret_name.clone()),
                default_mode: Some(FILE_MODE),
                ..Default::default()
            }),
            ..Default::default()
        },
    }
}

/// The full ordered volume list.
///
/// Every volume is operator-owned down to its source, so the list is rebuilt
/// rather than merged.
pub fn plan_volumes(cluster: &MysqlCluster) -> Vec<Volume> {
    planned_roles(cluster)
        .into_iter()
        .map(|role| volume_for(role, cluster))
        .collect()
}

/// Reduce the claim templates to the single `data` template.
///
/// An existing first entry is the mutation base so fields the runtime fills
/// in (status, annotations) stay put; only its name and spec are written.
pub fn ensure_volume_claim_templates(
    existing: Option<Vec<PersistentVolumeClaim>>,
    cluster: &MysqlCluster,
) -> Vec<PersistentVolumeClaim> {
    let mut data = existing
        .and_then(|claims| claims.into_iter().next())
        .unwrap_or_default();

    data.metadata.name = Some(DATA_VOLUME_NAME.to_string());
    data.spec = Some(cluster.spec.volume_spec.clone());

    vec![data]
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, PersistentVolumeClaimStatus};

    fn cluster(topology_secret: &str) -> MysqlCluster {
        let mut cluster = MysqlCluster::default();
        cluster.metadata.name = Some("db".to_string());
        cluster.spec.orchestrator_topology_secret_name = topology_secret.to_string();
        cluster
    }

    #[test]
    fn test_three_volumes_without_topology_secret() {
        let volumes = plan_volumes(&cluster(""));
        let names: Vec<_> = volumes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["conf", "config-map", "data"]);

        assert!(volumes[0].empty_dir.is_some());
        let cm = volumes[1].config_map.as_ref().unwrap();
        assert_eq!(cm.name, "db-mysql-config");
        assert_eq!(cm.default_mode, Some(0o644));
        let claim = volumes[2].persistent_volume_claim.as_ref().unwrap();
        assert_eq!(claim.claim_name, "data");
    }

    #[test]
    fn test_topology_volume_appended_last() {
        let volumes = plan_volumes(&cluster("orc-creds"));
        assert_eq!(volumes.len(), 4);
        let secret = volumes[3].secret.as_ref().unwrap();
        assert_eq!(volumes[3].name, "orc-topology-secret");
        assert_eq!(secret.secret_name.as_deref(), Some("orc-creds"));
        assert_eq!(secret.default_mode, Some(420));
    }

    #[test]
    fn test_mount_paths() {
        let constants = PolicyConstants::default();
        let path = |role: VolumeRole| role.mount(&constants).mount_path;
        assert_eq!(path(VolumeRole::ConfigScratch), "/etc/mysql");
        assert_eq!(path(VolumeRole::ConfigSource), "/mnt/conf");
        assert_eq!(path(VolumeRole::Data), "/var/lib/mysql");
        assert_eq!(
            path(VolumeRole::TopologyCredential),
            "/var/run/orc-topology"
        );
    }

    #[test]
    fn test_claim_template_created_when_absent() {
        let mut c = cluster("");
        c.spec.volume_spec = PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            ..Default::default()
        };

        let claims = ensure_volume_claim_templates(None, &c);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].metadata.name.as_deref(), Some("data"));
        assert_eq!(claims[0].spec.as_ref(), Some(&c.spec.volume_spec));
    }

    #[test]
    fn test_claim_template_keeps_runtime_fields() {
        let c = cluster("");
        let mut existing = PersistentVolumeClaim::default();
        existing.metadata.name = Some("old".to_string());
        existing.status = Some(PersistentVolumeClaimStatus {
            phase: Some("Pending".to_string()),
            ..Default::default()
        });
        let extra = PersistentVolumeClaim::default();

        let claims = ensure_volume_claim_templates(Some(vec![existing, extra]), &c);
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].metadata.name.as_deref(), Some("data"));
        assert_eq!(
            claims[0].status.as_ref().unwrap().phase.as_deref(),
            Some("Pending")
        );
    }
}
