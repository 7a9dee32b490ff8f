use crate::cluster::{MysqlCluster, API_GROUP, API_VERSION, KIND};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use std::collections::BTreeMap;

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

const MANAGED_BY: &str = "dolphin-operator";

/// Objects the operator derives from a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterResource {
    StatefulSet,
    ConfigMap,
    EnvSecret,
    HeadlessService,
}

impl MysqlCluster {
    /// Name of a derived object
    pub fn name_for(&self, resource: ClusterResource) -> String {
        let base = self.name();
        match resource {
            ClusterResource::StatefulSet => format!("{}-mysql", base),
            ClusterResource::ConfigMap => format!("{}-mysql-config", base),
            ClusterResource::EnvSecret => format!("{}-mysql-operator-env", base),
            ClusterResource::HeadlessService => format!("{}-mysql-nodes", base),
        }
    }

    /// Canonical labels for every derived object, with `extra` merged in.
    ///
    /// Canonical keys win over `extra` so the StatefulSet selector always
    /// matches the pod template.
    pub fn labels(&self, extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut labels = extra.clone();
        labels.insert(LABEL_NAME.to_string(), "mysql".to_string());
        labels.insert(LABEL_INSTANCE.to_string(), self.name().to_string());
        labels.insert(LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string());
        labels
    }

    /// Controller owner reference pointing back at this cluster
    pub fn owner_references(&self) -> Vec<OwnerReference> {
        vec![OwnerReference {
            api_version: format!("{}/{}", API_GROUP, API_VERSION),
            kind: KIND.to_string(),
            name: self.name().to_string(),
            uid: self.metadata.uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }]
    }

    /// Identity metadata of the StatefulSet for this cluster
    pub fn stateful_set_meta(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name_for(ClusterResource::StatefulSet)),
            namespace: Some(self.namespace().to_string()),
            labels: Some(self.labels(&BTreeMap::new())),
            owner_references: Some(self.owner_references()),
            ..Default::default()
        }
    }
}
