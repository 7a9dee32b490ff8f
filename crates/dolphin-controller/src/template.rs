//! Pod template builder

use crate::policy::{policy_for, ContainerRole, PolicyConstants, INIT_ROLES, RUN_ROLES};
use crate::volumes::plan_volumes;
use dolphin_core::MysqlCluster;
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec};
use std::collections::BTreeMap;

pub const ANNOTATION_CONFIG_HASH: &str = "config_hash";
pub const ANNOTATION_PROMETHEUS_SCRAPE: &str = "prometheus.io/scrape";
pub const ANNOTATION_PROMETHEUS_PORT: &str = "prometheus.io/port";

/// Annotations written onto the template by other tools that survive a
/// reconcile. Everything else is owned by the cluster's pod annotations.
pub const RUNTIME_ANNOTATIONS: [&str; 1] = ["kubectl.kubernetes.io/restartedAt"];

/// Produce one container per role, reusing the existing container at the
/// same position as the base.
///
/// Position is identity, so prior containers are only reused when the count
/// already matches; otherwise the list is built from scratch.
fn ensure_containers(
    existing: Option<Vec<Container>>,
    roles: &[ContainerRole],
    cluster: &MysqlCluster,
    constants: &PolicyConstants,
) -> Vec<Container> {
    let existing = existing
        .filter(|containers| containers.len() == roles.len())
        .unwrap_or_default();
    let mut existing = existing.into_iter();
    let pull_policy = cluster.spec.pod_spec.image_pull_policy.as_deref();

    roles
        .iter()
        .map(|role| {
            let base = existing.next().unwrap_or_default();
            policy_for(*role, cluster, constants).apply_to(base, pull_policy)
        })
        .collect()
}

fn non_empty<T>(map: BTreeMap<String, T>) -> Option<BTreeMap<String, T>> {
    (!map.is_empty()).then_some(map)
}

/// Bring `existing` to the desired pod template for `cluster`
pub fn ensure_template(
    existing: PodTemplateSpec,
    cluster: &MysqlCluster,
    constants: &PolicyConstants,
    config_hash: &str,
) -> PodTemplateSpec {
    let overrides = &cluster.spec.pod_spec;
    let mut template = existing;

    let mut meta = template.metadata.take().unwrap_or_default();
    meta.labels = Some(cluster.labels(&overrides.labels));

    let mut annotations: BTreeMap<String, String> = meta
        .annotations
        .take()
        .unwrap_or_default()
        .into_iter()
        .filter(|(key, _)| RUNTIME_ANNOTATIONS.contains(&key.as_str()))
        .collect();
    annotations.extend(overrides.annotations.clone());
    annotations.insert(ANNOTATION_CONFIG_HASH.to_string(), config_hash.to_string());
    annotations.insert(ANNOTATION_PROMETHEUS_SCRAPE.to_string(), "true".to_string());
    annotations.insert(
        ANNOTATION_PROMETHEUS_PORT.to_string(),
        constants.exporter_port.to_string(),
    );
    meta.annotations = Some(annotations);
    template.metadata = Some(meta);

    let mut pod = template.spec.take().unwrap_or_default();
    pod.init_containers = Some(ensure_containers(
        pod.init_containers.take(),
        &INIT_ROLES,
        cluster,
        constants,
    ));
    pod.containers = ensure_containers(Some(pod.containers), &RUN_ROLES, cluster, constants);
    pod.volumes = Some(plan_volumes(cluster));

    pod.affinity = overrides.affinity.clone();
    pod.node_selector = non_empty(overrides.node_selector.clone());
    pod.image_pull_secrets = (!overrides.image_pull_secrets.is_empty())
        .then(|| overrides.image_pull_secrets.clone());

    template.spec = Some(pod);
    template
}
