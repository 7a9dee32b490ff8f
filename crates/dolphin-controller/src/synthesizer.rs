//! StatefulSet spec synthesis
//!
//! `synthesize` is a pure function of the live object and the desired
//! cluster state. It writes only the fields the operator owns; metadata and
//! status pass through as they were.

use crate::policy::PolicyConstants;
use crate::template::ensure_template;
use crate::volumes::ensure_volume_claim_templates;
use dolphin_core::{ClusterResource, MysqlCluster, StatefulSet};
use k8s_openapi::api::apps::v1::StatefulSetSpec;
use std::collections::BTreeMap;

/// Everything one synthesis pass needs besides the live object
#[derive(Debug, Clone, Copy)]
pub struct DesiredState<'a> {
    pub cluster: &'a MysqlCluster,
    pub constants: &'a PolicyConstants,
    pub config_hash: &'a str,
}

/// Merge the desired spec onto `old`
pub fn synthesize(old: StatefulSet, desired: &DesiredState<'_>) -> StatefulSet {
    let cluster = desired.cluster;
    let mut sts = old;
    let mut spec: StatefulSetSpec = sts.spec.take().unwrap_or_default();

    spec.replicas = Some(cluster.spec.replicas);

    let mut selector = spec.selector;
    selector.match_labels = Some(cluster.labels(&BTreeMap::new()));
    spec.selector = selector;

    spec.service_name = cluster.name_for(ClusterResource::HeadlessService);
    spec.template = ensure_template(
        spec.template,
        cluster,
        desired.constants,
        desired.config_hash,
    );
    spec.volume_claim_templates = Some(ensure_volume_claim_templates(
        spec.volume_claim_templates.take(),
        cluster,
    ));

    sts.spec = Some(spec);
    sts
}
