//! Readiness derived from the StatefulSet replica counters

use chrono::{DateTime, Utc};
use dolphin_core::{ClusterConditionType, ConditionStatus, MysqlClusterStatus, StatefulSet};

pub const REASON_READY: &str = "statefulset ready";
pub const REASON_NOT_READY: &str = "statefulset not ready";
pub const MESSAGE_READY: &str = "Cluster is ready.";
pub const MESSAGE_NOT_READY: &str = "Cluster is not ready.";

/// Observed readiness of one StatefulSet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: ConditionStatus,
    pub reason: &'static str,
    pub message: &'static str,
    pub ready_nodes: i32,
}

/// Compare `status.replicas` against `status.readyReplicas`.
///
/// A StatefulSet the runtime has not reported on yet has no replicas and no
/// ready replicas; it is treated as not ready.
pub fn evaluate(sts: &StatefulSet) -> StatusReport {
    let (replicas, ready) = match &sts.status {
        Some(status) => (status.replicas, status.ready_replicas.unwrap_or(0)),
        None => {
            return StatusReport::not_ready(0);
        }
    };

    if replicas == ready {
        StatusReport {
            status: ConditionStatus::True,
            reason: REASON_READY,
            message: MESSAGE_READY,
            ready_nodes: ready,
        }
    } else {
        StatusReport::not_ready(ready)
    }
}

impl StatusReport {
    fn not_ready(ready_nodes: i32) -> Self {
        Self {
            status: ConditionStatus::False,
            reason: REASON_NOT_READY,
            message: MESSAGE_NOT_READY,
            ready_nodes,
        }
    }

    /// Record the report on the cluster status.
    ///
    /// Returns true when the Ready condition flipped.
    pub fn apply_to(&self, status: &mut MysqlClusterStatus, now: DateTime<Utc>) -> bool {
        status.ready_nodes = self.ready_nodes;
        status.update_condition(
            ClusterConditionType::Ready,
            self.status,
            self.reason,
            self.message,
            now,
        )
    }
}
