//! StatefulSet reconciliation for one cluster

use crate::apply::{Applier, ApplyVerb};
use crate::error::Result;
use crate::policy::PolicyConstants;
use crate::status::evaluate;
use crate::synthesizer::{synthesize, DesiredState};
use chrono::Utc;
use dolphin_core::{config_hash, MysqlCluster, StatefulSet};
use std::fmt;
use tracing::{debug, info, warn};

/// Outcome of one reconciliation, reported and never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceAction {
    Unchanged,
    Created,
    Updated,
    Failed,
}

impl From<ApplyVerb> for ConvergenceAction {
    fn from(verb: ApplyVerb) -> Self {
        match verb {
            ApplyVerb::Unchanged => ConvergenceAction::Unchanged,
            ApplyVerb::Created => ConvergenceAction::Created,
            ApplyVerb::Patched => ConvergenceAction::Updated,
        }
    }
}

impl ConvergenceAction {
    /// Action to report for a reconcile result
    pub fn of<T>(result: &std::result::Result<ConvergenceAction, T>) -> Self {
        match result {
            Ok(action) => *action,
            Err(_) => ConvergenceAction::Failed,
        }
    }

    /// Lowercase form used in logs and CLI output
    pub fn sync_status(self) -> &'static str {
        match self {
            ConvergenceAction::Unchanged => "unchanged",
            ConvergenceAction::Created => "created",
            ConvergenceAction::Updated => "updated",
            ConvergenceAction::Failed => "failed",
        }
    }
}

impl fmt::Display for ConvergenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sync_status())
    }
}

/// Drives the StatefulSet of a cluster toward its desired state
pub struct Reconciler<A: Applier> {
    applier: A,
    constants: PolicyConstants,
}

impl<A: Applier> Reconciler<A> {
    pub fn new(applier: A, constants: PolicyConstants) -> Self {
        Self { applier, constants }
    }

    pub fn applier(&self) -> &A {
        &self.applier
    }

    /// Run one reconciliation pass.
    ///
    /// Readiness is read from the StatefulSet as it was before this pass and
    /// written into `cluster.status` only if the apply succeeds. Apply errors
    /// are returned as-is.
    pub fn reconcile(&self, cluster: &mut MysqlCluster) -> Result<ConvergenceAction> {
        let meta = cluster.stateful_set_meta();
        let hash = config_hash(&cluster.spec);
        let now = Utc::now();
        let mut status = cluster.status.clone();

        debug!(
            "Reconciling StatefulSet for cluster {}/{} (config_hash {})",
            cluster.namespace(),
            cluster.name(),
            hash
        );

        let desired = DesiredState {
            cluster,
            constants: &self.constants,
            config_hash: &hash,
        };

        let result = self
            .applier
            .create_or_patch::<StatefulSet, _>(meta, |old| {
                let report = evaluate(&old);
                if report.apply_to(&mut status, now) {
                    info!(
                        "Cluster {} Ready={} ({})",
                        desired.cluster.name(),
                        report.status,
                        report.reason
                    );
                }
                synthesize(old, &desired)
            });

        match result {
            Ok((_, verb)) => {
                cluster.status = status;
                let action = ConvergenceAction::from(verb);
                info!(
                    "StatefulSet for cluster {}/{} {}",
                    cluster.namespace(),
                    cluster.name(),
                    action
                );
                Ok(action)
            }
            Err(e) => {
                warn!(
                    "StatefulSet for cluster {}/{} {}: {}",
                    cluster.namespace(),
                    cluster.name(),
                    ConvergenceAction::Failed,
                    e
                );
                Err(e)
            }
        }
    }
}
