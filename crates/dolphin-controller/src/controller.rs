use crate::apply::Applier;
use crate::error::Result;
use crate::policy::PolicyConstants;
use crate::reconciler::{ConvergenceAction, Reconciler};
use dolphin_core::{MysqlCluster, ObjectMeta};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Configuration for the cluster controller
#[derive(Debug, Clone)]
pub struct ClusterControllerConfig {
    /// Cluster manifests to reconcile on every pass
    pub manifests: Vec<PathBuf>,
    /// Interval between passes
    pub interval: Duration,
}

impl Default for ClusterControllerConfig {
    fn default() -> Self {
        Self {
            manifests: Vec::new(),
            interval: Duration::from_secs(30),
        }
    }
}

/// Per-pass tally of convergence actions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub unchanged: usize,
    pub created: usize,
    pub updated: usize,
    pub failed: usize,
}

impl PassSummary {
    fn record(&mut self, action: ConvergenceAction) {
        match action {
            ConvergenceAction::Unchanged => self.unchanged += 1,
            ConvergenceAction::Created => self.created += 1,
            ConvergenceAction::Updated => self.updated += 1,
            ConvergenceAction::Failed => self.failed += 1,
        }
    }
}

/// Level-triggered controller over a set of cluster manifests.
///
/// Each pass re-reads every manifest, records the cluster in the store,
/// reconciles its StatefulSet and persists the resulting status. Nothing is
/// carried between passes except what the store holds.
pub struct ClusterController<A: Applier> {
    reconciler: Reconciler<A>,
    config: ClusterControllerConfig,
}

impl<A: Applier> ClusterController<A> {
    pub fn new(applier: A, constants: PolicyConstants, config: ClusterControllerConfig) -> Self {
        Self {
            reconciler: Reconciler::new(applier, constants),
            config,
        }
    }

    pub fn reconciler(&self) -> &Reconciler<A> {
        &self.reconciler
    }

    /// Reconcile one manifest end to end
    pub fn reconcile_manifest(&self, path: &Path) -> Result<ConvergenceAction> {
        let manifest = MysqlCluster::from_file(path)?;
        manifest.validate()?;
        self.reconcile_cluster(manifest)
    }

    /// Store the declared cluster, reconcile it and write back its status
    pub fn reconcile_cluster(&self, manifest: MysqlCluster) -> Result<ConvergenceAction> {
        let applier = self.reconciler.applier();
        let meta = ObjectMeta {
            name: Some(manifest.name().to_string()),
            namespace: Some(manifest.namespace().to_string()),
            ..Default::default()
        };

        // the stored copy carries the uid and the status of earlier passes
        let (mut cluster, verb) =
            applier.create_or_patch::<MysqlCluster, _>(meta.clone(), |mut stored| {
                stored.metadata.labels = manifest.metadata.labels.clone();
                stored.metadata.annotations = manifest.metadata.annotations.clone();
                stored.spec = manifest.spec.clone();
                stored
            })?;
        debug!("Cluster {}/{} {}", cluster.namespace(), cluster.name(), verb);

        let action = self.reconciler.reconcile(&mut cluster)?;

        let status = cluster.status.clone();
        applier.create_or_patch::<MysqlCluster, _>(meta, move |mut stored| {
            stored.status = status;
            stored
        })?;

        Ok(action)
    }

    /// Reconcile every configured manifest once
    pub fn reconcile_all(&self) -> PassSummary {
        let mut summary = PassSummary::default();
        for path in &self.config.manifests {
            let result = self.reconcile_manifest(path);
            if let Err(e) = &result {
                error!("Failed to reconcile {}: {}", path.display(), e);
            }
            summary.record(ConvergenceAction::of(&result));
        }
        summary
    }

    /// Run reconciliation passes until cancelled
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        info!(
            "Starting cluster controller ({} manifests, interval: {:?})",
            self.config.manifests.len(),
            self.config.interval
        );

        let mut interval = tokio::time::interval(self.config.interval);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Cluster controller shutting down");
                    return Ok(());
                }
                _ = interval.tick() => {
                    let summary = self.reconcile_all();
                    info!(
                        "Reconciliation pass: {} created, {} updated, {} unchanged, {} failed",
                        summary.created, summary.updated, summary.unchanged, summary.failed
                    );
                }
            }
        }
    }
}
