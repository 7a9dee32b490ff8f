use clap::{Parser, Subcommand, ValueEnum};
use dolphin_controller::{
    Applier, ClusterController, ClusterControllerConfig, PolicyConstants, StoreApplier,
};
use dolphin_core::k8s_openapi::api::apps::v1::StatefulSetStatus;
use dolphin_core::{
    ClusterConditionType, ClusterResource, DolphinError, MysqlCluster, ObjectKey, Resource,
    StatefulSet,
};
use dolphin_storage::{KVStore, MemoryBackend, RedbBackend};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dolphin", about = "Dolphin MySQL cluster operator")]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the StatefulSets of one or more clusters
    Reconcile {
        /// MysqlCluster manifest (YAML), may be repeated
        #[arg(long = "cluster", required = true)]
        clusters: Vec<PathBuf>,
        /// Path to the redb database file
        #[arg(long, env = "DOLPHIN_DATA_DIR", default_value = "./dolphin.redb")]
        data_dir: PathBuf,
        /// Keep reconciling until interrupted
        #[arg(long)]
        watch: bool,
        /// Seconds between passes in watch mode
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
        /// Reconcile against an in-memory store and print the result
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the stored StatefulSet of a cluster as YAML
    Show {
        /// Cluster name
        name: String,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(long, env = "DOLPHIN_DATA_DIR", default_value = "./dolphin.redb")]
        data_dir: PathBuf,
    },
    /// List stored clusters with their readiness
    List {
        /// Only list clusters in this namespace
        #[arg(long)]
        namespace: Option<String>,
        #[arg(long, env = "DOLPHIN_DATA_DIR", default_value = "./dolphin.redb")]
        data_dir: PathBuf,
    },
    /// Write replica counters into a stored StatefulSet, as the runtime would
    SimulateStatus {
        /// Cluster name
        name: String,
        #[arg(long, default_value = "default")]
        namespace: String,
        /// Observed replicas
        #[arg(long)]
        replicas: i32,
        /// Ready replicas
        #[arg(long)]
        ready: i32,
        #[arg(long, env = "DOLPHIN_DATA_DIR", default_value = "./dolphin.redb")]
        data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    match cli.command {
        Commands::Reconcile {
            clusters,
            data_dir,
            watch,
            interval_secs,
            dry_run,
        } => {
            let config = ClusterControllerConfig {
                manifests: clusters,
                interval: Duration::from_secs(interval_secs),
            };
            if dry_run {
                info!("Dry run: reconciling against an in-memory store");
                run_reconcile(MemoryBackend::new(), config, watch, true).await
            } else {
                run_reconcile(open_store(&data_dir)?, config, watch, false).await
            }
        }
        Commands::Show {
            name,
            namespace,
            data_dir,
        } => run_show(open_store(&data_dir)?, &name, &namespace),
        Commands::List {
            namespace,
            data_dir,
        } => run_list(open_store(&data_dir)?, namespace.as_deref()),
        Commands::SimulateStatus {
            name,
            namespace,
            replicas,
            ready,
            data_dir,
        } => run_simulate_status(open_store(&data_dir)?, &name, &namespace, replicas, ready),
    }
}

/// Open the redb database backing every command
fn open_store(data_dir: &std::path::Path) -> miette::Result<RedbBackend> {
    RedbBackend::new(data_dir)
        .map_err(|e| miette::miette!("Failed to open storage at '{}': {}", data_dir.display(), e))
}

/// Run one pass, or keep running passes until ctrl-c in watch mode
async fn run_reconcile<S: KVStore>(
    store: S,
    config: ClusterControllerConfig,
    watch: bool,
    print: bool,
) -> miette::Result<()> {
    let controller = ClusterController::new(
        StoreApplier::new(store),
        PolicyConstants::default(),
        config,
    );

    if watch {
        let token = CancellationToken::new();
        let shutdown = token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutting down gracefully..."),
                Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
            }
            shutdown.cancel();
        });
        controller.run(token).await?;
    } else {
        let summary = controller.reconcile_all();
        info!(
            "Reconciliation pass: {} created, {} updated, {} unchanged, {} failed",
            summary.created, summary.updated, summary.unchanged, summary.failed
        );
        if summary.failed > 0 {
            return Err(miette::miette!(
                "{} of {} clusters failed to reconcile",
                summary.failed,
                summary.created + summary.updated + summary.unchanged + summary.failed
            ));
        }
    }

    if print {
        for sts in controller.reconciler().applier().list::<StatefulSet>(None)? {
            println!("---\n{}", dolphin_core::to_yaml(&sts)?);
        }
    }

    Ok(())
}

fn stateful_set_key(name: &str, namespace: &str) -> ObjectKey {
    let mut cluster = MysqlCluster::default();
    cluster.metadata.name = Some(name.to_string());
    ObjectKey::new(
        StatefulSet::gvk(),
        namespace,
        cluster.name_for(ClusterResource::StatefulSet),
    )
}

fn run_show<S: KVStore>(store: S, name: &str, namespace: &str) -> miette::Result<()> {
    let applier = StoreApplier::new(store);
    let key = stateful_set_key(name, namespace);
    let sts: StatefulSet = applier
        .get(&key)?
        .ok_or_else(|| DolphinError::object_not_found(key.to_string()))?;
    print!("{}", dolphin_core::to_yaml(&sts)?);
    Ok(())
}

fn run_list<S: KVStore>(store: S, namespace: Option<&str>) -> miette::Result<()> {
    let applier = StoreApplier::new(store);
    let clusters = applier.list::<MysqlCluster>(namespace)?;

    println!(
        "{:<20} {:<20} {:>8} {:>6}  REASON",
        "NAMESPACE", "NAME", "REPLICAS", "READY"
    );
    for cluster in clusters {
        let condition = cluster.status.condition(ClusterConditionType::Ready);
        println!(
            "{:<20} {:<20} {:>8} {:>6}  {}",
            cluster.namespace(),
            cluster.name(),
            cluster.spec.replicas,
            cluster.status.ready_nodes,
            condition.map(|c| c.reason.as_str()).unwrap_or("-"),
        );
    }
    Ok(())
}

fn run_simulate_status<S: KVStore>(
    store: S,
    name: &str,
    namespace: &str,
    replicas: i32,
    ready: i32,
) -> miette::Result<()> {
    let applier = StoreApplier::new(store);
    let key = stateful_set_key(name, namespace);
    let existing: StatefulSet = applier
        .get(&key)?
        .ok_or_else(|| DolphinError::object_not_found(key.to_string()))?;

    let (_, verb) = applier.create_or_patch::<StatefulSet, _>(existing.metadata, |mut sts| {
        let status = sts.status.get_or_insert_with(StatefulSetStatus::default);
        status.replicas = replicas;
        status.ready_replicas = Some(ready);
        sts
    })?;

    info!(
        "StatefulSet {} status {} (replicas {}, ready {})",
        key, verb, replicas, ready
    );
    Ok(())
}
