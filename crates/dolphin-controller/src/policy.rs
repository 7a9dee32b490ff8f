//! Container policy table
//!
//! Maps each container role to what the operator manages on it: image,
//! arguments, ports, probes, env sources and mounts. Applying a policy to an
//! existing container only touches those fields, so anything the runtime or
//! another controller filled in survives.

use crate::volumes::{planned_roles, VolumeRole};
use dolphin_core::{ClusterResource, MysqlCluster};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvFromSource, ExecAction, Probe, ResourceRequirements,
    SecretEnvSource, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Start delay, period and failure threshold of a managed probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTiming {
    pub initial_delay_seconds: i32,
    pub period_seconds: i32,
    pub failure_threshold: i32,
}

impl ProbeTiming {
    pub const fn new(
        initial_delay_seconds: i32,
        period_seconds: i32,
        failure_threshold: i32,
    ) -> Self {
        Self {
            initial_delay_seconds,
            period_seconds,
            failure_threshold,
        }
    }
}

/// Ports, paths and probe timings shared by every policy
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConstants {
    pub mysql_port_name: String,
    pub mysql_port: i32,
    pub helper_port_name: String,
    pub helper_port: i32,
    pub helper_probe_path: String,
    pub helper_probe_port: i32,
    pub exporter_port_name: String,
    pub exporter_port: i32,
    pub exporter_path: String,

    pub conf_mount_path: String,
    pub conf_map_mount_path: String,
    pub data_mount_path: String,
    pub orc_topology_dir: String,
    pub client_config_file: String,

    /// Prefix for variables injected from the credentials secret
    pub secret_env_prefix: String,

    pub main_liveness: ProbeTiming,
    pub main_readiness: ProbeTiming,
    pub helper_readiness: ProbeTiming,
    pub exporter_liveness: ProbeTiming,
}

impl Default for PolicyConstants {
    fn default() -> Self {
        Self {
            mysql_port_name: "mysql".to_string(),
            mysql_port: 3306,
            helper_port_name: "xtrabackup".to_string(),
            helper_port: 3307,
            helper_probe_path: "/health".to_string(),
            helper_probe_port: 8001,
            exporter_port_name: "prometheus".to_string(),
            exporter_port: 9104,
            exporter_path: "/metrics".to_string(),
            conf_mount_path: "/etc/mysql".to_string(),
            conf_map_mount_path: "/mnt/conf".to_string(),
            data_mount_path: "/var/lib/mysql".to_string(),
            orc_topology_dir: "/var/run/orc-topology".to_string(),
            client_config_file: "/etc/mysql/client.cnf".to_string(),
            secret_env_prefix: "MYSQL_".to_string(),
            main_liveness: ProbeTiming::new(30, 10, 5),
            main_readiness: ProbeTiming::new(5, 10, 5),
            helper_readiness: ProbeTiming::new(5, 10, 5),
            exporter_liveness: ProbeTiming::new(30, 120, 30),
        }
    }
}

/// Positional identity of a container in the pod template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRole {
    InitConfig,
    InitClone,
    Main,
    Helper,
    MetricsExporter,
}

/// Init containers in pod order
pub const INIT_ROLES: [ContainerRole; 2] = [ContainerRole::InitConfig, ContainerRole::InitClone];

/// Run containers in pod order
pub const RUN_ROLES: [ContainerRole; 3] = [
    ContainerRole::Main,
    ContainerRole::Helper,
    ContainerRole::MetricsExporter,
];

impl ContainerRole {
    pub fn name(self) -> &'static str {
        match self {
            ContainerRole::InitConfig => "init-mysql",
            ContainerRole::InitClone => "clone-mysql",
            ContainerRole::Main => "mysql",
            ContainerRole::Helper => "helper",
            ContainerRole::MetricsExporter => "metrics-exporter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeHandler {
    Exec(Vec<String>),
    HttpGet { path: String, port: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeSpec {
    pub handler: ProbeHandler,
    pub timing: ProbeTiming,
}

impl ProbeSpec {
    /// Write the managed handler and timings onto `base`.
    ///
    /// `timeoutSeconds` and `successThreshold` are left as found.
    fn apply_to(&self, base: Option<Probe>) -> Probe {
        let mut probe = base.unwrap_or_default();
        probe.initial_delay_seconds = Some(self.timing.initial_delay_seconds);
        probe.period_seconds = Some(self.timing.period_seconds);
        probe.failure_threshold = Some(self.timing.failure_threshold);

        probe.grpc = None;
        probe.tcp_socket = None;
        match &self.handler {
            ProbeHandler::Exec(command) => {
                probe.http_get = None;
                probe.exec = Some(ExecAction {
                    command: Some(command.clone()),
                });
            }
            ProbeHandler::HttpGet { path, port } => {
                probe.exec = None;
                let mut action = probe.http_get.take().unwrap_or_default();
                action.path = Some(path.clone());
                action.port = IntOrString::Int(*port);
                action.scheme = Some("HTTP".to_string());
                probe.http_get = Some(action);
            }
        }
        probe
    }
}

/// Operator-managed fields of one container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerPolicy {
    pub role: ContainerRole,
    pub image: String,
    pub args: Vec<String>,
    /// Named ports, `(name, port)`
    pub ports: Vec<(String, i32)>,
    pub resources: Option<ResourceRequirements>,
    pub liveness: Option<ProbeSpec>,
    pub readiness: Option<ProbeSpec>,
    pub env_from: Vec<EnvFromSource>,
    pub volume_mounts: Vec<VolumeMount>,
}

fn secret_env(name: impl Into<String>, prefix: Option<&str>) -> EnvFromSource {
    EnvFromSource {
        prefix: prefix.map(str::to_string),
        secret_ref: Some(SecretEnvSource {
            name: name.into(),
            optional: None,
        }),
        ..Default::default()
    }
}

fn mounts(roles: &[VolumeRole], constants: &PolicyConstants) -> Vec<VolumeMount> {
    roles.iter().map(|role| role.mount(constants)).collect()
}

fn exec(args: &[&str]) -> ProbeHandler {
    ProbeHandler::Exec(args.iter().map(|a| a.to_string()).collect())
}

/// Build the policy for `role`
pub fn policy_for(
    role: ContainerRole,
    cluster: &MysqlCluster,
    constants: &PolicyConstants,
) -> ContainerPolicy {
    let spec = &cluster.spec;
    let defaults_file = format!("--defaults-file={}", constants.client_config_file);
    let common_mounts = [VolumeRole::ConfigScratch, VolumeRole::Data];

    let mut env_from = vec![secret_env(
        cluster.name_for(ClusterResource::EnvSecret),
        None,
    )];

    let mut policy = ContainerPolicy {
        role,
        image: spec.helper_image().to_string(),
        args: Vec::new(),
        ports: Vec::new(),
        resources: None,
        liveness: None,
        readiness: None,
        env_from: Vec::new(),
        volume_mounts: Vec::new(),
    };

    match role {
        ContainerRole::InitConfig => {
            policy.args = vec!["files-config".to_string()];
            policy.volume_mounts = mounts(
                &[VolumeRole::ConfigScratch, VolumeRole::ConfigSource],
                constants,
            );
        }
        ContainerRole::InitClone => {
            policy.args = vec!["clone".to_string()];
            if !spec.init_bucket_secret_name.is_empty() {
                env_from.push(secret_env(spec.init_bucket_secret_name.clone(), None));
            }
            policy.volume_mounts = mounts(&common_mounts, constants);
        }
        ContainerRole::Main => {
            policy.image = spec.mysql_image().to_string();
            policy.ports = vec![(constants.mysql_port_name.clone(), constants.mysql_port)];
            policy.resources = spec.pod_spec.resources.clone();
            policy.liveness = Some(ProbeSpec {
                handler: exec(&["mysqladmin", defaults_file.as_str(), "ping"]),
                timing: constants.main_liveness,
            });
            policy.readiness = Some(ProbeSpec {
                handler: exec(&["mysql", defaults_file.as_str(), "-e", "SELECT 1"]),
                timing: constants.main_readiness,
            });
            env_from.push(secret_env(
                spec.secret_name.clone(),
                Some(&constants.secret_env_prefix),
            ));
            policy.volume_mounts = mounts(&common_mounts, constants);
        }
        ContainerRole::Helper => {
            policy.args = vec!["config-and-serve".to_string()];
            policy.ports = vec![(constants.helper_port_name.clone(), constants.helper_port)];
            policy.readiness = Some(ProbeSpec {
                handler: ProbeHandler::HttpGet {
                    path: constants.helper_probe_path.clone(),
                    port: constants.helper_probe_port,
                },
                timing: constants.helper_readiness,
            });
            let mut roles = common_mounts.to_vec();
            if planned_roles(cluster).contains(&VolumeRole::TopologyCredential) {
                roles.push(VolumeRole::TopologyCredential);
            }
            policy.volume_mounts = mounts(&roles, constants);
        }
        ContainerRole::MetricsExporter => {
            policy.image = spec.metrics_exporter_image().to_string();
            policy.args = vec![
                format!("--web.listen-address=0.0.0.0:{}", constants.exporter_port),
                format!("--web.telemetry-path={}", constants.exporter_path),
            ];
            policy.ports = vec![(constants.exporter_port_name.clone(), constants.exporter_port)];
            policy.liveness = Some(ProbeSpec {
                handler: ProbeHandler::HttpGet {
                    path: constants.exporter_path.clone(),
                    port: constants.exporter_port,
                },
                timing: constants.exporter_liveness,
            });
        }
    }

    policy.env_from = env_from;
    policy
}

/// Merge the managed ports onto `existing`, matching entries by name.
fn merge_ports(
    existing: Option<Vec<ContainerPort>>,
    managed: &[(String, i32)],
) -> Vec<ContainerPort> {
    let mut existing = existing.unwrap_or_default();
    managed
        .iter()
        .map(|(name, port)| {
            let mut merged = existing
                .iter()
                .position(|p| p.name.as_deref() == Some(name.as_str()))
                .map(|idx| existing.swap_remove(idx))
                .unwrap_or_default();
            merged.name = Some(name.clone());
            merged.container_port = *port;
            merged
        })
        .collect()
}

impl ContainerPolicy {
    /// Write this policy onto `base` and return the result
    pub fn apply_to(&self, mut base: Container, pull_policy: Option<&str>) -> Container {
        base.name = self.role.name().to_string();
        base.image = Some(self.image.clone());
        base.image_pull_policy = pull_policy.map(str::to_string);
        base.args = (!self.args.is_empty()).then(|| self.args.clone());
        base.env_from = (!self.env_from.is_empty()).then(|| self.env_from.clone());
        base.volume_mounts = (!self.volume_mounts.is_empty())
            .then(|| self.volume_mounts.clone());

        if !self.ports.is_empty() {
            base.ports = Some(merge_ports(base.ports.take(), &self.ports));
        }

        if self.role == ContainerRole::Main {
            base.resources = self.resources.clone();
        }

        if let Some(liveness) = &self.liveness {
            base.liveness_probe = Some(liveness.apply_to(base.liveness_probe.take()));
        }
        if let Some(readiness) = &self.readiness {
            base.readiness_probe = Some(readiness.apply_to(base.readiness_probe.take()));
        }

        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> MysqlCluster {
        let mut cluster = MysqlCluster::default();
        cluster.metadata.name = Some("db".to_string());
        cluster.spec.secret_name = "db-secret".to_string();
        cluster
    }

    fn secret_names(policy: &ContainerPolicy) -> Vec<(String, Option<String>)> {
        policy
            .env_from
            .iter()
            .map(|e| {
                (
                    e.secret_ref.as_ref().unwrap().name.clone(),
                    e.prefix.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_clone_env_with_init_bucket_secret() {
        let constants = PolicyConstants::default();
        let mut c = cluster();

        let without = policy_for(ContainerRole::InitClone, &c, &constants);
        assert_eq!(
            secret_names(&without),
            vec![("db-mysql-operator-env".to_string(), None)]
        );

        c.spec.init_bucket_secret_name = "seed-creds".to_string();
        let with = policy_for(ContainerRole::InitClone, &c, &constants);
        assert_eq!(
            secret_names(&with),
            vec![
                ("db-mysql-operator-env".to_string(), None),
                ("seed-creds".to_string(), None),
            ]
        );

        assert_eq!(with.volume_mounts, without.volume_mounts);
        let mount_paths: Vec<_> = with
            .volume_mounts
            .iter()
            .map(|m| m.mount_path.as_str())
            .collect();
        assert_eq!(mount_paths, vec!["/etc/mysql", "/var/lib/mysql"]);
    }

    #[test]
    fn test_main_policy() {
        let constants = PolicyConstants::default();
        let policy = policy_for(ContainerRole::Main, &cluster(), &constants);

        assert_eq!(policy.image, "percona:5.7");
        assert!(policy.args.is_empty());
        assert_eq!(policy.ports, vec![("mysql".to_string(), 3306)]);
        assert_eq!(
            secret_names(&policy)[1],
            ("db-secret".to_string(), Some("MYSQL_".to_string()))
        );

        let liveness = policy.liveness.unwrap();
        assert_eq!(liveness.timing, ProbeTiming::new(30, 10, 5));
        assert_eq!(
            liveness.handler,
            ProbeHandler::Exec(vec![
                "mysqladmin".to_string(),
                "--defaults-file=/etc/mysql/client.cnf".to_string(),
                "ping".to_string(),
            ])
        );

        let mount_paths: Vec<_> = policy
            .volume_mounts
            .iter()
            .map(|m| m.mount_path.as_str())
            .collect();
        assert_eq!(mount_paths, vec!["/etc/mysql", "/var/lib/mysql"]);
    }

    #[test]
    fn test_helper_mounts_topology_secret_only_when_configured() {
        let constants = PolicyConstants::default();
        let mut c = cluster();
        let policy = policy_for(ContainerRole::Helper, &c, &constants);
        assert_eq!(policy.volume_mounts.len(), 2);

        c.spec.orchestrator_topology_secret_name = "orc".to_string();
        let policy = policy_for(ContainerRole::Helper, &c, &constants);
        assert_eq!(policy.volume_mounts.len(), 3);
        assert_eq!(policy.volume_mounts[2].mount_path, "/var/run/orc-topology");
    }

    #[test]
    fn test_exporter_policy() {
        let constants = PolicyConstants::default();
        let policy = policy_for(ContainerRole::MetricsExporter, &cluster(), &constants);
        assert_eq!(
            policy.args,
            vec![
                "--web.listen-address=0.0.0.0:9104".to_string(),
                "--web.telemetry-path=/metrics".to_string(),
            ]
        );
        assert!(policy.readiness.is_none());
        assert!(policy.volume_mounts.is_empty());
        let liveness = policy.liveness.unwrap();
        assert_eq!(liveness.timing, ProbeTiming::new(30, 120, 30));
    }

    #[test]
    fn test_apply_keeps_runtime_fields() {
        let constants = PolicyConstants::default();
        let policy = policy_for(ContainerRole::Main, &cluster(), &constants);

        let base = Container {
            name: "mysql".to_string(),
            termination_message_path: Some("/dev/termination-log".to_string()),
            ports: Some(vec![ContainerPort {
                name: Some("mysql".to_string()),
                container_port: 3306,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            liveness_probe: Some(Probe {
                timeout_seconds: Some(1),
                success_threshold: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        };

        let container = policy.apply_to(base, Some("IfNotPresent"));
        assert_eq!(
            container.termination_message_path.as_deref(),
            Some("/dev/termination-log")
        );
        assert_eq!(container.image_pull_policy.as_deref(), Some("IfNotPresent"));

        let ports = container.ports.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));

        let liveness = container.liveness_probe.unwrap();
        assert_eq!(liveness.timeout_seconds, Some(1));
        assert_eq!(liveness.success_threshold, Some(1));
        assert_eq!(liveness.initial_delay_seconds, Some(30));
        assert!(liveness.exec.is_some());
    }

    #[test]
    fn test_apply_replaces_probe_handler() {
        let constants = PolicyConstants::default();
        let policy = policy_for(ContainerRole::Helper, &cluster(), &constants);
        let base = Container {
            readiness_probe: Some(Probe {
                exec: Some(ExecAction {
                    command: Some(vec!["true".to_string()]),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let probe = policy.apply_to(base, None).readiness_probe.unwrap();
        assert!(probe.exec.is_none());
        let http = probe.http_get.unwrap();
        assert_eq!(http.path.as_deref(), Some("/health"));
        assert_eq!(http.port, IntOrString::Int(8001));
        assert_eq!(http.scheme.as_deref(), Some("HTTP"));
    }

    #[test]
    fn test_merge_ports_by_name() {
        let existing = vec![
            ContainerPort {
                name: Some("other".to_string()),
                container_port: 1,
                ..Default::default()
            },
            ContainerPort {
                name: Some("prometheus".to_string()),
                container_port: 9000,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            },
        ];
        let merged = merge_ports(Some(existing), &[("prometheus".to_string(), 9104)]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].container_port, 9104);
        assert_eq!(merged[0].protocol.as_deref(), Some("TCP"));
    }
}
