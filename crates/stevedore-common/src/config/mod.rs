//! Release configuration model
//!
//! A release document describes one application release: an optional workload
//! (with containers and an optional ingress), an optional scheduled job, and
//! optional secret/config file artifacts. Exactly the declared sections are
//! reconciled; absent sections are never touched.

mod container;
mod validate;

pub use container::{ContainerConfig, HealthProbes, ProbeConfig, ResourceQuantity};
pub use validate::ValidatedRelease;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Root of a release document
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Release name; becomes the name of the workload, service, and ingress
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Labels and annotations shared across every synthesized object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<CommonMeta>,

    /// Long-running workload section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workload: Option<WorkloadConfig>,

    /// Scheduled job section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_job: Option<ScheduledJobConfig>,

    /// Sensitive file artifacts, each backed by one secret object
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_files: Vec<FileArtifact>,

    /// Non-sensitive file artifacts, each backed by one config object
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<FileArtifact>,
}

impl ReleaseConfig {
    /// Parse a YAML release document.
    ///
    /// Parsing is purely structural; call [`ReleaseConfig::validate`] to get
    /// a [`ValidatedRelease`] usable by the engine.
    pub fn parse(document: &str) -> Result<Self, Error> {
        serde_yaml::from_str(document)
            .map_err(|e| Error::serialization_for_kind("ReleaseConfig", e.to_string()))
    }

    /// Every container declared in this release, workload first
    pub fn declared_containers(&self) -> Vec<&ContainerConfig> {
        let mut containers = Vec::new();
        if let Some(ref workload) = self.workload {
            containers.extend(workload.containers.iter());
        }
        if let Some(ref job) = self.scheduled_job {
            containers.push(&job.container);
        }
        containers
    }

    /// Every file artifact declared in this release, secret files first
    pub fn declared_files(&self) -> Vec<&FileArtifact> {
        self.secret_files
            .iter()
            .chain(self.config_files.iter())
            .collect()
    }
}

/// Shared labels and annotations
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CommonMeta {
    /// Labels applied to every synthesized object
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Annotations applied to every synthesized object
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Long-running workload: a replicated set of containers, optionally exposed
/// through an ingress
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WorkloadConfig {
    /// Number of replicas (1-100)
    pub replicas: i32,

    /// Ordered container list; at least one
    pub containers: Vec<ContainerConfig>,

    /// Optional network entry point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressConfig>,

    /// Workload-specific labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Workload-specific annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Network entry point for a workload
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IngressConfig {
    /// Ingress class handling this entry point (e.g., "nginx")
    pub ingress_class: String,

    /// Certificate issuer for TLS certificates
    pub cluster_issuer: String,

    /// Hostnames routed to the release's service; at least one
    pub hostnames: Vec<String>,

    /// Backend service port
    pub port: u16,

    /// Ingress-specific labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Ingress-specific annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Scheduled job running a single container on a cron schedule
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ScheduledJobConfig {
    /// Cron expression (5-7 fields)
    pub schedule: String,

    /// Number of retries before the job run is marked failed (0-10)
    pub retry_limit: i32,

    /// The container to run
    pub container: ContainerConfig,

    /// Job-specific labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Job-specific annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// A file projected into containers, backed by one secret or config object
/// named `<release>-<name>`
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileArtifact {
    /// File name; also the data key of the backing object
    pub name: String,

    /// Raw file content
    pub data: String,

    /// Where and into which containers the file is mounted
    pub mount: MountSpec,

    /// Artifact-specific labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Artifact-specific annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Mount target of a file artifact
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MountSpec {
    /// Absolute directory path the file is mounted under
    pub path: String,

    /// Names of containers the file is exposed to; at least one
    pub exposed_to_containers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_DOC: &str = r#"
name: myapp
namespace: prod
common:
  labels:
    team: infra
workload:
  replicas: 3
  containers:
    - name: app
      image: registry.example.com/myapp
      tag: v1.4.2
      port: 8080
      healthProbes:
        liveness:
          path: /healthz
        readiness:
          path: /ready
          initialDelaySeconds: 5
      resourceRequests:
        cpu: 100m
        memory: 128Mi
  ingress:
    ingressClass: nginx
    clusterIssuer: letsencrypt-prod
    hostnames:
      - example.com
    port: 8080
scheduledJob:
  schedule: "*/5 * * * *"
  retryLimit: 3
  container:
    name: sweeper
    image: registry.example.com/sweeper
    tag: v0.9.0
    port: 9090
secretFiles:
  - name: api-token
    data: s3cr3t
    mount:
      path: /etc/secrets
      exposedToContainers: [app]
configFiles:
  - name: settings
    data: "verbose = true"
    mount:
      path: /etc/cfg
      exposedToContainers: [app]
"#;

    #[test]
    fn parses_full_document() {
        let config = ReleaseConfig::parse(FULL_DOC).unwrap();
        assert_eq!(config.name, "myapp");
        assert_eq!(config.namespace, "prod");

        let workload = config.workload.as_ref().unwrap();
        assert_eq!(workload.replicas, 3);
        assert_eq!(workload.containers.len(), 1);
        assert_eq!(workload.containers[0].name, "app");
        assert_eq!(
            workload.ingress.as_ref().unwrap().hostnames,
            vec!["example.com"]
        );

        let job = config.scheduled_job.as_ref().unwrap();
        assert_eq!(job.schedule, "*/5 * * * *");
        assert_eq!(job.retry_limit, 3);

        assert_eq!(config.secret_files.len(), 1);
        assert_eq!(config.config_files.len(), 1);
        assert_eq!(config.secret_files[0].mount.path, "/etc/secrets");
    }

    #[test]
    fn absent_sections_stay_absent() {
        let config = ReleaseConfig::parse("name: tiny\nnamespace: dev\n").unwrap();
        assert!(config.workload.is_none());
        assert!(config.scheduled_job.is_none());
        assert!(config.secret_files.is_empty());
        assert!(config.config_files.is_empty());
    }

    #[test]
    fn unknown_root_fields_are_rejected() {
        let doc = "name: x\nnamespace: y\nextra: true\n";
        assert!(ReleaseConfig::parse(doc).is_err());
    }

    #[test]
    fn declared_containers_cover_workload_and_job() {
        let config = ReleaseConfig::parse(FULL_DOC).unwrap();
        let names: Vec<&str> = config
            .declared_containers()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["app", "sweeper"]);
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = ReleaseConfig::parse(FULL_DOC).unwrap();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let reparsed = ReleaseConfig::parse(&serialized).unwrap();
        assert_eq!(config, reparsed);
    }
}
