//! Resource synthesis
//!
//! Pure mapping from a validated release to desired-state objects, one
//! function per kind. Given the same release and identity, every function
//! produces an identical object; the orchestrator relies on this for
//! idempotent apply. Nothing here talks to the store.

mod files;
mod ingress;
mod job;
mod service;
mod workload;

pub use files::{synthesize_config_file, synthesize_secret_file, volume_ident};
pub use ingress::synthesize_ingress;
pub use job::synthesize_scheduled_job;
pub use service::synthesize_service;
pub use workload::synthesize_workload;

use std::collections::BTreeMap;

use stevedore_common::config::{ContainerConfig, ReleaseConfig};
use stevedore_common::labels::{self, NAME_LABEL};
use stevedore_common::Result;

use crate::k8s::{Container, ContainerPort, ObjectMeta, Probe, ResourceRequirements};

/// Build merged metadata for one synthesized object.
///
/// Labels: common < section-specific < ownership marker, plus the
/// conventional name label (user-overridable). Annotations merge the same
/// way minus the marker.
pub(crate) fn object_meta(
    config: &ReleaseConfig,
    name: &str,
    specific_labels: &BTreeMap<String, String>,
    specific_annotations: &BTreeMap<String, String>,
) -> Result<ObjectMeta> {
    let empty = BTreeMap::new();
    let (common_labels, common_annotations) = match config.common {
        Some(ref common) => (&common.labels, &common.annotations),
        None => (&empty, &empty),
    };

    let mut merged_labels = labels::merge_labels(&config.name, common_labels, specific_labels)?;
    merged_labels
        .entry(NAME_LABEL.to_string())
        .or_insert_with(|| config.name.clone());
    let merged_annotations = labels::merge_annotations(common_annotations, specific_annotations)?;

    Ok(ObjectMeta::new(name, &config.namespace)
        .with_labels(merged_labels)
        .with_annotations(merged_annotations))
}

/// Selector labels identifying the release's pods.
///
/// Only the ownership marker: guaranteed present on every pod template and
/// immutable for the release's lifetime, which a selector must be.
pub(crate) fn selector_labels(release: &str) -> BTreeMap<String, String> {
    let mut selector = BTreeMap::new();
    selector.insert(labels::RELEASE_LABEL.to_string(), release.to_string());
    selector
}

/// Synthesize one pod container from its configuration
pub(crate) fn synthesize_container(
    config: &ReleaseConfig,
    container: &ContainerConfig,
) -> Container {
    let resources = synthesize_resources(container);
    let (liveness, readiness) = match container.health_probes {
        Some(ref probes) => (
            probes
                .liveness
                .as_ref()
                .map(|p| synthesize_probe(p, container.port)),
            probes
                .readiness
                .as_ref()
                .map(|p| synthesize_probe(p, container.port)),
        ),
        None => (None, None),
    };

    Container {
        name: container.name.clone(),
        image: container.image_ref(),
        ports: vec![ContainerPort {
            container_port: i32::from(container.port),
        }],
        resources,
        liveness_probe: liveness,
        readiness_probe: readiness,
        volume_mounts: files::mounts_for(config, &container.name),
    }
}

fn synthesize_resources(container: &ContainerConfig) -> Option<ResourceRequirements> {
    let mut requirements = ResourceRequirements::default();
    if let Some(ref requests) = container.resource_requests {
        if let Some(cpu) = requests.cpu_set() {
            requirements.requests.insert("cpu".to_string(), cpu.to_string());
        }
        if let Some(memory) = requests.memory_set() {
            requirements
                .requests
                .insert("memory".to_string(), memory.to_string());
        }
    }
    if let Some(ref limits) = container.resource_limits {
        if let Some(cpu) = limits.cpu_set() {
            requirements.limits.insert("cpu".to_string(), cpu.to_string());
        }
        if let Some(memory) = limits.memory_set() {
            requirements
                .limits
                .insert("memory".to_string(), memory.to_string());
        }
    }
    if requirements.is_empty() {
        None
    } else {
        Some(requirements)
    }
}

/// Synthesize a probe, defaulting initial delay and period to 1 second
fn synthesize_probe(
    probe: &stevedore_common::config::ProbeConfig,
    container_port: u16,
) -> Probe {
    Probe {
        http_get: crate::k8s::HttpGetAction {
            path: probe.path.clone(),
            port: i32::from(probe.port.unwrap_or(container_port)),
        },
        initial_delay_seconds: probe.initial_delay_seconds.unwrap_or(1),
        period_seconds: probe.period_seconds.unwrap_or(1),
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use stevedore_common::config::{
        ContainerConfig, FileArtifact, IngressConfig, MountSpec, ReleaseConfig,
        ScheduledJobConfig, ValidatedRelease, WorkloadConfig,
    };

    pub fn make_container(name: &str) -> ContainerConfig {
        ContainerConfig {
            name: name.to_string(),
            image: "registry.example.com/app".to_string(),
            tag: "v1.0.0".to_string(),
            port: 8080,
            ..Default::default()
        }
    }

    pub fn make_file(name: &str, path: &str, containers: &[&str]) -> FileArtifact {
        FileArtifact {
            name: name.to_string(),
            data: "payload".to_string(),
            mount: MountSpec {
                path: path.to_string(),
                exposed_to_containers: containers.iter().map(|s| s.to_string()).collect(),
            },
            ..Default::default()
        }
    }

    pub fn make_ingress(hostnames: &[&str], port: u16) -> IngressConfig {
        IngressConfig {
            ingress_class: "nginx".to_string(),
            cluster_issuer: "letsencrypt-prod".to_string(),
            hostnames: hostnames.iter().map(|s| s.to_string()).collect(),
            port,
            ..Default::default()
        }
    }

    pub fn make_release() -> ReleaseConfig {
        ReleaseConfig {
            name: "myapp".to_string(),
            namespace: "prod".to_string(),
            workload: Some(WorkloadConfig {
                replicas: 2,
                containers: vec![make_container("app")],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn make_scheduled_job(schedule: &str) -> ScheduledJobConfig {
        ScheduledJobConfig {
            schedule: schedule.to_string(),
            retry_limit: 3,
            container: make_container("sweeper"),
            ..Default::default()
        }
    }

    pub fn validated(config: ReleaseConfig) -> ValidatedRelease {
        config.validate().expect("test release should validate")
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::{make_release, validated};
    use super::*;
    use stevedore_common::config::CommonMeta;

    #[test]
    fn object_meta_merges_and_marks() {
        let mut config = make_release();
        config.common = Some(CommonMeta {
            labels: [("env".to_string(), "prod".to_string())].into(),
            ..Default::default()
        });
        let release = validated(config);

        let specific = [("tier".to_string(), "web".to_string())].into();
        let meta = object_meta(release.config(), "myapp", &specific, &Default::default()).unwrap();

        assert_eq!(meta.labels.get("env"), Some(&"prod".to_string()));
        assert_eq!(meta.labels.get("tier"), Some(&"web".to_string()));
        assert_eq!(
            meta.labels.get(labels::RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
        assert_eq!(meta.labels.get(NAME_LABEL), Some(&"myapp".to_string()));
    }

    #[test]
    fn selector_is_only_the_marker() {
        let selector = selector_labels("myapp");
        assert_eq!(selector.len(), 1);
        assert_eq!(
            selector.get(labels::RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
    }

    #[test]
    fn probe_defaults_are_one_second() {
        let probe = synthesize_probe(
            &stevedore_common::config::ProbeConfig {
                path: "/healthz".to_string(),
                ..Default::default()
            },
            8080,
        );
        assert_eq!(probe.initial_delay_seconds, 1);
        assert_eq!(probe.period_seconds, 1);
        assert_eq!(probe.http_get.port, 8080);
    }
}
