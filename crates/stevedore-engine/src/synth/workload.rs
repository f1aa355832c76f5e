//! Workload synthesis: the release's Deployment

use stevedore_common::config::ValidatedRelease;
use stevedore_common::{Error, Result};

use crate::k8s::{Deployment, DeploymentSpec, LabelSelector, PodMeta, PodSpec, PodTemplateSpec};

use super::{files, object_meta, selector_labels, synthesize_container};

/// Synthesize the Deployment for a release's workload section
pub fn synthesize_workload(release: &ValidatedRelease) -> Result<Deployment> {
    let config = release.config();
    let workload = config
        .workload
        .as_ref()
        .ok_or_else(|| Error::internal("synthesizer", "no workload section declared"))?;

    let meta = object_meta(config, &config.name, &workload.labels, &workload.annotations)?;

    // Pod labels start from the object labels so the ownership marker (the
    // selector) is always present, then fold in per-container metadata in
    // declared order.
    let mut pod_labels = meta.labels.clone();
    let mut pod_annotations = meta.annotations.clone();
    for container in &workload.containers {
        pod_labels.extend(container.labels.clone());
        pod_annotations.extend(container.annotations.clone());
    }

    let container_names: Vec<&str> = workload
        .containers
        .iter()
        .map(|c| c.name.as_str())
        .collect();

    let containers = workload
        .containers
        .iter()
        .map(|c| synthesize_container(config, c))
        .collect();

    Ok(Deployment::new(
        meta,
        DeploymentSpec {
            replicas: workload.replicas,
            selector: LabelSelector {
                match_labels: selector_labels(&config.name),
            },
            template: PodTemplateSpec {
                metadata: PodMeta {
                    labels: pod_labels,
                    annotations: pod_annotations,
                },
                spec: PodSpec {
                    containers,
                    volumes: files::volumes_for(config, &container_names),
                    restart_policy: None,
                },
            },
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{make_container, make_file, make_release, validated};
    use super::*;
    use stevedore_common::config::{HealthProbes, ProbeConfig, ResourceQuantity};
    use stevedore_common::labels::RELEASE_LABEL;

    #[test]
    fn deployment_carries_replicas_and_marker() {
        let release = validated(make_release());
        let deployment = synthesize_workload(&release).unwrap();

        assert_eq!(deployment.metadata.name, "myapp");
        assert_eq!(deployment.metadata.namespace, "prod");
        assert_eq!(deployment.spec.replicas, 2);
        assert_eq!(
            deployment.metadata.labels.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
        assert_eq!(
            deployment.spec.selector.match_labels.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
        assert_eq!(
            deployment.spec.template.metadata.labels.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
    }

    #[test]
    fn containers_get_image_ref_and_port() {
        let release = validated(make_release());
        let deployment = synthesize_workload(&release).unwrap();

        let container = &deployment.spec.template.spec.containers[0];
        assert_eq!(container.name, "app");
        assert_eq!(container.image, "registry.example.com/app:v1.0.0");
        assert_eq!(container.ports[0].container_port, 8080);
    }

    #[test]
    fn declared_probes_are_synthesized_with_defaults() {
        let mut config = make_release();
        config.workload.as_mut().unwrap().containers[0].health_probes = Some(HealthProbes {
            liveness: Some(ProbeConfig {
                path: "/healthz".to_string(),
                ..Default::default()
            }),
            readiness: None,
        });
        let release = validated(config);

        let deployment = synthesize_workload(&release).unwrap();
        let container = &deployment.spec.template.spec.containers[0];

        let liveness = container.liveness_probe.as_ref().unwrap();
        assert_eq!(liveness.http_get.path, "/healthz");
        assert_eq!(liveness.http_get.port, 8080);
        assert_eq!(liveness.initial_delay_seconds, 1);
        assert_eq!(liveness.period_seconds, 1);
        assert!(container.readiness_probe.is_none());
    }

    #[test]
    fn resources_skip_empty_strings() {
        let mut config = make_release();
        config.workload.as_mut().unwrap().containers[0].resource_requests =
            Some(ResourceQuantity {
                cpu: Some("100m".to_string()),
                memory: Some(String::new()),
            });
        let release = validated(config);

        let deployment = synthesize_workload(&release).unwrap();
        let resources = deployment.spec.template.spec.containers[0]
            .resources
            .as_ref()
            .unwrap();
        assert_eq!(resources.requests.get("cpu"), Some(&"100m".to_string()));
        assert!(!resources.requests.contains_key("memory"));
        assert!(resources.limits.is_empty());
    }

    #[test]
    fn file_artifacts_become_volumes_and_mounts() {
        let mut config = make_release();
        config
            .workload
            .as_mut()
            .unwrap()
            .containers
            .push(make_container("sidecar"));
        config.secret_files = vec![make_file("token", "/etc/secrets", &["app"])];
        let release = validated(config);

        let deployment = synthesize_workload(&release).unwrap();
        let pod = &deployment.spec.template.spec;

        assert_eq!(pod.volumes.len(), 1);
        assert_eq!(pod.containers[0].volume_mounts.len(), 1);
        assert!(pod.containers[1].volume_mounts.is_empty());
    }

    #[test]
    fn synthesis_twice_is_byte_identical() {
        let release = validated(make_release());
        let first = serde_json::to_string(&synthesize_workload(&release).unwrap()).unwrap();
        let second = serde_json::to_string(&synthesize_workload(&release).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
