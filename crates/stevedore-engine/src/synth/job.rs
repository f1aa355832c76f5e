//! Scheduled job synthesis: the release's CronJob
//!
//! Overlapping concurrent runs are forbidden; the declared retry limit maps
//! to the job's backoff limit. Malformed schedules never reach this point,
//! they fail validation upstream.

use stevedore_common::config::ValidatedRelease;
use stevedore_common::{Error, Result};

use crate::k8s::{CronJob, CronJobSpec, JobSpec, JobTemplateSpec, PodMeta, PodSpec, PodTemplateSpec};

use super::{files, object_meta, synthesize_container};

/// Synthesize the CronJob for a release's scheduled job section
pub fn synthesize_scheduled_job(release: &ValidatedRelease) -> Result<CronJob> {
    let config = release.config();
    let job = config
        .scheduled_job
        .as_ref()
        .ok_or_else(|| Error::internal("synthesizer", "no scheduled job section declared"))?;

    let meta = object_meta(config, &config.name, &job.labels, &job.annotations)?;

    let mut pod_labels = meta.labels.clone();
    let mut pod_annotations = meta.annotations.clone();
    pod_labels.extend(job.container.labels.clone());
    pod_annotations.extend(job.container.annotations.clone());

    let container = synthesize_container(config, &job.container);
    let volumes = files::volumes_for(config, &[&job.container.name]);

    Ok(CronJob::new(
        meta,
        CronJobSpec {
            schedule: job.schedule.clone(),
            concurrency_policy: "Forbid".to_string(),
            job_template: JobTemplateSpec {
                spec: JobSpec {
                    backoff_limit: job.retry_limit,
                    template: PodTemplateSpec {
                        metadata: PodMeta {
                            labels: pod_labels,
                            annotations: pod_annotations,
                        },
                        spec: PodSpec {
                            containers: vec![container],
                            volumes,
                            restart_policy: Some("OnFailure".to_string()),
                        },
                    },
                },
            },
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{make_file, make_release, make_scheduled_job, validated};
    use super::*;
    use stevedore_common::labels::RELEASE_LABEL;

    fn release_with_job() -> ValidatedRelease {
        let mut config = make_release();
        config.scheduled_job = Some(make_scheduled_job("*/5 * * * *"));
        validated(config)
    }

    #[test]
    fn cronjob_forbids_overlap_and_maps_retry_limit() {
        let cronjob = synthesize_scheduled_job(&release_with_job()).unwrap();

        assert_eq!(cronjob.metadata.name, "myapp");
        assert_eq!(cronjob.spec.schedule, "*/5 * * * *");
        assert_eq!(cronjob.spec.concurrency_policy, "Forbid");
        assert_eq!(cronjob.spec.job_template.spec.backoff_limit, 3);
        assert_eq!(
            cronjob.metadata.labels.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
    }

    #[test]
    fn job_pod_wraps_the_single_container() {
        let cronjob = synthesize_scheduled_job(&release_with_job()).unwrap();

        let pod = &cronjob.spec.job_template.spec.template.spec;
        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.containers[0].name, "sweeper");
        assert_eq!(pod.restart_policy.as_deref(), Some("OnFailure"));
    }

    #[test]
    fn job_pod_mounts_files_exposed_to_its_container() {
        let mut config = make_release();
        config.scheduled_job = Some(make_scheduled_job("0 3 * * *"));
        config.config_files = vec![make_file("settings", "/etc/cfg", &["sweeper"])];
        let release = validated(config);

        let cronjob = synthesize_scheduled_job(&release).unwrap();
        let pod = &cronjob.spec.job_template.spec.template.spec;
        assert_eq!(pod.volumes.len(), 1);
        assert_eq!(pod.containers[0].volume_mounts.len(), 1);
        assert_eq!(pod.containers[0].volume_mounts[0].mount_path, "/etc/cfg");
    }
}
