//! File artifact synthesis: backing objects and volume/mount wiring
//!
//! Each file artifact becomes one backing object named `<release>-<file>`
//! with the file name as its single data key. Volume identifiers are keyed
//! by a stable short hash of the file name so they stay deterministic and
//! collision-resistant across unrelated files sharing a name prefix.

use sha2::{Digest, Sha256};

use stevedore_common::config::{FileArtifact, ReleaseConfig};
use stevedore_common::Result;

use crate::k8s::{
    ConfigMap, ConfigMapVolumeSource, Secret, SecretVolumeSource, Volume, VolumeMount,
};

use super::object_meta;

/// Name of the backing object for a file artifact
pub(crate) fn backing_name(release: &str, file: &FileArtifact) -> String {
    format!("{}-{}", release, file.name)
}

/// Stable volume identifier for a file artifact.
///
/// First 8 hex characters of SHA-256 of the file name.
pub fn volume_ident(file_name: &str) -> String {
    let digest = Sha256::digest(file_name.as_bytes());
    format!("file-{}", &hex::encode(digest)[..8])
}

/// Synthesize the Secret backing one secret file
pub fn synthesize_secret_file(config: &ReleaseConfig, file: &FileArtifact) -> Result<Secret> {
    let meta = object_meta(
        config,
        &backing_name(&config.name, file),
        &file.labels,
        &file.annotations,
    )?;
    Ok(Secret::new(meta).with_data(&file.name, &file.data))
}

/// Synthesize the ConfigMap backing one config file
pub fn synthesize_config_file(config: &ReleaseConfig, file: &FileArtifact) -> Result<ConfigMap> {
    let meta = object_meta(
        config,
        &backing_name(&config.name, file),
        &file.labels,
        &file.annotations,
    )?;
    Ok(ConfigMap::new(meta).with_data(&file.name, &file.data))
}

/// Pod volumes for the file artifacts exposed to any of the given containers,
/// secret files first, in declared order
pub(crate) fn volumes_for(config: &ReleaseConfig, container_names: &[&str]) -> Vec<Volume> {
    let exposed = |file: &FileArtifact| {
        file.mount
            .exposed_to_containers
            .iter()
            .any(|c| container_names.contains(&c.as_str()))
    };

    let mut volumes = Vec::new();
    for file in config.secret_files.iter().filter(|f| exposed(f)) {
        volumes.push(Volume {
            name: volume_ident(&file.name),
            secret: Some(SecretVolumeSource {
                secret_name: backing_name(&config.name, file),
            }),
            config_map: None,
        });
    }
    for file in config.config_files.iter().filter(|f| exposed(f)) {
        volumes.push(Volume {
            name: volume_ident(&file.name),
            secret: None,
            config_map: Some(ConfigMapVolumeSource {
                name: backing_name(&config.name, file),
            }),
        });
    }
    volumes
}

/// Volume mounts for one container, cross-referencing every file artifact's
/// `exposedToContainers` list
pub(crate) fn mounts_for(config: &ReleaseConfig, container_name: &str) -> Vec<VolumeMount> {
    config
        .declared_files()
        .into_iter()
        .filter(|file| {
            file.mount
                .exposed_to_containers
                .iter()
                .any(|c| c == container_name)
        })
        .map(|file| VolumeMount {
            name: volume_ident(&file.name),
            mount_path: file.mount.path.clone(),
            read_only: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{make_file, make_release};
    use super::*;
    use stevedore_common::labels::RELEASE_LABEL;

    #[test]
    fn volume_ident_is_stable_and_distinct() {
        let first = volume_ident("settings");
        assert_eq!(first, volume_ident("settings"));
        assert_ne!(first, volume_ident("settings-extra"));
        assert!(first.starts_with("file-"));
        assert_eq!(first.len(), "file-".len() + 8);
    }

    #[test]
    fn secret_file_is_named_release_dash_file() {
        let mut config = make_release();
        config.secret_files = vec![make_file("api-token", "/etc/secrets", &["app"])];

        let secret = synthesize_secret_file(&config, &config.secret_files[0]).unwrap();
        assert_eq!(secret.metadata.name, "myapp-api-token");
        assert_eq!(secret.metadata.namespace, "prod");
        assert_eq!(secret.string_data.get("api-token"), Some(&"payload".to_string()));
        assert_eq!(
            secret.metadata.labels.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
    }

    #[test]
    fn config_file_data_is_keyed_by_file_name() {
        let mut config = make_release();
        config.config_files = vec![make_file("settings", "/etc/cfg", &["app"])];

        let config_map = synthesize_config_file(&config, &config.config_files[0]).unwrap();
        assert_eq!(config_map.metadata.name, "myapp-settings");
        assert_eq!(config_map.data.get("settings"), Some(&"payload".to_string()));
    }

    #[test]
    fn mounts_cover_only_exposed_containers() {
        let mut config = make_release();
        config.secret_files = vec![make_file("token", "/etc/secrets", &["app"])];
        config.config_files = vec![make_file("settings", "/etc/cfg", &["other"])];

        let mounts = mounts_for(&config, "app");
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, "/etc/secrets");
        assert_eq!(mounts[0].name, volume_ident("token"));
        assert!(mounts[0].read_only);

        assert!(mounts_for(&config, "ghost").is_empty());
    }

    #[test]
    fn volumes_follow_exposure() {
        let mut config = make_release();
        config.secret_files = vec![make_file("token", "/etc/secrets", &["app"])];
        config.config_files = vec![make_file("settings", "/etc/cfg", &["sweeper"])];

        let workload_volumes = volumes_for(&config, &["app"]);
        assert_eq!(workload_volumes.len(), 1);
        assert!(workload_volumes[0].secret.is_some());
        assert_eq!(
            workload_volumes[0].secret.as_ref().unwrap().secret_name,
            "myapp-token"
        );

        let job_volumes = volumes_for(&config, &["sweeper"]);
        assert_eq!(job_volumes.len(), 1);
        assert!(job_volumes[0].config_map.is_some());
    }

    #[test]
    fn synthesis_is_deterministic() {
        let mut config = make_release();
        config.secret_files = vec![make_file("token", "/etc/secrets", &["app"])];

        let first = synthesize_secret_file(&config, &config.secret_files[0]).unwrap();
        let second = synthesize_secret_file(&config, &config.secret_files[0]).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
