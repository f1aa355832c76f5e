//! Release snapshots
//!
//! The engine persists each applied release as a secret named
//! `<release>-config` holding the serialized document under a fixed data key.
//! Delete reads this snapshot back to learn what to tear down; it is the only
//! state the engine keeps across invocations.

use stevedore_common::config::{ReleaseConfig, ValidatedRelease};
use stevedore_common::{snapshot_name, Result, SNAPSHOT_DATA_KEY};

use crate::k8s::Secret;
use crate::synth::object_meta;

/// Synthesize the snapshot secret for a validated release
pub fn synthesize_snapshot(release: &ValidatedRelease) -> Result<Secret> {
    let config = release.config();
    let meta = object_meta(
        config,
        &snapshot_name(&config.name),
        &Default::default(),
        &Default::default(),
    )?;
    Ok(Secret::new(meta).with_data(SNAPSHOT_DATA_KEY, release.to_document()?))
}

/// Rehydrate a release from a previously persisted snapshot document.
///
/// The document is re-validated: a snapshot this tool wrote always passes,
/// and anything else has no business driving a teardown.
pub fn rehydrate(document: &str) -> Result<ValidatedRelease> {
    ReleaseConfig::parse(document)?.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::testutil::{make_release, validated};
    use stevedore_common::labels::RELEASE_LABEL;

    #[test]
    fn snapshot_is_named_release_config() {
        let release = validated(make_release());
        let snapshot = synthesize_snapshot(&release).unwrap();

        assert_eq!(snapshot.metadata.name, "myapp-config");
        assert_eq!(snapshot.metadata.namespace, "prod");
        assert_eq!(
            snapshot.metadata.labels.get(RELEASE_LABEL),
            Some(&"myapp".to_string())
        );
        assert!(snapshot.string_data.contains_key(SNAPSHOT_DATA_KEY));
    }

    #[test]
    fn snapshot_round_trips_the_release() {
        let release = validated(make_release());
        let snapshot = synthesize_snapshot(&release).unwrap();

        let document = snapshot.string_data.get(SNAPSHOT_DATA_KEY).unwrap();
        let rehydrated = rehydrate(document).unwrap();
        assert_eq!(rehydrated.config(), release.config());
    }

    #[test]
    fn garbage_documents_do_not_rehydrate() {
        assert!(rehydrate("not: [valid").is_err());
        assert!(rehydrate("name: UPPER\nnamespace: prod\n").is_err());
    }
}
