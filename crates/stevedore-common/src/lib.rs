//! Common types for Stevedore: release configuration, validation, and errors

#![deny(missing_docs)]

pub mod config;
pub mod error;
pub mod labels;

pub use config::{ReleaseConfig, ValidatedRelease};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "stevedore";

/// Suffix of the release snapshot object (`<release>-config`)
pub const SNAPSHOT_SUFFIX: &str = "-config";

/// Data key under which the serialized release document is stored in the snapshot
pub const SNAPSHOT_DATA_KEY: &str = "release.yaml";

/// Name of the secret that backs a release snapshot
pub fn snapshot_name(release: &str) -> String {
    format!("{}{}", release, SNAPSHOT_SUFFIX)
}

/// Label selector matching every object owned by the given release
pub fn release_selector(release: &str) -> String {
    format!("{}={}", labels::RELEASE_LABEL, release)
}
