//! Ownership guard
//!
//! Every object stevedore creates carries the `stevedore.io/release` marker
//! label whose value is the owning release's name. Before any mutation the
//! orchestrator asks this guard to classify the target; only `Absent` may be
//! created and only `Owned` may be updated or deleted. The classification is
//! never cached: the store is externally mutable between calls, and the
//! remaining check-to-mutate window is an accepted, documented risk.
//!
//! One consistent rule applies to every kind: `Owned` requires the marker
//! value to equal the release name exactly.

use tracing::debug;

use stevedore_common::labels::RELEASE_LABEL;
use stevedore_common::{Error, Result};

use crate::store::{ResourceKind, ResourceStore};

/// Classification of an object's identity relative to one release
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// No object with that identity exists; safe to create
    Absent,
    /// The object exists and its marker matches the release; safe to mutate
    Owned,
    /// The object exists but is not ours; mutation is refused
    Foreign {
        /// Why the object was classified as foreign
        reason: String,
    },
}

/// Classify the named object for the given release.
///
/// Consults the store on every call; see the module docs for the rule.
pub async fn check_ownership(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
    release: &str,
) -> Result<Ownership> {
    let Some(labels) = store.get_labels(kind, name, namespace).await? else {
        debug!(kind = %kind, name = %name, namespace = %namespace, "object absent");
        return Ok(Ownership::Absent);
    };

    let ownership = match labels.get(RELEASE_LABEL) {
        Some(value) if value == release => Ownership::Owned,
        Some(value) => Ownership::Foreign {
            reason: format!(
                "marker label '{RELEASE_LABEL}' is '{value}', expected '{release}'"
            ),
        },
        None => Ownership::Foreign {
            reason: format!("marker label '{RELEASE_LABEL}' is missing"),
        },
    };
    debug!(kind = %kind, name = %name, namespace = %namespace, ?ownership, "ownership check");
    Ok(ownership)
}

impl Ownership {
    /// Convert a `Foreign` classification into the error surfaced for the
    /// affected step
    pub fn conflict_error(&self, kind: ResourceKind, name: &str, namespace: &str) -> Error {
        let reason = match self {
            Ownership::Foreign { reason } => reason.clone(),
            _ => "not a foreign object".to_string(),
        };
        Error::ownership_conflict(kind.kind_name(), name, namespace, reason)
    }
}
