//! Error types for Stevedore
//!
//! Errors are structured with fields to aid debugging in production.
//! Validation failures carry every violated rule at once so a user can fix a
//! document in a single pass; apply failures carry one entry per failed step.

use thiserror::Error;

/// A single violated validation rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path of the invalid field (e.g., "workload.containers[0].port")
    pub field: String,
    /// Description of what's invalid
    pub message: String,
}

impl Violation {
    /// Create a violation for the given field path
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Aggregated validation violations, rendered one rule per entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    /// Number of violated rules
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no rule was violated
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the violations
    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }
}

impl std::fmt::Display for Violations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", rendered.join("; "))
    }
}

/// One failed step of an apply or delete pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Step identifier (e.g., "ingress", "secret-file/ca-bundle")
    pub step: String,
    /// Rendered cause of the failure
    pub cause: String,
}

impl std::fmt::Display for StepFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step, self.cause)
    }
}

/// Failed steps of one pass, rendered with a count line and one line per step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailures(pub Vec<StepFailure>);

impl std::fmt::Display for StepFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} step(s):", self.0.len())?;
        for failure in &self.0 {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

/// Main error type for Stevedore operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Release document failed validation; every violated rule is listed
    #[error("validation failed for release '{release}': {violations}")]
    Validation {
        /// Name of the release with invalid configuration
        release: String,
        /// Every violated rule
        violations: Violations,
    },

    /// An existing object is not owned by this tool; mutation refused
    #[error("ownership conflict for {kind} {namespace}/{name}: {message}")]
    OwnershipConflict {
        /// Resource kind (e.g., "Deployment")
        kind: String,
        /// Object name
        name: String,
        /// Object namespace
        namespace: String,
        /// Why the object was classified as foreign
        message: String,
    },

    /// A gating dependency (cluster issuer, ingress class) is missing
    #[error("dependency not met: {kind} '{name}' does not exist")]
    DependencyNotMet {
        /// Kind of the missing dependency
        kind: String,
        /// Name of the missing dependency
        name: String,
    },

    /// Object creation raced with an external creator
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Resource kind
        kind: String,
        /// Object name
        name: String,
        /// Object namespace
        namespace: String,
    },

    /// No persisted snapshot exists for a release being deleted
    #[error("no release snapshot found for '{release}' in namespace '{namespace}'")]
    SnapshotMissing {
        /// Release name
        release: String,
        /// Namespace searched
        namespace: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// One or more steps of an apply/delete pass failed
    #[error("{operation} of release '{release}' failed, {failures}")]
    Aggregate {
        /// Release name
        release: String,
        /// Operation that was attempted ("create", "update", "delete")
        operation: String,
        /// One entry per failed step
        failures: StepFailures,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "synthesizer", "snapshot")
        context: String,
    },
}

impl Error {
    /// Create a validation error from collected violations
    pub fn validation(release: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self::Validation {
            release: release.into(),
            violations: Violations(violations),
        }
    }

    /// Create an ownership conflict error
    pub fn ownership_conflict(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::OwnershipConflict {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Create a missing-dependency error
    pub fn dependency_not_met(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::DependencyNotMet {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an aggregate error from per-step failures
    pub fn aggregate(
        release: impl Into<String>,
        operation: impl Into<String>,
        failures: Vec<StepFailure>,
    ) -> Self {
        Self::Aggregate {
            release: release.into(),
            operation: operation.into(),
            failures: StepFailures(failures),
        }
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation, serialization, and ownership errors require a config or
    /// cluster fix and are not retryable. Transport errors and missing
    /// dependencies may resolve on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient errors, not on 4xx responses
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Validation { .. } => false,
            Error::OwnershipConflict { .. } => false,
            Error::DependencyNotMet { .. } => true,
            Error::AlreadyExists { .. } => false,
            Error::SnapshotMissing { .. } => false,
            Error::Serialization { .. } => false,
            Error::Aggregate { .. } => true,
            Error::Internal { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_violation() {
        let err = Error::validation(
            "myapp",
            vec![
                Violation::new("workload.replicas", "must be between 1 and 100"),
                Violation::new("scheduledJob.schedule", "not a valid cron expression"),
            ],
        );
        let rendered = err.to_string();
        assert!(rendered.contains("myapp"));
        assert!(rendered.contains("workload.replicas"));
        assert!(rendered.contains("scheduledJob.schedule"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn ownership_conflict_names_the_object() {
        let err = Error::ownership_conflict("Ingress", "myapp", "prod", "marker label missing");
        assert!(err.to_string().contains("Ingress"));
        assert!(err.to_string().contains("prod/myapp"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn dependency_not_met_is_retryable() {
        let err = Error::dependency_not_met("ClusterIssuer", "letsencrypt-prod");
        assert!(err.to_string().contains("letsencrypt-prod"));
        assert!(err.is_retryable());
    }

    #[test]
    fn aggregate_renders_one_line_per_step() {
        let err = Error::aggregate(
            "myapp",
            "update",
            vec![
                StepFailure {
                    step: "ingress".to_string(),
                    cause: "ownership conflict".to_string(),
                },
                StepFailure {
                    step: "config-file/settings".to_string(),
                    cause: "kubernetes error: timeout".to_string(),
                },
            ],
        );
        let rendered = err.to_string();
        assert!(rendered.contains("2 step(s)"));
        assert!(rendered.contains("ingress: ownership conflict"));
        assert!(rendered.contains("config-file/settings"));
    }

    #[test]
    fn snapshot_missing_is_not_retryable() {
        let err = Error::SnapshotMissing {
            release: "myapp".to_string(),
            namespace: "prod".to_string(),
        };
        assert!(err.to_string().contains("myapp"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn violations_display_joins_with_semicolons() {
        let violations = Violations(vec![
            Violation::new("a", "first"),
            Violation::new("b", "second"),
        ]);
        assert_eq!(violations.to_string(), "a: first; b: second");
        assert_eq!(violations.len(), 2);
    }
}
