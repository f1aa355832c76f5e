//! Apply orchestration
//!
//! One pass per invocation, a fixed step order, and no cross-object
//! transaction: workload → service → ingress → secret files → config files →
//! scheduled job → release snapshot. Every step runs the ownership guard
//! immediately before mutating; a `Foreign` object fails only its own step
//! and the pass continues. Failures are folded into one aggregate error at
//! the end, and a step already applied is never rolled back by a later
//! failure.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use stevedore_common::config::ValidatedRelease;
use stevedore_common::{snapshot_name, Error, Result, SNAPSHOT_DATA_KEY};

use crate::ownership::{check_ownership, Ownership};
use crate::snapshot;
use crate::store::{DesiredObject, ResourceKind, ResourceStore};
use crate::synth;

// =============================================================================
// Operations and reports
// =============================================================================

/// The pass being executed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// First-time provisioning of a release
    Create,
    /// Reconciliation of an existing release
    Update,
    /// Teardown from the persisted snapshot
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// What happened to one step
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Object did not exist and was created
    Created,
    /// Object was ours and was updated
    Updated,
    /// Object was ours and was deleted
    Deleted,
    /// Step needed no action (e.g., object already gone on delete)
    Skipped(String),
    /// Step failed; the pass continued without it
    Failed(String),
}

impl std::fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::Updated => f.write_str("updated"),
            Self::Deleted => f.write_str("deleted"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

/// Result of one step of a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepReport {
    /// Step identifier (e.g., "workload", "secret-file/api-token")
    pub step: String,
    /// What happened
    pub outcome: StepOutcome,
}

impl StepReport {
    /// True when the step failed
    pub fn failed(&self) -> bool {
        matches!(self.outcome, StepOutcome::Failed(_))
    }
}

impl std::fmt::Display for StepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step, self.outcome)
    }
}

/// Aggregated result of one apply or delete pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyReport {
    /// Release name
    pub release: String,
    /// Target namespace
    pub namespace: String,
    /// The pass that produced this report
    pub operation: Operation,
    /// Per-step results, in execution order
    pub steps: Vec<StepReport>,
    /// True when the pass stopped early because it was cancelled
    pub cancelled: bool,
}

impl ApplyReport {
    fn new(release: &str, namespace: &str, operation: Operation) -> Self {
        Self {
            release: release.to_string(),
            namespace: namespace.to_string(),
            operation,
            steps: Vec::new(),
            cancelled: false,
        }
    }

    /// True when every attempted step succeeded and the pass ran to the end
    pub fn succeeded(&self) -> bool {
        !self.cancelled && !self.steps.iter().any(StepReport::failed)
    }

    /// Convert into a result, folding failed steps into one aggregate error.
    ///
    /// A partially applied release is reported as failed even when some steps
    /// succeeded; the caller must be able to detect the mixed state and retry.
    pub fn into_result(self) -> Result<ApplyReport> {
        let failures: Vec<stevedore_common::error::StepFailure> = self
            .steps
            .iter()
            .filter_map(|s| match &s.outcome {
                StepOutcome::Failed(cause) => Some(stevedore_common::error::StepFailure {
                    step: s.step.clone(),
                    cause: cause.clone(),
                }),
                _ => None,
            })
            .collect();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(Error::aggregate(
                self.release,
                self.operation.to_string(),
                failures,
            ))
        }
    }
}

// =============================================================================
// Planned steps
// =============================================================================

/// Dependencies checked before the ingress step may mutate anything
struct IngressDependencies {
    cluster_issuer: String,
    ingress_class: String,
}

/// One step of an apply pass, synthesized up front
struct PlannedStep {
    step: String,
    desired: Result<DesiredObject>,
    preflight: Option<IngressDependencies>,
}

impl PlannedStep {
    fn new(step: impl Into<String>, desired: Result<DesiredObject>) -> Self {
        Self {
            step: step.into(),
            desired,
            preflight: None,
        }
    }
}

// =============================================================================
// Applier
// =============================================================================

/// Sequences create-or-update and delete passes for one release
pub struct Applier<'a> {
    store: &'a dyn ResourceStore,
}

impl<'a> Applier<'a> {
    /// Create an applier over the given store
    pub fn new(store: &'a dyn ResourceStore) -> Self {
        Self { store }
    }

    /// Apply a validated release: create-or-update every declared section in
    /// the fixed order, then persist the snapshot.
    ///
    /// Cancellation stops the pass before the next step; steps already issued
    /// are not retried or rolled back.
    pub async fn apply(
        &self,
        release: &ValidatedRelease,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        let mut report = ApplyReport::new(release.name(), release.namespace(), operation);
        info!(release = %release.name(), namespace = %release.namespace(), %operation, "starting pass");

        for planned in self.plan(release) {
            if cancel.is_cancelled() {
                warn!(release = %release.name(), "pass cancelled, returning partial result");
                report.cancelled = true;
                return report;
            }
            let step = planned.step.clone();
            let outcome = match self.execute_apply(release.name(), planned).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(step = %step, error = %e, "step failed, continuing");
                    StepOutcome::Failed(e.to_string())
                }
            };
            info!(step = %step, outcome = %outcome, "step finished");
            report.steps.push(StepReport { step, outcome });
        }
        report
    }

    /// Tear down a release from its persisted snapshot.
    ///
    /// Walks the sections present in the rehydrated description in the same
    /// fixed order, deleting owned objects; the snapshot itself goes last.
    pub async fn delete(
        &self,
        release: &str,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> ApplyReport {
        let mut report = ApplyReport::new(release, namespace, Operation::Delete);
        info!(release = %release, namespace = %namespace, "starting delete pass");

        let snapshot_object = snapshot_name(release);
        let document = match self
            .store
            .read_secret_key(&snapshot_object, namespace, SNAPSHOT_DATA_KEY)
            .await
        {
            Ok(Some(document)) => document,
            Ok(None) => {
                report.steps.push(StepReport {
                    step: "snapshot".to_string(),
                    outcome: StepOutcome::Failed(
                        Error::SnapshotMissing {
                            release: release.to_string(),
                            namespace: namespace.to_string(),
                        }
                        .to_string(),
                    ),
                });
                return report;
            }
            Err(e) => {
                report.steps.push(StepReport {
                    step: "snapshot".to_string(),
                    outcome: StepOutcome::Failed(e.to_string()),
                });
                return report;
            }
        };

        let rehydrated = match snapshot::rehydrate(&document) {
            Ok(r) => r,
            Err(e) => {
                report.steps.push(StepReport {
                    step: "snapshot".to_string(),
                    outcome: StepOutcome::Failed(e.to_string()),
                });
                return report;
            }
        };
        if rehydrated.name() != release || rehydrated.namespace() != namespace {
            report.steps.push(StepReport {
                step: "snapshot".to_string(),
                outcome: StepOutcome::Failed(
                    Error::internal(
                        "delete",
                        format!(
                            "snapshot describes '{}/{}', not '{}/{}'",
                            rehydrated.namespace(),
                            rehydrated.name(),
                            namespace,
                            release
                        ),
                    )
                    .to_string(),
                ),
            });
            return report;
        }

        for (step, kind, name) in delete_targets(&rehydrated, &snapshot_object) {
            if cancel.is_cancelled() {
                warn!(release = %release, "delete cancelled, returning partial result");
                report.cancelled = true;
                return report;
            }
            let outcome = match self.execute_delete(release, kind, &name, namespace).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(step = %step, error = %e, "step failed, continuing");
                    StepOutcome::Failed(e.to_string())
                }
            };
            info!(step = %step, outcome = %outcome, "step finished");
            report.steps.push(StepReport { step, outcome });
        }
        report
    }

    /// Synthesize every step of an apply pass, in the fixed order
    fn plan(&self, release: &ValidatedRelease) -> Vec<PlannedStep> {
        let config = release.config();
        let mut steps = Vec::new();

        if let Some(ref workload) = config.workload {
            steps.push(PlannedStep::new(
                "workload",
                synth::synthesize_workload(release).map(DesiredObject::Workload),
            ));
            steps.push(PlannedStep::new(
                "service",
                synth::synthesize_service(release).map(DesiredObject::Service),
            ));
            if let Some(ref ingress) = workload.ingress {
                let mut planned = PlannedStep::new(
                    "ingress",
                    synth::synthesize_ingress(release).map(DesiredObject::Ingress),
                );
                planned.preflight = Some(IngressDependencies {
                    cluster_issuer: ingress.cluster_issuer.clone(),
                    ingress_class: ingress.ingress_class.clone(),
                });
                steps.push(planned);
            }
        }

        for file in &config.secret_files {
            steps.push(PlannedStep::new(
                format!("secret-file/{}", file.name),
                synth::synthesize_secret_file(config, file).map(DesiredObject::SecretFile),
            ));
        }
        for file in &config.config_files {
            steps.push(PlannedStep::new(
                format!("config-file/{}", file.name),
                synth::synthesize_config_file(config, file).map(DesiredObject::ConfigFile),
            ));
        }

        if config.scheduled_job.is_some() {
            steps.push(PlannedStep::new(
                "scheduled-job",
                synth::synthesize_scheduled_job(release).map(DesiredObject::ScheduledJob),
            ));
        }

        steps.push(PlannedStep::new(
            "snapshot",
            snapshot::synthesize_snapshot(release).map(DesiredObject::SecretFile),
        ));

        steps
    }

    /// Run one apply step: pre-flight, guard, then create or update
    async fn execute_apply(&self, release: &str, planned: PlannedStep) -> Result<StepOutcome> {
        if let Some(deps) = planned.preflight {
            if !self.store.cluster_issuer_exists(&deps.cluster_issuer).await? {
                return Err(Error::dependency_not_met("ClusterIssuer", deps.cluster_issuer));
            }
            if !self.store.ingress_class_exists(&deps.ingress_class).await? {
                return Err(Error::dependency_not_met("IngressClass", deps.ingress_class));
            }
        }

        let desired = planned.desired?;
        let ownership = check_ownership(
            self.store,
            desired.kind(),
            desired.name(),
            desired.namespace(),
            release,
        )
        .await?;
        match ownership {
            Ownership::Absent => {
                self.store.create(&desired).await?;
                Ok(StepOutcome::Created)
            }
            Ownership::Owned => {
                self.store.update(&desired).await?;
                Ok(StepOutcome::Updated)
            }
            foreign @ Ownership::Foreign { .. } => Err(foreign.conflict_error(
                desired.kind(),
                desired.name(),
                desired.namespace(),
            )),
        }
    }

    /// Run one delete step: guard, then delete owned objects
    async fn execute_delete(
        &self,
        release: &str,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<StepOutcome> {
        let ownership = check_ownership(self.store, kind, name, namespace, release).await?;
        match ownership {
            Ownership::Absent => Ok(StepOutcome::Skipped("not found".to_string())),
            Ownership::Owned => {
                self.store.delete(kind, name, namespace).await?;
                Ok(StepOutcome::Deleted)
            }
            foreign @ Ownership::Foreign { .. } => {
                Err(foreign.conflict_error(kind, name, namespace))
            }
        }
    }
}

/// Deletion targets for the sections present in a rehydrated release, in the
/// fixed order, snapshot last
fn delete_targets(
    release: &ValidatedRelease,
    snapshot_object: &str,
) -> Vec<(String, ResourceKind, String)> {
    let config = release.config();
    let mut targets = Vec::new();

    if let Some(ref workload) = config.workload {
        targets.push((
            "workload".to_string(),
            ResourceKind::Workload,
            config.name.clone(),
        ));
        targets.push((
            "service".to_string(),
            ResourceKind::Service,
            config.name.clone(),
        ));
        if workload.ingress.is_some() {
            targets.push((
                "ingress".to_string(),
                ResourceKind::Ingress,
                config.name.clone(),
            ));
        }
    }
    for file in &config.secret_files {
        targets.push((
            format!("secret-file/{}", file.name),
            ResourceKind::SecretFile,
            format!("{}-{}", config.name, file.name),
        ));
    }
    for file in &config.config_files {
        targets.push((
            format!("config-file/{}", file.name),
            ResourceKind::ConfigFile,
            format!("{}-{}", config.name, file.name),
        ));
    }
    if config.scheduled_job.is_some() {
        targets.push((
            "scheduled-job".to_string(),
            ResourceKind::ScheduledJob,
            config.name.clone(),
        ));
    }
    targets.push((
        "snapshot".to_string(),
        ResourceKind::SecretFile,
        snapshot_object.to_string(),
    ));
    targets
}
