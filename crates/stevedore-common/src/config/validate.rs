//! Release validation
//!
//! Validation runs in two passes. The structural pass checks required fields,
//! numeric bounds, and string formats; the semantic pass (run only when the
//! structural pass found nothing) checks cross-field rules: key disjointness,
//! quantity literals, mount-path collisions, and container references.
//!
//! Every violated rule is collected; the caller gets one aggregated error
//! listing all of them, never just the first.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Violation};
use crate::labels;

use super::{ContainerConfig, ReleaseConfig};

/// A release configuration that passed both validation passes.
///
/// The engine only accepts this type, so an unvalidated document can never
/// reach synthesis or the store.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ValidatedRelease(ReleaseConfig);

impl ValidatedRelease {
    /// The validated configuration
    pub fn config(&self) -> &ReleaseConfig {
        &self.0
    }

    /// Release name
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Target namespace
    pub fn namespace(&self) -> &str {
        &self.0.namespace
    }

    /// Serialize back into a YAML document (used for the release snapshot)
    pub fn to_document(&self) -> Result<String, Error> {
        serde_yaml::to_string(&self.0)
            .map_err(|e| Error::serialization_for_kind("ReleaseConfig", e.to_string()))
    }
}

impl ReleaseConfig {
    /// Validate this configuration into a [`ValidatedRelease`].
    ///
    /// Pure function over its input; aggregates every violation into one
    /// [`Error::Validation`].
    pub fn validate(self) -> Result<ValidatedRelease, Error> {
        let mut violations = Vec::new();
        self.structural(&mut violations);
        if violations.is_empty() {
            self.semantic(&mut violations);
        }
        if violations.is_empty() {
            Ok(ValidatedRelease(self))
        } else {
            let release = if self.name.is_empty() {
                "unknown".to_string()
            } else {
                self.name.clone()
            };
            Err(Error::validation(release, violations))
        }
    }

    fn structural(&self, out: &mut Vec<Violation>) {
        if let Err(e) = validate_release_name(&self.name) {
            out.push(Violation::new("name", e));
        }
        if let Err(e) = validate_release_name(&self.namespace) {
            out.push(Violation::new("namespace", e));
        }

        if let Some(ref common) = self.common {
            check_meta("common", &common.labels, &common.annotations, out);
        }

        if let Some(ref workload) = self.workload {
            if !(1..=100).contains(&workload.replicas) {
                out.push(Violation::new(
                    "workload.replicas",
                    format!("must be between 1 and 100, got {}", workload.replicas),
                ));
            }
            if workload.containers.is_empty() {
                out.push(Violation::new(
                    "workload.containers",
                    "at least one container is required",
                ));
            }
            for (i, container) in workload.containers.iter().enumerate() {
                check_container(&format!("workload.containers[{i}]"), container, out);
            }
            check_meta("workload", &workload.labels, &workload.annotations, out);

            if let Some(ref ingress) = workload.ingress {
                if let Err(e) = validate_dns_label(&ingress.ingress_class) {
                    out.push(Violation::new("workload.ingress.ingressClass", e));
                }
                if let Err(e) = validate_dns_label(&ingress.cluster_issuer) {
                    out.push(Violation::new("workload.ingress.clusterIssuer", e));
                }
                if ingress.hostnames.is_empty() {
                    out.push(Violation::new(
                        "workload.ingress.hostnames",
                        "at least one hostname is required",
                    ));
                }
                for (i, hostname) in ingress.hostnames.iter().enumerate() {
                    if let Err(e) = validate_hostname(hostname) {
                        out.push(Violation::new(
                            format!("workload.ingress.hostnames[{i}]"),
                            e,
                        ));
                    }
                }
                if ingress.port == 0 {
                    out.push(Violation::new("workload.ingress.port", "must be non-zero"));
                }
                check_meta(
                    "workload.ingress",
                    &ingress.labels,
                    &ingress.annotations,
                    out,
                );
            }
        }

        if let Some(ref job) = self.scheduled_job {
            if let Err(e) = validate_cron(&job.schedule) {
                out.push(Violation::new("scheduledJob.schedule", e));
            }
            if !(0..=10).contains(&job.retry_limit) {
                out.push(Violation::new(
                    "scheduledJob.retryLimit",
                    format!("must be between 0 and 10, got {}", job.retry_limit),
                ));
            }
            check_container("scheduledJob.container", &job.container, out);
            check_meta("scheduledJob", &job.labels, &job.annotations, out);
        }

        for (kind, files) in [
            ("secretFiles", &self.secret_files),
            ("configFiles", &self.config_files),
        ] {
            for (i, file) in files.iter().enumerate() {
                let path = format!("{kind}[{i}]");
                if let Err(e) = validate_dns_label(&file.name) {
                    out.push(Violation::new(format!("{path}.name"), e));
                }
                if !file.mount.path.starts_with('/') {
                    out.push(Violation::new(
                        format!("{path}.mount.path"),
                        "must be an absolute path",
                    ));
                }
                if file.mount.exposed_to_containers.is_empty() {
                    out.push(Violation::new(
                        format!("{path}.mount.exposedToContainers"),
                        "at least one container is required",
                    ));
                }
                check_meta(&path, &file.labels, &file.annotations, out);
            }
        }
    }

    fn semantic(&self, out: &mut Vec<Violation>) {
        self.check_disjointness(out);
        self.check_container_names(out);
        self.check_quantities(out);
        self.check_file_references(out);
        self.check_mount_paths(out);
    }

    /// Common keys must be disjoint from every specific section's keys;
    /// a collision is an error, not a silent override.
    fn check_disjointness(&self, out: &mut Vec<Violation>) {
        let Some(ref common) = self.common else {
            return;
        };

        let mut sections: Vec<(String, &BTreeMap<String, String>, &BTreeMap<String, String>)> =
            Vec::new();
        if let Some(ref workload) = self.workload {
            sections.push(("workload".into(), &workload.labels, &workload.annotations));
            for (i, c) in workload.containers.iter().enumerate() {
                sections.push((
                    format!("workload.containers[{i}]"),
                    &c.labels,
                    &c.annotations,
                ));
            }
            if let Some(ref ingress) = workload.ingress {
                sections.push((
                    "workload.ingress".into(),
                    &ingress.labels,
                    &ingress.annotations,
                ));
            }
        }
        if let Some(ref job) = self.scheduled_job {
            sections.push(("scheduledJob".into(), &job.labels, &job.annotations));
            sections.push((
                "scheduledJob.container".into(),
                &job.container.labels,
                &job.container.annotations,
            ));
        }
        for (kind, files) in [
            ("secretFiles", &self.secret_files),
            ("configFiles", &self.config_files),
        ] {
            for (i, file) in files.iter().enumerate() {
                sections.push((format!("{kind}[{i}]"), &file.labels, &file.annotations));
            }
        }

        for (path, section_labels, section_annotations) in sections {
            for key in labels::conflicting_keys(&common.labels, section_labels) {
                out.push(Violation::new(
                    format!("{path}.labels.{key}"),
                    "duplicate key: also declared in common.labels",
                ));
            }
            for key in labels::conflicting_keys(&common.annotations, section_annotations) {
                out.push(Violation::new(
                    format!("{path}.annotations.{key}"),
                    "duplicate key: also declared in common.annotations",
                ));
            }
        }
    }

    fn check_container_names(&self, out: &mut Vec<Violation>) {
        let mut seen = BTreeMap::new();
        for container in self.declared_containers() {
            *seen.entry(container.name.clone()).or_insert(0) += 1;
        }
        for (name, count) in seen {
            if count > 1 {
                out.push(Violation::new(
                    "containers",
                    format!("container name '{name}' is declared {count} times"),
                ));
            }
        }

        let mut file_names = BTreeMap::new();
        for file in self.declared_files() {
            *file_names.entry(file.name.clone()).or_insert(0) += 1;
        }
        for (name, count) in file_names {
            if count > 1 {
                out.push(Violation::new(
                    "files",
                    format!(
                        "file artifact '{name}' is declared {count} times; backing objects would collide"
                    ),
                ));
            }
        }
    }

    fn check_quantities(&self, out: &mut Vec<Violation>) {
        for container in self.declared_containers() {
            for (field, quantity) in [
                ("resourceRequests", &container.resource_requests),
                ("resourceLimits", &container.resource_limits),
            ] {
                let Some(quantity) = quantity else { continue };
                if let Some(cpu) = quantity.cpu_set() {
                    if let Err(e) = validate_cpu_quantity(cpu) {
                        out.push(Violation::new(
                            format!("container '{}' {field}.cpu", container.name),
                            e,
                        ));
                    }
                }
                if let Some(memory) = quantity.memory_set() {
                    if let Err(e) = validate_memory_quantity(memory) {
                        out.push(Violation::new(
                            format!("container '{}' {field}.memory", container.name),
                            e,
                        ));
                    }
                }
            }
        }
    }

    /// Every `exposedToContainers` entry must name a declared container
    fn check_file_references(&self, out: &mut Vec<Violation>) {
        let declared: Vec<&str> = self
            .declared_containers()
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        for (kind, files) in [
            ("secretFiles", &self.secret_files),
            ("configFiles", &self.config_files),
        ] {
            for (i, file) in files.iter().enumerate() {
                for target in &file.mount.exposed_to_containers {
                    if !declared.contains(&target.as_str()) {
                        out.push(Violation::new(
                            format!("{kind}[{i}].mount.exposedToContainers"),
                            format!("no container named '{target}' is declared"),
                        ));
                    }
                }
            }
        }
    }

    /// No two file artifacts exposed to the same container may share a mount
    /// path
    fn check_mount_paths(&self, out: &mut Vec<Violation>) {
        let mut by_container: BTreeMap<(&str, &str), Vec<&str>> = BTreeMap::new();
        for file in self.declared_files() {
            for container in &file.mount.exposed_to_containers {
                by_container
                    .entry((container.as_str(), file.mount.path.as_str()))
                    .or_default()
                    .push(file.name.as_str());
            }
        }
        for ((container, path), files) in by_container {
            if files.len() > 1 {
                out.push(Violation::new(
                    format!("container '{container}'"),
                    format!(
                        "files {} share mount path '{path}'",
                        files
                            .iter()
                            .map(|f| format!("'{f}'"))
                            .collect::<Vec<_>>()
                            .join(" and ")
                    ),
                ));
            }
        }
    }
}

fn check_container(path: &str, container: &ContainerConfig, out: &mut Vec<Violation>) {
    if let Err(e) = validate_dns_label(&container.name) {
        out.push(Violation::new(format!("{path}.name"), e));
    }
    if container.image.is_empty() {
        out.push(Violation::new(format!("{path}.image"), "must not be empty"));
    }
    if container.tag.is_empty() {
        out.push(Violation::new(format!("{path}.tag"), "must not be empty"));
    }
    if container.port == 0 {
        out.push(Violation::new(format!("{path}.port"), "must be non-zero"));
    }
    if let Some(ref probes) = container.health_probes {
        for (name, probe) in [
            ("liveness", &probes.liveness),
            ("readiness", &probes.readiness),
        ] {
            let Some(probe) = probe else { continue };
            if !probe.path.starts_with('/') {
                out.push(Violation::new(
                    format!("{path}.healthProbes.{name}.path"),
                    "must start with '/'",
                ));
            }
            if probe.initial_delay_seconds.is_some_and(|d| d < 1) {
                out.push(Violation::new(
                    format!("{path}.healthProbes.{name}.initialDelaySeconds"),
                    "must be at least 1",
                ));
            }
            if probe.period_seconds.is_some_and(|p| p < 1) {
                out.push(Violation::new(
                    format!("{path}.healthProbes.{name}.periodSeconds"),
                    "must be at least 1",
                ));
            }
        }
    }
    check_meta(path, &container.labels, &container.annotations, out);
}

fn check_meta(
    path: &str,
    label_map: &BTreeMap<String, String>,
    annotation_map: &BTreeMap<String, String>,
    out: &mut Vec<Violation>,
) {
    for (key, value) in label_map {
        if labels::is_reserved_key(key) {
            out.push(Violation::new(
                format!("{path}.labels.{key}"),
                format!("'{}' prefix is reserved", labels::RESERVED_PREFIX),
            ));
            continue;
        }
        if let Err(e) = labels::validate_label_key(key) {
            out.push(Violation::new(format!("{path}.labels.{key}"), e));
        }
        if let Err(e) = labels::validate_label_value(value) {
            out.push(Violation::new(format!("{path}.labels.{key}"), e));
        }
    }
    for key in annotation_map.keys() {
        if labels::is_reserved_key(key) {
            out.push(Violation::new(
                format!("{path}.annotations.{key}"),
                format!("'{}' prefix is reserved", labels::RESERVED_PREFIX),
            ));
            continue;
        }
        // Annotation values are free-form; only the key is constrained.
        if let Err(e) = labels::validate_label_key(key) {
            out.push(Violation::new(format!("{path}.annotations.{key}"), e));
        }
    }
}

/// Validate a release or namespace name: lowercase alphanumeric, max 63 chars
fn validate_release_name(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("must not be empty".to_string());
    }
    if s.len() > 63 {
        return Err("exceeds 63 characters".to_string());
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(format!("'{s}' must be lowercase alphanumeric"));
    }
    Ok(())
}

/// Validate a DNS label: lowercase alphanumeric and '-', alphanumeric at both
/// ends, max 63 chars
fn validate_dns_label(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("must not be empty".to_string());
    }
    if s.len() > 63 {
        return Err("exceeds 63 characters".to_string());
    }
    if !s.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        || !s.chars().last().is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err(format!(
            "'{s}' must start and end with an alphanumeric character"
        ));
    }
    if !s
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(format!(
            "'{s}' may only contain lowercase alphanumeric characters and '-'"
        ));
    }
    Ok(())
}

/// Validate a DNS-1123 hostname: dot-separated DNS labels, max 253 chars
fn validate_hostname(s: &str) -> Result<(), String> {
    if s.is_empty() {
        return Err("must not be empty".to_string());
    }
    if s.len() > 253 {
        return Err("exceeds 253 characters".to_string());
    }
    for part in s.split('.') {
        validate_dns_label(part).map_err(|e| format!("invalid hostname '{s}': {e}"))?;
    }
    Ok(())
}

/// Validate a cron expression: 5-7 whitespace-separated fields, each from the
/// cron character set. Macros like `@hourly` are rejected.
fn validate_cron(expr: &str) -> Result<(), String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if !(5..=7).contains(&fields.len()) {
        return Err(format!(
            "'{expr}' must have 5 to 7 fields, got {}",
            fields.len()
        ));
    }
    for field in fields {
        if !field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-' | '?' | '#'))
        {
            return Err(format!("'{expr}' contains an invalid field '{field}'"));
        }
    }
    Ok(())
}

/// Validate a CPU quantity literal (e.g., "100m", "1", "0.5")
fn validate_cpu_quantity(qty: &str) -> Result<(), String> {
    let is_valid = if let Some(stripped) = qty.strip_suffix('m') {
        stripped.parse::<u64>().is_ok()
    } else {
        qty.parse::<f64>().is_ok()
    };
    if !is_valid {
        return Err(format!(
            "invalid quantity '{qty}' (expected e.g., '100m', '1', '0.5')"
        ));
    }
    Ok(())
}

/// Validate a memory quantity literal (e.g., "128Mi", "1Gi", "1000000")
fn validate_memory_quantity(qty: &str) -> Result<(), String> {
    let suffixes = [
        "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "k", "M", "G", "T", "P", "E",
    ];
    let is_valid = if let Some(suffix) = suffixes.iter().find(|s| qty.ends_with(*s)) {
        let prefix = &qty[..qty.len() - suffix.len()];
        prefix.parse::<u64>().is_ok() || prefix.parse::<f64>().is_ok()
    } else {
        qty.parse::<u64>().is_ok()
    };
    if !is_valid {
        return Err(format!(
            "invalid quantity '{qty}' (expected e.g., '128Mi', '1Gi')"
        ));
    }
    Ok(())
}
