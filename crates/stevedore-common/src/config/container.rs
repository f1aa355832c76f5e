//! Container configuration: image identity, probes, and resource quantities

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One container of a workload or scheduled job
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ContainerConfig {
    /// Container name; unique within the release
    pub name: String,

    /// Image repository (without tag)
    pub image: String,

    /// Image tag
    pub tag: String,

    /// Port the container listens on
    pub port: u16,

    /// Optional liveness/readiness probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_probes: Option<HealthProbes>,

    /// Requested resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requests: Option<ResourceQuantity>,

    /// Resource limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_limits: Option<ResourceQuantity>,

    /// Container-specific labels, merged into the pod template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Container-specific annotations, merged into the pod template
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ContainerConfig {
    /// Full image reference (`image:tag`)
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

/// Liveness and readiness probe declarations; each probe is synthesized only
/// when declared
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HealthProbes {
    /// Restarts the container when it fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<ProbeConfig>,

    /// Removes the pod from service endpoints when it fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ProbeConfig>,
}

/// One HTTP health probe
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProbeConfig {
    /// Request path (must start with '/')
    pub path: String,

    /// Probe port; defaults to the container port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Seconds before the first probe; defaults to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<i32>,

    /// Seconds between probes; defaults to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<i32>,
}

/// CPU and memory quantity strings. An empty string means "unset", not
/// invalid.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceQuantity {
    /// CPU quantity (e.g., "100m", "1", "0.5")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,

    /// Memory quantity (e.g., "128Mi", "1Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceQuantity {
    /// CPU quantity with empty strings collapsed to unset
    pub fn cpu_set(&self) -> Option<&str> {
        self.cpu.as_deref().filter(|s| !s.is_empty())
    }

    /// Memory quantity with empty strings collapsed to unset
    pub fn memory_set(&self) -> Option<&str> {
        self.memory.as_deref().filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_ref_joins_image_and_tag() {
        let container = ContainerConfig {
            name: "app".to_string(),
            image: "registry.example.com/myapp".to_string(),
            tag: "v2".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(container.image_ref(), "registry.example.com/myapp:v2");
    }

    #[test]
    fn empty_quantity_strings_are_unset() {
        let quantity = ResourceQuantity {
            cpu: Some(String::new()),
            memory: Some("128Mi".to_string()),
        };
        assert_eq!(quantity.cpu_set(), None);
        assert_eq!(quantity.memory_set(), Some("128Mi"));
    }

    #[test]
    fn probe_defaults_deserialize_as_unset() {
        let probe: ProbeConfig = serde_yaml::from_str("path: /healthz\n").unwrap();
        assert_eq!(probe.path, "/healthz");
        assert!(probe.port.is_none());
        assert!(probe.initial_delay_seconds.is_none());
        assert!(probe.period_seconds.is_none());
    }
}
