//! Resource store access
//!
//! [`ResourceStore`] is the engine's only door to the cluster: a per-kind
//! get/create/update/delete/list surface plus the two pre-flight existence
//! checks the ingress step depends on. [`KubeStore`] implements it over a
//! `kube::Client` using dynamic-object APIs; tests swap in a mock or an
//! in-memory fake.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret as K8sSecret;
use kube::api::{Api, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use stevedore_common::{Error, Result, FIELD_MANAGER};

use crate::k8s::{
    build_api_resource, ConfigMap, CronJob, Deployment, HasApiResource, Ingress, Secret, Service,
};

// =============================================================================
// Resource kinds
// =============================================================================

/// The resource kinds one release can own
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    /// The release's Deployment
    Workload,
    /// The release's Service
    Service,
    /// The release's Ingress
    Ingress,
    /// One Secret per secret file artifact (and the release snapshot)
    SecretFile,
    /// One ConfigMap per config file artifact
    ConfigFile,
    /// The release's CronJob
    ScheduledJob,
}

impl ResourceKind {
    /// Kubernetes kind name
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Workload => Deployment::KIND,
            Self::Service => Service::KIND,
            Self::Ingress => Ingress::KIND,
            Self::SecretFile => Secret::KIND,
            Self::ConfigFile => ConfigMap::KIND,
            Self::ScheduledJob => CronJob::KIND,
        }
    }

    /// ApiResource for store access
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Self::Workload => Deployment::api_resource(),
            Self::Service => Service::api_resource(),
            Self::Ingress => Ingress::api_resource(),
            Self::SecretFile => Secret::api_resource(),
            Self::ConfigFile => ConfigMap::api_resource(),
            Self::ScheduledJob => CronJob::api_resource(),
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind_name())
    }
}

// =============================================================================
// Desired objects
// =============================================================================

/// Fully computed target state for one resource, independent of current store
/// state
#[derive(Clone, Debug, PartialEq)]
pub enum DesiredObject {
    /// A Deployment
    Workload(Deployment),
    /// A Service
    Service(Service),
    /// An Ingress
    Ingress(Ingress),
    /// A Secret (file artifact or release snapshot)
    SecretFile(Secret),
    /// A ConfigMap
    ConfigFile(ConfigMap),
    /// A CronJob
    ScheduledJob(CronJob),
}

impl DesiredObject {
    /// Resource kind of this object
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Workload(_) => ResourceKind::Workload,
            Self::Service(_) => ResourceKind::Service,
            Self::Ingress(_) => ResourceKind::Ingress,
            Self::SecretFile(_) => ResourceKind::SecretFile,
            Self::ConfigFile(_) => ResourceKind::ConfigFile,
            Self::ScheduledJob(_) => ResourceKind::ScheduledJob,
        }
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.meta().name
    }

    /// Object namespace
    pub fn namespace(&self) -> &str {
        &self.meta().namespace
    }

    /// Object labels
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.meta().labels
    }

    /// Serialize into the JSON manifest sent to the store
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let result = match self {
            Self::Workload(o) => serde_json::to_value(o),
            Self::Service(o) => serde_json::to_value(o),
            Self::Ingress(o) => serde_json::to_value(o),
            Self::SecretFile(o) => serde_json::to_value(o),
            Self::ConfigFile(o) => serde_json::to_value(o),
            Self::ScheduledJob(o) => serde_json::to_value(o),
        };
        result.map_err(|e| Error::serialization_for_kind(self.kind().kind_name(), e.to_string()))
    }

    fn meta(&self) -> &crate::k8s::ObjectMeta {
        match self {
            Self::Workload(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
            Self::Ingress(o) => &o.metadata,
            Self::SecretFile(o) => &o.metadata,
            Self::ConfigFile(o) => &o.metadata,
            Self::ScheduledJob(o) => &o.metadata,
        }
    }
}

// =============================================================================
// Store trait
// =============================================================================

/// Cluster access for the reconciliation engine.
///
/// Every mutation the engine performs goes through this trait, so a test can
/// observe or refuse each one.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Labels of the named object, or `None` when it does not exist
    async fn get_labels(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>>;

    /// Create the object; fails with `AlreadyExists` when racing an external
    /// creator
    async fn create(&self, desired: &DesiredObject) -> Result<()>;

    /// Update the object via server-side apply
    async fn update(&self, desired: &DesiredObject) -> Result<()>;

    /// Delete the named object; absent objects are not an error
    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<()>;

    /// Names of objects matching a label selector
    async fn list_names(
        &self,
        kind: ResourceKind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<String>>;

    /// Read one data key of a stored secret (release snapshot rehydration)
    async fn read_secret_key(
        &self,
        name: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>>;

    /// Pre-flight check: does the named cluster issuer exist?
    async fn cluster_issuer_exists(&self, name: &str) -> Result<bool>;

    /// Pre-flight check: does the named ingress class exist?
    async fn ingress_class_exists(&self, name: &str) -> Result<bool>;
}

// =============================================================================
// Kubernetes implementation
// =============================================================================

/// [`ResourceStore`] backed by a Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    /// Wrap a Kubernetes client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api_for(&self, kind: ResourceKind, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, &kind.api_resource())
    }

    fn cluster_api(&self, api_version: &str, kind: &str) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), &build_api_resource(api_version, kind))
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get_labels(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let api = self.api_for(kind, namespace);
        let object = api.get_opt(name).await?;
        Ok(object.map(|o| o.metadata.labels.unwrap_or_default()))
    }

    async fn create(&self, desired: &DesiredObject) -> Result<()> {
        let api = self.api_for(desired.kind(), desired.namespace());
        let object: DynamicObject = serde_json::from_value(desired.to_json()?).map_err(|e| {
            Error::serialization_for_kind(desired.kind().kind_name(), e.to_string())
        })?;
        debug!(kind = %desired.kind(), name = %desired.name(), "creating object");
        match api.create(&PostParams::default(), &object).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Err(Error::already_exists(
                desired.kind().kind_name(),
                desired.name(),
                desired.namespace(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, desired: &DesiredObject) -> Result<()> {
        let api = self.api_for(desired.kind(), desired.namespace());
        let manifest = desired.to_json()?;
        debug!(kind = %desired.kind(), name = %desired.name(), "applying object");
        api.patch(
            desired.name(),
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&manifest),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, name: &str, namespace: &str) -> Result<()> {
        let api = self.api_for(kind, namespace);
        debug!(kind = %kind, name = %name, "deleting object");
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_names(
        &self,
        kind: ResourceKind,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<String>> {
        let api = self.api_for(kind, namespace);
        let params = ListParams::default().labels(label_selector);
        let objects = api.list(&params).await?;
        Ok(objects
            .items
            .into_iter()
            .filter_map(|o| o.metadata.name)
            .collect())
    }

    async fn read_secret_key(
        &self,
        name: &str,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>> {
        let api: Api<K8sSecret> = Api::namespaced(self.client.clone(), namespace);
        let Some(secret) = api.get_opt(name).await? else {
            return Ok(None);
        };
        let Some(bytes) = secret.data.and_then(|mut d| d.remove(key)) else {
            return Ok(None);
        };
        String::from_utf8(bytes.0)
            .map(Some)
            .map_err(|e| Error::serialization_for_kind("Secret", e.to_string()))
    }

    async fn cluster_issuer_exists(&self, name: &str) -> Result<bool> {
        let api = self.cluster_api("cert-manager.io/v1", "ClusterIssuer");
        match api.get_opt(name).await {
            Ok(found) => Ok(found.is_some()),
            // A missing cert-manager installation reads the same as a missing
            // issuer: the ingress step cannot proceed either way.
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ingress_class_exists(&self, name: &str) -> Result<bool> {
        let api = self.cluster_api("networking.k8s.io/v1", "IngressClass");
        match api.get_opt(name).await {
            Ok(found) => Ok(found.is_some()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
