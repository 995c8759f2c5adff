use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    api::{Api, ListParams},
    core::{ApiResource, DynamicObject},
    Client,
};

use crate::util::errors::{Error, Result, StdError};

/// Namespaced name of an object; `namespace` is `None` for cluster-scoped kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: &str, name: &str) -> Self {
        ObjectKey {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
        }
    }

    pub fn cluster(name: &str) -> Self {
        ObjectKey {
            namespace: None,
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// An API kind the store can read, e.g. `kubedb.com/v1 MongoDB` or `v1 Secret`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceKind {
    pub resource: ApiResource,
    pub namespaced: bool,
}

impl ResourceKind {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        let api_version = if group.is_empty() {
            version.to_string()
        } else {
            format!("{group}/{version}")
        };
        ResourceKind {
            resource: ApiResource {
                group: group.to_string(),
                version: version.to_string(),
                api_version,
                kind: kind.to_string(),
                plural: plural.to_string(),
            },
            namespaced,
        }
    }

    pub fn secret() -> Self {
        ResourceKind {
            resource: ApiResource::erase::<Secret>(&()),
            namespaced: true,
        }
    }

    pub fn kind(&self) -> &str {
        &self.resource.kind
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.resource.api_version, self.resource.kind)
    }
}

/// Read access to the cluster's objects.
///
/// `get` returns `Ok(None)` for objects that do not exist; any other failure is an error.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Option<DynamicObject>>;

    async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>>;
}

/// `ObjectStore` backed by the Kubernetes API server. Every call is a live read.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, kind: &ResourceKind, namespace: Option<&str>) -> Api<DynamicObject> {
        match namespace {
            Some(ns) if kind.namespaced => Api::namespaced_with(self.client.clone(), ns, &kind.resource),
            _ => Api::all_with(self.client.clone(), &kind.resource),
        }
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        if kind.namespaced && key.namespace.is_none() {
            return Err(Error::StdError(StdError::InvalidArgument(format!(
                "{kind} is namespaced but {key} has no namespace"
            ))));
        }
        self.api(kind, key.namespace.as_deref())
            .get_opt(&key.name)
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let mut params = ListParams::default();
        if let Some(selector) = label_selector {
            params = params.labels(selector);
        }
        let list = self
            .api(kind, namespace)
            .list(&params)
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;
        Ok(list.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_kinds_have_no_group_prefix() {
        let secret = ResourceKind::secret();
        assert_eq!(secret.resource.api_version, "v1");
        assert_eq!(secret.resource.plural, "secrets");
        assert!(secret.namespaced);

        let catalog = ResourceKind::new("catalog.kubedb.com", "v1alpha1", "RedisVersion", "redisversions", false);
        assert_eq!(catalog.to_string(), "catalog.kubedb.com/v1alpha1 RedisVersion");
    }

    #[test]
    fn keys_render_with_namespace() {
        assert_eq!(ObjectKey::namespaced("demo", "mg").to_string(), "demo/mg");
        assert_eq!(ObjectKey::cluster("6.0.12").to_string(), "6.0.12");
    }
}
