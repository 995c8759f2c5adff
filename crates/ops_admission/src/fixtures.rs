//! In-memory object store and object builders for tests.
#![allow(clippy::expect_used)]

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{ObjectMeta, TypeMeta};
use kube::core::DynamicObject;
use serde_json::json;

use crate::api::v1alpha1::catalog::{CATALOG_GROUP, CATALOG_VERSION};
use crate::api::v1alpha1::database::{DatabaseKind, DATABASE_GROUP, DATABASE_VERSION};
use crate::store::{ObjectKey, ObjectStore, ResourceKind};
use crate::util::errors::{Error, Result, StdError};

/// `ObjectStore` over a fixed set of objects. Kinds marked failing return an
/// error from every call, standing in for an unreachable API server.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    objects: BTreeMap<(String, ObjectKey), DynamicObject>,
    failing: BTreeSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: &ResourceKind, obj: DynamicObject) -> Self {
        let key = ObjectKey {
            namespace: obj.metadata.namespace.clone().filter(|_| kind.namespaced),
            name: obj.metadata.name.clone().unwrap_or_default(),
        };
        self.objects.insert((kind.kind().to_string(), key), obj);
        self
    }

    pub fn failing(mut self, kind: &ResourceKind) -> Self {
        self.failing.insert(kind.kind().to_string());
        self
    }

    fn check(&self, kind: &ResourceKind) -> Result<()> {
        if self.failing.contains(kind.kind()) {
            return Err(Error::StdError(StdError::InvalidArgument(format!(
                "store unavailable for {kind}"
            ))));
        }
        Ok(())
    }
}

fn labels_match(obj: &DynamicObject, selector: &str) -> bool {
    let labels = obj.metadata.labels.clone().unwrap_or_default();
    selector
        .split(',')
        .filter(|term| !term.trim().is_empty())
        .all(|term| match term.split_once('=') {
            Some((k, v)) => labels.get(k.trim()).map(String::as_str) == Some(v.trim()),
            None => labels.contains_key(term.trim()),
        })
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(&self, kind: &ResourceKind, key: &ObjectKey) -> Result<Option<DynamicObject>> {
        self.check(kind)?;
        let key = ObjectKey {
            namespace: key.namespace.clone().filter(|_| kind.namespaced),
            name: key.name.clone(),
        };
        Ok(self.objects.get(&(kind.kind().to_string(), key)).cloned())
    }

    async fn list(
        &self,
        kind: &ResourceKind,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        self.check(kind)?;
        Ok(self
            .objects
            .iter()
            .filter(|((k, key), _)| k == kind.kind() && (namespace.is_none() || key.namespace.as_deref() == namespace))
            .filter(|(_, obj)| label_selector.map_or(true, |s| labels_match(obj, s)))
            .map(|(_, obj)| obj.clone())
            .collect())
    }
}

fn dynamic(api_version: &str, kind: &str, metadata: ObjectMeta, data: serde_json::Value) -> DynamicObject {
    DynamicObject {
        types: Some(TypeMeta {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
        }),
        metadata,
        data,
    }
}

/// A database object of `kind` with the given spec JSON.
pub fn database(kind: DatabaseKind, namespace: &str, name: &str, spec: serde_json::Value) -> DynamicObject {
    dynamic(
        &format!("{DATABASE_GROUP}/{DATABASE_VERSION}"),
        kind.as_str(),
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        json!({ "spec": spec }),
    )
}

/// A catalog entry named after its version.
pub fn catalog_entry(
    kind: DatabaseKind,
    version: &str,
    deprecated: bool,
    allowlist: &[&str],
    denylist: &[&str],
) -> DynamicObject {
    dynamic(
        &format!("{CATALOG_GROUP}/{CATALOG_VERSION}"),
        &format!("{}Version", kind.as_str()),
        ObjectMeta {
            name: Some(version.to_string()),
            ..Default::default()
        },
        json!({
            "spec": {
                "version": version,
                "deprecated": deprecated,
                "updateConstraints": { "allowlist": allowlist, "denylist": denylist },
            }
        }),
    )
}

/// A secret carrying the given string data.
pub fn secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> DynamicObject {
    let secret = Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        type_: Some("kubernetes.io/basic-auth".to_string()),
        ..Default::default()
    };
    let value = serde_json::to_value(&secret).expect("secret serializes");
    serde_json::from_value(value).expect("secret decodes as a dynamic object")
}
