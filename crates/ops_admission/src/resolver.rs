use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use kube::core::DynamicObject;
use tracing::*;

use crate::api::v1alpha1::catalog::CatalogEntry;
use crate::api::v1alpha1::database::Database;
use crate::profile::DatabaseProfile;
use crate::store::{ObjectKey, ObjectStore, ResourceKind};
use crate::util::errors::{Error, FieldPath, Result, StdError, Violations};

/// What a call site does when the referenced object does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferencePolicy {
    /// Record a NotFound violation on the referencing field.
    Required,
    /// Log and carry on without the object.
    Advisory,
}

/// Resolves references from an OpsRequest to live objects.
#[derive(Clone)]
pub struct ReferenceResolver {
    store: Arc<dyn ObjectStore>,
}

impl ReferenceResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetches `key`. Store failures are wrapped with the referencing field path.
    pub async fn fetch(&self, kind: &ResourceKind, key: &ObjectKey, path: &FieldPath) -> Result<Option<DynamicObject>> {
        self.store.get(kind, key).await.map_err(|e| match e {
            Error::StdError(source) => Error::StdError(StdError::ReferenceError {
                path: path.to_string(),
                reference: format!("{} {}", kind.kind(), key),
                source: Box::new(source),
            }),
            other => other,
        })
    }

    pub async fn resolve(
        &self,
        kind: &ResourceKind,
        key: &ObjectKey,
        path: &FieldPath,
        policy: ReferencePolicy,
        violations: &mut Violations,
    ) -> Result<Option<DynamicObject>> {
        let obj = self.fetch(kind, key, path).await?;
        if obj.is_none() {
            report_missing(kind, key, path, policy, violations);
        }
        Ok(obj)
    }

    pub async fn database(
        &self,
        profile: &DatabaseProfile,
        key: &ObjectKey,
        path: &FieldPath,
        violations: &mut Violations,
    ) -> Result<Option<Database>> {
        let kind = profile.database_resource();
        match self.resolve(&kind, key, path, ReferencePolicy::Required, violations).await? {
            Some(obj) => Ok(Some(Database::from_dynamic(profile.kind, &obj)?)),
            None => Ok(None),
        }
    }

    pub async fn secret(
        &self,
        key: &ObjectKey,
        path: &FieldPath,
        policy: ReferencePolicy,
        violations: &mut Violations,
    ) -> Result<Option<Secret>> {
        let kind = ResourceKind::secret();
        match self.resolve(&kind, key, path, policy, violations).await? {
            Some(obj) => Ok(Some(decode_secret(&obj)?)),
            None => Ok(None),
        }
    }

    pub async fn catalog_entry(
        &self,
        profile: &DatabaseProfile,
        name: &str,
        path: &FieldPath,
        violations: &mut Violations,
    ) -> Result<Option<CatalogEntry>> {
        let kind = profile.catalog_resource();
        let key = ObjectKey::cluster(name);
        match self.resolve(&kind, &key, path, ReferencePolicy::Required, violations).await? {
            Some(obj) => Ok(Some(CatalogEntry::from_dynamic(&obj)?)),
            None => Ok(None),
        }
    }
}

/// Records or logs a reference that did not resolve, according to `policy`.
pub fn report_missing(
    kind: &ResourceKind,
    key: &ObjectKey,
    path: &FieldPath,
    policy: ReferencePolicy,
    violations: &mut Violations,
) {
    match policy {
        ReferencePolicy::Required => violations.not_found(
            path.clone(),
            key.to_string(),
            format!("{} {} does not exist", kind.kind(), key),
        ),
        ReferencePolicy::Advisory => {
            warn!(path = %path, reference = %key, kind = kind.kind(), "Referenced object not found, skipping");
        }
    }
}

pub fn decode_secret(obj: &DynamicObject) -> Result<Secret, StdError> {
    let value = serde_json::to_value(obj).map_err(StdError::JsonSerializationError)?;
    serde_json::from_value(value).map_err(StdError::JsonSerializationError)
}

/// Value of `key` in a secret, from `data` or `stringData`.
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(key)) {
        return String::from_utf8(bytes.0.clone()).ok();
    }
    secret.string_data.as_ref().and_then(|d| d.get(key)).cloned()
}

pub fn secret_has_key(secret: &Secret, key: &str) -> bool {
    secret.data.as_ref().is_some_and(|d| d.contains_key(key))
        || secret.string_data.as_ref().is_some_and(|d| d.contains_key(key))
}
