//! Admission entry points for OpsRequests of every database kind.

use std::sync::Arc;

use async_trait::async_trait;
use kube::{
    api::{Api, Patch, PatchParams},
    core::DynamicObject,
    Client,
};
use serde_json::json;
use tracing::*;

use crate::api::v1alpha1::database::DatabaseKind;
use crate::api::v1alpha1::opsrequest::{ApplyPolicy, OpsRequest};
use crate::immutability::check_immutable;
use crate::profile::profile;
use crate::resolver::ReferenceResolver;
use crate::store::{ObjectKey, ObjectStore};
use crate::upgrade::UpgradeResolver;
use crate::util::errors::{Error, FieldPath, Result, StdError, Violations};
use crate::validators::{validator_for, ValidationContext};

/// Annotation the operator sets on a database while an operation runs.
pub const PAUSED_ANNOTATION: &str = "ops.kubedb.com/paused";

/// Advisory messages returned alongside an admitted request.
pub type Warnings = Vec<String>;

/// Lets a database reconcile again once its operation has finished.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseResumer: Send + Sync {
    async fn resume(&self, kind: DatabaseKind, key: &ObjectKey) -> Result<()>;
}

/// Resumes a database by dropping its paused annotation.
#[derive(Clone)]
pub struct KubeResumer {
    client: Client,
}

impl KubeResumer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DatabaseResumer for KubeResumer {
    async fn resume(&self, kind: DatabaseKind, key: &ObjectKey) -> Result<()> {
        let namespace = key
            .namespace
            .as_deref()
            .ok_or_else(|| StdError::MetadataMissing(format!("{kind} {key} has no namespace")))?;
        let resource = profile(kind).database_resource();
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &resource.resource);

        let patch = json!({ "metadata": { "annotations": { PAUSED_ANNOTATION: null } } });
        api.patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::StdError(StdError::KubeError(e)))?;
        info!(kind = %kind, database = %key, "Resumed database");
        Ok(())
    }
}

/// Decides whether an OpsRequest create, update or delete is admitted.
#[derive(Clone)]
pub struct OpsRequestValidator {
    resolver: ReferenceResolver,
    upgrades: UpgradeResolver,
    resumer: Arc<dyn DatabaseResumer>,
}

impl OpsRequestValidator {
    pub fn new(store: Arc<dyn ObjectStore>, resumer: Arc<dyn DatabaseResumer>) -> Self {
        Self {
            resolver: ReferenceResolver::new(store.clone()),
            upgrades: UpgradeResolver::new(store),
            resumer,
        }
    }

    /// Every business rule for the request's type. All violations are
    /// reported together; infrastructure failures abort the check.
    pub async fn validate_create(&self, request: &OpsRequest) -> Result<Warnings> {
        let mut violations = Violations::new();
        self.check(request, &mut violations).await?;
        if !violations.is_empty() {
            info!(
                kind = request.kind(),
                name = request.name(),
                violations = violations.len(),
                "Rejected OpsRequest"
            );
        }
        violations.into_result(request.kind(), request.name())?;
        Ok(warnings(request))
    }

    /// Guards the immutable fields, then validates the new revision exactly
    /// like a create. A request that just reached a terminal phase also
    /// resumes its database.
    pub async fn validate_update(&self, old: &OpsRequest, new: &OpsRequest) -> Result<Warnings> {
        check_immutable(old, new)?;

        let (from, to) = (old.phase(), new.phase());
        if !from.is_terminal() && to.is_terminal() {
            debug!(name = new.name(), from = %from, to = %to, "OpsRequest finished");
            self.resume(new).await;
        }
        self.validate_create(new).await
    }

    pub async fn validate_delete(&self, request: &OpsRequest) -> Result<Warnings> {
        debug!(kind = request.kind(), name = request.name(), "Admitting delete");
        Ok(Warnings::new())
    }

    async fn check(&self, request: &OpsRequest, violations: &mut Violations) -> Result<()> {
        let spec = FieldPath::new("spec");

        let Ok(kind) = request.database_kind() else {
            violations.not_supported(
                FieldPath::new("kind"),
                request.kind(),
                DatabaseKind::ALL.iter().map(DatabaseKind::ops_kind).collect(),
            );
            return Ok(());
        };
        let profile = profile(kind);
        let op = &request.spec.type_;
        let validator = match validator_for(op) {
            Some(validator) if profile.supports(op) => validator,
            _ => {
                violations.not_supported(spec.child("type"), op.as_str(), profile.supported_operations());
                return Ok(());
            }
        };

        let expected = op.payload_field();
        for field in request.spec.populated_payloads() {
            if Some(field) != expected {
                violations.forbidden(spec.child(field), format!("must not be set when spec.type is {op}"));
            }
        }

        let Some(database) = self
            .resolver
            .database(profile, &request.database_key(), &spec.child("databaseRef"), violations)
            .await?
        else {
            return Ok(());
        };

        let ctx = ValidationContext {
            request,
            database: &database,
            profile,
            resolver: &self.resolver,
            upgrades: &self.upgrades,
        };
        debug!(kind = %kind, name = request.name(), op = %op, database = database.name(), "Validating OpsRequest");
        validator.validate(&ctx, violations).await
    }

    // Resume failures are logged, never surfaced to the caller.
    async fn resume(&self, request: &OpsRequest) {
        let kind = match request.database_kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(name = request.name(), error = %e, "Cannot resume database of unknown kind");
                return;
            }
        };
        let key = request.database_key();
        let mut violations = Violations::new();
        match self
            .resolver
            .database(profile(kind), &key, &FieldPath::new("spec").child("databaseRef"), &mut violations)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(kind = %kind, database = %key, "Database to resume no longer exists");
                return;
            }
            Err(e) => {
                warn!(kind = %kind, database = %key, error = %e, "Failed to resolve database to resume");
                return;
            }
        }
        if let Err(e) = self.resumer.resume(kind, &key).await {
            warn!(kind = %kind, database = %key, error = %e, "Failed to resume database");
        }
    }
}

fn warnings(request: &OpsRequest) -> Warnings {
    let mut warnings = Warnings::new();
    if request.spec.apply == Some(ApplyPolicy::Always) {
        warnings.push(format!(
            "{} {}: apply is Always, the operation will run even if the database is not Ready",
            request.kind(),
            request.name()
        ));
    }
    warnings
}
