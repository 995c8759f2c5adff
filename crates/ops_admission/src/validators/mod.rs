//! Business rules for each operation type.
//!
//! A validator reads the request, the live database and its profile, and
//! pushes every rule violation it finds. It returns `Err` only for
//! infrastructure failures.

use async_trait::async_trait;

use crate::api::v1alpha1::database::Database;
use crate::api::v1alpha1::opsrequest::{OpsRequest, OpsRequestType};
use crate::profile::DatabaseProfile;
use crate::resolver::ReferenceResolver;
use crate::upgrade::UpgradeResolver;
use crate::util::errors::{FieldPath, Result, Violations};

pub mod auth;
pub mod reconfigure;
pub mod restart;
pub mod scaling;
pub mod tls;
pub mod version;
pub mod volume;

pub struct ValidationContext<'a> {
    pub request: &'a OpsRequest,
    pub database: &'a Database,
    pub profile: &'static DatabaseProfile,
    pub resolver: &'a ReferenceResolver,
    pub upgrades: &'a UpgradeResolver,
}

impl ValidationContext<'_> {
    /// Path of the request's payload field for its type, e.g. `spec.horizontalScaling`.
    pub fn payload_path(&self) -> FieldPath {
        let spec = FieldPath::new("spec");
        match self.request.spec.type_.payload_field() {
            Some(field) => spec.child(field),
            None => spec,
        }
    }

    /// Namespace of referenced secrets: the database's own.
    pub fn namespace(&self) -> &str {
        self.database
            .namespace()
            .or(self.request.metadata.namespace.as_deref())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait OperationValidator: Send + Sync {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()>;
}

pub fn validator_for(operation: &OpsRequestType) -> Option<&'static dyn OperationValidator> {
    match operation {
        OpsRequestType::Restart => Some(&restart::RestartValidator),
        OpsRequestType::VerticalScaling => Some(&scaling::VerticalScalingValidator),
        OpsRequestType::HorizontalScaling => Some(&scaling::HorizontalScalingValidator),
        OpsRequestType::VolumeExpansion => Some(&volume::VolumeExpansionValidator),
        OpsRequestType::Reconfigure => Some(&reconfigure::ReconfigureValidator),
        OpsRequestType::ReconfigureTLS => Some(&tls::ReconfigureTlsValidator),
        OpsRequestType::UpdateVersion => Some(&version::UpdateVersionValidator),
        OpsRequestType::RotateAuth => Some(&auth::RotateAuthValidator),
        OpsRequestType::Other(_) => None,
    }
}

/// The payload, or a Required violation at its path when absent.
pub(crate) fn require_payload<'p, T>(
    ctx: &ValidationContext<'_>,
    payload: Option<&'p T>,
    violations: &mut Violations,
) -> Option<&'p T> {
    if payload.is_none() {
        violations.required(
            ctx.payload_path(),
            format!("required when spec.type is {}", ctx.request.spec.type_),
        );
    }
    payload
}

/// Shared test harness: a store seeded per test and a context over it.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::*;
    use crate::api::v1alpha1::database::DatabaseKind;
    use crate::api::v1alpha1::opsrequest::OpsRequestSpec;
    use crate::fixtures::{self, InMemoryStore};
    use crate::profile::profile;
    use crate::util::errors::FieldError;

    pub struct Harness {
        pub store: InMemoryStore,
        pub kind: DatabaseKind,
        pub database: Database,
    }

    impl Harness {
        pub fn new(kind: DatabaseKind, spec: serde_json::Value) -> Self {
            let obj = fixtures::database(kind, "demo", "db", spec);
            let database = Database::from_dynamic(kind, &obj).unwrap();
            let store = InMemoryStore::new().with(&profile(kind).database_resource(), obj);
            Harness { store, kind, database }
        }

        pub fn with(mut self, kind: &crate::store::ResourceKind, obj: kube::core::DynamicObject) -> Self {
            self.store = self.store.with(kind, obj);
            self
        }

        pub fn request(&self, spec: OpsRequestSpec) -> OpsRequest {
            OpsRequest::new(self.kind, "ops", "demo", spec)
        }

        /// Runs the validator for the request's type and returns what it found.
        pub async fn run(&self, request: &OpsRequest) -> Result<Vec<FieldError>> {
            let store: Arc<dyn crate::store::ObjectStore> = Arc::new(self.store.clone());
            let resolver = ReferenceResolver::new(store.clone());
            let upgrades = UpgradeResolver::new(store);
            let ctx = ValidationContext {
                request,
                database: &self.database,
                profile: profile(self.kind),
                resolver: &resolver,
                upgrades: &upgrades,
            };
            let mut violations = Violations::new();
            let validator = validator_for(&request.spec.type_).unwrap();
            validator.validate(&ctx, &mut violations).await?;
            Ok(violations.iter().cloned().collect())
        }
    }

    pub fn messages(found: &[FieldError]) -> Vec<String> {
        found.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::testing::Harness;
    use super::*;
    use crate::api::v1alpha1::database::DatabaseKind;
    use crate::api::v1alpha1::opsrequest::OpsRequestSpec;

    #[test]
    fn unknown_types_have_no_validator() {
        assert!(validator_for(&OpsRequestType::Other("Backup".to_string())).is_none());
        for op in OpsRequestType::ALL {
            assert!(validator_for(&op).is_some());
        }
    }

    #[tokio::test]
    async fn absent_payload_is_required_for_every_type() {
        let harness = Harness::new(
            DatabaseKind::MongoDB,
            json!({ "version": "6.0.12", "replicas": 3, "replicaSet": { "name": "rs0" } }),
        );
        for op in OpsRequestType::ALL {
            let field = op.payload_field().unwrap();
            let request = harness.request(OpsRequestSpec::new(op.clone(), "db"));
            let found = harness.run(&request).await.unwrap();
            assert_eq!(found.len(), 1, "{op}: {found:?}");
            assert_eq!(found[0].path.to_string(), format!("spec.{field}"));
        }
    }
}
