use async_trait::async_trait;
use tracing::*;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::util::errors::{Result, StdError, Violations};

pub struct UpdateVersionValidator;

#[async_trait]
impl OperationValidator for UpdateVersionValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(update) = require_payload(ctx, ctx.request.spec.update_version.as_ref(), violations) else {
            return Ok(());
        };
        let target_path = ctx.payload_path().child("targetVersion");
        let target = update.target_version.trim();
        if target.is_empty() {
            violations.required(target_path, "target version must be set");
            return Ok(());
        }

        let profile = ctx.profile;
        let db = ctx.database;
        let Some(entry) = ctx
            .resolver
            .catalog_entry(profile, target, &target_path, violations)
            .await?
        else {
            return Ok(());
        };
        if entry.spec.deprecated {
            violations.invalid(target_path, target, format!("{}Version {target} is deprecated", profile.kind));
            return Ok(());
        }

        let current = db.spec.version.trim();
        if current.is_empty() {
            return Err(StdError::MetadataMissing(format!("{} {} has no spec.version", db.kind, db.name())).into());
        }
        let upgradable = ctx
            .upgrades
            .is_upgradable(&profile.catalog_resource(), current, target)
            .await?;
        if !upgradable {
            violations.invalid(
                target_path,
                target,
                format!("upgrade from version {current} to {target} is not supported"),
            );
        }
        debug!(database = db.name(), current, target, upgradable, "Checked version update");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::v1alpha1::database::DatabaseKind;
    use crate::api::v1alpha1::opsrequest::{OpsRequestSpec, OpsRequestType, UpdateVersionSpec};
    use crate::fixtures;
    use crate::profile::profile;
    use crate::validators::testing::{messages, Harness};

    fn harness() -> Harness {
        let catalog = profile(DatabaseKind::MongoDB).catalog_resource();
        Harness::new(
            DatabaseKind::MongoDB,
            json!({ "version": "5.0.0", "replicas": 3, "replicaSet": { "name": "rs0" } }),
        )
        .with(
            &catalog,
            fixtures::catalog_entry(DatabaseKind::MongoDB, "5.0.0", false, &[">=5.0.0 <6.0.0"], &["=5.0.1"]),
        )
        .with(&catalog, fixtures::catalog_entry(DatabaseKind::MongoDB, "5.0.1", false, &[], &[]))
        .with(&catalog, fixtures::catalog_entry(DatabaseKind::MongoDB, "5.0.3", false, &[], &[]))
        .with(&catalog, fixtures::catalog_entry(DatabaseKind::MongoDB, "4.4.6", true, &[], &[]))
    }

    fn update(target: &str) -> OpsRequestSpec {
        let mut spec = OpsRequestSpec::new(OpsRequestType::UpdateVersion, "db");
        spec.update_version = Some(UpdateVersionSpec {
            target_version: target.to_string(),
        });
        spec
    }

    #[tokio::test]
    async fn allowed_target_is_admitted() {
        let harness = harness();
        assert!(harness.run(&harness.request(update("5.0.3"))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn denied_target_is_rejected() {
        let harness = harness();
        let found = messages(&harness.run(&harness.request(update("5.0.1"))).await.unwrap());
        assert_eq!(
            found,
            vec!["spec.updateVersion.targetVersion: Invalid value: 5.0.1: upgrade from version 5.0.0 to 5.0.1 is not supported"]
        );
    }

    #[tokio::test]
    async fn deprecated_or_unknown_target_is_rejected() {
        let harness = harness();
        let found = messages(&harness.run(&harness.request(update("4.4.6"))).await.unwrap());
        assert!(found[0].contains("MongoDBVersion 4.4.6 is deprecated"));

        let found = harness.run(&harness.request(update("7.0.2"))).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.to_string(), "spec.updateVersion.targetVersion");
    }

    #[tokio::test]
    async fn empty_target_is_required() {
        let harness = harness();
        let found = harness.run(&harness.request(update(" "))).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
