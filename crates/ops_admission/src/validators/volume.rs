use async_trait::async_trait;
use tracing::*;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::api::v1alpha1::database::StorageType;
use crate::util::errors::{FieldPath, Result, Violations};
use crate::util::quantity;

pub struct VolumeExpansionValidator;

#[async_trait]
impl OperationValidator for VolumeExpansionValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(expansion) = require_payload(ctx, ctx.request.spec.volume_expansion.as_ref(), violations) else {
            return Ok(());
        };
        let path = ctx.payload_path();
        if expansion.components.is_empty() {
            violations.required(path, "at least one storage component must be expanded");
            return Ok(());
        }

        let db = ctx.database;
        if db.spec.storage_type != StorageType::Durable {
            violations.invalid(
                FieldPath::new("spec").child("databaseRef"),
                db.spec.storage_type,
                format!("{} {} must use storageType Durable to expand volumes", db.kind, db.name()),
            );
            return Ok(());
        }

        let components = ctx.profile.components(db);
        for (component, requested) in &expansion.components {
            let component_path = path.child(component);
            if !components.contains(component) {
                violations.invalid(
                    component_path,
                    component,
                    format!("component does not exist in the database instance {}", db.name()),
                );
                continue;
            }
            let current = match db.storage_request(Some(component)) {
                Some(current) if ctx.profile.has_storage(component) => current,
                _ => {
                    violations.forbidden(component_path, format!("component {component} has no persistent storage"));
                    continue;
                }
            };

            let Ok(requested_size) = quantity::to_milli(requested) else {
                violations.invalid(component_path, &requested.0, "not a valid quantity");
                continue;
            };
            let current_size = quantity::to_milli(current)?;
            if requested_size <= current_size {
                violations.invalid(
                    component_path,
                    &requested.0,
                    format!("requested size must be greater than current size {}", current.0),
                );
            }
        }
        debug!(database = db.name(), mode = ?expansion.mode, "Checked volume expansion");
        Ok(())
    }
}
