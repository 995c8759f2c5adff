use async_trait::async_trait;
use futures::try_join;
use tracing::*;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::resolver::{decode_secret, report_missing, secret_has_key, secret_value, ReferencePolicy};
use crate::store::{ObjectKey, ResourceKind};
use crate::util::errors::{FieldPath, Result, Violations};

const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

/// Credential rotation. A replacement secret must keep the current username.
pub struct RotateAuthValidator;

#[async_trait]
impl OperationValidator for RotateAuthValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(auth) = require_payload(ctx, ctx.request.spec.authentication.as_ref(), violations) else {
            return Ok(());
        };
        let path = ctx.payload_path();
        let db = ctx.database;

        if ctx.profile.supports_disable_auth && db.spec.disable_auth {
            violations.forbidden(
                path,
                format!("authentication is disabled for {} {}, nothing to rotate", db.kind, db.name()),
            );
            return Ok(());
        }
        let Some(secret_ref) = auth.secret_ref.as_ref() else {
            return Ok(());
        };

        let secrets = ResourceKind::secret();
        let new_path = path.child("secretRef");
        let new_key = ObjectKey::namespaced(ctx.namespace(), &secret_ref.name);
        let current_path = FieldPath::new("spec").child("databaseRef");
        let current_key = db
            .spec
            .auth_secret
            .as_ref()
            .map(|r| ObjectKey::namespaced(ctx.namespace(), &r.name));

        let (new_obj, current_obj) = try_join!(ctx.resolver.fetch(&secrets, &new_key, &new_path), async {
            match &current_key {
                Some(key) => ctx.resolver.fetch(&secrets, key, &current_path).await,
                None => Ok(None),
            }
        })?;

        let Some(new_obj) = new_obj else {
            report_missing(&secrets, &new_key, &new_path, ReferencePolicy::Required, violations);
            return Ok(());
        };
        let new_secret = decode_secret(&new_obj)?;
        for key in [USERNAME_KEY, PASSWORD_KEY] {
            if !secret_has_key(&new_secret, key) {
                violations.invalid(
                    new_path.child("name"),
                    &secret_ref.name,
                    format!("secret must contain the {key} key"),
                );
            }
        }

        // A missing current secret skips the username comparison.
        let current_secret = match (current_obj, &current_key) {
            (Some(obj), _) => decode_secret(&obj)?,
            (None, Some(key)) => {
                report_missing(&secrets, key, &current_path, ReferencePolicy::Advisory, violations);
                return Ok(());
            }
            (None, None) => return Ok(()),
        };
        let current_user = secret_value(&current_secret, USERNAME_KEY);
        let new_user = secret_value(&new_secret, USERNAME_KEY);
        if new_user.is_some() && new_user != current_user {
            violations.invalid(new_path.child("name"), &secret_ref.name, "database username cannot be changed");
        }
        debug!(database = db.name(), secret = %new_key, "Checked auth rotation");
        Ok(())
    }
}
