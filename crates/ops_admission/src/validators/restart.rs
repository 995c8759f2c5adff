use async_trait::async_trait;
use tracing::*;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::util::errors::{Result, Violations};

/// A restart only needs its target to exist, which the dispatcher has already resolved.
pub struct RestartValidator;

#[async_trait]
impl OperationValidator for RestartValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        if require_payload(ctx, ctx.request.spec.restart.as_ref(), violations).is_some() {
            debug!(database = ctx.database.name(), "Restart admitted");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::api::v1alpha1::database::DatabaseKind;
    use crate::api::v1alpha1::opsrequest::{OpsRequestSpec, OpsRequestType, RestartSpec};
    use crate::validators::testing::Harness;

    #[tokio::test]
    async fn empty_restart_is_valid() {
        let harness = Harness::new(DatabaseKind::Kafka, json!({ "version": "3.6.1", "replicas": 3 }));
        let mut spec = OpsRequestSpec::new(OpsRequestType::Restart, "db");
        spec.restart = Some(RestartSpec {});
        assert!(harness.run(&harness.request(spec)).await.unwrap().is_empty());
    }
}
