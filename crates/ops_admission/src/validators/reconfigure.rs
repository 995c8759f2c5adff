use async_trait::async_trait;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::resolver::{secret_has_key, ReferencePolicy};
use crate::store::ObjectKey;
use crate::util::errors::{Result, Violations};

pub struct ReconfigureValidator;

#[async_trait]
impl OperationValidator for ReconfigureValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(config) = require_payload(ctx, ctx.request.spec.configuration.as_ref(), violations) else {
            return Ok(());
        };
        let path = ctx.payload_path();
        let config_key = ctx.profile.config_key;

        if !config.remove_custom_config && config.config_secret.is_none() && config.apply_config.is_none() {
            violations.required(path, "one of removeCustomConfig, configSecret or applyConfig must be set");
            return Ok(());
        }
        if config.remove_custom_config && config.config_secret.is_some() {
            violations.forbidden(
                path.child("removeCustomConfig"),
                "removeCustomConfig and configSecret can not be set together",
            );
        }

        if let Some(secret_ref) = &config.config_secret {
            let secret_path = path.child("configSecret");
            let key = ObjectKey::namespaced(ctx.namespace(), &secret_ref.name);
            let secret = ctx
                .resolver
                .secret(&key, &secret_path, ReferencePolicy::Required, violations)
                .await?;
            if let Some(secret) = secret {
                if !secret_has_key(&secret, config_key) {
                    violations.invalid(
                        secret_path.child("name"),
                        &secret_ref.name,
                        format!("secret must contain the {config_key} key"),
                    );
                }
            }
        }

        if let Some(apply) = &config.apply_config {
            if !apply.contains_key(config_key) {
                let files = apply.keys().cloned().collect::<Vec<_>>().join(",");
                violations.invalid(
                    path.child("applyConfig"),
                    format!("[{files}]"),
                    format!("applyConfig must contain the {config_key} key"),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use crate::api::v1alpha1::database::DatabaseKind;
    use crate::api::v1alpha1::opsrequest::{ConfigurationSpec, OpsRequestSpec, OpsRequestType};
    use crate::api::v1alpha1::ObjectReference;
    use crate::fixtures;
    use crate::store::ResourceKind;
    use crate::validators::testing::{messages, Harness};

    fn redis() -> Harness {
        Harness::new(DatabaseKind::Redis, json!({ "version": "7.2.3" }))
            .with(
                &ResourceKind::secret(),
                fixtures::secret("demo", "rd-config", &[("redis.conf", "maxclients 500")]),
            )
            .with(
                &ResourceKind::secret(),
                fixtures::secret("demo", "wrong-config", &[("custom.conf", "maxclients 500")]),
            )
    }

    fn reconfigure(config: ConfigurationSpec) -> OpsRequestSpec {
        let mut spec = OpsRequestSpec::new(OpsRequestType::Reconfigure, "db");
        spec.configuration = Some(config);
        spec
    }

    fn secret_ref(name: &str) -> Option<ObjectReference> {
        Some(ObjectReference { name: name.to_string() })
    }

    #[tokio::test]
    async fn nothing_to_do_is_rejected() {
        let harness = redis();
        let found = harness
            .run(&harness.request(reconfigure(ConfigurationSpec::default())))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path.to_string(), "spec.configuration");
    }

    #[tokio::test]
    async fn remove_and_secret_are_exclusive() {
        let harness = redis();
        let found = messages(
            &harness
                .run(&harness.request(reconfigure(ConfigurationSpec {
                    remove_custom_config: true,
                    config_secret: secret_ref("rd-config"),
                    apply_config: None,
                })))
                .await
                .unwrap(),
        );
        assert_eq!(
            found,
            vec!["spec.configuration.removeCustomConfig: Forbidden: removeCustomConfig and configSecret can not be set together"]
        );
    }

    #[tokio::test]
    async fn config_secret_must_resolve_and_carry_key() {
        let harness = redis();
        let ok = reconfigure(ConfigurationSpec {
            config_secret: secret_ref("rd-config"),
            ..Default::default()
        });
        assert!(harness.run(&harness.request(ok)).await.unwrap().is_empty());

        let wrong = reconfigure(ConfigurationSpec {
            config_secret: secret_ref("wrong-config"),
            ..Default::default()
        });
        let found = messages(&harness.run(&harness.request(wrong)).await.unwrap());
        assert!(found[0].contains("secret must contain the redis.conf key"));

        let missing = reconfigure(ConfigurationSpec {
            config_secret: secret_ref("nope"),
            ..Default::default()
        });
        let found = messages(&harness.run(&harness.request(missing)).await.unwrap());
        assert!(found[0].starts_with("spec.configuration.configSecret: Not found: \"demo/nope\""));
    }

    #[tokio::test]
    async fn apply_config_needs_engine_key() {
        let harness = redis();
        let ok = reconfigure(ConfigurationSpec {
            apply_config: Some(BTreeMap::from([("redis.conf".to_string(), "maxclients 500".to_string())])),
            ..Default::default()
        });
        assert!(harness.run(&harness.request(ok)).await.unwrap().is_empty());

        let wrong = reconfigure(ConfigurationSpec {
            apply_config: Some(BTreeMap::from([("my.cnf".to_string(), "x".to_string())])),
            ..Default::default()
        });
        let found = harness.run(&harness.request(wrong)).await.unwrap();
        assert_eq!(found[0].path.to_string(), "spec.configuration.applyConfig");
    }

    #[tokio::test]
    async fn secret_store_failure_propagates() {
        let mut harness = Harness::new(DatabaseKind::Redis, json!({ "version": "7.2.3" }));
        harness.store = harness.store.clone().failing(&ResourceKind::secret());
        let request = harness.request(reconfigure(ConfigurationSpec {
            config_secret: secret_ref("rd-config"),
            ..Default::default()
        }));
        assert!(harness.run(&request).await.unwrap_err().is_infrastructure());
    }
}
