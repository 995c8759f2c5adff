use std::collections::BTreeSet;

use async_trait::async_trait;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::util::errors::{Result, Violations};

/// Exactly one of removing TLS, rotating certificates, or changing the issuer
/// and certificates may be requested at a time.
pub struct ReconfigureTlsValidator;

#[async_trait]
impl OperationValidator for ReconfigureTlsValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(tls) = require_payload(ctx, ctx.request.spec.tls.as_ref(), violations) else {
            return Ok(());
        };
        let path = ctx.payload_path();

        let mut chosen = Vec::new();
        if tls.remove {
            chosen.push("remove");
        }
        if tls.rotate_certificates {
            chosen.push("rotateCertificates");
        }
        if tls.issuer_ref.is_some() || !tls.certificates.is_empty() {
            chosen.push("issuerRef/certificates");
        }
        match chosen.len() {
            0 => violations.required(path.clone(), "no reconfiguration provided for TLS"),
            1 => {}
            _ => violations.invalid(
                path.clone(),
                format!("[{}]", chosen.join(", ")),
                "more than one operation provided, set only one of remove, rotateCertificates or issuerRef/certificates",
            ),
        }

        let mut aliases = BTreeSet::new();
        for (i, cert) in tls.certificates.iter().enumerate() {
            if !aliases.insert(cert.alias.as_str()) {
                violations.duplicate(
                    path.child("certificates").key(&i.to_string()).child("alias"),
                    &cert.alias,
                );
            }
        }
        Ok(())
    }
}
