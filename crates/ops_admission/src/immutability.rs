use tracing::*;

use crate::api::v1alpha1::opsrequest::OpsRequest;
use crate::util::errors::{Error, Result};

fn guard<T: PartialEq>(changed: &mut Vec<&'static str>, path: &'static str, old: &T, new: &T) {
    if old != new {
        changed.push(path);
    }
}

/// Rejects an update that touches anything but `spec.apply`, `spec.timeout`,
/// metadata or status. Every changed path is named in the error.
pub fn check_immutable(old: &OpsRequest, new: &OpsRequest) -> Result<()> {
    let (o, n) = (&old.spec, &new.spec);
    let mut changed = Vec::new();

    guard(&mut changed, "spec.type", &o.type_, &n.type_);
    guard(&mut changed, "spec.databaseRef", &o.database_ref, &n.database_ref);
    guard(&mut changed, "spec.restart", &o.restart, &n.restart);
    guard(&mut changed, "spec.verticalScaling", &o.vertical_scaling, &n.vertical_scaling);
    guard(&mut changed, "spec.horizontalScaling", &o.horizontal_scaling, &n.horizontal_scaling);
    guard(&mut changed, "spec.volumeExpansion", &o.volume_expansion, &n.volume_expansion);
    guard(&mut changed, "spec.configuration", &o.configuration, &n.configuration);
    guard(&mut changed, "spec.tls", &o.tls, &n.tls);
    guard(&mut changed, "spec.updateVersion", &o.update_version, &n.update_version);
    guard(&mut changed, "spec.authentication", &o.authentication, &n.authentication);

    if changed.is_empty() {
        return Ok(());
    }
    warn!(kind = new.kind(), name = new.name(), fields = ?changed, "Rejected change to immutable fields");
    Err(Error::PreconditionFailed(format!(
        "{} {:?}: field(s) {} are immutable",
        new.kind(),
        new.name(),
        changed.join(", ")
    )))
}
