use std::collections::BTreeSet;
use std::sync::Arc;

use semver::{Version, VersionReq};
use tracing::*;

use crate::api::v1alpha1::catalog::{CatalogEntry, UpdateConstraints};
use crate::store::{ObjectKey, ObjectStore, ResourceKind};
use crate::util::errors::{Result, StdError};

const OPERATOR_CHARS: &str = "<>=~^";

/// Compiled allow and deny ranges of one catalog entry.
#[derive(Clone, Debug, Default)]
pub struct UpgradePolicy {
    allow: Vec<VersionReq>,
    deny: Vec<VersionReq>,
}

impl UpgradePolicy {
    pub fn from_constraints(constraints: &UpdateConstraints) -> Result<Self, StdError> {
        Ok(UpgradePolicy {
            allow: compile(&constraints.allowlist)?,
            deny: compile(&constraints.denylist)?,
        })
    }

    /// An empty allowlist allows everything; the denylist always wins.
    pub fn permits(&self, version: &Version) -> bool {
        let allowed = self.allow.is_empty() || self.allow.iter().any(|req| req.matches(version));
        allowed && !self.deny.iter().any(|req| req.matches(version))
    }
}

fn compile(ranges: &[String]) -> Result<Vec<VersionReq>, StdError> {
    let mut reqs = Vec::new();
    for range in ranges {
        for alternative in range.split("||") {
            reqs.push(parse_alternative(alternative)?);
        }
    }
    Ok(reqs)
}

/// Parses one `||` alternative, e.g. `>= 5.0.0 < 6.0.0` or `>=5.0.0, <6.0.0`.
fn parse_alternative(expr: &str) -> Result<VersionReq, StdError> {
    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in expr
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
    {
        if token.chars().all(|c| OPERATOR_CHARS.contains(c)) {
            if pending_op.replace(token).is_some() {
                return Err(invalid_range(expr));
            }
            continue;
        }
        comparators.push(match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            None => exact_unless_qualified(token),
        });
    }

    if pending_op.is_some() || comparators.is_empty() {
        return Err(invalid_range(expr));
    }
    VersionReq::parse(&comparators.join(", ")).map_err(StdError::SemverError)
}

// A bare version means that exact version, not a caret range.
fn exact_unless_qualified(token: &str) -> String {
    let has_op = token.starts_with(|c: char| OPERATOR_CHARS.contains(c));
    let core = token.split(['-', '+']).next().unwrap_or(token);
    let has_wildcard = core.contains(['*', 'x', 'X']);
    if has_op || has_wildcard {
        token.to_string()
    } else {
        format!("={token}")
    }
}

fn invalid_range(expr: &str) -> StdError {
    StdError::InvalidCatalog(format!("invalid version range {:?}", expr.trim()))
}

/// Decides whether one catalog entry may be upgraded to another.
#[derive(Clone)]
pub struct UpgradeResolver {
    store: Arc<dyn ObjectStore>,
}

impl UpgradeResolver {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Names of catalog entries `current` may be upgraded to.
    ///
    /// A missing `current` entry, an entry without a parseable version, or a
    /// malformed range fails the whole call.
    pub async fn eligible_versions(&self, catalog: &ResourceKind, current: &str) -> Result<BTreeSet<String>> {
        let entry = self
            .store
            .get(catalog, &ObjectKey::cluster(current))
            .await?
            .ok_or_else(|| StdError::InvalidCatalog(format!("{} {current} not found", catalog.kind())))?;
        let entry = CatalogEntry::from_dynamic(&entry)?;
        let policy = UpgradePolicy::from_constraints(&entry.spec.update_constraints)?;

        let mut eligible = BTreeSet::new();
        for obj in self.store.list(catalog, None, None).await? {
            let candidate = CatalogEntry::from_dynamic(&obj)?;
            let version = candidate.semver()?;
            if policy.permits(&version) {
                eligible.insert(candidate.name);
            }
        }
        debug!(catalog = catalog.kind(), current, eligible = ?eligible, "Resolved upgrade targets");
        Ok(eligible)
    }

    pub async fn is_upgradable(&self, catalog: &ResourceKind, current: &str, target: &str) -> Result<bool> {
        Ok(self.eligible_versions(catalog, current).await?.contains(target))
    }
}
