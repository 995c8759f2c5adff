use kube::core::DynamicObject;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::util::errors::StdError;

pub static CATALOG_GROUP: &str = "catalog.kubedb.com";
pub static CATALOG_VERSION: &str = "v1alpha1";

/// Versions this entry may be upgraded to, as semver range expressions.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateConstraints {
    #[serde(default)]
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub denylist: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub update_constraints: UpdateConstraints,
}

/// One supported engine build, e.g. `MongoDBVersion/6.0.12`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub spec: CatalogSpec,
}

impl CatalogEntry {
    pub fn from_dynamic(obj: &DynamicObject) -> Result<Self, StdError> {
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| StdError::MetadataMissing("catalog entry has no name".to_string()))?;
        let spec = match obj.data.get("spec") {
            Some(spec) => serde_json::from_value(spec.clone()).map_err(StdError::JsonSerializationError)?,
            None => return Err(StdError::InvalidCatalog(format!("catalog entry {name} has no spec"))),
        };
        Ok(CatalogEntry { name, spec })
    }

    /// The entry's engine version; a missing or malformed version is a catalog defect.
    pub fn semver(&self) -> Result<Version, StdError> {
        let raw = self
            .spec
            .version
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| StdError::InvalidCatalog(format!("catalog entry {} has no spec.version", self.name)))?;
        parse_version(raw).map_err(|e| StdError::ReferenceError {
            path: "spec.version".to_string(),
            reference: self.name.clone(),
            source: Box::new(e),
        })
    }
}

/// Parses an engine version, padding a missing minor or patch component (`16.1` -> `16.1.0`).
pub fn parse_version(raw: &str) -> Result<Version, StdError> {
    let raw = raw.trim().trim_start_matches('v');
    let (core, rest) = match raw.find(['-', '+']) {
        Some(idx) => raw.split_at(idx),
        None => (raw, ""),
    };
    let normalized = match core.matches('.').count() {
        0 => format!("{core}.0.0{rest}"),
        1 => format!("{core}.0{rest}"),
        _ => raw.to_string(),
    };
    Version::parse(&normalized).map_err(StdError::SemverError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_versions() {
        assert_eq!(parse_version("16.1").unwrap(), Version::new(16, 1, 0));
        assert_eq!(parse_version("9").unwrap(), Version::new(9, 0, 0));
        assert_eq!(parse_version("v8.0.35").unwrap(), Version::new(8, 0, 35));
        assert_eq!(parse_version("8.11-rc.1").unwrap().pre.as_str(), "rc.1");
    }

    #[test]
    fn rejects_non_versions() {
        assert!(parse_version("xpack-8.11.1").is_err());
        assert!(parse_version("").is_err());
    }

    #[test]
    fn missing_version_is_a_catalog_error() {
        let entry = CatalogEntry {
            name: "4.4.26".to_string(),
            spec: CatalogSpec::default(),
        };
        assert!(matches!(entry.semver(), Err(StdError::InvalidCatalog(_))));
    }

    #[test]
    fn decodes_from_dynamic_object() {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "catalog.kubedb.com/v1alpha1",
            "kind": "MongoDBVersion",
            "metadata": { "name": "6.0.12" },
            "spec": {
                "version": "6.0.12",
                "deprecated": true,
                "updateConstraints": { "allowlist": [">= 6.0.0, < 7.1.0"] },
            },
        }))
        .unwrap();
        let entry = CatalogEntry::from_dynamic(&obj).unwrap();
        assert!(entry.spec.deprecated);
        assert_eq!(entry.spec.update_constraints.allowlist.len(), 1);
        assert!(entry.spec.update_constraints.denylist.is_empty());
        assert_eq!(entry.semver().unwrap(), Version::new(6, 0, 12));
    }
}
