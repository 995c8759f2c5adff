use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::api::v1alpha1::ObjectReference;
use crate::util::errors::StdError;

pub static DATABASE_GROUP: &str = "kubedb.com";
pub static DATABASE_VERSION: &str = "v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatabaseKind {
    MongoDB,
    Postgres,
    MySQL,
    Redis,
    Elasticsearch,
    Kafka,
    Memcached,
}

impl DatabaseKind {
    pub const ALL: [DatabaseKind; 7] = [
        DatabaseKind::MongoDB,
        DatabaseKind::Postgres,
        DatabaseKind::MySQL,
        DatabaseKind::Redis,
        DatabaseKind::Elasticsearch,
        DatabaseKind::Kafka,
        DatabaseKind::Memcached,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::MongoDB => "MongoDB",
            DatabaseKind::Postgres => "Postgres",
            DatabaseKind::MySQL => "MySQL",
            DatabaseKind::Redis => "Redis",
            DatabaseKind::Elasticsearch => "Elasticsearch",
            DatabaseKind::Kafka => "Kafka",
            DatabaseKind::Memcached => "Memcached",
        }
    }

    /// `MongoDBOpsRequest` -> `MongoDB`
    pub fn from_ops_kind(kind: &str) -> Option<Self> {
        kind.strip_suffix("OpsRequest")
            .and_then(|db| db.parse().ok())
    }

    pub fn ops_kind(&self) -> String {
        format!("{}OpsRequest", self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = StdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatabaseKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StdError::InvalidArgument(format!("unknown database kind {s:?}")))
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorageType {
    #[default]
    Durable,
    Ephemeral,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageType::Durable => f.write_str("Durable"),
            StorageType::Ephemeral => f.write_str("Ephemeral"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<PersistentVolumeClaimSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplicaSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// The subset of a database custom resource's spec that admission reads.
///
/// Every database kind is decoded into this one shape; fields a kind does not
/// have simply stay unset.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSpec {
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_set: Option<ReplicaSetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterSpec>,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<PersistentVolumeClaimSpec>,
    /// Dedicated components keyed by name (`master`, `data`, `shard`, `broker`, ...).
    #[serde(default, alias = "shardTopology", skip_serializing_if = "Option::is_none")]
    pub topology: Option<BTreeMap<String, NodeSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_secret: Option<ObjectReference>,
    #[serde(default, alias = "disableSecurity")]
    pub disable_auth: bool,
}

/// A live database instance as seen by admission.
#[derive(Clone, Debug)]
pub struct Database {
    pub kind: DatabaseKind,
    pub metadata: ObjectMeta,
    pub spec: DatabaseSpec,
}

impl Database {
    pub fn from_dynamic(kind: DatabaseKind, obj: &DynamicObject) -> Result<Self, StdError> {
        let spec = obj.data.get("spec").cloned().ok_or_else(|| {
            StdError::MetadataMissing(format!(
                "{} {} has no spec",
                kind,
                obj.metadata.name.as_deref().unwrap_or_default()
            ))
        })?;
        Ok(Database {
            kind,
            metadata: obj.metadata.clone(),
            spec: serde_json::from_value(spec).map_err(StdError::JsonSerializationError)?,
        })
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    pub fn is_dedicated(&self) -> bool {
        self.spec.topology.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Storage claim of a component; combined deployments use the top-level claim.
    pub fn storage_for(&self, component: Option<&str>) -> Option<&PersistentVolumeClaimSpec> {
        match (component, self.spec.topology.as_ref()) {
            (Some(c), Some(topology)) if !topology.is_empty() => {
                topology.get(c).and_then(|node| node.storage.as_ref())
            }
            _ => self.spec.storage.as_ref(),
        }
    }

    /// Currently requested `storage` of a component, if any.
    pub fn storage_request(&self, component: Option<&str>) -> Option<&Quantity> {
        self.storage_for(component)
            .and_then(|claim| claim.resources.as_ref())
            .and_then(|resources| resources.requests.as_ref())
            .and_then(|requests| requests.get("storage"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_round_trip_through_ops_kind() {
        for kind in DatabaseKind::ALL {
            assert_eq!(DatabaseKind::from_ops_kind(&kind.ops_kind()), Some(kind));
        }
        assert_eq!(DatabaseKind::from_ops_kind("MongoDB"), None);
        assert_eq!(DatabaseKind::from_ops_kind("RiakOpsRequest"), None);
    }

    #[test]
    fn decodes_sharded_mongodb() {
        let obj: DynamicObject = serde_yaml::from_str(
            r#"
apiVersion: kubedb.com/v1
kind: MongoDB
metadata:
  name: mg-sh
  namespace: demo
spec:
  version: "6.0.12"
  storageType: Durable
  shardTopology:
    shard:
      shards: 2
      replicas: 3
      storage:
        resources:
          requests:
            storage: 1Gi
    configServer:
      replicas: 3
      storage:
        resources:
          requests:
            storage: 500Mi
    mongos:
      replicas: 2
  terminationPolicy: WipeOut
"#,
        )
        .unwrap();

        let db = Database::from_dynamic(DatabaseKind::MongoDB, &obj).unwrap();
        assert_eq!(db.name(), "mg-sh");
        assert!(db.is_dedicated());
        assert_eq!(
            db.storage_request(Some("configServer")),
            Some(&Quantity("500Mi".to_string()))
        );
        assert_eq!(db.storage_request(Some("mongos")), None);
    }

    #[test]
    fn disable_security_aliases_disable_auth() {
        let spec: DatabaseSpec = serde_json::from_value(serde_json::json!({
            "version": "xpack-8.11.1",
            "disableSecurity": true,
        }))
        .unwrap();
        assert!(spec.disable_auth);
        assert_eq!(spec.storage_type, StorageType::Durable);
    }

    #[test]
    fn missing_spec_is_an_error() {
        let obj: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "kubedb.com/v1",
            "kind": "Redis",
            "metadata": { "name": "rd" },
        }))
        .unwrap();
        assert!(Database::from_dynamic(DatabaseKind::Redis, &obj).is_err());
    }
}
