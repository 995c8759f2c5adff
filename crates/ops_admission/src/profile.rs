//! Per database kind parameters: which operations a kind accepts, how its
//! deployment is laid out, and where its API objects live.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::api::v1alpha1::catalog::{CATALOG_GROUP, CATALOG_VERSION};
use crate::api::v1alpha1::database::{Database, DatabaseKind, DatabaseSpec, DATABASE_GROUP, DATABASE_VERSION};
use crate::api::v1alpha1::opsrequest::OpsRequestType;
use crate::store::ResourceKind;

/// How a database instance is deployed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// A single node.
    Standalone,
    /// Several identical members addressed as one component.
    Cluster,
    /// Named components with their own node counts and storage.
    Dedicated,
}

#[derive(Clone, Debug)]
pub struct ScalingRules {
    /// Member count bounds of a combined cluster.
    pub cluster_replicas: Option<RangeInclusive<i32>>,
    /// Lower bound on shards of a sharded database.
    pub min_shards: Option<i32>,
    /// Whether a standalone database may grow by `replicas`.
    pub standalone_replicas: bool,
}

#[derive(Debug)]
pub struct DatabaseProfile {
    pub kind: DatabaseKind,
    pub plural: &'static str,
    pub operations: &'static [OpsRequestType],
    /// File a custom configuration must provide.
    pub config_key: &'static str,
    pub standalone_component: &'static str,
    pub cluster_component: &'static str,
    /// Dedicated components that run without persistent storage.
    pub diskless_components: &'static [&'static str],
    pub supports_disable_auth: bool,
    pub scaling: ScalingRules,
    cluster_mode: fn(&DatabaseSpec) -> bool,
    sharded: fn(&DatabaseSpec) -> bool,
}

const ALL_OPERATIONS: &[OpsRequestType] = &[
    OpsRequestType::Restart,
    OpsRequestType::VerticalScaling,
    OpsRequestType::HorizontalScaling,
    OpsRequestType::VolumeExpansion,
    OpsRequestType::Reconfigure,
    OpsRequestType::ReconfigureTLS,
    OpsRequestType::UpdateVersion,
    OpsRequestType::RotateAuth,
];

const MEMCACHED_OPERATIONS: &[OpsRequestType] = &[
    OpsRequestType::Restart,
    OpsRequestType::VerticalScaling,
    OpsRequestType::HorizontalScaling,
    OpsRequestType::Reconfigure,
    OpsRequestType::ReconfigureTLS,
    OpsRequestType::UpdateVersion,
];

fn always(_: &DatabaseSpec) -> bool {
    true
}

fn never(_: &DatabaseSpec) -> bool {
    false
}

fn mode_is(spec: &DatabaseSpec, modes: &[&str]) -> bool {
    spec.mode.as_deref().is_some_and(|m| modes.contains(&m))
}

fn mongodb_replicated(spec: &DatabaseSpec) -> bool {
    spec.replica_set.is_some()
}

fn mongodb_sharded(spec: &DatabaseSpec) -> bool {
    spec.topology.as_ref().is_some_and(|t| t.contains_key("shard"))
}

fn postgres_replicated(spec: &DatabaseSpec) -> bool {
    spec.replicas.unwrap_or(1) > 1
}

fn mysql_group(spec: &DatabaseSpec) -> bool {
    mode_is(spec, &["GroupReplication", "InnoDBCluster"])
}

fn redis_replicated(spec: &DatabaseSpec) -> bool {
    mode_is(spec, &["Cluster", "Sentinel"])
}

fn redis_sharded(spec: &DatabaseSpec) -> bool {
    mode_is(spec, &["Cluster"])
}

static PROFILES: [DatabaseProfile; 7] = [
    DatabaseProfile {
        kind: DatabaseKind::MongoDB,
        plural: "mongodbs",
        operations: ALL_OPERATIONS,
        config_key: "mongod.conf",
        standalone_component: "standalone",
        cluster_component: "replicaSet",
        diskless_components: &["mongos"],
        supports_disable_auth: false,
        scaling: ScalingRules {
            cluster_replicas: None,
            min_shards: Some(1),
            standalone_replicas: false,
        },
        cluster_mode: mongodb_replicated,
        sharded: mongodb_sharded,
    },
    DatabaseProfile {
        kind: DatabaseKind::Postgres,
        plural: "postgreses",
        operations: ALL_OPERATIONS,
        config_key: "user.conf",
        standalone_component: "postgres",
        cluster_component: "postgres",
        diskless_components: &[],
        supports_disable_auth: false,
        scaling: ScalingRules {
            cluster_replicas: None,
            min_shards: None,
            standalone_replicas: true,
        },
        cluster_mode: postgres_replicated,
        sharded: never,
    },
    DatabaseProfile {
        kind: DatabaseKind::MySQL,
        plural: "mysqls",
        operations: ALL_OPERATIONS,
        config_key: "my-config.cnf",
        standalone_component: "mysql",
        cluster_component: "mysql",
        diskless_components: &[],
        supports_disable_auth: false,
        scaling: ScalingRules {
            cluster_replicas: Some(3..=9),
            min_shards: None,
            standalone_replicas: false,
        },
        cluster_mode: mysql_group,
        sharded: never,
    },
    DatabaseProfile {
        kind: DatabaseKind::Redis,
        plural: "redises",
        operations: ALL_OPERATIONS,
        config_key: "redis.conf",
        standalone_component: "redis",
        cluster_component: "redis",
        diskless_components: &[],
        supports_disable_auth: true,
        scaling: ScalingRules {
            cluster_replicas: None,
            min_shards: Some(3),
            standalone_replicas: false,
        },
        cluster_mode: redis_replicated,
        sharded: redis_sharded,
    },
    DatabaseProfile {
        kind: DatabaseKind::Elasticsearch,
        plural: "elasticsearches",
        operations: ALL_OPERATIONS,
        config_key: "elasticsearch.yml",
        standalone_component: "node",
        cluster_component: "node",
        diskless_components: &[],
        supports_disable_auth: true,
        scaling: ScalingRules {
            cluster_replicas: None,
            min_shards: None,
            standalone_replicas: true,
        },
        cluster_mode: always,
        sharded: never,
    },
    DatabaseProfile {
        kind: DatabaseKind::Kafka,
        plural: "kafkas",
        operations: ALL_OPERATIONS,
        config_key: "server.properties",
        standalone_component: "node",
        cluster_component: "node",
        diskless_components: &[],
        supports_disable_auth: true,
        scaling: ScalingRules {
            cluster_replicas: None,
            min_shards: None,
            standalone_replicas: true,
        },
        cluster_mode: always,
        sharded: never,
    },
    DatabaseProfile {
        kind: DatabaseKind::Memcached,
        plural: "memcacheds",
        operations: MEMCACHED_OPERATIONS,
        config_key: "memcached.conf",
        standalone_component: "memcached",
        cluster_component: "memcached",
        diskless_components: &["memcached"],
        supports_disable_auth: false,
        scaling: ScalingRules {
            cluster_replicas: None,
            min_shards: None,
            standalone_replicas: true,
        },
        cluster_mode: always,
        sharded: never,
    },
];

pub fn profile(kind: DatabaseKind) -> &'static DatabaseProfile {
    match kind {
        DatabaseKind::MongoDB => &PROFILES[0],
        DatabaseKind::Postgres => &PROFILES[1],
        DatabaseKind::MySQL => &PROFILES[2],
        DatabaseKind::Redis => &PROFILES[3],
        DatabaseKind::Elasticsearch => &PROFILES[4],
        DatabaseKind::Kafka => &PROFILES[5],
        DatabaseKind::Memcached => &PROFILES[6],
    }
}

impl DatabaseProfile {
    pub fn supports(&self, operation: &OpsRequestType) -> bool {
        self.operations.contains(operation)
    }

    pub fn supported_operations(&self) -> Vec<String> {
        self.operations.iter().map(ToString::to_string).collect()
    }

    pub fn database_resource(&self) -> ResourceKind {
        ResourceKind::new(DATABASE_GROUP, DATABASE_VERSION, self.kind.as_str(), self.plural, true)
    }

    /// The cluster-scoped `<Kind>Version` catalog.
    pub fn catalog_resource(&self) -> ResourceKind {
        ResourceKind::new(
            CATALOG_GROUP,
            CATALOG_VERSION,
            &format!("{}Version", self.kind),
            &format!("{}versions", self.kind.as_str().to_lowercase()),
            false,
        )
    }

    pub fn topology(&self, db: &Database) -> Topology {
        if db.is_dedicated() {
            Topology::Dedicated
        } else if (self.cluster_mode)(&db.spec) {
            Topology::Cluster
        } else {
            Topology::Standalone
        }
    }

    pub fn is_sharded(&self, db: &Database) -> bool {
        (self.sharded)(&db.spec)
    }

    /// Component names of this instance. Built per call from the live object.
    pub fn components(&self, db: &Database) -> BTreeSet<String> {
        match self.topology(db) {
            Topology::Standalone => BTreeSet::from([self.standalone_component.to_string()]),
            Topology::Cluster => BTreeSet::from([self.cluster_component.to_string()]),
            Topology::Dedicated => db
                .spec
                .topology
                .as_ref()
                .map(|t| t.keys().cloned().collect())
                .unwrap_or_default(),
        }
    }

    pub fn has_storage(&self, component: &str) -> bool {
        !self.diskless_components.contains(&component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use serde_json::json;

    fn database(kind: DatabaseKind, spec: serde_json::Value) -> Database {
        Database::from_dynamic(kind, &fixtures::database(kind, "demo", "db", spec)).unwrap()
    }

    #[test]
    fn every_kind_has_its_own_profile() {
        for kind in DatabaseKind::ALL {
            assert_eq!(profile(kind).kind, kind);
        }
    }

    #[test]
    fn memcached_rejects_storage_and_auth_operations() {
        let mc = profile(DatabaseKind::Memcached);
        assert!(mc.supports(&OpsRequestType::Restart));
        assert!(!mc.supports(&OpsRequestType::VolumeExpansion));
        assert!(!mc.supports(&OpsRequestType::RotateAuth));
        assert!(!mc.supports(&OpsRequestType::Other("Backup".to_string())));
        assert_eq!(mc.supported_operations().len(), 6);
    }

    #[test]
    fn resources_point_at_the_right_groups() {
        let pg = profile(DatabaseKind::Postgres);
        let db = pg.database_resource();
        assert_eq!(db.resource.api_version, "kubedb.com/v1");
        assert_eq!(db.resource.plural, "postgreses");
        assert!(db.namespaced);

        let catalog = pg.catalog_resource();
        assert_eq!(catalog.kind(), "PostgresVersion");
        assert_eq!(catalog.resource.plural, "postgresversions");
        assert!(!catalog.namespaced);
    }

    #[test]
    fn mongodb_components_follow_topology() {
        let mg = profile(DatabaseKind::MongoDB);

        let standalone = database(DatabaseKind::MongoDB, json!({ "version": "6.0.12" }));
        assert_eq!(mg.topology(&standalone), Topology::Standalone);
        assert_eq!(mg.components(&standalone), BTreeSet::from(["standalone".to_string()]));

        let rs = database(
            DatabaseKind::MongoDB,
            json!({ "version": "6.0.12", "replicas": 3, "replicaSet": { "name": "rs0" } }),
        );
        assert_eq!(mg.topology(&rs), Topology::Cluster);
        assert!(mg.components(&rs).contains("replicaSet"));
        assert!(!mg.is_sharded(&rs));

        let sharded = database(
            DatabaseKind::MongoDB,
            json!({
                "version": "6.0.12",
                "shardTopology": {
                    "shard": { "shards": 2, "replicas": 3 },
                    "configServer": { "replicas": 3 },
                    "mongos": { "replicas": 2 },
                },
            }),
        );
        assert_eq!(mg.topology(&sharded), Topology::Dedicated);
        assert!(mg.is_sharded(&sharded));
        assert_eq!(mg.components(&sharded).len(), 3);
        assert!(!mg.has_storage("mongos"));
        assert!(mg.has_storage("shard"));
    }

    #[test]
    fn mode_selects_cluster_layout() {
        let my = profile(DatabaseKind::MySQL);
        let group = database(DatabaseKind::MySQL, json!({ "version": "8.0.35", "mode": "GroupReplication" }));
        assert_eq!(my.topology(&group), Topology::Cluster);
        let single = database(DatabaseKind::MySQL, json!({ "version": "8.0.35" }));
        assert_eq!(my.topology(&single), Topology::Standalone);

        let rd = profile(DatabaseKind::Redis);
        let cluster = database(DatabaseKind::Redis, json!({ "version": "7.2.3", "mode": "Cluster" }));
        assert!(rd.is_sharded(&cluster));
        let sentinel = database(DatabaseKind::Redis, json!({ "version": "7.2.3", "mode": "Sentinel" }));
        assert_eq!(rd.topology(&sentinel), Topology::Cluster);
        assert!(!rd.is_sharded(&sentinel));
    }
}
