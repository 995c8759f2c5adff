use async_trait::async_trait;
use tracing::*;

use super::{require_payload, OperationValidator, ValidationContext};
use crate::profile::Topology;
use crate::util::errors::{FieldPath, Result, Violations};

pub struct VerticalScalingValidator;

#[async_trait]
impl OperationValidator for VerticalScalingValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(payload) = require_payload(ctx, ctx.request.spec.vertical_scaling.as_ref(), violations) else {
            return Ok(());
        };
        let path = ctx.payload_path();
        if payload.components.is_empty() {
            violations.required(path, "at least one component must be scaled");
            return Ok(());
        }

        let components = ctx.profile.components(ctx.database);
        for (name, target) in &payload.components {
            let component_path = path.child(name);
            if !components.contains(name) {
                violations.invalid(
                    component_path,
                    name,
                    format!("component does not exist in the database instance {}", ctx.database.name()),
                );
                continue;
            }
            let empty = target
                .resources
                .as_ref()
                .map_or(true, |r| r.requests.is_none() && r.limits.is_none());
            if empty {
                violations.required(component_path.child("resources"), "requests or limits must be set");
            }
        }
        debug!(database = ctx.database.name(), components = ?payload.components.keys(), "Checked vertical scaling");
        Ok(())
    }
}

pub struct HorizontalScalingValidator;

fn check_count(violations: &mut Violations, path: FieldPath, count: i32, what: &str) -> bool {
    if count == 0 {
        violations.invalid(path, count, format!("{what} count can not be 0"));
        return false;
    }
    if count < 0 {
        violations.invalid(path, count, format!("{what} count can not be negative"));
        return false;
    }
    true
}

#[async_trait]
impl OperationValidator for HorizontalScalingValidator {
    async fn validate(&self, ctx: &ValidationContext<'_>, violations: &mut Violations) -> Result<()> {
        let Some(hs) = require_payload(ctx, ctx.request.spec.horizontal_scaling.as_ref(), violations) else {
            return Ok(());
        };
        let path = ctx.payload_path();
        let per_component = hs.topology.as_ref().filter(|t| !t.is_empty());
        if hs.replicas.is_none() && hs.shards.is_none() && per_component.is_none() {
            violations.required(path, "one of replicas, shards or topology must be set");
            return Ok(());
        }

        let db = ctx.database;
        let profile = ctx.profile;
        let rules = &profile.scaling;

        let replicas = hs
            .replicas
            .filter(|&r| check_count(violations, path.child("replicas"), r, "replicas"));
        let shards = hs
            .shards
            .filter(|&s| check_count(violations, path.child("shards"), s, "shards"));
        if let Some(topology) = per_component {
            for (component, &count) in topology {
                check_count(violations, path.child("topology").child(component), count, "replicas");
            }
        }

        match profile.topology(db) {
            Topology::Standalone => {
                if per_component.is_some() {
                    violations.forbidden(path.child("topology"), "standalone database has no dedicated components");
                }
                if hs.replicas.is_some() && !rules.standalone_replicas {
                    violations.forbidden(
                        path.child("replicas"),
                        format!("standalone {} can not be scaled horizontally", profile.kind),
                    );
                }
            }
            Topology::Cluster => {
                if per_component.is_some() {
                    violations.forbidden(path.child("topology"), "database has no dedicated components, scale replicas");
                }
                if let (Some(range), Some(count)) = (&rules.cluster_replicas, replicas) {
                    if !range.contains(&count) {
                        violations.invalid(
                            path.child("replicas"),
                            count,
                            format!(
                                "cluster size must be between {} and {} inclusive",
                                range.start(),
                                range.end()
                            ),
                        );
                    }
                }
            }
            Topology::Dedicated => {
                if hs.replicas.is_some() {
                    violations.forbidden(
                        path.child("replicas"),
                        "dedicated topology is scaled per component through topology",
                    );
                }
                let components = profile.components(db);
                for component in per_component.into_iter().flat_map(|t| t.keys()) {
                    if !components.contains(component) {
                        violations.invalid(
                            path.child("topology").child(component),
                            component,
                            format!("component does not exist in the database instance {}", db.name()),
                        );
                    }
                }
            }
        }

        if hs.shards.is_some() && !profile.is_sharded(db) {
            violations.forbidden(path.child("shards"), format!("{} {} is not sharded", profile.kind, db.name()));
        } else if let (Some(count), Some(min)) = (shards, rules.min_shards) {
            if count < min {
                violations.invalid(path.child("shards"), count, format!("shards count must be at least {min}"));
            }
        }
        Ok(())
    }
}
