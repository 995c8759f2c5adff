use std::fmt;

use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod database;
pub mod opsrequest;

/// Reference to an object in the same namespace as the referrer.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectReference {
    pub name: String,
}

/// Reference from an OpsRequest to the database it operates on.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseReference {
    pub name: String,
    /// Defaults to the namespace of the OpsRequest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl fmt::Display for DatabaseReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}
