pub mod api;
pub mod dispatcher;
pub mod immutability;
pub mod profile;
pub mod resolver;
pub mod store;
pub mod upgrade;
pub mod util;
pub mod validators;

#[cfg(any(test, feature = "test-util"))]
pub mod fixtures;

pub use api::v1alpha1::database::DatabaseKind;
pub use api::v1alpha1::opsrequest::{OpsRequest, OpsRequestType};
pub use dispatcher::{DatabaseResumer, KubeResumer, OpsRequestValidator, Warnings};
pub use store::{KubeStore, ObjectKey, ObjectStore, ResourceKind};
pub use util::errors::{Error, Result, StdError};
