use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::{ResourceRequirements, TypedLocalObjectReference};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::{ObjectMeta, TypeMeta};
use kube::core::DynamicObject;
use serde::{Deserialize, Serialize};

use crate::api::v1alpha1::database::DatabaseKind;
use crate::api::v1alpha1::{DatabaseReference, ObjectReference};
use crate::store::ObjectKey;
use crate::util::errors::StdError;

pub static OPS_GROUP: &str = "ops.kubedb.com";
pub static OPS_VERSION: &str = "v1alpha1";

/// The maintenance action an OpsRequest asks for.
///
/// Unknown values are kept verbatim so admission can reject them by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpsRequestType {
    Restart,
    VerticalScaling,
    HorizontalScaling,
    VolumeExpansion,
    Reconfigure,
    ReconfigureTLS,
    UpdateVersion,
    RotateAuth,
    Other(String),
}

impl OpsRequestType {
    pub const ALL: [OpsRequestType; 8] = [
        OpsRequestType::Restart,
        OpsRequestType::VerticalScaling,
        OpsRequestType::HorizontalScaling,
        OpsRequestType::VolumeExpansion,
        OpsRequestType::Reconfigure,
        OpsRequestType::ReconfigureTLS,
        OpsRequestType::UpdateVersion,
        OpsRequestType::RotateAuth,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            OpsRequestType::Restart => "Restart",
            OpsRequestType::VerticalScaling => "VerticalScaling",
            OpsRequestType::HorizontalScaling => "HorizontalScaling",
            OpsRequestType::VolumeExpansion => "VolumeExpansion",
            OpsRequestType::Reconfigure => "Reconfigure",
            OpsRequestType::ReconfigureTLS => "ReconfigureTLS",
            OpsRequestType::UpdateVersion => "UpdateVersion",
            OpsRequestType::RotateAuth => "RotateAuth",
            OpsRequestType::Other(s) => s,
        }
    }

    /// Name of the `spec` field carrying this type's payload.
    pub fn payload_field(&self) -> Option<&'static str> {
        match self {
            OpsRequestType::Restart => Some("restart"),
            OpsRequestType::VerticalScaling => Some("verticalScaling"),
            OpsRequestType::HorizontalScaling => Some("horizontalScaling"),
            OpsRequestType::VolumeExpansion => Some("volumeExpansion"),
            OpsRequestType::Reconfigure => Some("configuration"),
            OpsRequestType::ReconfigureTLS => Some("tls"),
            OpsRequestType::UpdateVersion => Some("updateVersion"),
            OpsRequestType::RotateAuth => Some("authentication"),
            OpsRequestType::Other(_) => None,
        }
    }
}

impl From<String> for OpsRequestType {
    fn from(s: String) -> Self {
        OpsRequestType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .unwrap_or(OpsRequestType::Other(s))
    }
}

impl From<OpsRequestType> for String {
    fn from(t: OpsRequestType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for OpsRequestType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress reported by the ops controller.
///
/// Phases this crate does not model (`Denied`, `WaitingForApproval`, ...) are
/// kept verbatim and count as non-terminal.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum OpsRequestPhase {
    #[default]
    Pending,
    Progressing,
    Successful,
    Failed,
    Skipped,
    Other(String),
}

impl OpsRequestPhase {
    pub fn as_str(&self) -> &str {
        match self {
            OpsRequestPhase::Pending => "Pending",
            OpsRequestPhase::Progressing => "Progressing",
            OpsRequestPhase::Successful => "Successful",
            OpsRequestPhase::Failed => "Failed",
            OpsRequestPhase::Skipped => "Skipped",
            OpsRequestPhase::Other(s) => s,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OpsRequestPhase::Successful | OpsRequestPhase::Failed | OpsRequestPhase::Skipped
        )
    }
}

impl From<String> for OpsRequestPhase {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Pending" => OpsRequestPhase::Pending,
            "Progressing" => OpsRequestPhase::Progressing,
            "Successful" => OpsRequestPhase::Successful,
            "Failed" => OpsRequestPhase::Failed,
            "Skipped" => OpsRequestPhase::Skipped,
            _ => OpsRequestPhase::Other(s),
        }
    }
}

impl From<OpsRequestPhase> for String {
    fn from(p: OpsRequestPhase) -> Self {
        p.as_str().to_string()
    }
}

impl fmt::Display for OpsRequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyPolicy {
    IfReady,
    Always,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpsRequestSpec {
    #[serde(rename = "type")]
    pub type_: OpsRequestType,
    pub database_ref: DatabaseReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_scaling: Option<VerticalScalingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_scaling: Option<HorizontalScalingSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_expansion: Option<VolumeExpansionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<ConfigurationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_version: Option<UpdateVersionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,

    /// Mutable after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply: Option<ApplyPolicy>,
    /// Mutable after creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl OpsRequestSpec {
    pub fn new(type_: OpsRequestType, database: &str) -> Self {
        OpsRequestSpec {
            type_,
            database_ref: DatabaseReference {
                name: database.to_string(),
                namespace: None,
            },
            restart: None,
            vertical_scaling: None,
            horizontal_scaling: None,
            volume_expansion: None,
            configuration: None,
            tls: None,
            update_version: None,
            authentication: None,
            apply: None,
            timeout: None,
        }
    }

    /// Payload field names that are populated, in declaration order.
    pub fn populated_payloads(&self) -> Vec<&'static str> {
        [
            ("restart", self.restart.is_some()),
            ("verticalScaling", self.vertical_scaling.is_some()),
            ("horizontalScaling", self.horizontal_scaling.is_some()),
            ("volumeExpansion", self.volume_expansion.is_some()),
            ("configuration", self.configuration.is_some()),
            ("tls", self.tls.is_some()),
            ("updateVersion", self.update_version.is_some()),
            ("authentication", self.authentication.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect()
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct RestartSpec {}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct VerticalScalingSpec {
    /// Keyed by component name (`standalone`, `replicaSet`, `shard`, `master`, ...).
    #[serde(flatten)]
    pub components: BTreeMap<String, ComponentResources>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct ComponentResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct HorizontalScalingSpec {
    /// Member count of a combined (non dedicated) cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Shard count of a sharded database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shards: Option<i32>,
    /// Node count per dedicated component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<BTreeMap<String, i32>>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VolumeExpansionMode {
    Online,
    Offline,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct VolumeExpansionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<VolumeExpansionMode>,
    /// Requested size keyed by component name.
    #[serde(flatten)]
    pub components: BTreeMap<String, Quantity>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    #[serde(default)]
    pub remove_custom_config: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_secret: Option<ObjectReference>,
    /// Inline config files keyed by file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_config: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    #[serde(default)]
    pub remove: bool,
    #[serde(default)]
    pub rotate_certificates: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_ref: Option<TypedLocalObjectReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<CertificateSpec>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVersionSpec {
    #[serde(default)]
    pub target_version: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<ObjectReference>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OpsRequestStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<OpsRequestPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// An OpsRequest of any database kind (`MongoDBOpsRequest`, `RedisOpsRequest`, ...).
///
/// All kinds share one spec shape; the database kind is carried by `kind`.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct OpsRequest {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: OpsRequestSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OpsRequestStatus>,
}

impl OpsRequest {
    pub fn new(database_kind: DatabaseKind, name: &str, namespace: &str, spec: OpsRequestSpec) -> Self {
        OpsRequest {
            types: TypeMeta {
                api_version: format!("{OPS_GROUP}/{OPS_VERSION}"),
                kind: database_kind.ops_kind(),
            },
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        &self.types.kind
    }

    pub fn phase(&self) -> OpsRequestPhase {
        self.status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_default()
    }

    pub fn database_kind(&self) -> Result<DatabaseKind, StdError> {
        DatabaseKind::from_ops_kind(&self.types.kind).ok_or_else(|| {
            StdError::InvalidArgument(format!("{:?} is not a known OpsRequest kind", self.types.kind))
        })
    }

    /// Key of the target database; its namespace defaults to the request's own.
    pub fn database_key(&self) -> ObjectKey {
        let namespace = self
            .spec
            .database_ref
            .namespace
            .clone()
            .or_else(|| self.metadata.namespace.clone());
        ObjectKey {
            namespace,
            name: self.spec.database_ref.name.clone(),
        }
    }
}

impl TryFrom<&DynamicObject> for OpsRequest {
    type Error = StdError;

    fn try_from(obj: &DynamicObject) -> Result<Self, Self::Error> {
        let value = serde_json::to_value(obj).map_err(StdError::JsonSerializationError)?;
        serde_json::from_value(value).map_err(StdError::JsonSerializationError)
    }
}
