use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StdError {
    #[error("Kube Error: {0}")]
    KubeError(#[source] kube::Error),

    #[error("JsonSerializationError: {0}")]
    JsonSerializationError(#[source] serde_json::Error),

    #[error("SemverError: {0}")]
    SemverError(#[source] semver::Error),

    #[error("MetadataMissing: {0}")]
    MetadataMissing(String),

    #[error("InvalidArgument: {0}")]
    InvalidArgument(String),

    #[error("InvalidCatalog: {0}")]
    InvalidCatalog(String),

    #[error("ReferenceError: failed to resolve {path} ({reference}): {source}")]
    ReferenceError {
        path: String,
        reference: String,
        #[source]
        source: Box<StdError>,
    },
}

impl StdError {
    pub fn metric_label(&self) -> String {
        let label = format!("{self:?}");
        label
            .split(|c: char| !c.is_alphanumeric())
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

/// Dotted path to a field of the validated object, e.g. `spec.horizontalScaling.replicas`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    pub fn new(root: &str) -> Self {
        FieldPath(root.to_string())
    }

    pub fn child(&self, name: &str) -> Self {
        FieldPath(format!("{}.{}", self.0, name))
    }

    pub fn key(&self, key: &str) -> Self {
        FieldPath(format!("{}[{}]", self.0, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldErrorKind {
    Required,
    Invalid(String),
    Forbidden,
    NotFound(String),
    NotSupported(String, Vec<String>),
    Duplicate(String),
}

/// A single business-rule violation, rendered the way the API server renders field errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub path: FieldPath,
    pub kind: FieldErrorKind,
    pub detail: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            FieldErrorKind::Required => write!(f, "{}: Required value: {}", self.path, self.detail),
            FieldErrorKind::Invalid(value) => {
                write!(f, "{}: Invalid value: {}: {}", self.path, value, self.detail)
            }
            FieldErrorKind::Forbidden => write!(f, "{}: Forbidden: {}", self.path, self.detail),
            FieldErrorKind::NotFound(value) => {
                write!(f, "{}: Not found: {:?}", self.path, value)?;
                if !self.detail.is_empty() {
                    write!(f, ": {}", self.detail)?;
                }
                Ok(())
            }
            FieldErrorKind::Duplicate(value) => write!(f, "{}: Duplicate value: {:?}", self.path, value),
            FieldErrorKind::NotSupported(value, supported) => {
                let supported = supported
                    .iter()
                    .map(|s| format!("{s:?}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "{}: Unsupported value: {:?}: supported values: {}",
                    self.path, value, supported
                )
            }
        }
    }
}

/// Collects every violation found while validating one request.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: FieldPath, kind: FieldErrorKind, detail: impl Into<String>) {
        self.0.push(FieldError {
            path,
            kind,
            detail: detail.into(),
        });
    }

    pub fn required(&mut self, path: FieldPath, detail: impl Into<String>) {
        self.push(path, FieldErrorKind::Required, detail);
    }

    pub fn invalid(&mut self, path: FieldPath, value: impl fmt::Display, detail: impl Into<String>) {
        self.push(path, FieldErrorKind::Invalid(value.to_string()), detail);
    }

    pub fn forbidden(&mut self, path: FieldPath, detail: impl Into<String>) {
        self.push(path, FieldErrorKind::Forbidden, detail);
    }

    pub fn not_found(&mut self, path: FieldPath, value: impl Into<String>, detail: impl Into<String>) {
        self.push(path, FieldErrorKind::NotFound(value.into()), detail);
    }

    pub fn not_supported(&mut self, path: FieldPath, value: impl Into<String>, supported: Vec<String>) {
        self.push(path, FieldErrorKind::NotSupported(value.into(), supported), "");
    }

    pub fn duplicate(&mut self, path: FieldPath, value: impl Into<String>) {
        self.push(path, FieldErrorKind::Duplicate(value.into()), "");
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    /// Turns the collected violations into a single rejection for `kind`/`name`.
    pub fn into_result(self, kind: &str, name: &str) -> Result<()> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(Error::Invalid(InvalidError {
            kind: kind.to_string(),
            name: name.to_string(),
            causes: self.0,
        }))
    }
}

#[derive(Error, Debug)]
pub struct InvalidError {
    pub kind: String,
    pub name: String,
    pub causes: Vec<FieldError>,
}

impl fmt::Display for InvalidError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {:?} is invalid: ", self.kind, self.name)?;
        match self.causes.as_slice() {
            [single] => write!(f, "{single}"),
            causes => {
                let joined = causes.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                write!(f, "[{joined}]")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Standard Error: {0}")]
    StdError(#[source] StdError),

    #[error(transparent)]
    Invalid(InvalidError),

    #[error("PreconditionFailed: {0}")]
    PreconditionFailed(String),
}

impl Error {
    pub fn metric_label(&self) -> String {
        match self {
            Error::StdError(e) => e.metric_label(),
            Error::Invalid(_) => "invalid".to_string(),
            Error::PreconditionFailed(_) => "preconditionfailed".to_string(),
        }
    }

    /// Infrastructure failures, as opposed to a request the user has to fix.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Error::StdError(_))
    }

    pub fn violations(&self) -> &[FieldError] {
        match self {
            Error::Invalid(e) => &e.causes,
            _ => &[],
        }
    }
}

impl From<StdError> for Error {
    fn from(e: StdError) -> Self {
        Error::StdError(e)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
