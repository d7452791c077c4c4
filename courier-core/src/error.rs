use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Boxed error used as the opaque cause of a [`BackendError`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where in a declaration an annotation was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationSite {
    pub interface: String,
    pub method: String,
    /// `None` stands for the return annotation.
    pub parameter: Option<String>,
}

impl AnnotationSite {
    pub fn parameter(interface: &str, method: &str, parameter: &str) -> Self {
        Self {
            interface: interface.to_owned(),
            method: method.to_owned(),
            parameter: Some(parameter.to_owned()),
        }
    }

    pub fn return_type(interface: &str, method: &str) -> Self {
        Self {
            interface: interface.to_owned(),
            method: method.to_owned(),
            parameter: None,
        }
    }
}

impl fmt::Display for AnnotationSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parameter {
            Some(parameter) => write!(
                f,
                "parameter `{}` of `{}::{}`",
                parameter, self.interface, self.method
            ),
            None => write!(f, "return type of `{}::{}`", self.interface, self.method),
        }
    }
}

/// Errors raised while extracting signatures or binding an interface.
///
/// These are fatal for the whole binding and never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    #[error("cannot resolve type `{name}` in {site}")]
    UnresolvedType { site: AnnotationSite, name: String },

    #[error("invalid annotation in {site}: {reason}")]
    InvalidAnnotation { site: AnnotationSite, reason: String },

    #[error("`{interface}` declares method `{method}` more than once")]
    DuplicateMethod { interface: String, method: String },

    #[error("`{interface}` declares no method `{method}`")]
    UnknownMethod { interface: String, method: String },

    #[error("`{interface}::{method}` is missing required metadata: {what}")]
    MissingMetadata {
        interface: String,
        method: String,
        what: String,
    },

    #[error("invalid schema for `{type_name}`: {reason}")]
    InvalidSchema { type_name: String, reason: String },

    #[error("internal binding error: {0}")]
    Internal(String),
}

/// Call-time argument binding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("{method}() takes {expected} positional arguments but {given} were given")]
    TooManyPositional {
        method: String,
        expected: usize,
        given: usize,
    },

    #[error("{method}() got an unexpected keyword argument `{name}`")]
    UnexpectedKeyword { method: String, name: String },

    #[error("{method}() got multiple values for argument `{name}`")]
    MultipleValues { method: String, name: String },

    #[error("{method}() missing required argument `{name}`")]
    Missing { method: String, name: String },
}

/// A marker could not be applied to a request or a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkerError {
    #[error("`{marker}` cannot be applied to this request, expected `{expected}`")]
    UnsupportedRequest {
        marker: &'static str,
        expected: &'static str,
    },

    #[error("`{marker}` cannot read this response, expected `{expected}`")]
    UnsupportedResponse {
        marker: &'static str,
        expected: &'static str,
    },

    #[error("`{marker}` expects {expected}, got `{found}`")]
    UnexpectedValue {
        marker: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("key `{key}` is missing from the payload")]
    MissingKey { key: String },

    #[error("template `{template}` refers to unknown argument `{placeholder}`")]
    UnknownPlaceholder {
        template: String,
        placeholder: String,
    },

    #[error("malformed template `{template}`")]
    MalformedTemplate { template: String },
}

/// One schema violation found while validating a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer into the payload, empty for the root.
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// The payload does not match the declared result type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payload does not match `{type_name}`: {}", join_issues(.issues))]
pub struct ValidationError {
    pub type_name: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(type_name: impl Into<String>, issues: Vec<ValidationIssue>) -> Self {
        Self {
            type_name: type_name.into(),
            issues,
        }
    }

    /// Wrap a serde conversion failure into the typed result `T`.
    pub fn deserialize<T: ?Sized>(err: &serde_json::Error) -> Self {
        Self::new(
            std::any::type_name::<T>(),
            vec![ValidationIssue {
                path: String::new(),
                message: err.to_string(),
            }],
        )
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Cooperative cancellation signal.
///
/// Backends never wrap it into a [`BackendError`]; it surfaces as [`Error::Cancelled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Uniform envelope for anything that went wrong inside a backend.
#[derive(Debug, Error)]
#[error("backend error: {inner}")]
pub struct BackendError {
    #[source]
    inner: BoxError,
}

impl BackendError {
    pub fn new(inner: impl Into<BoxError>) -> Self {
        Self {
            inner: inner.into(),
        }
    }

    /// The wrapped backend client error.
    pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.inner.as_ref()
    }

    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }

    pub fn into_inner(self) -> BoxError {
        self.inner
    }

    /// Convert a backend client result, wrapping the failure unless it is a cancellation.
    pub fn guard<T, E>(result: std::result::Result<T, E>) -> Result<T>
    where
        E: Into<BoxError>,
    {
        result.map_err(|err| Error::from_backend(err.into()))
    }
}

/// Top-level error returned by bound service calls.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Arguments(#[from] ArgumentError),

    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("`{interface}` has no method `{method}`")]
    UnknownMethod { interface: String, method: String },

    #[error("service method bound to `{expected}` was called with another receiver")]
    Receiver { expected: &'static str },

    #[error("call was cancelled")]
    Cancelled,
}

impl Error {
    /// Classify an opaque backend failure.
    pub fn from_backend(inner: BoxError) -> Self {
        if is_cancellation(inner.as_ref()) {
            Error::Cancelled
        } else {
            Error::Backend(BackendError { inner })
        }
    }

    /// Same as [`Error::from_backend`] for causes carried as `anyhow::Error`.
    pub fn from_anyhow(inner: anyhow::Error) -> Self {
        if inner.chain().any(|cause| is_cancellation_cause(cause)) {
            Error::Cancelled
        } else {
            Error::Backend(BackendError {
                inner: inner.into(),
            })
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<Cancelled> for Error {
    fn from(_: Cancelled) -> Self {
        Error::Cancelled
    }
}

fn is_cancellation(err: &(dyn StdError + Send + Sync + 'static)) -> bool {
    if let Some(join) = err.downcast_ref::<tokio::task::JoinError>() {
        return join.is_cancelled();
    }
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(cause) = current {
        if is_cancellation_cause(cause) {
            return true;
        }
        current = cause.source();
    }
    false
}

fn is_cancellation_cause(cause: &(dyn StdError + 'static)) -> bool {
    cause.is::<Cancelled>()
        || cause
            .downcast_ref::<tokio::task::JoinError>()
            .is_some_and(tokio::task::JoinError::is_cancelled)
}
