use crate::{
    collection::CollectionError, dependency::DependencyError, key::KeyError,
    lifecycle::LifecycleError, storage::StorageError, urn::PathError,
};
use std::fmt;
use thiserror::Error as ThisError;

/// Boxed failure returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

///
/// Error
///
/// Structured error with a stable classification.
/// `class` separates "absent" from "illegal"; `detail` carries the typed
/// per-module error so callers can match on the exact failure.
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// The variant (if present) must correspond to `origin`.
    pub detail: Option<ErrorDetail>,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            detail: None,
        }
    }

    /// Construct a configuration error.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Config, ErrorOrigin::Config, message)
    }

    /// Wrap an external collaborator failure.
    pub(crate) fn external(
        origin: ErrorOrigin,
        operation: &'static str,
        target: impl Into<String>,
        source: BoxError,
    ) -> Self {
        let err = ExternalError {
            operation,
            target: target.into(),
            source,
        };

        Self {
            class: ErrorClass::External,
            origin,
            message: err.to_string(),
            detail: Some(ErrorDetail::External(err)),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_state(&self) -> bool {
        matches!(self.class, ErrorClass::State)
    }

    /// Return the collaborator failure wrapped by an `External` error.
    #[must_use]
    pub fn external_cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.detail {
            Some(ErrorDetail::External(err)) => Some(err.source.as_ref()),
            _ => None,
        }
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }

    fn classified(detail: ErrorDetail, class: ErrorClass, origin: ErrorOrigin) -> Self {
        Self {
            class,
            origin,
            message: detail.to_string(),
            detail: Some(detail),
        }
    }
}

///
/// ErrorDetail
///

#[derive(Debug, ThisError)]
pub enum ErrorDetail {
    #[error("{0}")]
    Key(KeyError),

    #[error("{0}")]
    Path(PathError),

    #[error("{0}")]
    Storage(StorageError),

    #[error("{0}")]
    Collection(CollectionError),

    #[error("{0}")]
    Lifecycle(LifecycleError),

    #[error("{0}")]
    Dependency(DependencyError),

    #[error("{0}")]
    External(ExternalError),
}

///
/// ExternalError
///
/// A populator, resolver, discovery or executor failure, re-signaled once
/// with its original cause attached.
///

#[derive(Debug, ThisError)]
#[error("operation failed: {operation} '{target}': {source}")]
pub struct ExternalError {
    pub operation: &'static str,
    pub target: String,
    #[source]
    pub source: BoxError,
}

macro_rules! impl_from_detail {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Error {
            fn from(err: $ty) -> Self {
                let (class, origin) = (err.class(), err.origin());
                Self::classified(ErrorDetail::$variant(err), class, origin)
            }
        }
    };
}

impl_from_detail!(KeyError, Key);
impl_from_detail!(PathError, Path);
impl_from_detail!(StorageError, Storage);
impl_from_detail!(CollectionError, Collection);
impl_from_detail!(LifecycleError, Lifecycle);
impl_from_detail!(DependencyError, Dependency);

///
/// ErrorClass
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Missing, null or duplicate identity; unknown anchor.
    Identity,
    /// The addressed object or position does not exist.
    NotFound,
    /// The operation is illegal in the current lock or lifecycle state.
    State,
    /// The dependency graph is inconsistent.
    Graph,
    /// A collaborator failed.
    External,
    Unsupported,
    Config,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Identity => "identity",
            Self::NotFound => "not_found",
            Self::State => "state",
            Self::Graph => "graph",
            Self::External => "external",
            Self::Unsupported => "unsupported",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Key,
    Path,
    Storage,
    Collection,
    Lifecycle,
    Dependency,
    Populator,
    Resolver,
    Discovery,
    Executor,
    Config,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Key => "key",
            Self::Path => "path",
            Self::Storage => "storage",
            Self::Collection => "collection",
            Self::Lifecycle => "lifecycle",
            Self::Dependency => "dependency",
            Self::Populator => "populator",
            Self::Resolver => "resolver",
            Self::Discovery => "discovery",
            Self::Executor => "executor",
            Self::Config => "config",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn external_error_keeps_original_cause() {
        let cause: BoxError = Box::new(io::Error::other("connection reset"));
        let err = Error::external(ErrorOrigin::Populator, "populate", "Server[@Name='s']", cause);

        assert_eq!(err.class, ErrorClass::External);
        assert_eq!(err.origin, ErrorOrigin::Populator);
        assert!(err.message.starts_with("operation failed: populate"));
        assert_eq!(
            err.external_cause().map(ToString::to_string).as_deref(),
            Some("connection reset")
        );
    }

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err = Error::config("bad kind");

        assert_eq!(err.display_with_class(), "config:config: bad kind");
        assert!(!err.is_not_found());
        assert!(!err.is_state());
    }
}
