//! Error types for dependency injection

use thiserror::Error;

/// Semantic category of a [`DiError`].
///
/// Callers that need differentiated recovery should match on the kind rather
/// than on individual variants: a `NotFound` means "try another source", a
/// `Container` error means the container is misconfigured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The requested identifier, type or signature does not exist
    NotFound,
    /// Configuration or contract violation
    Container,
    /// An argument could not be produced or has the wrong shape
    InvalidArgument,
}

/// Errors that can occur during dependency injection operations
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// Identifier is unknown to definitions, providers and delegates
    #[error("Service ({id}) not found")]
    NotFound { id: String },

    /// `modify` targeted an identifier that was never added
    #[error("Service ({id}) can not be modified, as it is not found")]
    NotModifiable { id: String },

    /// The autowire resolver was asked for a type it does not know
    #[error("Service ({id}) is not an existing class and therefore cannot be resolved")]
    UnknownClass { id: String },

    /// An injected name points at a signature whose target is gone
    #[error("Signature for call ({name}) not found")]
    SignatureNotFound { name: String },

    /// A provider claimed an identifier but registered nothing under it
    #[error("Service provider lied to provide ({id}) service")]
    ProviderLied { id: String },

    /// Provider registration was requested for an unclaimed identifier
    #[error("Service ({id}) is not provided by any provider")]
    NotProvided { id: String },

    /// `inject` was called with an unknown signature
    #[error("Signature ({signature}) is not valid")]
    InvalidSignature { signature: String },

    /// `invoke` was called with a name nothing was injected under
    #[error("Calling ({name}) not injected")]
    NotInjected { name: String },

    /// A named method does not exist on the target
    #[error("Method ({method}) is not callable on {target}")]
    MethodNotFound { target: String, method: String },

    /// Known type that cannot be constructed
    #[error("Class ({id}) is not instantiable")]
    NotInstantiable { id: String },

    /// Circular dependency detected during resolution
    #[error("Circular dependency detected while resolving: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// Resolved value is not of the requested Rust type
    #[error("Service ({id}) is not of type {expected}")]
    TypeMismatch { id: String, expected: &'static str },

    /// Constructor, factory or method failed
    #[error("Failed to create service {id}: {reason}")]
    CreationFailed { id: String, reason: String },

    /// Delegate needs a container but is not attached to a live one
    #[error("No container attached (never set or already dropped)")]
    NoContainer,

    /// Argument cannot be produced or has the wrong type
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Autowiring exhausted every fallback for a parameter
    #[error("Cannot resolve the dependency: {param} (in {class})")]
    UnresolvedDependency { class: String, param: String },
}

impl DiError {
    /// Create a NotFound error for an identifier
    #[inline]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a CreationFailed error
    #[inline]
    pub fn creation_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CreationFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidArgument error
    #[inline]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// Create a MethodNotFound error
    #[inline]
    pub fn method_not_found(target: impl Into<String>, method: impl Into<String>) -> Self {
        Self::MethodNotFound {
            target: target.into(),
            method: method.into(),
        }
    }

    /// The semantic kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. }
            | Self::NotModifiable { .. }
            | Self::UnknownClass { .. }
            | Self::SignatureNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) | Self::UnresolvedDependency { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::ProviderLied { .. }
            | Self::NotProvided { .. }
            | Self::InvalidSignature { .. }
            | Self::NotInjected { .. }
            | Self::MethodNotFound { .. }
            | Self::NotInstantiable { .. }
            | Self::CircularDependency { .. }
            | Self::TypeMismatch { .. }
            | Self::CreationFailed { .. }
            | Self::NoContainer => ErrorKind::Container,
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    #[inline]
    pub fn is_container_error(&self) -> bool {
        self.kind() == ErrorKind::Container
    }

    #[inline]
    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;
