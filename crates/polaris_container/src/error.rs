//! Resolution errors.

use crate::key::ServiceKey;

/// Boxed error produced by user constructors, factories and release hooks.
pub type BoxError = Box<dyn core::error::Error + Send + Sync>;

/// Errors that can occur while building a container or resolving a service.
///
/// None of these are retried or caught inside the engine. A failure raised by
/// a constructor or factory is carried by [`ResolveError::Activation`] and
/// displays exactly as the original error.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No exact, specialized or synthesized declaration exists for the key.
    #[error("service not found: {0}")]
    ServiceNotFound(ServiceKey),

    /// A generic family cannot be specialized for the requested key.
    #[error("invalid generic binding for {service}: {reason}")]
    InvalidGenericBinding {
        /// The requested key.
        service: ServiceKey,
        /// Why the binding is unusable.
        reason: &'static str,
    },

    /// A collection was requested for a service without multiple registrations.
    #[error("cannot resolve {0}: the item service has no multi-registration")]
    AmbiguousCollection(ServiceKey),

    /// The implementation type has no public constructor.
    #[error("no eligible public constructor on {0}")]
    NoEligibleConstructor(&'static str),

    /// The implementation type has more than one public constructor.
    #[error("{count} public constructors on {implementation}, expected exactly one")]
    AmbiguousConstructor {
        /// The implementation type name.
        implementation: &'static str,
        /// Number of eligible constructors found.
        count: usize,
    },

    /// The container has been disposed.
    #[error("container has been disposed")]
    ContainerDisposed,

    /// The scope has been disposed.
    #[error("scope has been disposed")]
    ScopeDisposed,

    /// More than one declaration was registered for a key while duplicates are rejected.
    #[error("duplicate registration for {0}")]
    DuplicateRegistration(ServiceKey),

    /// An activation builder was given a declaration that is not type-bound.
    #[error("declaration for {0} is not bound to an implementation type")]
    NotTypeBound(ServiceKey),

    /// A declaration depends on itself, directly or transitively.
    #[error("circular dependency: {}", .path.join(" -> "))]
    CircularDependency {
        /// The chain of services being resolved, ending with the repeated one.
        path: Vec<String>,
    },

    /// A resolved instance is not of the requested Rust type.
    #[error("type mismatch for {service}: expected {expected}, found {found}")]
    TypeMismatch {
        /// The service key that was resolved.
        service: ServiceKey,
        /// The Rust type the caller asked for.
        expected: &'static str,
        /// The service type the instance was created as.
        found: &'static str,
    },

    /// A constructor requested an argument it does not declare.
    #[error("{implementation} has no constructor argument at index {index}")]
    MissingArgument {
        /// The implementation type name.
        implementation: &'static str,
        /// The requested argument index.
        index: usize,
    },

    /// A constructor or factory failed.
    #[error(transparent)]
    Activation(BoxError),
}

impl ResolveError {
    /// Wraps a constructor or factory failure.
    pub fn activation(error: impl Into<BoxError>) -> Self {
        Self::Activation(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_error_displays_root_cause() {
        let error = ResolveError::activation("connection refused");
        assert_eq!(error.to_string(), "connection refused");
    }

    #[test]
    fn circular_dependency_lists_path() {
        let error = ResolveError::CircularDependency {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(error.to_string(), "circular dependency: A -> B -> A");
    }
}
