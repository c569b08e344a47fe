//! Service declarations.
//!
//! A [`ServiceDeclaration`] is the immutable record the engine resolves from:
//! the key callers ask for, a [`Lifetime`], and one of four [`Binding`]s.
//!
//! | Binding | Produces | Lifetime |
//! |---------|----------|----------|
//! | [`Binding::Type`] | a constructed [`Implementation`] | any |
//! | [`Binding::Factory`] | whatever the factory returns | any |
//! | [`Binding::Instance`] | a pre-built value | always [`Lifetime::Singleton`] |
//! | [`Binding::Multi`] | every member, as a collection | always [`Lifetime::Transient`] |
//!
//! Each declaration gets a unique [`DeclarationId`] when it is created. All
//! engine caches (activation functions, scoped and singleton instances) are
//! keyed by that identity, never by value.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::ResolveError;
use crate::implementation::{Implementation, ImplementationType};
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::scope::Resolver;

/// Function producing an instance from a resolver.
pub type Factory = Arc<dyn Fn(&dyn Resolver) -> Result<Instance, ResolveError> + Send + Sync>;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// A new instance on every resolution.
    #[default]
    Transient,
    /// One instance per scope.
    Scoped,
    /// One instance per container, owned by the root scope.
    Singleton,
}

/// Identity of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId(u64);

impl DeclarationId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DeclarationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a declaration produces its instance.
#[derive(Clone)]
pub enum Binding {
    /// Construct an implementation type, resolving its constructor parameters.
    Type(Implementation),
    /// Call a factory.
    Factory(Factory),
    /// Return a fixed instance.
    Instance(Instance),
    /// Resolve every member, in registration order.
    Multi(Arc<[Arc<ServiceDeclaration>]>),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(implementation) => f.debug_tuple("Type").field(implementation).finish(),
            Self::Factory(_) => f.write_str("Factory"),
            Self::Instance(instance) => f.debug_tuple("Instance").field(instance).finish(),
            Self::Multi(members) => f.debug_tuple("Multi").field(&members.len()).finish(),
        }
    }
}

/// A registered description of how to produce a service and for how long.
#[derive(Debug)]
pub struct ServiceDeclaration {
    id: DeclarationId,
    service: ServiceKey,
    lifetime: Lifetime,
    binding: Binding,
}

impl ServiceDeclaration {
    fn new(service: ServiceKey, lifetime: Lifetime, binding: Binding) -> Self {
        Self {
            id: DeclarationId::next(),
            service,
            lifetime,
            binding,
        }
    }

    /// Binds `service` to an implementation type.
    #[must_use]
    pub fn type_bound(
        service: ServiceKey,
        implementation: impl Into<Implementation>,
        lifetime: Lifetime,
    ) -> Self {
        Self::new(service, lifetime, Binding::Type(implementation.into()))
    }

    /// Binds `service` to a factory.
    #[must_use]
    pub fn factory_bound<F>(service: ServiceKey, lifetime: Lifetime, factory: F) -> Self
    where
        F: Fn(&dyn Resolver) -> Result<Instance, ResolveError> + Send + Sync + 'static,
    {
        Self::new(service, lifetime, Binding::Factory(Arc::new(factory)))
    }

    /// Binds `service` to a fixed instance. The lifetime is always singleton.
    #[must_use]
    pub fn instance_bound(service: ServiceKey, instance: Instance) -> Self {
        Self::new(service, Lifetime::Singleton, Binding::Instance(instance))
    }

    /// Groups `members` under `service`. The lifetime is always transient.
    #[must_use]
    pub fn multi_bound(
        service: ServiceKey,
        members: impl IntoIterator<Item = Arc<ServiceDeclaration>>,
    ) -> Self {
        Self::new(
            service,
            Lifetime::Transient,
            Binding::Multi(members.into_iter().collect()),
        )
    }

    /// Returns the declaration identity.
    #[must_use]
    pub fn id(&self) -> DeclarationId {
        self.id
    }

    /// Returns the key the declaration is registered under.
    #[must_use]
    pub fn service(&self) -> &ServiceKey {
        &self.service
    }

    /// Returns the lifetime.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Returns the binding.
    #[must_use]
    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    /// Returns the members of a multi-bound declaration.
    #[must_use]
    pub fn members(&self) -> Option<&[Arc<ServiceDeclaration>]> {
        match &self.binding {
            Binding::Multi(members) => Some(members),
            _ => None,
        }
    }

    /// Returns the closed implementation type of a type-bound declaration.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidGenericBinding`] if the implementation is still open
    /// - [`ResolveError::NotTypeBound`] for any other binding
    pub fn implementation_type(&self) -> Result<&ImplementationType, ResolveError> {
        match &self.binding {
            Binding::Type(Implementation::Closed(ty)) => Ok(ty),
            Binding::Type(Implementation::Open(_)) => Err(ResolveError::InvalidGenericBinding {
                service: self.service.clone(),
                reason: "an open generic declaration cannot be activated directly",
            }),
            _ => Err(ResolveError::NotTypeBound(self.service.clone())),
        }
    }
}
