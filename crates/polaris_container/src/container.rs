//! The service container.
//!
//! A [`Container`] is built once from an ordered list of declarations and an
//! [`ActivationBuilder`]. It owns:
//!
//! - the declaration registry (see [`find_declaration`](Container::find_declaration))
//! - the activation cache, one [`Activation`] per declaration
//! - the root scope, which holds singletons
//!
//! Every container is also a root scope: [`Container::resolve`] and its
//! [`Resolver`] impl delegate to it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use polaris_container::prelude::*;
//!
//! trait Counter: Send + Sync { fn value(&self) -> u32; }
//! struct Zero;
//! impl Counter for Zero { fn value(&self) -> u32 { 0 } }
//!
//! let container = Container::build(
//!     [ServiceDeclaration::factory_bound(
//!         ServiceKey::of::<dyn Counter>(),
//!         Lifetime::Singleton,
//!         |_| Ok(Instance::new::<dyn Counter>(Arc::new(Zero))),
//!     )],
//!     ActivationStrategy::default().builder(),
//! )
//! .unwrap();
//!
//! let a = container.get::<dyn Counter>().unwrap();
//! let b = container.create_scope().unwrap().get::<dyn Counter>().unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::activation::{Activation, ActivationBuilder};
use crate::builder::{ContainerBuilder, DuplicatePolicy};
use crate::declaration::{Binding, DeclarationId, ServiceDeclaration};
use crate::dispose::DisposeError;
use crate::error::ResolveError;
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::registry::{Registry, resolve_members};
use crate::scope::{Resolver, Scope, ScopeState};

/// State shared by a container and every scope created from it.
pub(crate) struct ContainerInner {
    registry: Registry,
    activations: RwLock<HashMap<DeclarationId, Activation>>,
    activation_builder: Arc<dyn ActivationBuilder>,
    root: Arc<ScopeState>,
    disposed: AtomicBool,
}

impl ContainerInner {
    pub(crate) fn root_state(&self) -> &Arc<ScopeState> {
        &self.root
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn find_declaration(
        &self,
        service: &ServiceKey,
    ) -> Result<Arc<ServiceDeclaration>, ResolveError> {
        self.registry.find(service)
    }

    /// Returns the cached activation of `declaration`, building it on a miss.
    ///
    /// The build runs outside the lock. Two threads missing at once both
    /// build; the last one stored is kept.
    fn activation(&self, declaration: &ServiceDeclaration) -> Result<Activation, ResolveError> {
        if let Some(activation) = self.activations.read().get(&declaration.id()) {
            return Ok(Arc::clone(activation));
        }

        let activation: Activation = match declaration.binding() {
            Binding::Instance(instance) => {
                let instance = instance.clone();
                Arc::new(move |_: &dyn Resolver| -> Result<Instance, ResolveError> {
                    Ok(instance.clone())
                })
            }
            Binding::Factory(factory) => Arc::clone(factory),
            Binding::Type(_) => {
                tracing::debug!(
                    service = %declaration.service(),
                    declaration = %declaration.id(),
                    "building activation"
                );
                self.activation_builder.build_activation(declaration)?
            }
            Binding::Multi(members) => {
                let members = Arc::clone(members);
                Arc::new(move |resolver: &dyn Resolver| resolve_members(resolver, &members))
            }
        };

        self.activations
            .write()
            .insert(declaration.id(), Arc::clone(&activation));
        Ok(activation)
    }

    /// Runs the activation of `declaration` with `resolver` resolving its dependencies.
    pub(crate) fn activate(
        &self,
        declaration: &ServiceDeclaration,
        resolver: &dyn Resolver,
    ) -> Result<Instance, ResolveError> {
        let activation = self.activation(declaration)?;
        activation(resolver)
    }
}

/// A built service container.
///
/// `Container` is `Send + Sync`; share it behind an `Arc` to resolve from
/// several threads.
pub struct Container {
    inner: Arc<ContainerInner>,
    root: Scope,
}

impl Container {
    /// Builds a container with the default duplicate policy.
    ///
    /// Declarations registered under the same key are grouped in
    /// registration order. See [`ContainerBuilder`] for a typed way to
    /// assemble the declaration list.
    ///
    /// # Errors
    ///
    /// Never fails under [`DuplicatePolicy::Fold`]; the `Result` mirrors
    /// [`ContainerBuilder::build`].
    pub fn build(
        declarations: impl IntoIterator<Item = ServiceDeclaration>,
        activation_builder: Arc<dyn ActivationBuilder>,
    ) -> Result<Self, ResolveError> {
        Self::with_policy(declarations, activation_builder, DuplicatePolicy::default())
    }

    pub(crate) fn with_policy(
        declarations: impl IntoIterator<Item = ServiceDeclaration>,
        activation_builder: Arc<dyn ActivationBuilder>,
        duplicates: DuplicatePolicy,
    ) -> Result<Self, ResolveError> {
        let registry = Registry::build(declarations, duplicates)?;
        let root = Arc::new(ScopeState::new());
        let inner = Arc::new(ContainerInner {
            registry,
            activations: RwLock::new(HashMap::new()),
            activation_builder,
            root: Arc::clone(&root),
            disposed: AtomicBool::new(false),
        });
        tracing::debug!(?duplicates, "container built");
        Ok(Self {
            root: Scope::new(Arc::clone(&inner), root),
            inner,
        })
    }

    /// Starts a [`ContainerBuilder`].
    #[must_use]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Finds the declaration `service` resolves with.
    ///
    /// Exact registrations win; a key registered several times resolves to
    /// its last registration. Otherwise:
    ///
    /// - `Collection(T)` gets a synthesized collection over every
    ///   registration of `T` (specializing open generic members when `T` is
    ///   constructed)
    /// - a constructed generic key gets its family's open declaration,
    ///   specialized with the key's type arguments
    ///
    /// Synthesized declarations are cached, so repeated lookups return the
    /// same declaration.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::ServiceNotFound`] if nothing matches
    /// - [`ResolveError::AmbiguousCollection`] if `T` is not multiply registered
    /// - [`ResolveError::InvalidGenericBinding`] if specialization is not possible
    pub fn find_declaration(
        &self,
        service: &ServiceKey,
    ) -> Result<Arc<ServiceDeclaration>, ResolveError> {
        self.inner.find_declaration(service)
    }

    /// Returns the activation function of `declaration`, building it once.
    ///
    /// # Errors
    ///
    /// Returns any error from the [`ActivationBuilder`].
    pub fn activation(&self, declaration: &ServiceDeclaration) -> Result<Activation, ResolveError> {
        self.inner.activation(declaration)
    }

    /// Creates a child scope.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ContainerDisposed`] after [`dispose`](Self::dispose).
    pub fn create_scope(&self) -> Result<Scope, ResolveError> {
        if self.is_disposed() {
            return Err(ResolveError::ContainerDisposed);
        }
        tracing::trace!("scope created");
        Ok(Scope::new(Arc::clone(&self.inner), Arc::new(ScopeState::new())))
    }

    /// Returns the root scope.
    #[must_use]
    pub fn root_scope(&self) -> &Scope {
        &self.root
    }

    /// Resolves `service` from the root scope.
    ///
    /// # Errors
    ///
    /// See [`Scope::resolve`].
    pub fn resolve(&self, service: &ServiceKey) -> Result<Instance, ResolveError> {
        self.root.resolve(service)
    }

    /// Returns `true` once [`dispose`](Self::dispose) has completed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    /// Disposes the root scope, then marks the container disposed.
    ///
    /// Scopes created from this container are not disposed; they only start
    /// failing with [`ResolveError::ContainerDisposed`].
    ///
    /// # Errors
    ///
    /// Returns the first [`DisposeError`] from the root scope. The container
    /// is not marked disposed in that case.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        self.root.dispose()?;
        self.inner.disposed.store(true, Ordering::SeqCst);
        tracing::debug!("container disposed");
        Ok(())
    }

    /// Asynchronously disposes the root scope, then marks the container disposed.
    ///
    /// # Errors
    ///
    /// Returns the first [`DisposeError`] from the root scope.
    pub async fn dispose_async(&self) -> Result<(), DisposeError> {
        self.root.dispose_async().await?;
        self.inner.disposed.store(true, Ordering::SeqCst);
        tracing::debug!("container disposed");
        Ok(())
    }
}

impl Resolver for Container {
    fn resolve(&self, service: &ServiceKey) -> Result<Instance, ResolveError> {
        self.root.resolve(service)
    }

    fn resolve_declaration(
        &self,
        declaration: &Arc<ServiceDeclaration>,
    ) -> Result<Instance, ResolveError> {
        self.root.resolve_declaration(declaration)
    }
}

impl core::fmt::Debug for Container {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Container")
            .field("registry", &self.inner.registry)
            .field("activations", &self.inner.activations.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
