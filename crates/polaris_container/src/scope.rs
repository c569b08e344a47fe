//! Resolution scopes.
//!
//! A [`Scope`] is a bounded resolution context. It owns the instances of
//! [`Lifetime::Scoped`] declarations resolved through it, and tracks every
//! disposable instance it creates so that [`Scope::dispose`] can release them.
//!
//! ```text
//! Container
//!    │
//!    ├── root scope      (singletons live here)
//!    │
//!    ├── Scope A         (scoped instances of A, transients created by A)
//!    └── Scope B         (scoped instances of B, transients created by B)
//! ```
//!
//! # Lifetime policy
//!
//! | Lifetime | Resolved at | Cached in | Tracked for disposal by |
//! |----------|-------------|-----------|-------------------------|
//! | Transient | any scope | nowhere | the resolving scope |
//! | Scoped | any scope | the resolving scope | the resolving scope |
//! | Singleton | root scope | the root scope | the root scope |
//! | Singleton | child scope | forwarded to the root scope | the root scope |
//!
//! # Concurrency
//!
//! Instances are constructed outside of any lock, so a constructor may resolve
//! further services from the same scope. Two threads resolving the same
//! scoped declaration for the first time may both construct an instance: only
//! the first one stored is ever returned, but both are tracked for disposal.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::container::ContainerInner;
use crate::declaration::{DeclarationId, Lifetime, ServiceDeclaration};
use crate::dispose::{DisposeError, Release};
use crate::error::ResolveError;
use crate::instance::{Instance, ServiceCollection};
use crate::key::ServiceKey;

/// Something services can be resolved from.
///
/// Implemented by [`Scope`] and [`Container`](crate::container::Container).
/// Activation functions and factories receive the resolving scope as a
/// `&dyn Resolver`.
pub trait Resolver {
    /// Resolves the service registered under `service`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if no declaration matches, the owner is
    /// disposed, or constructing the instance fails.
    fn resolve(&self, service: &ServiceKey) -> Result<Instance, ResolveError>;

    /// Resolves a specific declaration, applying its lifetime policy.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if constructing the instance fails.
    fn resolve_declaration(
        &self,
        declaration: &Arc<ServiceDeclaration>,
    ) -> Result<Instance, ResolveError>;
}

/// Typed resolution helpers, available on every [`Resolver`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use polaris_container::prelude::*;
///
/// trait Clock: Send + Sync { fn now(&self) -> u64; }
/// struct Fixed;
/// impl Clock for Fixed { fn now(&self) -> u64 { 42 } }
///
/// let container = ContainerBuilder::new()
///     .add_instance(
///         ServiceKey::of::<dyn Clock>(),
///         Instance::new::<dyn Clock>(Arc::new(Fixed)),
///     )
///     .build()
///     .unwrap();
///
/// let scope = container.create_scope().unwrap();
/// let clock = scope.get::<dyn Clock>().unwrap();
/// assert_eq!(clock.now(), 42);
/// ```
pub trait ResolverExt: Resolver {
    /// Resolves `S` and downcasts it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TypeMismatch`] if the instance registered under
    /// `S` was created as another type, or any resolution error.
    fn get<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, ResolveError> {
        let service = ServiceKey::of::<S>();
        let instance = self.resolve(&service)?;
        downcast(&service, &instance)
    }

    /// Resolves every registration of `S`, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::AmbiguousCollection`] if `S` does not have
    /// multiple registrations, or any resolution error.
    fn get_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, ResolveError> {
        let service = ServiceKey::collection::<S>();
        let instance = self.resolve(&service)?;
        let collection: Arc<ServiceCollection> = downcast(&service, &instance)?;
        collection
            .iter()
            .map(|item| downcast(&service, item))
            .collect()
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

fn downcast<S: ?Sized + Send + Sync + 'static>(
    service: &ServiceKey,
    instance: &Instance,
) -> Result<Arc<S>, ResolveError> {
    instance
        .downcast::<S>()
        .ok_or_else(|| ResolveError::TypeMismatch {
            service: service.clone(),
            expected: core::any::type_name::<S>(),
            found: instance.service_name(),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope state
// ─────────────────────────────────────────────────────────────────────────────

/// State owned by one scope.
#[derive(Default)]
pub(crate) struct ScopeState {
    /// Scoped instances (singletons for the root scope).
    instances: RwLock<HashMap<DeclarationId, Instance>>,
    /// Append-only until disposal drains it.
    disposables: Mutex<Vec<Release>>,
    disposed: AtomicBool,
}

impl ScopeState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn cached(&self, id: DeclarationId) -> Option<Instance> {
        self.instances.read().get(&id).cloned()
    }

    /// Stores `instance` unless another one got there first; returns the stored one.
    fn store(&self, id: DeclarationId, instance: Instance) -> Instance {
        self.instances.write().entry(id).or_insert(instance).clone()
    }

    /// Tracks `release` unless the scope is already disposed.
    ///
    /// Returns `false` when the scope was disposed first.
    fn track(&self, release: &Release) -> bool {
        let mut disposables = self.disposables.lock();
        if self.is_disposed() {
            return false;
        }
        disposables.push(release.clone());
        true
    }

    /// Marks the scope disposed and takes every tracked release, last created first.
    fn drain(&self) -> Vec<Release> {
        let mut disposables = self.disposables.lock();
        self.disposed.store(true, Ordering::SeqCst);
        let mut tracked = core::mem::take(&mut *disposables);
        drop(disposables);
        tracked.reverse();
        tracked
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn tracked(&self) -> usize {
        self.disposables.lock().len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cycle detection
// ─────────────────────────────────────────────────────────────────────────────

thread_local! {
    /// Declarations currently being constructed on this thread, outermost first.
    static CONSTRUCTING: RefCell<Vec<(DeclarationId, ServiceKey)>> =
        const { RefCell::new(Vec::new()) };
}

/// Marks a declaration as under construction for the current thread.
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(declaration: &ServiceDeclaration) -> Result<Self, ResolveError> {
        CONSTRUCTING.with_borrow_mut(|stack| {
            if stack.iter().any(|(id, _)| *id == declaration.id()) {
                let mut path: Vec<String> = stack.iter().map(|(_, key)| key.to_string()).collect();
                path.push(declaration.service().to_string());
                return Err(ResolveError::CircularDependency { path });
            }
            stack.push((declaration.id(), declaration.service().clone()));
            Ok(Self)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scope
// ─────────────────────────────────────────────────────────────────────────────

/// A nested resolution context.
///
/// Created by [`Container::create_scope`](crate::container::Container::create_scope).
/// A scope holds a reference to its container's shared state but never
/// disposes the container.
pub struct Scope {
    container: Arc<ContainerInner>,
    state: Arc<ScopeState>,
}

impl Scope {
    pub(crate) fn new(container: Arc<ContainerInner>, state: Arc<ScopeState>) -> Self {
        Self { container, state }
    }

    /// Returns `true` if this is the container's root scope.
    #[must_use]
    pub fn is_root(&self) -> bool {
        Arc::ptr_eq(&self.state, self.container.root_state())
    }

    /// Returns `true` once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Returns the number of instances currently tracked for disposal.
    #[must_use]
    pub fn tracked_disposables(&self) -> usize {
        self.state.tracked()
    }

    /// Resolves the service registered under `service`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::ContainerDisposed`] if the container is disposed
    /// - [`ResolveError::ScopeDisposed`] if this scope is disposed
    /// - any error from finding the declaration or constructing the instance
    pub fn resolve(&self, service: &ServiceKey) -> Result<Instance, ResolveError> {
        if self.container.is_disposed() {
            return Err(ResolveError::ContainerDisposed);
        }
        if self.state.is_disposed() {
            return Err(ResolveError::ScopeDisposed);
        }
        let declaration = self.container.find_declaration(service)?;
        self.resolve_declaration(&declaration)
    }

    /// Resolves a declaration according to its lifetime.
    ///
    /// # Errors
    ///
    /// Returns any error from constructing the instance.
    pub fn resolve_declaration(
        &self,
        declaration: &Arc<ServiceDeclaration>,
    ) -> Result<Instance, ResolveError> {
        match declaration.lifetime() {
            Lifetime::Transient => self.create(declaration),
            Lifetime::Scoped => self.create_cached(declaration),
            Lifetime::Singleton if self.is_root() => self.create_cached(declaration),
            Lifetime::Singleton => self.root().resolve_declaration(declaration),
        }
    }

    fn root(&self) -> Scope {
        Scope::new(
            Arc::clone(&self.container),
            Arc::clone(self.container.root_state()),
        )
    }

    fn create_cached(&self, declaration: &ServiceDeclaration) -> Result<Instance, ResolveError> {
        if let Some(instance) = self.state.cached(declaration.id()) {
            return Ok(instance);
        }
        let created = self.create(declaration)?;
        Ok(self.state.store(declaration.id(), created))
    }

    fn create(&self, declaration: &ServiceDeclaration) -> Result<Instance, ResolveError> {
        let _guard = ConstructionGuard::enter(declaration)?;
        let instance = self.container.activate(declaration, self)?;
        let accepted = match instance.release() {
            Some(release) => {
                tracing::trace!(
                    service = %declaration.service(),
                    root = self.is_root(),
                    "tracking disposable instance"
                );
                self.state.track(release)
            }
            None => !self.state.is_disposed(),
        };
        if accepted {
            return Ok(instance);
        }

        // The scope was disposed while this instance was being built.
        tracing::debug!(
            service = %declaration.service(),
            "releasing instance of a disposed scope"
        );
        if let Some(Err(error)) = instance.release().map(Release::release) {
            tracing::warn!(service = error.service, %error, "late instance release failed");
        }
        Err(ResolveError::ScopeDisposed)
    }

    /// Releases every instance tracked by this scope and marks it disposed.
    ///
    /// Instances are released last created first, each exactly once.
    /// Async-only instances are blocked on.
    ///
    /// # Errors
    ///
    /// Returns the first [`DisposeError`]. Instances after the failing one are
    /// not released.
    pub fn dispose(&self) -> Result<(), DisposeError> {
        let tracked = self.state.drain();
        tracing::debug!(count = tracked.len(), root = self.is_root(), "disposing scope");
        for release in tracked {
            release.release().inspect_err(|error| {
                tracing::warn!(service = error.service, %error, "scope disposal stopped");
            })?;
        }
        Ok(())
    }

    /// Asynchronously releases every instance tracked by this scope and marks it disposed.
    ///
    /// Sync-only instances are released synchronously.
    ///
    /// # Errors
    ///
    /// Returns the first [`DisposeError`]. Instances after the failing one are
    /// not released.
    pub async fn dispose_async(&self) -> Result<(), DisposeError> {
        let tracked = self.state.drain();
        tracing::debug!(
            count = tracked.len(),
            root = self.is_root(),
            "disposing scope asynchronously"
        );
        for release in tracked {
            release.release_async().await.inspect_err(|error| {
                tracing::warn!(service = error.service, %error, "scope disposal stopped");
            })?;
        }
        Ok(())
    }
}

impl Resolver for Scope {
    fn resolve(&self, service: &ServiceKey) -> Result<Instance, ResolveError> {
        Scope::resolve(self, service)
    }

    fn resolve_declaration(
        &self,
        declaration: &Arc<ServiceDeclaration>,
    ) -> Result<Instance, ResolveError> {
        Scope::resolve_declaration(self, declaration)
    }
}

impl core::fmt::Debug for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scope")
            .field("root", &self.is_root())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
