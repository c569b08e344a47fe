//! Container configuration and assembly.
//!
//! [`ContainerBuilder`] collects declarations in registration order and
//! builds a [`Container`] with the configured [`ContainerOptions`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use polaris_container::prelude::*;
//!
//! trait Transport: Send + Sync { fn name(&self) -> &'static str; }
//!
//! struct Tcp;
//! impl Transport for Tcp { fn name(&self) -> &'static str { "tcp" } }
//!
//! impl Injectable for Tcp {
//!     fn implementation() -> ImplementationType {
//!         ImplementationType::new::<Tcp>([Constructor::from_fn(|(): ()| {
//!             Instance::new::<dyn Transport>(Arc::new(Tcp))
//!         })])
//!     }
//! }
//!
//! let container = ContainerBuilder::new()
//!     .with_strategy(ActivationStrategy::Interpreted)
//!     .add_scoped::<dyn Transport, Tcp>()
//!     .build()
//!     .unwrap();
//!
//! let scope = container.create_scope().unwrap();
//! assert_eq!(scope.get::<dyn Transport>().unwrap().name(), "tcp");
//! ```

use std::sync::Arc;

use crate::activation::{ActivationBuilder, ActivationStrategy};
use crate::container::Container;
use crate::declaration::{Lifetime, ServiceDeclaration};
use crate::error::ResolveError;
use crate::implementation::{Implementation, Injectable};
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::scope::Resolver;

/// What to do when a key is registered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Group the registrations: the key resolves to the last one and
    /// `Collection(key)` resolves to all of them.
    #[default]
    Fold,
    /// Fail the build with [`ResolveError::DuplicateRegistration`].
    Reject,
}

/// Options applied when a container is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContainerOptions {
    /// Built-in activation builder to use.
    pub strategy: ActivationStrategy,
    /// Handling of keys registered more than once.
    pub duplicates: DuplicatePolicy,
}

/// Collects declarations and builds a [`Container`].
#[derive(Default)]
pub struct ContainerBuilder {
    declarations: Vec<ServiceDeclaration>,
    options: ContainerOptions,
    /// Overrides `options.strategy` when set.
    activation_builder: Option<Arc<dyn ActivationBuilder>>,
}

impl ContainerBuilder {
    /// Creates an empty builder with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration.
    pub fn add(&mut self, declaration: ServiceDeclaration) -> &mut Self {
        self.declarations.push(declaration);
        self
    }

    /// Binds `service` to an implementation, closed or open generic.
    pub fn add_type(
        &mut self,
        service: ServiceKey,
        implementation: impl Into<Implementation>,
        lifetime: Lifetime,
    ) -> &mut Self {
        self.add(ServiceDeclaration::type_bound(service, implementation, lifetime))
    }

    /// Binds `S` to the transient implementation `I`.
    pub fn add_transient<S: ?Sized + 'static, I: Injectable>(&mut self) -> &mut Self {
        self.add_type(ServiceKey::of::<S>(), I::implementation(), Lifetime::Transient)
    }

    /// Binds `S` to the scoped implementation `I`.
    pub fn add_scoped<S: ?Sized + 'static, I: Injectable>(&mut self) -> &mut Self {
        self.add_type(ServiceKey::of::<S>(), I::implementation(), Lifetime::Scoped)
    }

    /// Binds `S` to the singleton implementation `I`.
    pub fn add_singleton<S: ?Sized + 'static, I: Injectable>(&mut self) -> &mut Self {
        self.add_type(ServiceKey::of::<S>(), I::implementation(), Lifetime::Singleton)
    }

    /// Binds `service` to a factory.
    pub fn add_factory<F>(
        &mut self,
        service: ServiceKey,
        lifetime: Lifetime,
        factory: F,
    ) -> &mut Self
    where
        F: Fn(&dyn Resolver) -> Result<Instance, ResolveError> + Send + Sync + 'static,
    {
        self.add(ServiceDeclaration::factory_bound(service, lifetime, factory))
    }

    /// Binds `service` to a pre-built singleton instance.
    pub fn add_instance(&mut self, service: ServiceKey, instance: Instance) -> &mut Self {
        self.add(ServiceDeclaration::instance_bound(service, instance))
    }

    /// Replaces the options.
    pub fn with_options(&mut self, options: ContainerOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Selects a built-in activation strategy.
    pub fn with_strategy(&mut self, strategy: ActivationStrategy) -> &mut Self {
        self.options.strategy = strategy;
        self
    }

    /// Sets the duplicate registration policy.
    pub fn with_duplicates(&mut self, duplicates: DuplicatePolicy) -> &mut Self {
        self.options.duplicates = duplicates;
        self
    }

    /// Uses a custom activation builder instead of the configured strategy.
    pub fn with_activation_builder(&mut self, builder: Arc<dyn ActivationBuilder>) -> &mut Self {
        self.activation_builder = Some(builder);
        self
    }

    /// Returns the number of declarations added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Returns `true` if no declarations were added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Builds the container, draining the added declarations.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::DuplicateRegistration`] under
    /// [`DuplicatePolicy::Reject`] if a key was added more than once.
    pub fn build(&mut self) -> Result<Container, ResolveError> {
        let activation_builder = self
            .activation_builder
            .clone()
            .unwrap_or_else(|| self.options.strategy.builder());
        tracing::debug!(
            declarations = self.declarations.len(),
            strategy = ?self.options.strategy,
            custom_builder = self.activation_builder.is_some(),
            "building container"
        );
        Container::with_policy(
            core::mem::take(&mut self.declarations),
            activation_builder,
            self.options.duplicates,
        )
    }
}

impl core::fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("declarations", &self.declarations.len())
            .field("options", &self.options)
            .field("custom_builder", &self.activation_builder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::PrecompiledActivationBuilder;
    use crate::implementation::{Constructor, ImplementationType};
    use crate::scope::ResolverExt;
    use core::sync::atomic::{AtomicUsize, Ordering};

    trait Sink: Send + Sync {
        fn id(&self) -> u8;
    }

    struct Null;
    impl Sink for Null {
        fn id(&self) -> u8 {
            0
        }
    }

    impl Injectable for Null {
        fn implementation() -> ImplementationType {
            ImplementationType::new::<Null>([Constructor::from_fn(|(): ()| {
                Instance::new::<dyn Sink>(Arc::new(Null))
            })])
        }
    }

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl ActivationBuilder for Counting {
        fn build_activation(
            &self,
            declaration: &ServiceDeclaration,
        ) -> Result<crate::activation::Activation, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            PrecompiledActivationBuilder.build_activation(declaration)
        }
    }

    #[test]
    fn lifetime_helpers_register_typed_declarations() {
        let mut builder = ContainerBuilder::new();
        builder
            .add_transient::<dyn Sink, Null>()
            .add_scoped::<dyn Sink, Null>()
            .add_singleton::<dyn Sink, Null>();

        assert_eq!(builder.len(), 3);
        let container = builder.build().unwrap();
        assert!(builder.is_empty());

        let sinks = container.get_all::<dyn Sink>().unwrap();
        assert_eq!(sinks.len(), 3);
        assert!(sinks.iter().all(|sink| sink.id() == 0));
    }

    #[test]
    fn reject_policy_is_applied() {
        let result = ContainerBuilder::new()
            .with_duplicates(DuplicatePolicy::Reject)
            .add_transient::<dyn Sink, Null>()
            .add_transient::<dyn Sink, Null>()
            .build();

        assert!(matches!(result, Err(ResolveError::DuplicateRegistration(_))));
    }

    #[test]
    fn custom_activation_builder_overrides_strategy() {
        let counting = Arc::new(Counting::default());
        let container = ContainerBuilder::new()
            .with_strategy(ActivationStrategy::Interpreted)
            .with_activation_builder(counting.clone())
            .add_transient::<dyn Sink, Null>()
            .build()
            .unwrap();

        for _ in 0..3 {
            container.get::<dyn Sink>().unwrap();
        }
        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn options_default_to_precompiled_and_fold() {
        let options = ContainerOptions::default();
        assert_eq!(options.strategy, ActivationStrategy::Precompiled);
        assert_eq!(options.duplicates, DuplicatePolicy::Fold);
    }
}
