//! Runtime service resolution for polaris_di.
//!
//! `polaris_container` resolves services from a registry of declarations,
//! honoring per-service lifetimes across nested scopes:
//!
//! - [`key`] - Service keys: plain types, open and constructed generics, collections
//! - [`instance`] - Type-erased resolved instances
//! - [`dispose`] - Synchronous and asynchronous release of instances
//! - [`implementation`] - Implementation types and their constructors
//! - [`declaration`] - Service declarations and lifetimes
//! - [`activation`] - Turning declarations into activation functions
//! - [`container`] - The container and its root scope
//! - [`scope`] - Nested resolution contexts
//! - [`builder`] - Container configuration
//!
//! # Lifetimes
//!
//! - **Transient** - a new instance per resolution
//! - **Scoped** - one instance per [`Scope`](scope::Scope)
//! - **Singleton** - one instance per [`Container`](container::Container), held by the root scope
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use polaris_container::prelude::*;
//!
//! trait Store: Send + Sync { fn get(&self) -> u32; }
//! trait Service: Send + Sync { fn run(&self) -> u32; }
//!
//! struct MemoryStore;
//! impl Store for MemoryStore { fn get(&self) -> u32 { 5 } }
//!
//! struct Doubler { store: Arc<dyn Store> }
//! impl Service for Doubler { fn run(&self) -> u32 { self.store.get() * 2 } }
//!
//! impl Injectable for MemoryStore {
//!     fn implementation() -> ImplementationType {
//!         ImplementationType::new::<MemoryStore>([Constructor::from_fn(|(): ()| {
//!             Instance::new::<dyn Store>(Arc::new(MemoryStore))
//!         })])
//!     }
//! }
//!
//! impl Injectable for Doubler {
//!     fn implementation() -> ImplementationType {
//!         ImplementationType::new::<Doubler>([Constructor::from_fn(|store: Arc<dyn Store>| {
//!             Instance::new::<dyn Service>(Arc::new(Doubler { store }))
//!         })])
//!     }
//! }
//!
//! let container = ContainerBuilder::new()
//!     .add_singleton::<dyn Store, MemoryStore>()
//!     .add_scoped::<dyn Service, Doubler>()
//!     .build()
//!     .unwrap();
//!
//! let scope = container.create_scope().unwrap();
//! assert_eq!(scope.get::<dyn Service>().unwrap().run(), 10);
//! scope.dispose().unwrap();
//! ```

/// Activation functions and the builders that produce them.
pub mod activation;

/// Container configuration and assembly.
pub mod builder;

/// The service container.
pub mod container;

/// Service declarations and lifetimes.
pub mod declaration;

/// Instance disposal.
pub mod dispose;

/// Resolution errors.
pub mod error;

/// Implementation types and constructors.
pub mod implementation;

/// Type-erased resolved instances.
pub mod instance;

/// Service keys.
pub mod key;

mod registry;

/// Resolution scopes.
pub mod scope;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::activation::{
        Activation, ActivationBuilder, ActivationStrategy, InterpretedActivationBuilder,
        PrecompiledActivationBuilder,
    };
    pub use crate::builder::{ContainerBuilder, ContainerOptions, DuplicatePolicy};
    pub use crate::container::Container;
    pub use crate::declaration::{Binding, DeclarationId, Lifetime, ServiceDeclaration};
    pub use crate::dispose::{AsyncDispose, Dispose, DisposeError};
    pub use crate::error::{BoxError, ResolveError};
    pub use crate::implementation::{
        Arguments, Constructor, GenericImplementation, Implementation, ImplementationType,
        Injectable,
    };
    pub use crate::instance::{Instance, ServiceCollection};
    pub use crate::key::{GenericFamily, ServiceKey, TypeToken};
    pub use crate::scope::{Resolver, ResolverExt, Scope};
}
