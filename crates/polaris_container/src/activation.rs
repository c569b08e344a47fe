//! Activation building.
//!
//! An [`Activation`] is the function a container calls to produce an
//! instance of a declaration: it receives the resolving scope and returns the
//! new instance. Activations are built once per declaration and cached by the
//! container.
//!
//! For type-bound declarations the container delegates to an
//! [`ActivationBuilder`]. Two builders ship with the crate and behave
//! identically from the caller's point of view:
//!
//! | Builder | Build time | Per call |
//! |---------|------------|----------|
//! | [`InterpretedActivationBuilder`] | captures the implementation type | selects the constructor, walks its parameters, invokes |
//! | [`PrecompiledActivationBuilder`] | selects the constructor, captures parameters and invoke function | resolves parameters, invokes |
//!
//! The choice is made once per container through [`ActivationStrategy`].

use std::sync::Arc;

use crate::declaration::ServiceDeclaration;
use crate::error::ResolveError;
use crate::implementation::{Arguments, ImplementationType};
use crate::instance::Instance;
use crate::key::ServiceKey;
use crate::scope::Resolver;

/// A resolver-to-instance function.
pub type Activation = Arc<dyn Fn(&dyn Resolver) -> Result<Instance, ResolveError> + Send + Sync>;

/// Converts a type-bound declaration into an [`Activation`].
///
/// # Example
///
/// A builder that counts how often the container asks for a new activation:
///
/// ```
/// use core::sync::atomic::{AtomicUsize, Ordering};
/// use polaris_container::activation::{
///     Activation, ActivationBuilder, PrecompiledActivationBuilder,
/// };
/// use polaris_container::declaration::ServiceDeclaration;
/// use polaris_container::error::ResolveError;
///
/// #[derive(Default)]
/// struct Counting {
///     calls: AtomicUsize,
///     inner: PrecompiledActivationBuilder,
/// }
///
/// impl ActivationBuilder for Counting {
///     fn build_activation(
///         &self,
///         declaration: &ServiceDeclaration,
///     ) -> Result<Activation, ResolveError> {
///         self.calls.fetch_add(1, Ordering::SeqCst);
///         self.inner.build_activation(declaration)
///     }
/// }
/// ```
pub trait ActivationBuilder: Send + Sync + 'static {
    /// Builds the activation for a type-bound declaration.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NotTypeBound`] if the declaration is not type-bound
    /// - [`ResolveError::InvalidGenericBinding`] if its implementation is open
    /// - [`ResolveError::NoEligibleConstructor`] / [`ResolveError::AmbiguousConstructor`]
    ///   if constructor selection fails (the interpreted builder reports these
    ///   when the activation runs)
    fn build_activation(&self, declaration: &ServiceDeclaration)
    -> Result<Activation, ResolveError>;
}

/// Resolves each parameter in order through `resolver`.
fn resolve_arguments(
    resolver: &dyn Resolver,
    parameters: &[ServiceKey],
) -> Result<Vec<Instance>, ResolveError> {
    let mut values = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        values.push(resolver.resolve(parameter)?);
    }
    Ok(values)
}

/// Selects the constructor and resolves its parameters on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterpretedActivationBuilder;

impl InterpretedActivationBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn activate(
        implementation: &ImplementationType,
        resolver: &dyn Resolver,
    ) -> Result<Instance, ResolveError> {
        let constructor = implementation.select_constructor()?;
        let values = resolve_arguments(resolver, constructor.parameters())?;
        constructor.invoke(implementation.name(), values)
    }
}

impl ActivationBuilder for InterpretedActivationBuilder {
    fn build_activation(
        &self,
        declaration: &ServiceDeclaration,
    ) -> Result<Activation, ResolveError> {
        let implementation = declaration.implementation_type()?.clone();
        Ok(Arc::new(move |resolver: &dyn Resolver| {
            Self::activate(&implementation, resolver)
        }))
    }
}

/// Selects the constructor once and reuses the captured call on every activation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecompiledActivationBuilder;

impl PrecompiledActivationBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ActivationBuilder for PrecompiledActivationBuilder {
    fn build_activation(
        &self,
        declaration: &ServiceDeclaration,
    ) -> Result<Activation, ResolveError> {
        let implementation = declaration.implementation_type()?;
        let constructor = implementation.select_constructor()?;

        let name = implementation.name();
        let parameters = constructor.shared_parameters();
        let invoke = constructor.function();

        Ok(Arc::new(move |resolver: &dyn Resolver| {
            let values = resolve_arguments(resolver, &parameters)?;
            invoke(Arguments::new(name, Arc::clone(&parameters), values))
        }))
    }
}

/// Which built-in [`ActivationBuilder`] a container uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivationStrategy {
    /// [`InterpretedActivationBuilder`]: no build cost, selection per call.
    Interpreted,
    /// [`PrecompiledActivationBuilder`]: selection once, cheaper calls.
    #[default]
    Precompiled,
}

impl ActivationStrategy {
    /// Returns the builder implementing this strategy.
    #[must_use]
    pub fn builder(self) -> Arc<dyn ActivationBuilder> {
        match self {
            Self::Interpreted => Arc::new(InterpretedActivationBuilder),
            Self::Precompiled => Arc::new(PrecompiledActivationBuilder),
        }
    }
}
