//! Implementation type metadata.
//!
//! Rust has no runtime reflection, so the constructor of an implementation
//! type is registered explicitly. An [`ImplementationType`] carries the list
//! of its [`Constructor`]s: the parameter keys each one needs and the function
//! that builds the instance once those parameters are resolved.
//!
//! Constructors are usually written with [`Constructor::from_fn`], which
//! derives the parameter keys from a tuple of `Arc<S>` dependencies:
//!
//! ```
//! use std::sync::Arc;
//! use polaris_container::implementation::{Constructor, ImplementationType, Injectable};
//! use polaris_container::instance::Instance;
//!
//! trait Clock: Send + Sync {}
//! trait Greeter: Send + Sync {}
//!
//! struct TimedGreeter { clock: Arc<dyn Clock> }
//! impl Greeter for TimedGreeter {}
//!
//! impl Injectable for TimedGreeter {
//!     fn implementation() -> ImplementationType {
//!         ImplementationType::new::<Self>([Constructor::from_fn(
//!             |(clock,): (Arc<dyn Clock>,)| {
//!                 Instance::new::<dyn Greeter>(Arc::new(TimedGreeter { clock }))
//!             },
//!         )])
//!     }
//! }
//! ```
//!
//! Open generic implementations are described by a [`GenericImplementation`],
//! whose specializer maps concrete type arguments to a closed
//! [`ImplementationType`].

use std::sync::Arc;

use variadics_please::all_tuples;

use crate::error::ResolveError;
use crate::instance::Instance;
use crate::key::{GenericFamily, ServiceKey, TypeToken};

/// Function invoked with resolved constructor arguments.
pub type ConstructorFn = Arc<dyn Fn(Arguments) -> Result<Instance, ResolveError> + Send + Sync>;

/// Function mapping type arguments to a closed implementation type.
pub type Specializer = Arc<dyn Fn(&[ServiceKey]) -> Option<ImplementationType> + Send + Sync>;

/// Resolved constructor arguments, in parameter order.
pub struct Arguments {
    implementation: &'static str,
    parameters: Arc<[ServiceKey]>,
    values: Vec<Instance>,
}

impl Arguments {
    pub(crate) fn new(
        implementation: &'static str,
        parameters: Arc<[ServiceKey]>,
        values: Vec<Instance>,
    ) -> Self {
        Self {
            implementation,
            parameters,
            values,
        }
    }

    /// Returns the raw instance at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingArgument`] if the constructor declares
    /// fewer parameters.
    pub fn instance(&self, index: usize) -> Result<&Instance, ResolveError> {
        self.values.get(index).ok_or(ResolveError::MissingArgument {
            implementation: self.implementation,
            index,
        })
    }

    /// Returns the argument at `index` as `Arc<S>`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::MissingArgument`] if `index` is out of range
    /// - [`ResolveError::TypeMismatch`] if the argument is not an `S`
    pub fn get<S: ?Sized + Send + Sync + 'static>(
        &self,
        index: usize,
    ) -> Result<Arc<S>, ResolveError> {
        let instance = self.instance(index)?;
        instance
            .downcast::<S>()
            .ok_or_else(|| ResolveError::TypeMismatch {
                service: self
                    .parameters
                    .get(index)
                    .cloned()
                    .unwrap_or_else(ServiceKey::of::<S>),
                expected: core::any::type_name::<S>(),
                found: instance.service_name(),
            })
    }

    /// Returns the number of arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the constructor takes no arguments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A set of constructor dependencies expressed as a tuple of `Arc<S>`.
///
/// Implemented for `()`, for `Arc<S>` and for tuples of up to eight
/// dependencies.
pub trait Dependencies: Sized {
    /// Appends the service keys of the dependencies, in order.
    fn keys(keys: &mut Vec<ServiceKey>);

    /// Extracts the dependencies from resolved arguments starting at `offset`,
    /// advancing it past the consumed arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] if an argument is missing or of the wrong type.
    fn extract(arguments: &Arguments, offset: &mut usize) -> Result<Self, ResolveError>;
}

impl Dependencies for () {
    fn keys(_keys: &mut Vec<ServiceKey>) {}

    fn extract(_arguments: &Arguments, _offset: &mut usize) -> Result<Self, ResolveError> {
        Ok(())
    }
}

impl<S: ?Sized + Send + Sync + 'static> Dependencies for Arc<S> {
    fn keys(keys: &mut Vec<ServiceKey>) {
        keys.push(ServiceKey::of::<S>());
    }

    fn extract(arguments: &Arguments, offset: &mut usize) -> Result<Self, ResolveError> {
        let value = arguments.get::<S>(*offset)?;
        *offset += 1;
        Ok(value)
    }
}

macro_rules! impl_dependencies_tuple {
    ($($dep:ident),*) => {
        impl<$($dep: Dependencies),*> Dependencies for ($($dep,)*) {
            fn keys(keys: &mut Vec<ServiceKey>) {
                $($dep::keys(keys);)*
            }

            fn extract(arguments: &Arguments, offset: &mut usize) -> Result<Self, ResolveError> {
                Ok(($($dep::extract(arguments, offset)?,)*))
            }
        }
    };
}

// Generate impls for tuples of size 1 to 8
all_tuples!(impl_dependencies_tuple, 1, 8, D);

/// A constructor of an implementation type.
#[derive(Clone)]
pub struct Constructor {
    parameters: Arc<[ServiceKey]>,
    public: bool,
    invoke: ConstructorFn,
}

impl Constructor {
    /// Creates a public constructor from explicit parameter keys.
    ///
    /// `invoke` receives the resolved arguments in the same order as
    /// `parameters`.
    #[must_use]
    pub fn new<F>(parameters: impl IntoIterator<Item = ServiceKey>, invoke: F) -> Self
    where
        F: Fn(Arguments) -> Result<Instance, ResolveError> + Send + Sync + 'static,
    {
        Self {
            parameters: parameters.into_iter().collect(),
            public: true,
            invoke: Arc::new(invoke),
        }
    }

    /// Creates a public constructor whose parameters are the tuple `D`.
    #[must_use]
    pub fn from_fn<D, F>(constructor: F) -> Self
    where
        D: Dependencies + 'static,
        F: Fn(D) -> Instance + Send + Sync + 'static,
    {
        let mut parameters = Vec::new();
        D::keys(&mut parameters);
        Self::new(parameters, move |arguments| {
            let mut offset = 0;
            let dependencies = D::extract(&arguments, &mut offset)?;
            Ok(constructor(dependencies))
        })
    }

    /// Marks the constructor as not eligible for activation.
    #[must_use]
    pub fn non_public(mut self) -> Self {
        self.public = false;
        self
    }

    /// Returns the parameter keys, in order.
    #[must_use]
    pub fn parameters(&self) -> &[ServiceKey] {
        &self.parameters
    }

    /// Returns the parameter keys as a shared slice.
    #[must_use]
    pub fn shared_parameters(&self) -> Arc<[ServiceKey]> {
        Arc::clone(&self.parameters)
    }

    /// Returns `true` if the constructor is eligible for activation.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Returns the invoke function.
    #[must_use]
    pub fn function(&self) -> ConstructorFn {
        Arc::clone(&self.invoke)
    }

    /// Invokes the constructor with already-resolved arguments.
    ///
    /// # Errors
    ///
    /// Propagates the constructor's own failure unchanged.
    pub fn invoke(
        &self,
        implementation: &'static str,
        values: Vec<Instance>,
    ) -> Result<Instance, ResolveError> {
        (self.invoke)(Arguments::new(
            implementation,
            Arc::clone(&self.parameters),
            values,
        ))
    }
}

impl core::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A concrete, constructible implementation type.
#[derive(Clone, Debug)]
pub struct ImplementationType {
    token: TypeToken,
    constructors: Arc<[Constructor]>,
}

impl ImplementationType {
    /// Describes the implementation type `T` and its constructors.
    #[must_use]
    pub fn new<T: ?Sized + 'static>(constructors: impl IntoIterator<Item = Constructor>) -> Self {
        Self {
            token: TypeToken::of::<T>(),
            constructors: constructors.into_iter().collect(),
        }
    }

    /// Returns the type token of the implementation.
    #[must_use]
    pub fn token(&self) -> TypeToken {
        self.token
    }

    /// Returns the implementation type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.token.name()
    }

    /// Returns every declared constructor.
    #[must_use]
    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// Selects the single public constructor.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::NoEligibleConstructor`] if there is none
    /// - [`ResolveError::AmbiguousConstructor`] if there are several
    pub fn select_constructor(&self) -> Result<&Constructor, ResolveError> {
        let mut eligible = self.constructors.iter().filter(|ctor| ctor.is_public());
        let Some(first) = eligible.next() else {
            return Err(ResolveError::NoEligibleConstructor(self.name()));
        };
        let others = eligible.count();
        if others > 0 {
            return Err(ResolveError::AmbiguousConstructor {
                implementation: self.name(),
                count: others + 1,
            });
        }
        Ok(first)
    }
}

/// A type that describes its own implementation metadata.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the implementation type descriptor for `Self`.
    fn implementation() -> ImplementationType;
}

/// An open generic implementation, e.g. `Repository<_>`.
#[derive(Clone)]
pub struct GenericImplementation {
    family: GenericFamily,
    specialize: Specializer,
}

impl GenericImplementation {
    /// Creates an open implementation from a specializer.
    ///
    /// The specializer returns `None` for type arguments it cannot close over.
    #[must_use]
    pub fn new<F>(family: GenericFamily, specialize: F) -> Self
    where
        F: Fn(&[ServiceKey]) -> Option<ImplementationType> + Send + Sync + 'static,
    {
        Self {
            family,
            specialize: Arc::new(specialize),
        }
    }

    /// Returns the implementation's generic family.
    #[must_use]
    pub fn family(&self) -> GenericFamily {
        self.family
    }

    /// Applies type arguments, producing a closed implementation.
    #[must_use]
    pub fn specialize(&self, args: &[ServiceKey]) -> Option<ImplementationType> {
        (self.specialize)(args)
    }
}

impl core::fmt::Debug for GenericImplementation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GenericImplementation")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// The implementation a type-bound declaration points to.
#[derive(Clone, Debug)]
pub enum Implementation {
    /// A concrete implementation type.
    Closed(ImplementationType),
    /// An open generic implementation, specialized on demand.
    Open(GenericImplementation),
}

impl Implementation {
    /// Returns the implementation name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Closed(ty) => ty.name(),
            Self::Open(generic) => generic.family().name(),
        }
    }
}

impl From<ImplementationType> for Implementation {
    fn from(ty: ImplementationType) -> Self {
        Self::Closed(ty)
    }
}

impl From<GenericImplementation> for Implementation {
    fn from(generic: GenericImplementation) -> Self {
        Self::Open(generic)
    }
}
