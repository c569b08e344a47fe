//! Type-erased service instances.
//!
//! Every resolution returns an [`Instance`]: a cheap-to-clone handle around an
//! `Arc<S>`, where `S` is the service type the producer chose (usually a trait
//! object such as `dyn Logger`). Two handles are the *same instance* when
//! [`Instance::ptr_eq`] holds, which is how lifetime caching is observed.

use core::any::Any;
use std::sync::Arc;

use crate::dispose::{AsyncDispose, Dispose, Release};

/// A resolved service instance.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use polaris_container::instance::Instance;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let instance = Instance::new::<dyn Greeter>(Arc::new(English));
/// let greeter = instance.downcast::<dyn Greeter>().unwrap();
/// assert_eq!(greeter.greet(), "hello");
/// ```
#[derive(Clone)]
pub struct Instance {
    /// Holds an `Arc<S>`.
    value: Arc<dyn Any + Send + Sync>,
    service: &'static str,
    release: Option<Release>,
}

impl Instance {
    /// Wraps a service value.
    #[must_use]
    pub fn new<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self {
            value: Arc::new(value),
            service: core::any::type_name::<S>(),
            release: None,
        }
    }

    /// Attaches a synchronous release capability.
    ///
    /// The scope that creates this instance will call [`Dispose::dispose`]
    /// once when it is disposed.
    #[must_use]
    pub fn with_dispose<D: Dispose>(mut self, target: Arc<D>) -> Self {
        let service = self.service;
        self.release
            .get_or_insert_with(|| Release::new(service))
            .set_sync(target);
        self
    }

    /// Attaches an asynchronous release capability.
    #[must_use]
    pub fn with_async_dispose<D: AsyncDispose>(mut self, target: Arc<D>) -> Self {
        let service = self.service;
        self.release
            .get_or_insert_with(|| Release::new(service))
            .set_async(target);
        self
    }

    /// Returns the service value as `Arc<S>` if it was created as `S`.
    #[must_use]
    pub fn downcast<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<S>> {
        self.value.downcast_ref::<Arc<S>>().cloned()
    }

    /// Returns `true` if the instance was created as `S`.
    #[must_use]
    pub fn is<S: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.value.is::<Arc<S>>()
    }

    /// Returns the service type name the instance was created as.
    #[must_use]
    pub fn service_name(&self) -> &'static str {
        self.service
    }

    /// Returns the disposal capability, if any.
    #[must_use]
    pub fn release(&self) -> Option<&Release> {
        self.release.as_ref()
    }

    /// Returns `true` if the instance will be tracked for disposal.
    #[must_use]
    pub fn is_disposable(&self) -> bool {
        self.release.is_some()
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }
}

impl core::fmt::Debug for Instance {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Instance")
            .field("service", &self.service)
            .field("disposable", &self.is_disposable())
            .finish()
    }
}

/// The ordered result of resolving a collection key.
///
/// Items appear in registration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    items: Vec<Instance>,
}

impl ServiceCollection {
    /// Creates a collection from resolved items.
    #[must_use]
    pub fn new(items: Vec<Instance>) -> Self {
        Self { items }
    }

    /// Returns the items in registration order.
    #[must_use]
    pub fn items(&self) -> &[Instance] {
        &self.items
    }

    /// Returns an iterator over the items.
    pub fn iter(&self) -> core::slice::Iter<'_, Instance> {
        self.items.iter()
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Downcasts every item to `Arc<S>`; `None` if any item is not an `S`.
    #[must_use]
    pub fn downcast_all<S: ?Sized + Send + Sync + 'static>(&self) -> Option<Vec<Arc<S>>> {
        self.items.iter().map(Instance::downcast::<S>).collect()
    }
}

impl<'a> IntoIterator for &'a ServiceCollection {
    type Item = &'a Instance;
    type IntoIter = core::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
