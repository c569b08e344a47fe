//! Disposal capabilities.
//!
//! Instances opt into disposal by attaching a [`Release`] when they are
//! produced (see [`Instance::with_dispose`](crate::instance::Instance::with_dispose)).
//! The capability is fixed at creation time; the scope that created the
//! instance tracks it and calls it exactly once when the scope is disposed.
//!
//! An instance may support synchronous release, asynchronous release or both.
//! Each disposal path uses the capability it prefers and falls back to the
//! other one:
//!
//! | Path | First choice | Fallback |
//! |------|--------------|----------|
//! | [`Scope::dispose`](crate::scope::Scope::dispose) | [`Dispose`] | [`AsyncDispose`], blocked on |
//! | [`Scope::dispose_async`](crate::scope::Scope::dispose_async) | [`AsyncDispose`] | [`Dispose`] |

use std::sync::Arc;

use crate::error::BoxError;

/// Synchronous release of a service's resources.
///
/// # Example
///
/// ```
/// use polaris_container::dispose::Dispose;
/// use polaris_container::error::BoxError;
///
/// struct Connection;
///
/// impl Dispose for Connection {
///     fn dispose(&self) -> Result<(), BoxError> {
///         // close the socket
///         Ok(())
///     }
/// }
/// ```
pub trait Dispose: Send + Sync + 'static {
    /// Releases the resources held by this instance.
    ///
    /// # Errors
    ///
    /// Returns the release failure; disposal of the owning scope stops there.
    fn dispose(&self) -> Result<(), BoxError>;
}

/// Asynchronous release of a service's resources.
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    /// Releases the resources held by this instance.
    ///
    /// # Errors
    ///
    /// Returns the release failure; disposal of the owning scope stops there.
    async fn dispose_async(&self) -> Result<(), BoxError>;
}

/// Error raised when a tracked instance fails to release.
#[derive(Debug, thiserror::Error)]
#[error("failed to release {service}: {source}")]
pub struct DisposeError {
    /// The service type of the instance that failed.
    pub service: &'static str,
    /// The failure reported by the instance.
    #[source]
    pub source: BoxError,
}

/// The disposal capability attached to an instance.
#[derive(Clone)]
pub struct Release {
    service: &'static str,
    sync: Option<Arc<dyn Dispose>>,
    asynchronous: Option<Arc<dyn AsyncDispose>>,
}

impl Release {
    pub(crate) fn new(service: &'static str) -> Self {
        Self {
            service,
            sync: None,
            asynchronous: None,
        }
    }

    pub(crate) fn set_sync(&mut self, target: Arc<dyn Dispose>) {
        self.sync = Some(target);
    }

    pub(crate) fn set_async(&mut self, target: Arc<dyn AsyncDispose>) {
        self.asynchronous = Some(target);
    }

    /// Returns the service type name the release belongs to.
    #[must_use]
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Returns `true` if the instance supports synchronous release.
    #[must_use]
    pub fn is_sync(&self) -> bool {
        self.sync.is_some()
    }

    /// Returns `true` if the instance supports asynchronous release.
    #[must_use]
    pub fn is_async(&self) -> bool {
        self.asynchronous.is_some()
    }

    /// Releases synchronously, blocking on the async capability if it is the only one.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError`] if the instance's release fails.
    pub fn release(&self) -> Result<(), DisposeError> {
        let result = match (&self.sync, &self.asynchronous) {
            (Some(target), _) => target.dispose(),
            (None, Some(target)) => futures::executor::block_on(target.dispose_async()),
            (None, None) => Ok(()),
        };
        result.map_err(|source| self.failed(source))
    }

    /// Releases asynchronously, calling the sync capability if it is the only one.
    ///
    /// # Errors
    ///
    /// Returns [`DisposeError`] if the instance's release fails.
    pub async fn release_async(&self) -> Result<(), DisposeError> {
        let result = match (&self.asynchronous, &self.sync) {
            (Some(target), _) => target.dispose_async().await,
            (None, Some(target)) => target.dispose(),
            (None, None) => Ok(()),
        };
        result.map_err(|source| self.failed(source))
    }

    fn failed(&self, source: BoxError) -> DisposeError {
        DisposeError {
            service: self.service,
            source,
        }
    }
}

impl core::fmt::Debug for Release {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Release")
            .field("service", &self.service)
            .field("sync", &self.is_sync())
            .field("async", &self.is_async())
            .finish()
    }
}
