//! Shared test utilities for `polaris_container` integration tests.
//!
//! Import via `mod test_utils;` in test files.

#![allow(
    dead_code,
    missing_docs,
    reason = "not every helper is used by every test binary"
)]

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use polaris_container::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST SERVICES
// ═══════════════════════════════════════════════════════════════════════════════

pub trait ITestService: Send + Sync {
    fn id(&self) -> usize;
}

pub trait ITestServiceWithNested: Send + Sync {
    fn nested(&self) -> &Arc<dyn ITestService>;
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

pub struct TestService {
    id: usize,
}

impl TestService {
    pub fn new() -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl ITestService for TestService {
    fn id(&self) -> usize {
        self.id
    }
}

impl Injectable for TestService {
    fn implementation() -> ImplementationType {
        ImplementationType::new::<TestService>([Constructor::from_fn(|(): ()| {
            Instance::new::<dyn ITestService>(Arc::new(TestService::new()))
        })])
    }
}

pub struct TestServiceWithNested {
    nested: Arc<dyn ITestService>,
}

impl ITestServiceWithNested for TestServiceWithNested {
    fn nested(&self) -> &Arc<dyn ITestService> {
        &self.nested
    }
}

impl Injectable for TestServiceWithNested {
    fn implementation() -> ImplementationType {
        ImplementationType::new::<TestServiceWithNested>([Constructor::from_fn(
            |nested: Arc<dyn ITestService>| {
                Instance::new::<dyn ITestServiceWithNested>(Arc::new(TestServiceWithNested {
                    nested,
                }))
            },
        )])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPOSAL JOURNAL
// ═══════════════════════════════════════════════════════════════════════════════

/// Records every release, in order.
#[derive(Default)]
pub struct Journal {
    entries: Mutex<Vec<&'static str>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: &'static str) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<&'static str> {
        self.entries.lock().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| **e == entry).count()
    }
}

/// A resource released synchronously.
pub struct Connection {
    pub name: &'static str,
    journal: Arc<Journal>,
}

impl Connection {
    pub fn new(name: &'static str, journal: &Arc<Journal>) -> Arc<Self> {
        Arc::new(Self {
            name,
            journal: Arc::clone(journal),
        })
    }
}

impl Dispose for Connection {
    fn dispose(&self) -> Result<(), BoxError> {
        self.journal.record(self.name);
        Ok(())
    }
}

/// Declares `Connection` under the marker type `M`.
pub fn connection<M: 'static>(
    name: &'static str,
    lifetime: Lifetime,
    journal: &Arc<Journal>,
) -> ServiceDeclaration {
    let journal = Arc::clone(journal);
    ServiceDeclaration::factory_bound(ServiceKey::of::<M>(), lifetime, move |_| {
        let connection = Connection::new(name, &journal);
        Ok(Instance::new(Arc::clone(&connection)).with_dispose(connection))
    })
}

/// Counts calls and delegates to the precompiled builder.
#[derive(Default)]
pub struct CountingBuilder {
    calls: AtomicUsize,
}

impl CountingBuilder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ActivationBuilder for CountingBuilder {
    fn build_activation(
        &self,
        declaration: &ServiceDeclaration,
    ) -> Result<Activation, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        PrecompiledActivationBuilder.build_activation(declaration)
    }
}

/// Builds the nested-service container used by several tests.
pub fn nested_container(strategy: ActivationStrategy) -> Container {
    ContainerBuilder::new()
        .with_strategy(strategy)
        .add_transient::<dyn ITestService, TestService>()
        .add_transient::<dyn ITestServiceWithNested, TestServiceWithNested>()
        .build()
        .expect("container")
}
