//! Concurrent access tests for `polaris_container`.
//!
//! These tests verify thread-safety of resolution caches and disposal tracking.

mod test_utils;

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use polaris_container::prelude::*;
use test_utils::{CountingBuilder, ITestService, Journal, TestService, connection};

struct Registry;

/// Test that many threads racing on the first singleton resolution observe one identity.
#[test]
fn concurrent_singleton_resolution_yields_one_identity() {
    let container = Arc::new(
        ContainerBuilder::new()
            .add_singleton::<dyn ITestService, TestService>()
            .build()
            .unwrap(),
    );
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let scope = container.create_scope().unwrap();
                barrier.wait();
                scope.get::<dyn ITestService>().unwrap().id()
            })
        })
        .collect();

    let ids: Vec<usize> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
}

/// Test that a shared scope returns one scoped instance to every thread.
#[test]
fn concurrent_scoped_resolution_converges() {
    let journal = Journal::new();
    let container = Container::build(
        [connection::<Registry>("registry", Lifetime::Scoped, &journal)],
        ActivationStrategy::default().builder(),
    )
    .unwrap();
    let scope = Arc::new(container.create_scope().unwrap());
    let barrier = Arc::new(Barrier::new(6));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let scope = Arc::clone(&scope);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                scope.resolve(&ServiceKey::of::<Registry>()).unwrap()
            })
        })
        .collect();

    let instances: Vec<Instance> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    let winner = scope.resolve(&ServiceKey::of::<Registry>()).unwrap();
    assert!(instances.iter().all(|instance| Instance::ptr_eq(instance, &winner)));

    // Racing constructions that lost are still released with the scope.
    let tracked = scope.tracked_disposables();
    assert!((1..=6).contains(&tracked));
    scope.dispose().unwrap();
    assert_eq!(journal.count("registry"), tracked);
}

/// Test that concurrent transient resolutions never lose a disposal entry.
#[test]
fn concurrent_transients_are_all_tracked() {
    let journal = Journal::new();
    let container = Container::build(
        [connection::<Registry>("registry", Lifetime::Transient, &journal)],
        ActivationStrategy::default().builder(),
    )
    .unwrap();
    let scope = Arc::new(container.create_scope().unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let scope = Arc::clone(&scope);
            thread::spawn(move || {
                for _ in 0..50 {
                    scope.resolve(&ServiceKey::of::<Registry>()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(scope.tracked_disposables(), 200);
    scope.dispose().unwrap();
    assert_eq!(journal.count("registry"), 200);
}

/// Test that specialization from many threads converges on one declaration.
#[test]
fn concurrent_specialization_converges() {
    struct ListFamily;
    struct List;

    let family = GenericFamily::of::<ListFamily>();
    let specializations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&specializations);
    let counting = Arc::new(CountingBuilder::default());

    let container = Arc::new(
        ContainerBuilder::new()
            .with_activation_builder(counting.clone())
            .add_type(
                ServiceKey::open(family),
                GenericImplementation::new(family, move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Some(ImplementationType::new::<List>([Constructor::from_fn(|(): ()| {
                        Instance::new(Arc::new(List))
                    })]))
                }),
                Lifetime::Transient,
            )
            .build()
            .unwrap(),
    );
    let key = ServiceKey::constructed(family, [ServiceKey::of::<u64>()]);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let container = Arc::clone(&container);
            let barrier = Arc::clone(&barrier);
            let key = key.clone();
            thread::spawn(move || {
                barrier.wait();
                container.find_declaration(&key).unwrap().id()
            })
        })
        .collect();

    let ids: Vec<DeclarationId> = handles
        .into_iter()
        .map(|handle| handle.join().expect("Thread panicked"))
        .collect();

    assert!(ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert!((1..=4).contains(&specializations.load(Ordering::SeqCst)));

    container.resolve(&key).unwrap();
    container.resolve(&key).unwrap();
    assert_eq!(counting.calls(), 1);
}

/// Test that `Container` and `Scope` can be shared between threads.
#[test]
fn container_and_scope_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Container>();
    assert_send_sync::<Scope>();
    assert_send_sync::<Instance>();
}
