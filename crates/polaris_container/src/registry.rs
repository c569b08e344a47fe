//! Declaration registry.
//!
//! Maps each [`ServiceKey`] to exactly one [`ServiceDeclaration`]. The
//! registered declarations are fixed once built from the ordered registration
//! list. Specializations of open generics and collections over them are
//! synthesized on first request and cached beside the registered map.

use std::sync::Arc;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use parking_lot::RwLock;

use crate::builder::DuplicatePolicy;
use crate::declaration::{Binding, DeclarationId, Lifetime, ServiceDeclaration};
use crate::error::ResolveError;
use crate::implementation::Implementation;
use crate::instance::{Instance, ServiceCollection};
use crate::key::ServiceKey;
use crate::scope::Resolver;

/// Key → declaration map shared by a container and its scopes.
pub(crate) struct Registry {
    declarations: HashMap<ServiceKey, Arc<ServiceDeclaration>>,
    /// Collections synthesized on request, by collection key.
    collections: RwLock<HashMap<ServiceKey, Arc<ServiceDeclaration>>>,
    /// One specialization per (open registration, constructed key).
    specializations: RwLock<HashMap<(DeclarationId, ServiceKey), Arc<ServiceDeclaration>>>,
}

impl Registry {
    /// Groups `declarations` by key, preserving registration order.
    ///
    /// A key registered once maps to its declaration. A key registered more
    /// than once maps to a multi-bound declaration over every registration,
    /// and a collection declaration is installed under `Collection(key)`
    /// unless that key was registered explicitly.
    pub(crate) fn build(
        declarations: impl IntoIterator<Item = ServiceDeclaration>,
        duplicates: DuplicatePolicy,
    ) -> Result<Self, ResolveError> {
        let mut order: Vec<ServiceKey> = Vec::new();
        let mut groups: HashMap<ServiceKey, Vec<Arc<ServiceDeclaration>>> = HashMap::new();
        for declaration in declarations {
            let group = groups
                .entry(declaration.service().clone())
                .or_insert_with(|| {
                    order.push(declaration.service().clone());
                    Vec::new()
                });
            group.push(Arc::new(declaration));
        }

        let mut map = HashMap::with_capacity(order.len());
        let mut multi_keys = Vec::new();
        for key in order {
            let Some(mut group) = groups.remove(&key) else {
                continue;
            };
            let declaration = if group.len() == 1 {
                group.remove(0)
            } else {
                if duplicates == DuplicatePolicy::Reject {
                    return Err(ResolveError::DuplicateRegistration(key));
                }
                multi_keys.push(key.clone());
                Arc::new(ServiceDeclaration::multi_bound(key.clone(), group))
            };
            map.insert(key, declaration);
        }

        for key in multi_keys {
            let collection = ServiceKey::collection_of(key.clone());
            if map.contains_key(&collection) {
                tracing::debug!(service = %key, "explicit collection registration kept");
                continue;
            }
            let declaration = map
                .get(&key)
                .and_then(|multi| multi.members())
                .map(|members| collection_declaration(collection.clone(), members.into()));
            if let Some(declaration) = declaration {
                map.insert(collection, Arc::new(declaration));
            }
        }

        tracing::debug!(declarations = map.len(), "registry built");
        Ok(Self {
            declarations: map,
            collections: RwLock::new(HashMap::new()),
            specializations: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the declaration registered under exactly `service`.
    pub(crate) fn lookup(&self, service: &ServiceKey) -> Option<Arc<ServiceDeclaration>> {
        self.declarations.get(service).cloned()
    }

    /// Number of declarations, synthesized ones included.
    pub(crate) fn len(&self) -> usize {
        self.declarations.len() + self.collections.read().len() + self.specializations.read().len()
    }

    /// Finds (or synthesizes) the declaration to resolve `service` with.
    ///
    /// A multi-bound hit resolves to its last registration.
    pub(crate) fn find(
        &self,
        service: &ServiceKey,
    ) -> Result<Arc<ServiceDeclaration>, ResolveError> {
        if let Some(declaration) = self.lookup(service) {
            return Ok(last_member(declaration));
        }
        match service {
            ServiceKey::Collection(item) => self.synthesize_collection(service, item),
            ServiceKey::Constructed { .. } => self.specialize(service),
            ServiceKey::Type(_) | ServiceKey::Open(_) => {
                Err(ResolveError::ServiceNotFound(service.clone()))
            }
        }
    }

    /// Closes the last open registration of `service`'s family over its type arguments.
    fn specialize(&self, service: &ServiceKey) -> Result<Arc<ServiceDeclaration>, ResolveError> {
        let Some(family) = service.generic_family() else {
            return Err(ResolveError::ServiceNotFound(service.clone()));
        };
        let Some(open) = self.lookup(&ServiceKey::open(family)) else {
            return Err(ResolveError::ServiceNotFound(service.clone()));
        };
        self.specialize_member(&last_member(open), service)
    }

    /// Returns the specialization of the open registration `open` for
    /// `service`, building it on first request.
    fn specialize_member(
        &self,
        open: &ServiceDeclaration,
        service: &ServiceKey,
    ) -> Result<Arc<ServiceDeclaration>, ResolveError> {
        let key = (open.id(), service.clone());
        if let Some(declaration) = self.specializations.read().get(&key) {
            return Ok(Arc::clone(declaration));
        }

        let declaration = specialize_declaration(open, service)?;
        tracing::debug!(
            service = %service,
            open = %open.id(),
            "specialized open generic declaration"
        );
        match self.specializations.write().entry(key) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => Ok(Arc::clone(entry.insert(Arc::new(declaration)))),
        }
    }

    /// Builds a collection declaration for `item`'s multi-bound registrations.
    ///
    /// When `item` has no registration of its own, the members are the
    /// specializations of every open registration of its family.
    fn synthesize_collection(
        &self,
        service: &ServiceKey,
        item: &ServiceKey,
    ) -> Result<Arc<ServiceDeclaration>, ResolveError> {
        if let Some(declaration) = self.collections.read().get(service) {
            return Ok(Arc::clone(declaration));
        }

        let members: Vec<Arc<ServiceDeclaration>> = if let Some(registered) = self.lookup(item) {
            let Some(members) = registered.members() else {
                return Err(ResolveError::AmbiguousCollection(service.clone()));
            };
            members.to_vec()
        } else if let Some(family) = item.generic_family() {
            let open = self
                .lookup(&ServiceKey::open(family))
                .ok_or_else(|| ResolveError::AmbiguousCollection(service.clone()))?;
            let Some(members) = open.members() else {
                return Err(ResolveError::AmbiguousCollection(service.clone()));
            };
            members
                .iter()
                .map(|member| self.specialize_member(member, item))
                .collect::<Result<_, _>>()?
        } else {
            return Err(ResolveError::AmbiguousCollection(service.clone()));
        };

        tracing::debug!(
            service = %service,
            members = members.len(),
            "synthesized collection declaration"
        );
        let declaration = collection_declaration(service.clone(), members.into());
        match self.collections.write().entry(service.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => Ok(Arc::clone(entry.insert(Arc::new(declaration)))),
        }
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registry")
            .field("declarations", &self.len())
            .finish()
    }
}

fn last_member(declaration: Arc<ServiceDeclaration>) -> Arc<ServiceDeclaration> {
    if let Some(last) = declaration.members().and_then(<[_]>::last) {
        return Arc::clone(last);
    }
    declaration
}

/// Specializes an open type-bound declaration for the constructed key `service`.
fn specialize_declaration(
    open: &ServiceDeclaration,
    service: &ServiceKey,
) -> Result<ServiceDeclaration, ResolveError> {
    let Binding::Type(Implementation::Open(generic)) = open.binding() else {
        return Err(ResolveError::InvalidGenericBinding {
            service: service.clone(),
            reason: "an open generic service must be bound to an open generic implementation",
        });
    };
    let closed = generic
        .specialize(service.type_arguments())
        .ok_or_else(|| ResolveError::InvalidGenericBinding {
            service: service.clone(),
            reason: "the implementation cannot be specialized with these type arguments",
        })?;
    Ok(ServiceDeclaration::type_bound(
        service.clone(),
        closed,
        open.lifetime(),
    ))
}

/// Resolves every member through `resolver` into one [`ServiceCollection`].
pub(crate) fn resolve_members(
    resolver: &dyn Resolver,
    members: &[Arc<ServiceDeclaration>],
) -> Result<Instance, ResolveError> {
    let items = members
        .iter()
        .map(|member| resolver.resolve_declaration(member))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instance::new(Arc::new(ServiceCollection::new(items))))
}

/// A transient declaration resolving every member through the calling scope.
fn collection_declaration(
    service: ServiceKey,
    members: Arc<[Arc<ServiceDeclaration>]>,
) -> ServiceDeclaration {
    ServiceDeclaration::factory_bound(service, Lifetime::Transient, move |resolver: &dyn Resolver| {
        resolve_members(resolver, &members)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::implementation::{Constructor, GenericImplementation, ImplementationType};
    use crate::key::GenericFamily;

    struct Plugin;
    struct Cache;
    struct RepositoryFamily;
    struct Repository<T>(core::marker::PhantomData<T>);

    fn factory(service: ServiceKey) -> ServiceDeclaration {
        ServiceDeclaration::factory_bound(service, Lifetime::Transient, |_| {
            Ok(Instance::new(Arc::new(Plugin)))
        })
    }

    fn repository(lifetime: Lifetime) -> ServiceDeclaration {
        let family = GenericFamily::of::<RepositoryFamily>();
        ServiceDeclaration::type_bound(
            ServiceKey::open(family),
            GenericImplementation::new(family, |args| {
                (args == [ServiceKey::of::<u32>()]).then(|| {
                    ImplementationType::new::<Repository<u32>>([Constructor::from_fn(|(): ()| {
                        Instance::new(Arc::new(Repository::<u32>(core::marker::PhantomData)))
                    })])
                })
            }),
            lifetime,
        )
    }

    #[test]
    fn single_registration_passes_through() {
        let declaration = factory(ServiceKey::of::<Plugin>());
        let id = declaration.id();
        let registry = Registry::build([declaration], DuplicatePolicy::Fold).unwrap();

        assert_eq!(registry.find(&ServiceKey::of::<Plugin>()).unwrap().id(), id);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn multiple_registrations_fold_into_multi_and_collection() {
        let first = factory(ServiceKey::of::<Plugin>());
        let second = factory(ServiceKey::of::<Plugin>());
        let last = second.id();
        let registry = Registry::build([first, second], DuplicatePolicy::Fold).unwrap();

        let multi = registry.lookup(&ServiceKey::of::<Plugin>()).unwrap();
        assert_eq!(multi.members().unwrap().len(), 2);
        assert_eq!(registry.find(&ServiceKey::of::<Plugin>()).unwrap().id(), last);
        assert!(registry.lookup(&ServiceKey::collection::<Plugin>()).is_some());
    }

    #[test]
    fn reject_policy_refuses_duplicates() {
        let result = Registry::build(
            [factory(ServiceKey::of::<Plugin>()), factory(ServiceKey::of::<Plugin>())],
            DuplicatePolicy::Reject,
        );
        assert!(matches!(result, Err(ResolveError::DuplicateRegistration(_))));
    }

    #[test]
    fn explicit_collection_registration_wins() {
        let explicit = factory(ServiceKey::collection::<Plugin>());
        let id = explicit.id();
        let registry = Registry::build(
            [
                factory(ServiceKey::of::<Plugin>()),
                explicit,
                factory(ServiceKey::of::<Plugin>()),
            ],
            DuplicatePolicy::Fold,
        )
        .unwrap();

        assert_eq!(registry.find(&ServiceKey::collection::<Plugin>()).unwrap().id(), id);
    }

    #[test]
    fn collection_requires_multiple_registrations() {
        let registry =
            Registry::build([factory(ServiceKey::of::<Plugin>())], DuplicatePolicy::Fold).unwrap();

        assert!(matches!(
            registry.find(&ServiceKey::collection::<Plugin>()),
            Err(ResolveError::AmbiguousCollection(_))
        ));
        assert!(matches!(
            registry.find(&ServiceKey::collection::<Cache>()),
            Err(ResolveError::AmbiguousCollection(_))
        ));
    }

    #[test]
    fn specialization_is_cached_under_the_constructed_key() {
        let family = GenericFamily::of::<RepositoryFamily>();
        let registry =
            Registry::build([repository(Lifetime::Scoped)], DuplicatePolicy::Fold).unwrap();
        let key = ServiceKey::constructed(family, [ServiceKey::of::<u32>()]);

        let first = registry.find(&key).unwrap();
        let second = registry.find(&key).unwrap();

        assert_eq!(first.id(), second.id());
        assert_eq!(first.service(), &key);
        assert_eq!(first.lifetime(), Lifetime::Scoped);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn collection_and_constructed_key_share_the_last_specialization() {
        let family = GenericFamily::of::<RepositoryFamily>();
        let key = ServiceKey::constructed(family, [ServiceKey::of::<u32>()]);
        let collection = ServiceKey::collection_of(key.clone());

        for constructed_first in [true, false] {
            let registry = Registry::build(
                [repository(Lifetime::Singleton), repository(Lifetime::Singleton)],
                DuplicatePolicy::Fold,
            )
            .unwrap();

            let (single, members) = if constructed_first {
                let single = registry.find(&key).unwrap();
                (single, registry.find(&collection).unwrap())
            } else {
                let members = registry.find(&collection).unwrap();
                (registry.find(&key).unwrap(), members)
            };

            // One specialization per open registration, the last one shared.
            let specialized = registry.specializations.read();
            assert_eq!(specialized.len(), 2);
            assert!(specialized.values().any(|member| member.id() == single.id()));
            assert_eq!(registry.find(&key).unwrap().id(), single.id());
            assert_eq!(registry.find(&collection).unwrap().id(), members.id());
        }
    }

    #[test]
    fn refused_specialization_is_an_invalid_binding() {
        let family = GenericFamily::of::<RepositoryFamily>();
        let registry =
            Registry::build([repository(Lifetime::Transient)], DuplicatePolicy::Fold).unwrap();

        let error = registry
            .find(&ServiceKey::constructed(family, [ServiceKey::of::<String>()]))
            .unwrap_err();
        assert!(matches!(error, ResolveError::InvalidGenericBinding { .. }));
    }

    #[test]
    fn open_family_bound_to_a_factory_is_an_invalid_binding() {
        let family = GenericFamily::of::<RepositoryFamily>();
        let registry =
            Registry::build([factory(ServiceKey::open(family))], DuplicatePolicy::Fold).unwrap();

        let error = registry
            .find(&ServiceKey::constructed(family, [ServiceKey::of::<u32>()]))
            .unwrap_err();
        assert!(matches!(error, ResolveError::InvalidGenericBinding { .. }));
    }

    #[test]
    fn unknown_keys_are_not_found() {
        let registry = Registry::build(Vec::new(), DuplicatePolicy::Fold).unwrap();
        let family = GenericFamily::of::<RepositoryFamily>();

        for key in [
            ServiceKey::of::<Cache>(),
            ServiceKey::open(family),
            ServiceKey::constructed(family, [ServiceKey::of::<u32>()]),
        ] {
            assert!(matches!(registry.find(&key), Err(ResolveError::ServiceNotFound(_))));
        }
    }
}
