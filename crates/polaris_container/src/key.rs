//! Service keys.
//!
//! The engine never inspects source-level type syntax. Every service is looked
//! up by an explicit [`ServiceKey`] built from already-resolved type identities:
//!
//! | Key | Example | Built with |
//! |-----|---------|------------|
//! | [`ServiceKey::Type`] | `dyn Logger` | [`ServiceKey::of`] |
//! | [`ServiceKey::Open`] | `Handler<_>` | [`ServiceKey::open`] |
//! | [`ServiceKey::Constructed`] | `Handler<i32>` | [`ServiceKey::constructed`] |
//! | [`ServiceKey::Collection`] | `Collection<dyn Logger>` | [`ServiceKey::collection_of`] |
//!
//! Generic families have no runtime representation in Rust, so a family is
//! identified by a marker type:
//!
//! ```
//! use polaris_container::key::{GenericFamily, ServiceKey};
//!
//! struct HandlerFamily;
//!
//! let family = GenericFamily::named::<HandlerFamily>("Handler");
//! let key = ServiceKey::constructed(family, [ServiceKey::of::<i32>()]);
//! assert_eq!(key.to_string(), "Handler<i32>");
//! ```

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a single Rust type.
///
/// Equality and hashing only consider the [`TypeId`]; the name is kept for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeToken {
    id: TypeId,
    name: &'static str,
}

impl TypeToken {
    /// Creates the token for `T`. Trait objects are allowed.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeToken {}

impl Hash for TypeToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a parameterized type family such as `Handler<_>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericFamily {
    marker: TypeToken,
    name: &'static str,
}

impl GenericFamily {
    /// Creates a family identified by the marker type `M`, displayed with the
    /// marker's type name.
    #[must_use]
    pub fn of<M: ?Sized + 'static>() -> Self {
        let marker = TypeToken::of::<M>();
        Self {
            marker,
            name: marker.name(),
        }
    }

    /// Creates a family identified by the marker type `M` with a display name.
    #[must_use]
    pub fn named<M: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            marker: TypeToken::of::<M>(),
            name,
        }
    }

    /// Returns the display name of the family.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for GenericFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<_>", self.name)
    }
}

/// The key a service is registered and resolved by.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ServiceKey {
    /// A plain (non-generic) service type.
    Type(TypeToken),
    /// An open generic family, e.g. `Handler<_>`.
    Open(GenericFamily),
    /// A generic family applied to concrete type arguments, e.g. `Handler<i32>`.
    Constructed {
        /// The generic family.
        family: GenericFamily,
        /// The type arguments, in order.
        args: Arc<[ServiceKey]>,
    },
    /// "All registrations of" the inner key.
    Collection(Arc<ServiceKey>),
}

impl ServiceKey {
    /// Key of the plain service type `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::Type(TypeToken::of::<T>())
    }

    /// Key of an open generic family.
    #[must_use]
    pub fn open(family: GenericFamily) -> Self {
        Self::Open(family)
    }

    /// Key of `family` specialized with `args`.
    #[must_use]
    pub fn constructed(family: GenericFamily, args: impl IntoIterator<Item = ServiceKey>) -> Self {
        Self::Constructed {
            family,
            args: args.into_iter().collect(),
        }
    }

    /// Key of the collection of every registration of `item`.
    #[must_use]
    pub fn collection_of(item: ServiceKey) -> Self {
        Self::Collection(Arc::new(item))
    }

    /// Key of the collection of every registration of `T`.
    #[must_use]
    pub fn collection<T: ?Sized + 'static>() -> Self {
        Self::collection_of(Self::of::<T>())
    }

    /// Returns the generic family of an open or constructed key.
    #[must_use]
    pub fn generic_family(&self) -> Option<GenericFamily> {
        match self {
            Self::Open(family) | Self::Constructed { family, .. } => Some(*family),
            Self::Type(_) | Self::Collection(_) => None,
        }
    }

    /// Returns the type arguments of a constructed key (empty otherwise).
    #[must_use]
    pub fn type_arguments(&self) -> &[ServiceKey] {
        match self {
            Self::Constructed { args, .. } => args,
            _ => &[],
        }
    }

    /// Returns the item key of a collection key.
    #[must_use]
    pub fn collection_item(&self) -> Option<&ServiceKey> {
        match self {
            Self::Collection(item) => Some(item),
            _ => None,
        }
    }
}

impl From<TypeToken> for ServiceKey {
    fn from(token: TypeToken) -> Self {
        Self::Type(token)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(token) => f.write_str(token.name()),
            Self::Open(family) => write!(f, "{}<_>", family.name()),
            Self::Constructed { family, args } => {
                write!(f, "{}<", family.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Self::Collection(item) => write!(f, "Collection<{item}>"),
        }
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashSet;

    trait Greeter {}
    struct HandlerFamily;
    struct RepoFamily;

    #[test]
    fn tokens_compare_by_type_id() {
        assert_eq!(TypeToken::of::<i32>(), TypeToken::of::<i32>());
        assert_ne!(TypeToken::of::<i32>(), TypeToken::of::<u32>());
        assert_eq!(TypeToken::of::<dyn Greeter>().type_id(), TypeId::of::<dyn Greeter>());
    }

    #[test]
    fn constructed_keys_differ_by_arguments() {
        let family = GenericFamily::of::<HandlerFamily>();
        let int_handler = ServiceKey::constructed(family, [ServiceKey::of::<i32>()]);
        let str_handler = ServiceKey::constructed(family, [ServiceKey::of::<String>()]);

        assert_ne!(int_handler, str_handler);
        assert_eq!(
            int_handler,
            ServiceKey::constructed(family, [ServiceKey::of::<i32>()])
        );
        assert_eq!(int_handler.generic_family(), Some(family));
        assert_eq!(int_handler.type_arguments(), &[ServiceKey::of::<i32>()]);
    }

    #[test]
    fn families_differ_by_marker() {
        let handler = GenericFamily::named::<HandlerFamily>("Handler");
        let repo = GenericFamily::named::<RepoFamily>("Handler");
        assert_ne!(handler, repo);

        let mut keys = HashSet::new();
        keys.insert(ServiceKey::open(handler));
        keys.insert(ServiceKey::open(repo));
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn collection_wraps_item() {
        let key = ServiceKey::collection::<dyn Greeter>();
        assert_eq!(key.collection_item(), Some(&ServiceKey::of::<dyn Greeter>()));
        assert_eq!(ServiceKey::of::<i32>().collection_item(), None);
    }

    #[test]
    fn display_renders_generic_shapes() {
        let family = GenericFamily::named::<HandlerFamily>("Handler");
        assert_eq!(ServiceKey::open(family).to_string(), "Handler<_>");
        assert_eq!(
            ServiceKey::constructed(family, [ServiceKey::of::<i32>(), ServiceKey::of::<u8>()])
                .to_string(),
            "Handler<i32, u8>"
        );
        assert_eq!(
            ServiceKey::collection_of(ServiceKey::constructed(family, [ServiceKey::of::<i32>()]))
                .to_string(),
            "Collection<Handler<i32>>"
        );
    }
}
