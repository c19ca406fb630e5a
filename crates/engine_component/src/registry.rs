//! Component type registry.
//!
//! The registry assigns each component type a small integer [`TypeId`] at
//! registration time and records its position in the implements/implementing
//! graph. Registration order is significant only in that ids are handed out
//! sequentially; ids are stable for the lifetime of the registry, and every
//! world builds its pools directly from its own registry — there is no
//! process-wide type state.
//!
//! Unknown-type lookups are programmer errors and panic. Data-dependent
//! conditions (capacity exhaustion, stale handles) are reported by the pool
//! layer instead.

use std::any::TypeId as RustTypeId;
use std::collections::HashMap;

use tracing::debug;

use crate::component::Component;
use crate::pool::{AnyPool, Pool};

/// Maximum number of distinct component types one registry can hold.
pub const MAX_TYPES: usize = 1023;

/// A small integer identifier for a registered component type.
///
/// Assigned sequentially by [`ComponentRegistry::register`]; meaningful only
/// within the registry (and world) that assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u16);

impl TypeId {
    pub(crate) const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the id as a `usize` for table addressing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

/// Per-type metadata recorded at registration.
#[derive(Debug)]
pub struct TypeMetadata {
    type_id: TypeId,
    name: &'static str,
    byte_size: usize,
    capacity: u16,
    /// This type plus every ancestor, nearest first.
    implements: Vec<TypeId>,
    /// This type plus every descendant, in registration order.
    implementing: Vec<TypeId>,
    /// Builds this type's pool; the per-type construct/destruct behaviour
    /// lives behind the returned trait object.
    make_pool: fn(TypeId, u16) -> Box<dyn AnyPool>,
}

impl TypeMetadata {
    /// The id assigned to this type.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The component's registered name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Size of one component instance in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Maximum live instances of this exact type.
    #[must_use]
    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// This type's id followed by every ancestor id.
    #[must_use]
    pub fn implements(&self) -> &[TypeId] {
        &self.implements
    }

    /// This type's id plus every descendant id.
    #[must_use]
    pub fn implementing(&self) -> &[TypeId] {
        &self.implementing
    }

    /// Build the fixed-capacity pool for this type.
    #[must_use]
    pub fn create_pool(&self) -> Box<dyn AnyPool> {
        (self.make_pool)(self.type_id, self.capacity)
    }
}

/// Registry of component types for one world.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    types: Vec<TypeMetadata>,
    by_rust_type: HashMap<RustTypeId, TypeId>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a root component type with the given pool capacity.
    ///
    /// # Panics
    ///
    /// Panics if `T` was already registered or the [`MAX_TYPES`] id budget is
    /// exhausted — both indicate a registration bug, not a data condition.
    pub fn register<T: Component>(&mut self, capacity: u16) -> TypeId {
        self.register_inner::<T>(capacity, None)
    }

    /// Register a component type as a subtype of an already-registered base.
    ///
    /// The new type inherits the base's `implements` list (plus the base
    /// itself), and every ancestor gains the new type in its `implementing`
    /// list, so implements-aware queries for any ancestor reach this type's
    /// pool.
    ///
    /// # Panics
    ///
    /// Panics on double registration, id budget exhaustion, or an
    /// unregistered `base`.
    pub fn register_with_base<T: Component>(&mut self, capacity: u16, base: TypeId) -> TypeId {
        self.register_inner::<T>(capacity, Some(base))
    }

    fn register_inner<T: Component>(&mut self, capacity: u16, base: Option<TypeId>) -> TypeId {
        assert!(
            !self.by_rust_type.contains_key(&RustTypeId::of::<T>()),
            "component type `{}` registered twice",
            T::type_name()
        );
        assert!(
            self.types.len() < MAX_TYPES,
            "component type id budget exhausted ({MAX_TYPES} types)"
        );

        let type_id = TypeId::new(self.types.len() as u16);

        // Every type implements itself.
        let mut implements = vec![type_id];
        if let Some(base) = base {
            // The base's implements list already contains the base and all of
            // its ancestors, so extending by it wires the whole chain.
            let base_implements = self.metadata(base).implements.clone();
            for &ancestor in &base_implements {
                self.types[ancestor.index()].implementing.push(type_id);
            }
            implements.extend(base_implements);
        }

        self.types.push(TypeMetadata {
            type_id,
            name: T::type_name(),
            byte_size: std::mem::size_of::<T>(),
            capacity,
            implements,
            implementing: vec![type_id],
            make_pool: |type_id, capacity| Box::new(Pool::<T>::new(type_id, capacity)),
        });
        self.by_rust_type.insert(RustTypeId::of::<T>(), type_id);

        debug!(
            type_name = T::type_name(),
            type_id = type_id.index(),
            capacity,
            "registered component type"
        );

        type_id
    }

    /// Returns the id assigned to `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered with this registry.
    #[must_use]
    pub fn type_id<T: Component>(&self) -> TypeId {
        match self.try_type_id::<T>() {
            Some(id) => id,
            None => panic!(
                "component type `{}` was never registered",
                T::type_name()
            ),
        }
    }

    /// Returns the id assigned to `T`, or `None` if unregistered.
    #[must_use]
    pub fn try_type_id<T: Component>(&self) -> Option<TypeId> {
        self.by_rust_type.get(&RustTypeId::of::<T>()).copied()
    }

    /// Returns the metadata for a registered type id.
    ///
    /// # Panics
    ///
    /// Panics for an id this registry never assigned.
    #[must_use]
    pub fn metadata(&self, type_id: TypeId) -> &TypeMetadata {
        self.types
            .get(type_id.index())
            .unwrap_or_else(|| panic!("unregistered component {type_id}"))
    }

    /// Returns `true` iff `candidate` is `target` or a descendant of it.
    #[must_use]
    pub fn type_implements_type(&self, candidate: TypeId, target: TypeId) -> bool {
        self.metadata(candidate).implements.contains(&target)
    }

    /// Override a registered type's pool capacity, matched by name.
    ///
    /// Returns `false` when no registered type carries `name`; callers are
    /// expected to warn, since a misspelled configuration entry is otherwise
    /// silent. Must be applied before the world builds its pools.
    pub fn set_capacity(&mut self, name: &str, capacity: u16) -> bool {
        match self.types.iter_mut().find(|meta| meta.name == name) {
            Some(meta) => {
                meta.capacity = capacity;
                true
            }
            None => false,
        }
    }

    /// Number of registered types.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Iterate over all registered type metadata, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeMetadata> {
        self.types.iter()
    }
}
