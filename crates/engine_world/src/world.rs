//! World state: hosts and their components.
//!
//! The [`World`] owns a [`ComponentManager`] plus the host table mapping each
//! live [`HostId`] to its [`ComponentCollection`]. Every structural change —
//! attach, detach, host destruction — goes through the world so the chain
//! heads in the collections and the links in the pools never disagree.

use std::collections::HashMap;

use engine_component::{
    Component, ComponentError, ComponentRegistry, Handle, HostId, RawHandle, TypeId,
};
use tracing::debug;

use crate::collection::ComponentCollection;
use crate::manager::ComponentManager;

/// One simulation world: hosts, their component collections, and the pools
/// behind them.
#[derive(Debug)]
pub struct World {
    manager: ComponentManager,
    hosts: HashMap<HostId, ComponentCollection>,
    /// Next host id to hand out. Ids start at 1; zero is the invalid
    /// sentinel, and ids are never reused.
    next_host: u64,
    /// Hosts queued for destruction at the tick safe point.
    pending_destroy: Vec<HostId>,
}

impl World {
    /// Build a world from a finished registry.
    ///
    /// Pool capacities are fixed from this point on; apply configuration
    /// overrides to the registry first.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            manager: ComponentManager::new(registry),
            hosts: HashMap::new(),
            next_host: 1,
            pending_destroy: Vec::new(),
        }
    }

    /// The registry this world's pools were built from.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        self.manager.registry()
    }

    /// The manager owning this world's pools.
    #[must_use]
    pub fn manager(&self) -> &ComponentManager {
        &self.manager
    }

    pub(crate) fn manager_mut(&mut self) -> &mut ComponentManager {
        &mut self.manager
    }

    pub(crate) fn collection(&self, host: HostId) -> Option<&ComponentCollection> {
        self.hosts.get(&host)
    }

    /// Create a new, empty host.
    pub fn spawn_host(&mut self) -> HostId {
        let host = HostId::from_raw(self.next_host);
        self.next_host += 1;
        self.hosts.insert(host, ComponentCollection::new());
        debug!(%host, "spawned host");
        host
    }

    /// `true` if `host` is live in this world.
    #[must_use]
    pub fn host_exists(&self, host: HostId) -> bool {
        self.hosts.contains_key(&host)
    }

    /// Number of live hosts.
    #[must_use]
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    /// Free every component a host owns, leaving the host alive and empty.
    ///
    /// A no-op for a host with nothing attached.
    pub fn release_all(&mut self, host: HostId) -> Result<(), ComponentError> {
        let collection = self
            .hosts
            .get_mut(&host)
            .ok_or(ComponentError::UnknownHost(host))?;
        let freed = Self::free_chains(&mut self.manager, collection);
        debug!(%host, components = freed, "released all components");
        Ok(())
    }

    /// Destroy a host, immediately freeing every component it owns.
    pub fn destroy_host(&mut self, host: HostId) -> Result<(), ComponentError> {
        let mut collection = self
            .hosts
            .remove(&host)
            .ok_or(ComponentError::UnknownHost(host))?;
        let freed = Self::free_chains(&mut self.manager, &mut collection);
        debug!(%host, components = freed, "destroyed host");
        Ok(())
    }

    fn free_chains(manager: &mut ComponentManager, collection: &mut ComponentCollection) -> usize {
        let mut freed = 0usize;
        for (type_id, head) in collection.drain() {
            let mut cursor = Some(head);
            while let Some(index) = cursor {
                let pool = manager.pool_dyn(type_id);
                let next = pool.next_of(index);
                if let Some(handle) = pool.handle_at(index) {
                    manager.free_raw(handle);
                    freed += 1;
                }
                cursor = next;
            }
        }
        freed
    }

    /// Attach a component of type `T` to `host`.
    ///
    /// The component is default-constructed in its pool slot, linked at the
    /// head of the host's chain for `T`, and then initialised against
    /// `definition`. Fails if the host is unknown or the pool is full; a
    /// failed attach leaves the world unchanged.
    pub fn attach<T: Component>(
        &mut self,
        host: HostId,
        definition: &T::Definition,
    ) -> Result<Handle<T>, ComponentError> {
        let type_id = self.manager.registry().type_id::<T>();
        let collection = self
            .hosts
            .get_mut(&host)
            .ok_or(ComponentError::UnknownHost(host))?;
        let head = collection.first(type_id);

        let handle = self.manager.pool_mut::<T>().allocate(host, head)?;
        collection.set_first(type_id, handle.raw().index());

        if let Some(component) = self.manager.pool_mut::<T>().resolve_mut(handle.raw()) {
            component.initialize(definition);
        }

        debug!(%host, component = T::type_name(), "attached component");
        Ok(handle)
    }

    /// Run a component's second factory step.
    ///
    /// Call once all of the host's components have been attached, so
    /// cross-component wiring can see its siblings. Returns `false` for a
    /// stale handle.
    pub fn finalize<T: Component>(&mut self, handle: Handle<T>, definition: &T::Definition) -> bool {
        match self.manager.pool_mut::<T>().resolve_mut(handle.raw()) {
            Some(component) => {
                component.finalize(definition);
                true
            }
            None => false,
        }
    }

    /// Detach and drop a component immediately.
    ///
    /// Stale handles are a no-op. Returns `true` if the component was live
    /// and is now freed, with the owning host's chain head patched.
    pub fn detach(&mut self, handle: impl Into<RawHandle>) -> bool {
        let handle = handle.into();
        let Some(freed) = self.manager.free_raw(handle) else {
            return false;
        };

        // Only the chain head lives outside the pool; interior links were
        // already spliced by the free itself.
        if let Some(collection) = self.hosts.get_mut(&freed.host)
            && collection.first(handle.type_id()) == Some(handle.index())
        {
            match freed.next {
                Some(next) => collection.set_first(handle.type_id(), next),
                None => collection.remove(handle.type_id()),
            }
        }
        true
    }

    /// Flag a component for deletion at the next safe point.
    ///
    /// The component stays live and queryable until [`World::flush_pending`]
    /// runs. Stale or already-flagged handles return `false`.
    pub fn defer_free(&mut self, handle: impl Into<RawHandle>) -> bool {
        self.manager.defer_free(handle.into())
    }

    pub(crate) fn defer_destroy_host(&mut self, host: HostId) {
        self.pending_destroy.push(host);
    }

    /// The tick safe point: free every deferred component and destroy every
    /// deferred host.
    pub fn flush_pending(&mut self) {
        let pending = self.manager.take_pending();
        let deferred = pending.len();
        for handle in pending {
            self.detach(handle);
        }

        let hosts = std::mem::take(&mut self.pending_destroy);
        for host in hosts {
            // A host queued twice, or destroyed by an earlier deferred op,
            // is already gone.
            let _ = self.destroy_host(host);
        }

        if deferred > 0 {
            debug!(freed = deferred, "flushed deferred frees");
        }
    }

    /// Resolve a typed handle to a shared reference.
    #[must_use]
    pub fn get<T: Component>(&self, handle: Handle<T>) -> Option<&T> {
        self.manager.pool::<T>().resolve(handle.raw())
    }

    /// Resolve a typed handle to an exclusive reference.
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.manager.pool_mut::<T>().resolve_mut(handle.raw())
    }

    /// The host owning the component a handle addresses, if it is live.
    #[must_use]
    pub fn host_of(&self, handle: impl Into<RawHandle>) -> Option<HostId> {
        let handle = handle.into();
        let pool = self.manager.pool_dyn(handle.type_id());
        if pool.handle_at(handle.index()) != Some(handle) {
            return None;
        }
        pool.host_of(handle.index())
    }

    /// The host's most recently attached component of exactly `T`.
    #[must_use]
    pub fn find_one<T: Component>(&self, host: HostId) -> Option<Handle<T>> {
        let type_id = self.manager.registry().type_id::<T>();
        let head = self.hosts.get(&host)?.first(type_id)?;
        self.manager.pool::<T>().typed_at(head)
    }

    /// The host's most recently attached component of exactly `type_id`.
    #[must_use]
    pub fn find_one_raw(&self, host: HostId, type_id: TypeId) -> Option<RawHandle> {
        let head = self.hosts.get(&host)?.first(type_id)?;
        self.manager.pool_dyn(type_id).handle_at(head)
    }

    /// All of the host's components of exactly `T`, newest first.
    #[must_use]
    pub fn find_all<T: Component>(&self, host: HostId) -> Vec<Handle<T>> {
        let type_id = self.manager.registry().type_id::<T>();
        let Some(collection) = self.hosts.get(&host) else {
            return Vec::new();
        };
        let pool = self.manager.pool::<T>();
        let mut found = Vec::new();
        let mut cursor = collection.first(type_id);
        while let Some(index) = cursor {
            if let Some(handle) = pool.typed_at(index) {
                found.push(handle);
            }
            cursor = pool.next_of(index);
        }
        found
    }

    /// All of the host's components of exactly `type_id`, newest first.
    #[must_use]
    pub fn find_all_raw(&self, host: HostId, type_id: TypeId) -> Vec<RawHandle> {
        let Some(collection) = self.hosts.get(&host) else {
            return Vec::new();
        };
        self.walk_chain(collection, type_id)
    }

    /// All of the host's components of `type_id` or any descendant type.
    ///
    /// Grouped by exact type in registration order, newest first within each
    /// type.
    #[must_use]
    pub fn find_all_that_implement(&self, host: HostId, type_id: TypeId) -> Vec<RawHandle> {
        let Some(collection) = self.hosts.get(&host) else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for &descendant in self.manager.registry().metadata(type_id).implementing() {
            found.extend(self.walk_chain(collection, descendant));
        }
        found
    }

    fn walk_chain(&self, collection: &ComponentCollection, type_id: TypeId) -> Vec<RawHandle> {
        let pool = self.manager.pool_dyn(type_id);
        let mut found = Vec::new();
        let mut cursor = collection.first(type_id);
        while let Some(index) = cursor {
            if let Some(handle) = pool.handle_at(index) {
                found.push(handle);
            }
            cursor = pool.next_of(index);
        }
        found
    }

    /// Live instances of exactly `T`, world-wide.
    #[must_use]
    pub fn count_allocated<T: Component>(&self) -> usize {
        let type_id = self.manager.registry().type_id::<T>();
        self.manager.count_allocated(type_id)
    }

    /// Live instances of exactly `type_id`, world-wide.
    #[must_use]
    pub fn count_allocated_raw(&self, type_id: TypeId) -> usize {
        self.manager.count_allocated(type_id)
    }

    /// Live instances of `type_id` or any descendant, world-wide.
    #[must_use]
    pub fn count_allocated_that_implement(&self, type_id: TypeId) -> usize {
        self.manager.count_allocated_that_implement(type_id)
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentRegistry;

    use super::*;

    #[derive(Debug, Default)]
    struct Health {
        current: f32,
        max: f32,
    }

    struct HealthDefinition {
        max: f32,
    }

    impl Component for Health {
        type Definition = HealthDefinition;

        fn type_name() -> &'static str {
            "Health"
        }

        fn initialize(&mut self, definition: &Self::Definition) {
            self.max = definition.max;
            self.current = definition.max;
        }
    }

    #[derive(Debug, Default)]
    struct Armor {
        rating: u32,
    }

    impl Component for Armor {
        type Definition = u32;

        fn type_name() -> &'static str {
            "Armor"
        }

        fn initialize(&mut self, definition: &u32) {
            self.rating = *definition;
        }
    }

    #[derive(Debug, Default)]
    struct HeavyArmor;

    impl Component for HeavyArmor {
        type Definition = ();

        fn type_name() -> &'static str {
            "HeavyArmor"
        }
    }

    fn make_world() -> World {
        let mut registry = ComponentRegistry::new();
        registry.register::<Health>(8);
        let armor = registry.register::<Armor>(8);
        registry.register_with_base::<HeavyArmor>(8, armor);
        World::new(registry)
    }

    #[test]
    fn test_spawn_host_ids_are_unique_and_valid() {
        let mut world = make_world();
        let a = world.spawn_host();
        let b = world.spawn_host();
        assert!(a.is_valid());
        assert!(b.is_valid());
        assert_ne!(a, b);
        assert_eq!(world.host_count(), 2);
    }

    #[test]
    fn test_attach_initializes_component() {
        let mut world = make_world();
        let host = world.spawn_host();
        let handle = world
            .attach::<Health>(host, &HealthDefinition { max: 100.0 })
            .unwrap();
        let health = world.get(handle).unwrap();
        assert_eq!(health.current, 100.0);
        assert_eq!(health.max, 100.0);
    }

    #[test]
    fn test_attach_to_unknown_host_fails() {
        let mut world = make_world();
        let err = world
            .attach::<Health>(HostId::from_raw(99), &HealthDefinition { max: 1.0 })
            .unwrap_err();
        assert!(matches!(err, ComponentError::UnknownHost(_)));
    }

    #[test]
    fn test_detach_patches_chain_head() {
        let mut world = make_world();
        let host = world.spawn_host();
        let first = world.attach::<Armor>(host, &1).unwrap();
        let second = world.attach::<Armor>(host, &2).unwrap();

        // Newest first: find_one sees the second attach.
        assert_eq!(world.find_one::<Armor>(host), Some(second));

        assert!(world.detach(second));
        assert_eq!(world.find_one::<Armor>(host), Some(first));

        assert!(world.detach(first));
        assert!(world.find_one::<Armor>(host).is_none());
    }

    #[test]
    fn test_find_all_walks_whole_chain() {
        let mut world = make_world();
        let host = world.spawn_host();
        let a = world.attach::<Armor>(host, &1).unwrap();
        let b = world.attach::<Armor>(host, &2).unwrap();
        let c = world.attach::<Armor>(host, &3).unwrap();

        assert_eq!(world.find_all::<Armor>(host), vec![c, b, a]);
    }

    #[test]
    fn test_destroy_host_releases_all_components() {
        let mut world = make_world();
        let host = world.spawn_host();
        let health = world
            .attach::<Health>(host, &HealthDefinition { max: 10.0 })
            .unwrap();
        let armor = world.attach::<Armor>(host, &5).unwrap();

        world.destroy_host(host).unwrap();
        assert!(!world.host_exists(host));
        assert!(world.get(health).is_none());
        assert!(world.get(armor).is_none());
        assert_eq!(world.count_allocated::<Health>(), 0);
        assert_eq!(world.count_allocated::<Armor>(), 0);
    }

    #[test]
    fn test_release_all_empties_chains_but_keeps_host() {
        let mut world = make_world();
        let host = world.spawn_host();
        world
            .attach::<Health>(host, &HealthDefinition { max: 10.0 })
            .unwrap();
        world.attach::<Armor>(host, &1).unwrap();
        world.attach::<Armor>(host, &2).unwrap();

        world.release_all(host).unwrap();
        assert!(world.host_exists(host));
        assert!(world.find_all::<Armor>(host).is_empty());
        assert_eq!(world.count_allocated::<Health>(), 0);
        assert_eq!(world.count_allocated::<Armor>(), 0);

        // The emptied host is still usable, and a second release is a no-op.
        world.release_all(host).unwrap();
        world.attach::<Armor>(host, &3).unwrap();
        assert_eq!(world.count_allocated::<Armor>(), 1);
    }

    #[test]
    fn test_implements_counts_union_exact_counts() {
        let mut world = make_world();
        let host = world.spawn_host();
        for i in 0..5 {
            world.attach::<Armor>(host, &i).unwrap();
            world.attach::<HeavyArmor>(host, &()).unwrap();
        }

        let armor_id = world.registry().type_id::<Armor>();
        let heavy_id = world.registry().type_id::<HeavyArmor>();
        assert_eq!(world.count_allocated_raw(armor_id), 5);
        assert_eq!(world.count_allocated_raw(heavy_id), 5);
        assert_eq!(world.count_allocated_that_implement(armor_id), 10);
        assert_eq!(world.count_allocated_that_implement(heavy_id), 5);

        // The implements lookup unions both chains; the exact lookup sees
        // only the base chain.
        assert_eq!(world.find_all_that_implement(host, armor_id).len(), 10);
        assert_eq!(world.find_all_raw(host, armor_id).len(), 5);
        assert_eq!(world.find_all_that_implement(host, heavy_id).len(), 5);
    }

    #[test]
    fn test_find_all_that_implement_spans_descendants() {
        let mut world = make_world();
        let host = world.spawn_host();
        world.attach::<Armor>(host, &1).unwrap();
        world.attach::<HeavyArmor>(host, &()).unwrap();
        world.attach::<HeavyArmor>(host, &()).unwrap();

        let armor_id = world.registry().type_id::<Armor>();
        assert_eq!(world.find_all_that_implement(host, armor_id).len(), 3);
        assert_eq!(world.find_all_raw(host, armor_id).len(), 1);
    }

    #[test]
    fn test_deferred_free_survives_until_flush() {
        let mut world = make_world();
        let host = world.spawn_host();
        let handle = world.attach::<Armor>(host, &7).unwrap();

        assert!(world.defer_free(handle));
        // Still live and queryable before the safe point.
        assert!(world.get(handle).is_some());
        assert_eq!(world.count_allocated::<Armor>(), 1);

        world.flush_pending();
        assert!(world.get(handle).is_none());
        assert_eq!(world.count_allocated::<Armor>(), 0);
    }

    #[test]
    fn test_deferred_free_is_idempotent_within_a_tick() {
        let mut world = make_world();
        let host = world.spawn_host();
        let handle = world.attach::<Armor>(host, &7).unwrap();
        let other = world.attach::<Armor>(host, &8).unwrap();

        assert!(world.defer_free(handle));
        assert!(!world.defer_free(handle));

        world.flush_pending();
        assert!(world.get(handle).is_none());
        assert!(world.get(other).is_some());
        assert_eq!(world.count_allocated::<Armor>(), 1);
    }

    #[test]
    fn test_capacity_exhaustion_leaves_world_unchanged() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Armor>(1);
        let mut world = World::new(registry);
        let host = world.spawn_host();

        world.attach::<Armor>(host, &1).unwrap();
        let err = world.attach::<Armor>(host, &2).unwrap_err();
        assert!(matches!(err, ComponentError::CapacityExhausted { .. }));
        assert_eq!(world.count_allocated::<Armor>(), 1);
        assert_eq!(world.find_all::<Armor>(host).len(), 1);
    }

    #[test]
    fn test_stale_handle_after_slot_reuse() {
        let mut registry = ComponentRegistry::new();
        registry.register::<Armor>(1);
        let mut world = World::new(registry);
        let host = world.spawn_host();

        let first = world.attach::<Armor>(host, &1).unwrap();
        world.detach(first);
        let second = world.attach::<Armor>(host, &2).unwrap();

        assert!(world.get(first).is_none());
        assert_eq!(world.get(second).map(|a| a.rating), Some(2));
        assert!(!world.detach(first));
    }
}
