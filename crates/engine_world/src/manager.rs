//! Type-erased pool storage for one world.
//!
//! The manager owns one pool per registered type plus the registry that
//! described them, and queues handles flagged for deferred deletion. All
//! typed access to the erased pools funnels through the downcast helpers in
//! this module; nothing else in the workspace touches `as_any`.

use engine_component::{
    AnyPool, Component, ComponentRegistry, FreedSlot, Pool, RawHandle, TypeId,
};
use tracing::debug;

/// Owns the component pools of one world.
#[derive(Debug)]
pub struct ComponentManager {
    registry: ComponentRegistry,
    /// One pool per registered type, indexed by [`TypeId`]. Built once at
    /// construction; capacity overrides must land in the registry before.
    pools: Vec<Box<dyn AnyPool>>,
    /// Handles flagged for deletion, freed together at the tick safe point.
    pending_free: Vec<RawHandle>,
}

impl ComponentManager {
    /// Build pools for every type in `registry` and take ownership of it.
    ///
    /// A pool is created even for capacity zero; allocation from it fails
    /// with a capacity error rather than the type being absent.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        let pools: Vec<Box<dyn AnyPool>> =
            registry.iter().map(|meta| meta.create_pool()).collect();

        debug!(pool_count = pools.len(), "built component pools");

        Self {
            registry,
            pools,
            pending_free: Vec::new(),
        }
    }

    /// The registry this manager's pools were built from.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// The type-erased pool for `type_id`.
    ///
    /// # Panics
    ///
    /// Panics for an id this world's registry never assigned.
    #[must_use]
    pub fn pool_dyn(&self, type_id: TypeId) -> &dyn AnyPool {
        self.pools
            .get(type_id.index())
            .unwrap_or_else(|| panic!("no pool for unregistered component {type_id}"))
            .as_ref()
    }

    /// The type-erased pool for `type_id`, mutably.
    ///
    /// # Panics
    ///
    /// Panics for an id this world's registry never assigned.
    pub fn pool_dyn_mut(&mut self, type_id: TypeId) -> &mut dyn AnyPool {
        self.pools
            .get_mut(type_id.index())
            .unwrap_or_else(|| panic!("no pool for unregistered component {type_id}"))
            .as_mut()
    }

    /// The concrete pool for `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    #[must_use]
    pub fn pool<T: Component>(&self) -> &Pool<T> {
        let type_id = self.registry.type_id::<T>();
        self.pools[type_id.index()]
            .as_any()
            .downcast_ref::<Pool<T>>()
            .unwrap_or_else(|| panic!("pool for `{}` holds a different type", T::type_name()))
    }

    /// The concrete pool for `T`, mutably.
    ///
    /// # Panics
    ///
    /// Panics if `T` was never registered.
    pub fn pool_mut<T: Component>(&mut self) -> &mut Pool<T> {
        let type_id = self.registry.type_id::<T>();
        self.pools[type_id.index()]
            .as_any_mut()
            .downcast_mut::<Pool<T>>()
            .unwrap_or_else(|| panic!("pool for `{}` holds a different type", T::type_name()))
    }

    /// Mutable access to two distinct pools at once, for paired iteration.
    ///
    /// # Panics
    ///
    /// Panics if `A` and `B` are the same registered type, or either is
    /// unregistered.
    pub fn pool_pair_mut<A: Component, B: Component>(&mut self) -> (&mut Pool<A>, &mut Pool<B>) {
        let a = self.registry.type_id::<A>();
        let b = self.registry.type_id::<B>();
        assert_ne!(a, b, "paired pool access needs two distinct component types");

        let [pa, pb] = self
            .pools
            .get_disjoint_mut([a.index(), b.index()])
            .unwrap_or_else(|err| panic!("pool indices invalid: {err}"));

        (
            pa.as_any_mut()
                .downcast_mut::<Pool<A>>()
                .unwrap_or_else(|| panic!("pool for `{}` holds a different type", A::type_name())),
            pb.as_any_mut()
                .downcast_mut::<Pool<B>>()
                .unwrap_or_else(|| panic!("pool for `{}` holds a different type", B::type_name())),
        )
    }

    /// Mutable access to three distinct pools at once.
    ///
    /// # Panics
    ///
    /// Panics if the three types are not pairwise distinct, or any is
    /// unregistered.
    pub fn pool_triple_mut<A: Component, B: Component, C: Component>(
        &mut self,
    ) -> (&mut Pool<A>, &mut Pool<B>, &mut Pool<C>) {
        let a = self.registry.type_id::<A>();
        let b = self.registry.type_id::<B>();
        let c = self.registry.type_id::<C>();
        assert!(
            a != b && a != c && b != c,
            "triple pool access needs three distinct component types"
        );

        let [pa, pb, pc] = self
            .pools
            .get_disjoint_mut([a.index(), b.index(), c.index()])
            .unwrap_or_else(|err| panic!("pool indices invalid: {err}"));

        (
            pa.as_any_mut()
                .downcast_mut::<Pool<A>>()
                .unwrap_or_else(|| panic!("pool for `{}` holds a different type", A::type_name())),
            pb.as_any_mut()
                .downcast_mut::<Pool<B>>()
                .unwrap_or_else(|| panic!("pool for `{}` holds a different type", B::type_name())),
            pc.as_any_mut()
                .downcast_mut::<Pool<C>>()
                .unwrap_or_else(|| panic!("pool for `{}` holds a different type", C::type_name())),
        )
    }

    /// Free the slot a handle addresses, immediately.
    ///
    /// Stale handles are a no-op (`None`). On success the unlink record is
    /// returned so the caller can patch the owning host's collection head.
    pub fn free_raw(&mut self, handle: RawHandle) -> Option<FreedSlot> {
        self.pool_dyn_mut(handle.type_id()).free_raw(handle)
    }

    /// Flag a live handle for deletion at the next safe point.
    ///
    /// Returns `false` for stale handles and for handles already flagged, so
    /// a handle queued twice in one tick is freed once.
    pub fn defer_free(&mut self, handle: RawHandle) -> bool {
        let pool = self.pool_dyn_mut(handle.type_id());
        if pool.handle_at(handle.index()) != Some(handle) {
            return false;
        }
        if !pool.flag_pending_free(handle.index()) {
            return false;
        }
        self.pending_free.push(handle);
        true
    }

    /// Take the queued deferred frees, leaving the queue empty.
    #[must_use]
    pub fn take_pending(&mut self) -> Vec<RawHandle> {
        std::mem::take(&mut self.pending_free)
    }

    /// Number of handles currently queued for deferred deletion.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending_free.len()
    }

    /// Live instances of the exact type `type_id`.
    #[must_use]
    pub fn count_allocated(&self, type_id: TypeId) -> usize {
        self.pool_dyn(type_id).allocated_count()
    }

    /// Live instances of `type_id` or any of its descendants.
    #[must_use]
    pub fn count_allocated_that_implement(&self, type_id: TypeId) -> usize {
        self.registry
            .metadata(type_id)
            .implementing()
            .iter()
            .map(|&descendant| self.pool_dyn(descendant).allocated_count())
            .sum()
    }
}
