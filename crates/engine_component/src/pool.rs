//! Fixed-capacity component pools.
//!
//! One pool exists per registered component type, sized by the type's
//! declared capacity and torn down with its world. Storage uses a roster of
//! slot indices: the first `allocated` roster entries address live slots, the
//! rest are free. Allocation pops from the boundary; freeing swaps the freed
//! entry back across it. This gives a freelist, a high-water mark, and dense
//! iteration over live slots in a single array.
//!
//! Each slot additionally threads an intra-host chain: `previous`/`next`
//! links connecting all components of this exact type owned by the same
//! host. Links are slot indices, never pointers, and a slot can only be
//! unlinked by its own pool — a dangling or cyclic chain cannot be
//! constructed through this API.

use std::any::Any;

use crate::component::Component;
use crate::error::ComponentError;
use crate::handle::{Generation, Handle, RawHandle, SlotIndex};
use crate::host::HostId;
use crate::registry::TypeId;

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    generation: Generation,
    host: Option<HostId>,
    next: Option<SlotIndex>,
    previous: Option<SlotIndex>,
    pending_free: bool,
    /// Where this slot currently sits in the roster.
    roster_position: u16,
}

/// Unlink record returned by a successful free.
///
/// The caller patches the owning host's collection head with `next` when the
/// freed slot was the head of its chain.
#[derive(Debug, Clone, Copy)]
pub struct FreedSlot {
    /// The host that owned the freed component.
    pub host: HostId,
    /// The freed slot's predecessor in its host chain, if any.
    pub previous: Option<SlotIndex>,
    /// The freed slot's successor in its host chain, if any.
    pub next: Option<SlotIndex>,
}

/// A fixed-capacity arena holding all live components of one concrete type.
pub struct Pool<T: Component> {
    type_id: TypeId,
    slots: Box<[Slot<T>]>,
    /// Live slot indices first, free ones after `allocated`.
    roster: Box<[SlotIndex]>,
    allocated: u16,
}

impl<T: Component> Pool<T> {
    /// Create a pool with `capacity` slots for type `type_id`.
    #[must_use]
    pub fn new(type_id: TypeId, capacity: u16) -> Self {
        let slots = (0..capacity)
            .map(|i| Slot {
                value: None,
                generation: Generation::ZERO,
                host: None,
                next: None,
                previous: None,
                pending_free: false,
                roster_position: i,
            })
            .collect();
        let roster = (0..capacity).map(SlotIndex::new).collect();
        Self {
            type_id,
            slots,
            roster,
            allocated: 0,
        }
    }

    /// The type id this pool stores.
    #[must_use]
    pub fn component_type_id(&self) -> TypeId {
        self.type_id
    }

    /// Maximum number of live components.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of currently live components.
    #[must_use]
    pub fn allocated_count(&self) -> usize {
        self.allocated as usize
    }

    /// Allocate a slot for `host`, default-constructing the value in place
    /// and linking it at the head of the host's exact-type chain.
    ///
    /// `chain_head` is the host's current chain head for this type (the
    /// caller updates its collection to the returned handle's index). The
    /// handle carries the slot's current generation, untouched since the
    /// slot was last freed.
    pub fn allocate(
        &mut self,
        host: HostId,
        chain_head: Option<SlotIndex>,
    ) -> Result<Handle<T>, ComponentError> {
        if self.allocated_count() == self.capacity() {
            return Err(ComponentError::CapacityExhausted {
                type_name: T::type_name(),
                capacity: self.slots.len() as u16,
            });
        }

        let index = self.roster[self.allocated as usize];
        self.allocated += 1;

        if let Some(head) = chain_head {
            self.slots[head.index()].previous = Some(index);
        }

        let slot = &mut self.slots[index.index()];
        slot.value = Some(T::default());
        slot.host = Some(host);
        slot.next = chain_head;
        slot.previous = None;
        slot.pending_free = false;

        Ok(Handle::from_raw(RawHandle::new(
            self.type_id,
            index,
            slot.generation,
        )))
    }

    /// Resolve a handle to a shared reference.
    ///
    /// Returns `None` for stale or out-of-range handles — the soft failure
    /// path, never an error.
    #[must_use]
    pub fn resolve(&self, handle: RawHandle) -> Option<&T> {
        let slot = self.slots.get(handle.index().index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Resolve a handle to an exclusive reference.
    #[must_use]
    pub fn resolve_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index().index())?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Free the slot a handle addresses.
    ///
    /// A stale handle is a no-op (`None`). Otherwise the slot is unlinked
    /// from its host chain, the value dropped, the generation bumped, and
    /// the index returned to the free region — one atomic step per free, so
    /// handle invalidation happens exactly once.
    pub fn free(&mut self, handle: RawHandle) -> Option<FreedSlot> {
        let index = handle.index();
        {
            let slot = self.slots.get(index.index())?;
            if slot.generation != handle.generation() || slot.value.is_none() {
                return None;
            }
        }

        let slot = &mut self.slots[index.index()];
        let Some(host) = slot.host.take() else {
            return None;
        };
        let previous = slot.previous.take();
        let next = slot.next.take();
        slot.value = None;
        slot.pending_free = false;
        slot.generation = slot.generation.next();

        // Splice the neighbours together.
        if let Some(prev) = previous {
            self.slots[prev.index()].next = next;
        }
        if let Some(nxt) = next {
            self.slots[nxt.index()].previous = previous;
        }

        // Swap the roster entry back across the high-water boundary.
        self.allocated -= 1;
        let last = self.allocated as usize;
        let position = self.slots[index.index()].roster_position as usize;
        if position != last {
            self.roster.swap(position, last);
            let moved = self.roster[position];
            self.slots[moved.index()].roster_position = position as u16;
            self.slots[index.index()].roster_position = last as u16;
        }

        Some(FreedSlot {
            host,
            previous,
            next,
        })
    }

    /// Next slot in the same host's chain.
    #[must_use]
    pub fn next_of(&self, index: SlotIndex) -> Option<SlotIndex> {
        self.slots.get(index.index())?.next
    }

    /// Previous slot in the same host's chain.
    #[must_use]
    pub fn previous_of(&self, index: SlotIndex) -> Option<SlotIndex> {
        self.slots.get(index.index())?.previous
    }

    /// The host owning the component at `index`, if the slot is live.
    #[must_use]
    pub fn host_of(&self, index: SlotIndex) -> Option<HostId> {
        self.slots.get(index.index())?.host
    }

    /// A handle for the live component at `index`.
    #[must_use]
    pub fn handle_at(&self, index: SlotIndex) -> Option<RawHandle> {
        let slot = self.slots.get(index.index())?;
        slot.value.as_ref()?;
        Some(RawHandle::new(self.type_id, index, slot.generation))
    }

    /// A typed handle for the live component at `index`.
    #[must_use]
    pub fn typed_at(&self, index: SlotIndex) -> Option<Handle<T>> {
        self.handle_at(index).map(Handle::from_raw)
    }

    /// The live component value at `index`.
    #[must_use]
    pub fn value_at(&self, index: SlotIndex) -> Option<&T> {
        self.slots.get(index.index())?.value.as_ref()
    }

    /// The live component value at `index`, mutably.
    #[must_use]
    pub fn value_at_mut(&mut self, index: SlotIndex) -> Option<&mut T> {
        self.slots.get_mut(index.index())?.value.as_mut()
    }

    /// Iterate every live slot, in roster order.
    ///
    /// This is the query engine's outer loop: all allocated components of
    /// the type, not scoped to any host. Order is unspecified and changes
    /// as slots are freed.
    pub fn live_slots(&self) -> impl Iterator<Item = SlotIndex> + '_ {
        self.roster[..self.allocated as usize].iter().copied()
    }

    /// Flag a live slot for deferred deletion.
    ///
    /// Returns `false` if the slot is dead or already flagged, so a handle
    /// queued twice in one tick is freed once.
    pub fn flag_pending_free(&mut self, index: SlotIndex) -> bool {
        match self.slots.get_mut(index.index()) {
            Some(slot) if slot.value.is_some() && !slot.pending_free => {
                slot.pending_free = true;
                true
            }
            _ => false,
        }
    }

    /// Whether the slot at `index` is flagged for deferred deletion.
    #[must_use]
    pub fn is_pending_free(&self, index: SlotIndex) -> bool {
        self.slots
            .get(index.index())
            .is_some_and(|slot| slot.pending_free)
    }
}

impl<T: Component> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("type", &T::type_name())
            .field("allocated", &self.allocated)
            .field("capacity", &self.slots.len())
            .finish()
    }
}

/// Object-safe view of a [`Pool`] for type-erased storage.
///
/// The manager holds `Box<dyn AnyPool>` per registered type; the single
/// typed-access point is [`AnyPool::as_any`] + a downcast to the concrete
/// `Pool<T>`, performed in exactly one audited place.
pub trait AnyPool: std::fmt::Debug {
    /// The type id this pool stores.
    fn component_type_id(&self) -> TypeId;
    /// The stored component type's registered name.
    fn type_name(&self) -> &'static str;
    /// Maximum number of live components.
    fn capacity(&self) -> usize;
    /// Number of currently live components.
    fn allocated_count(&self) -> usize;
    /// Type-erased [`Pool::free`].
    fn free_raw(&mut self, handle: RawHandle) -> Option<FreedSlot>;
    /// Type-erased [`Pool::flag_pending_free`].
    fn flag_pending_free(&mut self, index: SlotIndex) -> bool;
    /// Type-erased [`Pool::host_of`].
    fn host_of(&self, index: SlotIndex) -> Option<HostId>;
    /// Type-erased [`Pool::next_of`].
    fn next_of(&self, index: SlotIndex) -> Option<SlotIndex>;
    /// Type-erased [`Pool::handle_at`].
    fn handle_at(&self, index: SlotIndex) -> Option<RawHandle>;
    /// Type-erased [`Pool::live_slots`].
    fn live_slots(&self) -> Box<dyn Iterator<Item = SlotIndex> + '_>;
    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
    /// Downcast support, mutable.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for Pool<T> {
    fn component_type_id(&self) -> TypeId {
        self.type_id
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn capacity(&self) -> usize {
        Pool::capacity(self)
    }

    fn allocated_count(&self) -> usize {
        Pool::allocated_count(self)
    }

    fn free_raw(&mut self, handle: RawHandle) -> Option<FreedSlot> {
        Pool::free(self, handle)
    }

    fn flag_pending_free(&mut self, index: SlotIndex) -> bool {
        Pool::flag_pending_free(self, index)
    }

    fn host_of(&self, index: SlotIndex) -> Option<HostId> {
        Pool::host_of(self, index)
    }

    fn next_of(&self, index: SlotIndex) -> Option<SlotIndex> {
        Pool::next_of(self, index)
    }

    fn handle_at(&self, index: SlotIndex) -> Option<RawHandle> {
        Pool::handle_at(self, index)
    }

    fn live_slots(&self) -> Box<dyn Iterator<Item = SlotIndex> + '_> {
        Box::new(Pool::live_slots(self))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Dummy {
        value: i32,
    }

    impl Component for Dummy {
        type Definition = i32;

        fn type_name() -> &'static str {
            "Dummy"
        }

        fn initialize(&mut self, definition: &i32) {
            self.value = *definition;
        }
    }

    fn make_pool(capacity: u16) -> Pool<Dummy> {
        Pool::new(TypeId::new(0), capacity)
    }

    const HOST: HostId = HostId::from_raw(1);

    #[test]
    fn test_allocate_within_capacity() {
        let mut pool = make_pool(3);
        let mut head = None;
        for _ in 0..3 {
            let handle = pool.allocate(HOST, head).unwrap();
            head = Some(handle.raw().index());
        }
        assert_eq!(pool.allocated_count(), 3);
    }

    #[test]
    fn test_capacity_exhaustion_is_typed_error() {
        let mut pool = make_pool(2);
        pool.allocate(HOST, None).unwrap();
        pool.allocate(HOST, None).unwrap();
        let err = pool.allocate(HOST, None).unwrap_err();
        match err {
            ComponentError::CapacityExhausted {
                type_name,
                capacity,
            } => {
                assert_eq!(type_name, "Dummy");
                assert_eq!(capacity, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(pool.allocated_count(), 2);
    }

    #[test]
    fn test_free_then_resolve_is_none() {
        let mut pool = make_pool(2);
        let handle = pool.allocate(HOST, None).unwrap();
        assert!(pool.resolve(handle.raw()).is_some());
        assert!(pool.free(handle.raw()).is_some());
        assert!(pool.resolve(handle.raw()).is_none());
    }

    #[test]
    fn test_stale_handle_stays_dead_after_reuse() {
        let mut pool = make_pool(1);
        let first = pool.allocate(HOST, None).unwrap();
        pool.free(first.raw()).unwrap();

        // The slot is reused, but with a new generation.
        let second = pool.allocate(HOST, None).unwrap();
        assert_ne!(first, second);
        assert!(pool.resolve(first.raw()).is_none());
        assert!(pool.resolve(second.raw()).is_some());
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut pool = make_pool(2);
        let handle = pool.allocate(HOST, None).unwrap();
        assert!(pool.free(handle.raw()).is_some());
        assert!(pool.free(handle.raw()).is_none());
        assert_eq!(pool.allocated_count(), 0);
    }

    #[test]
    fn test_alloc_free_roundtrip_restores_count() {
        let mut pool = make_pool(4);
        let before = pool.allocated_count();
        let handle = pool.allocate(HOST, None).unwrap();
        pool.free(handle.raw()).unwrap();
        assert_eq!(pool.allocated_count(), before);
    }

    #[test]
    fn test_chain_links_newest_first() {
        let mut pool = make_pool(4);
        let a = pool.allocate(HOST, None).unwrap();
        let b = pool.allocate(HOST, Some(a.raw().index())).unwrap();
        let c = pool.allocate(HOST, Some(b.raw().index())).unwrap();

        // c -> b -> a
        assert_eq!(pool.next_of(c.raw().index()), Some(b.raw().index()));
        assert_eq!(pool.next_of(b.raw().index()), Some(a.raw().index()));
        assert_eq!(pool.next_of(a.raw().index()), None);
        assert_eq!(pool.previous_of(a.raw().index()), Some(b.raw().index()));
        assert_eq!(pool.previous_of(c.raw().index()), None);
    }

    #[test]
    fn test_free_splices_chain_middle() {
        let mut pool = make_pool(4);
        let a = pool.allocate(HOST, None).unwrap();
        let b = pool.allocate(HOST, Some(a.raw().index())).unwrap();
        let c = pool.allocate(HOST, Some(b.raw().index())).unwrap();

        let freed = pool.free(b.raw()).unwrap();
        assert_eq!(freed.host, HOST);
        assert_eq!(freed.previous, Some(c.raw().index()));
        assert_eq!(freed.next, Some(a.raw().index()));

        // c -> a after the splice.
        assert_eq!(pool.next_of(c.raw().index()), Some(a.raw().index()));
        assert_eq!(pool.previous_of(a.raw().index()), Some(c.raw().index()));
    }

    #[test]
    fn test_live_slots_walks_all_allocated() {
        let mut pool = make_pool(8);
        let a = pool.allocate(HOST, None).unwrap();
        let b = pool.allocate(HostId::from_raw(2), None).unwrap();
        let c = pool.allocate(HostId::from_raw(3), None).unwrap();
        pool.free(b.raw());

        let live: Vec<SlotIndex> = pool.live_slots().collect();
        assert_eq!(live.len(), 2);
        assert!(live.contains(&a.raw().index()));
        assert!(live.contains(&c.raw().index()));
    }

    #[test]
    fn test_pending_free_flag_set_once() {
        let mut pool = make_pool(2);
        let handle = pool.allocate(HOST, None).unwrap();
        let index = handle.raw().index();
        assert!(pool.flag_pending_free(index));
        assert!(!pool.flag_pending_free(index));
        assert!(pool.is_pending_free(index));

        // Freeing clears the flag for the next occupant.
        pool.free(handle.raw());
        assert!(!pool.is_pending_free(index));
    }

    #[test]
    fn test_initialize_via_resolve_mut() {
        let mut pool = make_pool(2);
        let handle = pool.allocate(HOST, None).unwrap();
        if let Some(component) = pool.resolve_mut(handle.raw()) {
            component.initialize(&41);
        }
        assert_eq!(pool.resolve(handle.raw()).map(|c| c.value), Some(41));
    }
}
