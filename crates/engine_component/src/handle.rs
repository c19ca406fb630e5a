//! Generational handles addressing pooled component slots.
//!
//! A [`RawHandle`] packs a component type id, a slot index, and the slot's
//! generation at the time the handle was issued. The handle stays valid only
//! while the generation matches the slot's current generation; freeing a slot
//! bumps its generation, so every handle issued before the free resolves to
//! `None` afterwards — even once the slot is reused.
//!
//! [`Handle<T>`] is a zero-cost typed wrapper over [`RawHandle`]. Typed access
//! goes through it, so the type-erased lookup is confined to the pool layer.

use std::marker::PhantomData;

use crate::component::Component;
use crate::registry::TypeId;

/// Slot generation counter.
///
/// Incremented with wrapping on every free. The small modulus means a handle
/// retained across 256 frees of the same slot could falsely validate; callers
/// that cache handles across ticks are expected to re-resolve them each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Generation(u8);

impl Generation {
    /// The generation every slot starts at.
    pub const ZERO: Generation = Generation(0);

    /// The generation after this one, wrapping at the counter width.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Returns the raw counter value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// Index of a slot within one component pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u16);

impl SlotIndex {
    /// Create a slot index from a raw `u16`.
    #[must_use]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the index as a `usize` for slice addressing.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// An opaque reference to a component slot: `{TypeId, Generation, SlotIndex}`.
///
/// Raw handles are only meaningful within the world whose pools issued them.
/// Resolving a stale handle is a soft failure (`None`), never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle {
    type_id: TypeId,
    index: SlotIndex,
    generation: Generation,
}

impl RawHandle {
    pub(crate) const fn new(type_id: TypeId, index: SlotIndex, generation: Generation) -> Self {
        Self {
            type_id,
            index,
            generation,
        }
    }

    /// The component type this handle addresses.
    #[must_use]
    pub const fn type_id(self) -> TypeId {
        self.type_id
    }

    /// The slot index within the type's pool.
    #[must_use]
    pub const fn index(self) -> SlotIndex {
        self.index
    }

    /// The slot generation this handle was issued against.
    #[must_use]
    pub const fn generation(self) -> Generation {
        self.generation
    }
}

/// A typed handle to a component of type `T`.
///
/// Same layout and validity rules as [`RawHandle`]; the type parameter lets
/// the world hand back `&T` / `&mut T` without the caller naming the pool.
pub struct Handle<T: Component> {
    raw: RawHandle,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Component> Handle<T> {
    pub(crate) const fn from_raw(raw: RawHandle) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Returns the untyped handle.
    #[must_use]
    pub const fn raw(self) -> RawHandle {
        self.raw
    }
}

impl<T: Component> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Component> Copy for Handle<T> {}

impl<T: Component> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: Component> Eq for Handle<T> {}

impl<T: Component> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("type", &T::type_name())
            .field("raw", &self.raw)
            .finish()
    }
}

impl<T: Component> From<Handle<T>> for RawHandle {
    fn from(handle: Handle<T>) -> Self {
        handle.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_wraps() {
        let mut g = Generation::ZERO;
        for _ in 0..=u8::MAX {
            g = g.next();
        }
        assert_eq!(g, Generation::ZERO);
    }

    #[test]
    fn test_generation_next_differs() {
        let g = Generation::ZERO;
        assert_ne!(g, g.next());
    }

    #[test]
    fn test_slot_index_roundtrip() {
        let idx = SlotIndex::new(42);
        assert_eq!(idx.index(), 42);
    }
}
