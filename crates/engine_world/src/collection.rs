//! Per-host component collections.
//!
//! A collection maps each component type a host owns to the head of the
//! host's chain in that type's pool. The chain links themselves live in the
//! pool slots; the collection only remembers where each chain starts, so a
//! host-scoped lookup is one map probe regardless of how many components the
//! host carries.

use std::collections::HashMap;

use engine_component::{SlotIndex, TypeId};

/// One host's view of its components: chain head per exact component type.
#[derive(Debug, Default)]
pub struct ComponentCollection {
    heads: HashMap<TypeId, SlotIndex>,
}

impl ComponentCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The head of this host's chain for `type_id`, if the host owns any
    /// component of that exact type.
    #[must_use]
    pub fn first(&self, type_id: TypeId) -> Option<SlotIndex> {
        self.heads.get(&type_id).copied()
    }

    /// Record `index` as the new chain head for `type_id`.
    pub fn set_first(&mut self, type_id: TypeId, index: SlotIndex) {
        self.heads.insert(type_id, index);
    }

    /// Drop the chain entry for `type_id`, marking the host as owning no
    /// components of that exact type.
    pub fn remove(&mut self, type_id: TypeId) {
        self.heads.remove(&type_id);
    }

    /// `true` if the host owns no components at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// Number of exact types the host owns at least one component of.
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.heads.len()
    }

    /// Iterate the exact types this host owns components of.
    pub fn types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.heads.keys().copied()
    }

    /// Drain all chain heads, emptying the collection.
    pub fn drain(&mut self) -> impl Iterator<Item = (TypeId, SlotIndex)> + '_ {
        self.heads.drain()
    }
}
