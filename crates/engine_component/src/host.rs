//! Host identifiers.
//!
//! A host is an entity-like owner of components. The id itself carries no
//! data; the world maps each live id to a component collection. Pool slots
//! record the owning host so a query can jump from any component instance to
//! the rest of that host's components.

/// A unique host identifier within one world.
///
/// Host ids are allocated monotonically by the world that owns them and are
/// never reused; component slots, not hosts, carry the generation counters
/// that guard against stale references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u64);

impl HostId {
    /// The null / invalid host sentinel.
    pub const INVALID: HostId = HostId(0);

    /// Create a host id from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) host id.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Host({})", self.0)
    }
}
