//! Component-layer error types.
//!
//! Only recoverable, data-dependent conditions appear here. Programmer
//! errors (unregistered types, out-of-registry ids) panic at the registry
//! boundary instead, and stale handles resolve to `None` rather than
//! erroring.

use crate::host::HostId;

/// Errors that can occur while operating on component storage.
#[derive(Debug, thiserror::Error)]
pub enum ComponentError {
    /// A pool's fixed capacity is exhausted. Entity counts are
    /// data-dependent, so callers may recover — e.g. by skipping a spawn.
    #[error("component pool for `{type_name}` is exhausted (capacity {capacity})")]
    CapacityExhausted {
        /// Name of the component type whose pool is full.
        type_name: &'static str,
        /// The pool's fixed capacity.
        capacity: u16,
    },

    /// The addressed host does not exist (never spawned, or destroyed).
    #[error("host {0} does not exist in this world")]
    UnknownHost(HostId),
}
