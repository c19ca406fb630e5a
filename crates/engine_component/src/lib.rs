//! # engine_component
//!
//! The component layer of the ECS core — defines what a component is, how it
//! is identified, and how it is stored.
//!
//! This crate provides:
//!
//! - [`Component`] trait — the contract all pooled data must satisfy.
//! - [`Handle`] / [`RawHandle`] — generational references to pooled slots.
//! - [`HostId`] — lightweight `u64` identifiers for component owners.
//! - [`ComponentRegistry`] — per-world type ids and the
//!   implements/implementing graph.
//! - [`Pool`] — fixed-capacity, type-erased component storage with per-host
//!   chains.

pub mod component;
pub mod error;
pub mod handle;
pub mod host;
pub mod pool;
pub mod registry;

pub use component::Component;
pub use error::ComponentError;
pub use handle::{Generation, Handle, RawHandle, SlotIndex};
pub use host::HostId;
pub use pool::{AnyPool, FreedSlot, Pool};
pub use registry::{ComponentRegistry, TypeId, TypeMetadata, MAX_TYPES};
