//! # engine_world
//!
//! Worlds, hosts, and systems on top of the component layer.
//!
//! This crate provides:
//!
//! - [`World`] — hosts, their component collections, and the pools behind
//!   them.
//! - [`ComponentManager`] — type-erased pool storage and deferred-free
//!   queueing.
//! - [`Commands`] — structural mutations recorded during iteration, applied
//!   at the tick safe point.
//! - Query methods on [`World`] — cardinality-sorted multi-type joins.
//! - [`SystemRegistry`] / [`TickLoop`] — named per-tick closures and the
//!   fixed-timestep driver.
//! - [`WorldConfig`] — data-driven pool capacity overrides.

pub mod collection;
pub mod config;
pub mod manager;
pub mod query;
pub mod systems;
pub mod tick;
pub mod world;

pub use collection::ComponentCollection;
pub use config::{PoolCapacityConfig, WorldConfig};
pub use manager::ComponentManager;
pub use query::{Commands, QueryStats};
pub use systems::{SystemInfo, SystemRegistry};
pub use tick::{TickConfig, TickContext, TickLoop};
pub use world::World;
