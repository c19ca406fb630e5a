//! Fixed-timestep tick loop.
//!
//! Each tick runs every registered system over every world, then flushes
//! each world's pending queues. The flush is the safe point: structural
//! mutations queued during the tick — deferred frees, host destructions —
//! land here, never while a system is iterating.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::systems::SystemRegistry;
use crate::world::World;

/// Per-tick context handed to every system.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Current tick counter, starting at 1 for the first tick.
    pub tick_id: u64,
    /// Seconds simulated by this tick.
    pub dt: f64,
}

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

/// The simulation driver: worlds, systems, and the tick counter.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    worlds: Vec<World>,
    systems: SystemRegistry,
}

impl TickLoop {
    /// Create a tick loop with no worlds or systems.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self {
            tick_id: 0,
            config,
            worlds: Vec::new(),
            systems: SystemRegistry::new(),
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Add a world to the simulation; returns its index.
    pub fn add_world(&mut self, world: World) -> usize {
        self.worlds.push(world);
        self.worlds.len() - 1
    }

    /// Returns a reference to the world at `index`.
    #[must_use]
    pub fn world(&self, index: usize) -> Option<&World> {
        self.worlds.get(index)
    }

    /// Returns a mutable reference to the world at `index`.
    pub fn world_mut(&mut self, index: usize) -> Option<&mut World> {
        self.worlds.get_mut(index)
    }

    /// Returns a reference to the system registry.
    #[must_use]
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    /// Returns a mutable reference to the system registry.
    pub fn systems_mut(&mut self) -> &mut SystemRegistry {
        &mut self.systems
    }

    /// Run one tick: every system over every world, then the safe point.
    pub fn tick(&mut self, dt: f64) {
        self.tick_id += 1;
        let ctx = TickContext {
            tick_id: self.tick_id,
            dt,
        };

        debug!(
            tick_id = self.tick_id,
            dt,
            worlds = self.worlds.len(),
            systems = self.systems.len(),
            "tick start"
        );

        for world in &mut self.worlds {
            self.systems.run_all(world, &ctx);
            world.flush_pending();
        }
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    ///
    /// Blocking; sleeps out the remainder of each tick's time budget and
    /// warns when a tick overruns it.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            worlds = self.worlds.len(),
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f64());

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::{Component, ComponentRegistry};

    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        ticks: u64,
    }

    impl Component for Counter {
        type Definition = ();

        fn type_name() -> &'static str {
            "Counter"
        }
    }

    fn make_world() -> World {
        let mut registry = ComponentRegistry::new();
        registry.register::<Counter>(4);
        World::new(registry)
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = TickLoop::new(TickConfig::default());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 1);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 2);
    }

    #[test]
    fn test_systems_see_every_tick() {
        let mut tick_loop = TickLoop::new(TickConfig::default());
        let index = tick_loop.add_world(make_world());

        let world = tick_loop.world_mut(index).unwrap();
        let host = world.spawn_host();
        let handle = world.attach::<Counter>(host, &()).unwrap();

        tick_loop.systems_mut().register("count", |world, _| {
            world.query_components::<Counter>(|_, _, _, counter| {
                counter.ticks += 1;
            });
        });

        tick_loop.tick(1.0 / 60.0);
        tick_loop.tick(1.0 / 60.0);
        tick_loop.tick(1.0 / 60.0);

        let world = tick_loop.world(index).unwrap();
        assert_eq!(world.get(handle).map(|c| c.ticks), Some(3));
    }

    #[test]
    fn test_deferred_free_lands_at_end_of_tick() {
        let mut tick_loop = TickLoop::new(TickConfig::default());
        let index = tick_loop.add_world(make_world());

        let world = tick_loop.world_mut(index).unwrap();
        let host = world.spawn_host();
        let handle = world.attach::<Counter>(host, &()).unwrap();

        tick_loop.systems_mut().register("reap", |world, _| {
            world.query_components::<Counter>(|commands, _, handle, _| {
                commands.free(handle);
            });
        });
        // A later system in the same tick still sees the component.
        tick_loop.systems_mut().register("observe", |world, _| {
            assert_eq!(world.count_allocated::<Counter>(), 1);
        });

        tick_loop.tick(1.0 / 60.0);

        let world = tick_loop.world(index).unwrap();
        assert!(world.get(handle).is_none());
        assert_eq!(world.count_allocated::<Counter>(), 0);
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0, // fast for testing
            max_ticks: 5,
        };
        let mut tick_loop = TickLoop::new(config);
        tick_loop.add_world(make_world());
        tick_loop.run();
        assert_eq!(tick_loop.tick_id(), 5);
    }
}
