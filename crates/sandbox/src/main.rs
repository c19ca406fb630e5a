//! # sandbox — demo simulation
//!
//! A small scene exercising the ECS core end to end: component registration
//! with a base/derived pair, data-driven pool capacities, typed queries with
//! deferred frees, and the fixed-timestep tick loop.

use anyhow::Result;
use engine_component::{Component, ComponentRegistry};
use engine_world::{TickConfig, TickLoop, World, WorldConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Position {
    x: f32,
    y: f32,
}

struct PositionDefinition {
    x: f32,
    y: f32,
}

impl Component for Position {
    type Definition = PositionDefinition;

    fn type_name() -> &'static str {
        "Position"
    }

    fn initialize(&mut self, definition: &Self::Definition) {
        self.x = definition.x;
        self.y = definition.y;
    }
}

#[derive(Debug, Default)]
struct Velocity {
    dx: f32,
    dy: f32,
}

struct VelocityDefinition {
    dx: f32,
    dy: f32,
}

impl Component for Velocity {
    type Definition = VelocityDefinition;

    fn type_name() -> &'static str {
        "Velocity"
    }

    fn initialize(&mut self, definition: &Self::Definition) {
        self.dx = definition.dx;
        self.dy = definition.dy;
    }
}

#[derive(Debug, Default)]
struct Lifetime {
    remaining: f64,
}

impl Component for Lifetime {
    type Definition = f64;

    fn type_name() -> &'static str {
        "Lifetime"
    }

    fn initialize(&mut self, definition: &f64) {
        self.remaining = *definition;
    }
}

/// A `Lifetime` that logs when it expires. Registered as a subtype, so
/// implements-aware queries for `Lifetime` reach it too.
#[derive(Debug, Default)]
struct LoudLifetime {
    remaining: f64,
}

impl Component for LoudLifetime {
    type Definition = f64;

    fn type_name() -> &'static str {
        "LoudLifetime"
    }

    fn initialize(&mut self, definition: &f64) {
        self.remaining = *definition;
    }
}

const WORLD_DEFINITION: &str = r#"{
    "component_pools": [
        { "component_type": "Position", "capacity": 256 },
        { "component_type": "Velocity", "capacity": 256 },
        { "component_type": "Lifetime", "capacity": 64 },
        { "component_type": "LoudLifetime", "capacity": 16 }
    ]
}"#;

fn build_world() -> Result<World> {
    let mut registry = ComponentRegistry::new();
    registry.register::<Position>(32);
    registry.register::<Velocity>(32);
    let lifetime = registry.register::<Lifetime>(32);
    registry.register_with_base::<LoudLifetime>(8, lifetime);

    let config = WorldConfig::from_json(WORLD_DEFINITION)?;
    config.apply(&mut registry);

    let mut world = World::new(registry);

    for i in 0..10 {
        let host = world.spawn_host();
        world.attach::<Position>(
            host,
            &PositionDefinition {
                x: i as f32,
                y: 0.0,
            },
        )?;
        world.attach::<Velocity>(
            host,
            &VelocityDefinition {
                dx: 1.0,
                dy: 0.5 * i as f32,
            },
        )?;
        if i % 2 == 0 {
            world.attach::<Lifetime>(host, &(0.1 * i as f64))?;
        } else {
            world.attach::<LoudLifetime>(host, &(0.05 * i as f64))?;
        }
    }

    Ok(world)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sandbox=info".parse()?))
        .init();

    info!("sandbox starting");

    let world = build_world()?;
    let lifetime_id = world.registry().type_id::<Lifetime>();
    info!(
        hosts = world.host_count(),
        lifetimes = world.count_allocated_that_implement(lifetime_id),
        "world built"
    );

    let mut tick_loop = TickLoop::new(TickConfig {
        tick_rate: 60.0,
        max_ticks: 120, // Two simulated seconds.
    });
    tick_loop.add_world(world);

    tick_loop.systems_mut().register("movement", |world, ctx| {
        let dt = ctx.dt as f32;
        world.query_components2::<Position, Velocity>(|_, _, (_, position), (_, velocity)| {
            position.x += velocity.dx * dt;
            position.y += velocity.dy * dt;
        });
    });

    tick_loop.systems_mut().register("expire", |world, ctx| {
        let dt = ctx.dt;
        world.query_components::<Lifetime>(|commands, host, handle, lifetime| {
            lifetime.remaining -= dt;
            if lifetime.remaining <= 0.0 {
                commands.free(handle);
                commands.destroy_host(host);
            }
        });
        world.query_components::<LoudLifetime>(|commands, host, handle, lifetime| {
            lifetime.remaining -= dt;
            if lifetime.remaining <= 0.0 {
                info!(%host, "loud lifetime expired");
                commands.free(handle);
                commands.destroy_host(host);
            }
        });
    });

    tick_loop.run();

    let world = tick_loop.world(0).ok_or_else(|| anyhow::anyhow!("world 0 missing"))?;
    info!(
        hosts = world.host_count(),
        positions = world.count_allocated::<Position>(),
        "sandbox finished"
    );

    Ok(())
}
