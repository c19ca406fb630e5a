//! System registration.
//!
//! A system is a named closure run once per world per tick. Systems execute
//! in registration order; there is no scheduling or parallelism, and a
//! system gets exclusive access to the world while it runs.

use tracing::debug;

use crate::tick::TickContext;
use crate::world::World;

/// A registered system: the per-tick closure plus its name for logging.
pub struct SystemInfo {
    name: String,
    run: Box<dyn FnMut(&mut World, &TickContext)>,
}

impl SystemInfo {
    /// The system's registered name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemInfo").field("name", &self.name).finish()
    }
}

/// Registry of systems, run in registration order each tick.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: Vec<SystemInfo>,
}

impl SystemRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a system under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        run: impl FnMut(&mut World, &TickContext) + 'static,
    ) {
        let name = name.into();
        debug!(system = %name, "registered system");
        self.systems.push(SystemInfo {
            name,
            run: Box::new(run),
        });
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// `true` if no systems are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Iterate registered systems in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &SystemInfo> {
        self.systems.iter()
    }

    /// Run every system against `world`, in registration order.
    pub fn run_all(&mut self, world: &mut World, ctx: &TickContext) {
        for system in &mut self.systems {
            (system.run)(world, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use engine_component::ComponentRegistry;

    use super::*;

    #[test]
    fn test_systems_run_in_registration_order() {
        let mut registry = SystemRegistry::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            registry.register(name, move |_, _| order.borrow_mut().push(name));
        }

        let mut world = World::new(ComponentRegistry::new());
        let ctx = TickContext {
            tick_id: 1,
            dt: 1.0 / 60.0,
        };
        registry.run_all(&mut world, &ctx);

        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
        assert_eq!(registry.len(), 3);
    }
}
