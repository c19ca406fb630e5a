//! World configuration.
//!
//! Pool capacities are data, not code: a world definition ships a list of
//! per-component capacity overrides that is applied to the registry before
//! the world builds its pools. Component types are referenced by their
//! registered name, so a definition file never names Rust types.

use engine_component::ComponentRegistry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Capacity override for one component type, matched by registered name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolCapacityConfig {
    /// The component's registered name.
    pub component_type: String,
    /// Pool capacity to use instead of the registration default.
    pub capacity: u16,
}

/// Deserialised world definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Per-component pool capacity overrides.
    #[serde(default)]
    pub component_pools: Vec<PoolCapacityConfig>,
}

impl WorldConfig {
    /// Parse a world definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply the capacity overrides to `registry`.
    ///
    /// Must run before the world builds its pools. Overrides naming no
    /// registered component are skipped with a warning; a typo in a
    /// definition file should be visible, not fatal.
    pub fn apply(&self, registry: &mut ComponentRegistry) {
        for entry in &self.component_pools {
            if !registry.set_capacity(&entry.component_type, entry.capacity) {
                warn!(
                    component_type = %entry.component_type,
                    capacity = entry.capacity,
                    "capacity override for unknown component type"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use engine_component::Component;

    use super::*;

    #[derive(Debug, Default)]
    struct Health;

    impl Component for Health {
        type Definition = ();

        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_parse_and_apply_overrides() {
        let json = r#"{
            "component_pools": [
                { "component_type": "Health", "capacity": 128 }
            ]
        }"#;
        let config = WorldConfig::from_json(json).unwrap();

        let mut registry = ComponentRegistry::new();
        let health = registry.register::<Health>(16);
        config.apply(&mut registry);

        assert_eq!(registry.metadata(health).capacity(), 128);
    }

    #[test]
    fn test_unknown_component_is_skipped() {
        let json = r#"{
            "component_pools": [
                { "component_type": "NoSuchThing", "capacity": 4 },
                { "component_type": "Health", "capacity": 32 }
            ]
        }"#;
        let config = WorldConfig::from_json(json).unwrap();

        let mut registry = ComponentRegistry::new();
        let health = registry.register::<Health>(16);
        config.apply(&mut registry);

        // The bad entry is ignored; the good one still lands.
        assert_eq!(registry.metadata(health).capacity(), 32);
    }

    #[test]
    fn test_empty_config_is_valid() {
        let config = WorldConfig::from_json("{}").unwrap();
        assert!(config.component_pools.is_empty());
    }
}
