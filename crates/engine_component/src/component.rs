//! Core [`Component`] trait.
//!
//! Every piece of data stored in a component pool must implement
//! [`Component`]. Components are constructed in place in their pool slot via
//! `Default`, then run their [`Component::initialize`] step against an
//! externally-deserialized definition. The core never inspects definitions;
//! their shape belongs to the reflection/serialization layer that produced
//! them.

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::Component;
///
/// #[derive(Debug, Default)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// struct HealthDefinition {
///     max: f32,
/// }
///
/// impl Component for Health {
///     type Definition = HealthDefinition;
///
///     fn type_name() -> &'static str {
///         "Health"
///     }
///
///     fn initialize(&mut self, definition: &Self::Definition) {
///         self.max = definition.max;
///         self.current = definition.max;
///     }
/// }
/// ```
pub trait Component: Default + Sized + 'static {
    /// The externally-deserialized definition handed to this component at
    /// attach time. Use `()` for components that need none.
    type Definition;

    /// A stable, human-readable name for this component type.
    ///
    /// Pool-capacity configuration refers to components by this name, so it
    /// must be unique within one registry.
    fn type_name() -> &'static str;

    /// Factory step run right after the component is constructed in its slot.
    fn initialize(&mut self, _definition: &Self::Definition) {}

    /// Second factory step, run by the caller once every component of the
    /// host has been attached. Cross-component wiring belongs here.
    fn finalize(&mut self, _definition: &Self::Definition) {}
}
