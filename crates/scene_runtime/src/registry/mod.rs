//! Component type registry
//!
//! External subsystems (physics, rendering, scripting) plug into the runtime
//! by registering a component type: a name, a resource type tag, static
//! metadata, and a [`ComponentLifecycle`] implementation providing the fixed
//! callback set. The registry is built once with [`RegistryBuilder`] before
//! any collection exists and is read-only afterwards; it is an explicit
//! object rather than process-global state, so independent runtimes can
//! coexist in one process.
//!
//! Dispatch is a closed table: the callback set is fixed at registration
//! time, so component kinds are records in a table instead of an open trait
//! hierarchy on the hot path.

use std::any::Any;
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;

use std::rc::Rc;

use thiserror::Error;

use crate::collection::{CallbackOps, UpdateContext};
use crate::input::{InputAction, InputResponse};
use crate::instance::InstanceKey;
use crate::message::Message;
use crate::resource::ResourceTypeTag;

/// Registration errors, fatal at startup
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The component type name is already bound.
    #[error("component type '{0}' is already registered")]
    DuplicateType(String),

    /// The resource type tag is already bound to another component type.
    #[error("resource type {0:?} is already bound to component type '{1}'")]
    DuplicateResourceType(ResourceTypeTag, String),
}

/// Failure reported by a component callback
///
/// Component implementations communicate failure only through this value;
/// they must never panic across the callback boundary.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ComponentError(pub String);

impl ComponentError {
    /// Convenience constructor from any displayable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Opaque handle a component implementation returns from `create`
///
/// The runtime stores it in the component slot and threads it back through
/// every later callback; only the owning implementation interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComponentHandle(pub u64);

/// Index of a registered component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentTypeIndex(pub(crate) u32);

impl ComponentTypeIndex {
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Arguments to a component `create` callback
pub struct CreateContext<'a> {
    /// Instance the component is being attached to.
    pub instance: InstanceKey,
    /// The already-resolved resource; never raw bytes.
    pub resource: &'a dyn Any,
    /// Per-slot user data, present iff the type declares `has_user_data`.
    /// Starts at zero for a fresh slot.
    pub user_data: Option<&'a mut u64>,
}

/// By-value view of one live component passed to lifecycle callbacks
///
/// `user_data` is copied out of the slot before the callback and written
/// back afterwards, but only for types that declare `has_user_data`; for
/// all other types it reads as zero and writes are discarded.
#[derive(Debug, Clone, Copy)]
pub struct ComponentEntry {
    /// Owning instance.
    pub instance: InstanceKey,
    /// Handle the component returned from `create`.
    pub handle: ComponentHandle,
    /// Per-slot user data word.
    pub user_data: u64,
}

/// The fixed lifecycle callback set every component type implements
///
/// `create` and `destroy` are mandatory; the rest default to no-ops so a
/// minimal component type only implements what it needs. Callbacks must
/// return promptly — the runtime is single-threaded and never suspends.
pub trait ComponentLifecycle {
    /// Create one component from its resolved resource.
    ///
    /// # Errors
    ///
    /// A failing create aborts the owning instance's spawn; everything
    /// created before it is rolled back.
    fn create(&mut self, ctx: CreateContext<'_>) -> Result<ComponentHandle, ComponentError>;

    /// Post-creation initialization, run after the whole instance spawned.
    ///
    /// # Errors
    ///
    /// Init failures are reported and logged but not rolled back; the
    /// instance stays live.
    fn init(&mut self, _entry: &mut ComponentEntry) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Per-frame update over the dense set of live components of this type.
    ///
    /// # Errors
    ///
    /// A failing update is reported from `Collection::update` but does not
    /// stop the remaining types from updating.
    fn update(
        &mut self,
        _entries: &mut [ComponentEntry],
        _ctx: &UpdateContext,
        _ops: &CallbackOps,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Deliver one message to one component.
    ///
    /// # Errors
    ///
    /// Failures are logged by the collection and do not abort the drain.
    fn on_message(
        &mut self,
        _entry: &mut ComponentEntry,
        _message: &Message,
        _ops: &CallbackOps,
    ) -> Result<(), ComponentError> {
        Ok(())
    }

    /// Offer one input action to one component of the focused instance.
    fn on_input(&mut self, _entry: &mut ComponentEntry, _action: &InputAction) -> InputResponse {
        InputResponse::Ignored
    }

    /// Destroy one component. Must not fail.
    fn destroy(&mut self, entry: &mut ComponentEntry);
}

/// One registered component type: metadata plus its lifecycle object
pub struct ComponentTypeDef {
    name: String,
    resource_type: ResourceTypeTag,
    has_user_data: bool,
    max_instance_count: Option<u32>,
    update_priority: u16,
    lifecycle: RefCell<Box<dyn ComponentLifecycle>>,
}

impl fmt::Debug for ComponentTypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentTypeDef")
            .field("name", &self.name)
            .field("resource_type", &self.resource_type)
            .field("has_user_data", &self.has_user_data)
            .field("max_instance_count", &self.max_instance_count)
            .field("update_priority", &self.update_priority)
            .finish_non_exhaustive()
    }
}

impl ComponentTypeDef {
    /// Describe a component type with default metadata.
    pub fn new(
        name: impl Into<String>,
        resource_type: ResourceTypeTag,
        lifecycle: Box<dyn ComponentLifecycle>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type,
            has_user_data: false,
            max_instance_count: None,
            update_priority: 0,
            lifecycle: RefCell::new(lifecycle),
        }
    }

    /// Declare that slots of this type carry a user-data word.
    #[must_use]
    pub fn with_user_data(mut self) -> Self {
        self.has_user_data = true;
        self
    }

    /// Cap the number of live components of this type per collection.
    #[must_use]
    pub fn with_max_instance_count(mut self, max: u32) -> Self {
        self.max_instance_count = Some(max);
        self
    }

    /// Override the update priority (lower runs earlier; ties update in
    /// registration order).
    #[must_use]
    pub fn with_update_priority(mut self, priority: u16) -> Self {
        self.update_priority = priority;
        self
    }

    /// Component type name (the prototype extension).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource type this component consumes.
    #[must_use]
    pub fn resource_type(&self) -> ResourceTypeTag {
        self.resource_type
    }

    /// Whether slots of this type carry user data.
    #[must_use]
    pub fn has_user_data(&self) -> bool {
        self.has_user_data
    }

    /// Per-collection live component cap, if any.
    #[must_use]
    pub fn max_instance_count(&self) -> Option<u32> {
        self.max_instance_count
    }

    /// Update priority.
    #[must_use]
    pub fn update_priority(&self) -> u16 {
        self.update_priority
    }

    /// Borrow the lifecycle object mutably.
    ///
    /// The runtime's phases are strictly sequential, so this borrow is never
    /// held across callbacks; a panic here means a callback re-entered the
    /// collection.
    pub(crate) fn lifecycle_mut(&self) -> RefMut<'_, Box<dyn ComponentLifecycle>> {
        self.lifecycle.borrow_mut()
    }
}

/// Builds a [`Registry`], enforcing unique names and resource tags
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    types: Vec<ComponentTypeDef>,
    by_name: HashMap<String, ComponentTypeIndex>,
    by_resource: HashMap<ResourceTypeTag, ComponentTypeIndex>,
}

impl RegistryBuilder {
    /// Start with no registered types.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a component type, assigning it the next ascending slot.
    ///
    /// # Errors
    ///
    /// Fails with [`RegisterError::DuplicateType`] or
    /// [`RegisterError::DuplicateResourceType`] if the name or resource tag
    /// is already bound; registration failures abort registry construction.
    pub fn register(&mut self, def: ComponentTypeDef) -> Result<&mut Self, RegisterError> {
        if self.by_name.contains_key(def.name()) {
            return Err(RegisterError::DuplicateType(def.name().to_string()));
        }
        if let Some(&index) = self.by_resource.get(&def.resource_type()) {
            return Err(RegisterError::DuplicateResourceType(
                def.resource_type(),
                self.types[index.as_usize()].name().to_string(),
            ));
        }
        let index = ComponentTypeIndex(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.by_name.insert(def.name().to_string(), index);
        self.by_resource.insert(def.resource_type(), index);
        self.types.push(def);
        Ok(self)
    }

    /// Freeze the registered set into a shareable, read-only registry.
    #[must_use]
    pub fn build(self) -> Rc<Registry> {
        let mut update_order: Vec<ComponentTypeIndex> = (0..self.types.len())
            .map(|i| ComponentTypeIndex(u32::try_from(i).unwrap_or(u32::MAX)))
            .collect();
        // Stable sort keeps registration order within equal priorities.
        update_order.sort_by_key(|index| self.types[index.as_usize()].update_priority());

        Rc::new(Registry {
            types: self.types,
            by_name: self.by_name,
            update_order,
        })
    }
}

/// Read-only table of registered component types
pub struct Registry {
    types: Vec<ComponentTypeDef>,
    by_name: HashMap<String, ComponentTypeIndex>,
    update_order: Vec<ComponentTypeIndex>,
}

impl Registry {
    /// Look up a component type by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<ComponentTypeIndex> {
        self.by_name.get(name).copied()
    }

    /// Descriptor for a type index.
    #[must_use]
    pub fn get(&self, index: ComponentTypeIndex) -> &ComponentTypeDef {
        &self.types[index.as_usize()]
    }

    /// Type indices in update order: ascending (priority, registration slot).
    #[must_use]
    pub fn update_order(&self) -> &[ComponentTypeIndex] {
        &self.update_order
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Inert;

    impl ComponentLifecycle for Inert {
        fn create(&mut self, _ctx: CreateContext<'_>) -> Result<ComponentHandle, ComponentError> {
            Ok(ComponentHandle(0))
        }

        fn destroy(&mut self, _entry: &mut ComponentEntry) {}
    }

    fn def(name: &str, tag: u32) -> ComponentTypeDef {
        ComponentTypeDef::new(name, ResourceTypeTag(tag), Box::new(Inert))
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(def("phys", 0)).unwrap();
        let err = builder.register(def("phys", 1)).unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateType(_)));
    }

    #[test]
    fn duplicate_resource_tag_is_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register(def("phys", 0)).unwrap();
        let err = builder.register(def("render", 0)).unwrap_err();
        assert!(matches!(err, RegisterError::DuplicateResourceType(..)));
    }

    #[test]
    fn registration_order_defines_default_update_order() {
        let mut builder = RegistryBuilder::new();
        builder.register(def("a", 0)).unwrap();
        builder.register(def("b", 1)).unwrap();
        builder.register(def("c", 2)).unwrap();
        let registry = builder.build();

        let names: Vec<&str> = registry
            .update_order()
            .iter()
            .map(|&i| registry.get(i).name())
            .collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn priority_overrides_registration_order() {
        let mut builder = RegistryBuilder::new();
        builder.register(def("late", 0).with_update_priority(10)).unwrap();
        builder.register(def("early", 1).with_update_priority(1)).unwrap();
        builder.register(def("mid", 2).with_update_priority(5)).unwrap();
        let registry = builder.build();

        let names: Vec<&str> = registry
            .update_order()
            .iter()
            .map(|&i| registry.get(i).name())
            .collect();
        assert_eq!(names, ["early", "mid", "late"]);
    }

    #[test]
    fn find_resolves_registered_names_only() {
        let mut builder = RegistryBuilder::new();
        builder.register(def("phys", 0)).unwrap();
        let registry = builder.build();
        assert!(registry.find("phys").is_some());
        assert!(registry.find("render").is_none());
    }

    #[test]
    fn metadata_builders_stick() {
        let d = def("a", 0)
            .with_user_data()
            .with_max_instance_count(4)
            .with_update_priority(7);
        assert!(d.has_user_data());
        assert_eq!(d.max_instance_count(), Some(4));
        assert_eq!(d.update_priority(), 7);
    }
}
