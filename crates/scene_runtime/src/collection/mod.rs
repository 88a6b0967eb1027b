//! Collection — one world of instances
//!
//! A [`Collection`] owns a table of instances, drives the component
//! lifecycle, and sequences a frame as three strictly ordered phases:
//! [`Collection::update`] runs each registered component type once in
//! priority order, [`Collection::dispatch_input`] routes actions through
//! the focus stack, and [`Collection::post_update`] drains the mailbox and
//! performs deferred destruction.
//!
//! Instance creation is transactional: a prototype either spawns completely
//! or every partially created component is rolled back in reverse order and
//! the caller sees an error. Deletion is two-phase: [`Collection::delete`]
//! only marks, destruction happens at the next `post_update` boundary, so
//! in-flight iteration never observes a vanished record.
//!
//! The collection is single-threaded by construction. Component callbacks
//! cannot touch the collection directly; they request deletion, spawning,
//! or message posts through [`CallbackOps`], and the collection applies
//! those requests at phase boundaries.

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;
use thiserror::Error;

use crate::config::RuntimeConfig;
use crate::foundation::math::{Mat4, Transform};
use crate::input::{FocusStack, InputAction, InputResponse};
use crate::instance::{ComponentSlot, Instance, InstanceFlags, InstanceKey};
use crate::message::{Mailbox, Message};
use crate::prototype::Prototype;
use crate::registry::{ComponentEntry, ComponentError, ComponentTypeIndex, CreateContext, Registry};
use crate::resource::{ResourceError, ResourceLoader};

/// Errors from instance-level operations on a collection
#[derive(Debug, Error)]
pub enum CollectionError {
    /// The key is stale or never belonged to this collection.
    #[error("stale or unknown instance handle")]
    InvalidHandle,

    /// The requested reparenting would create a cycle.
    #[error("reparenting would create a cycle")]
    WouldCycle,

    /// The two instances are not linked as parent and child.
    #[error("instances are not linked as parent and child")]
    NotLinked,
}

/// Errors from the transactional spawn protocol
///
/// Any of these means the spawn had no observable effect: everything
/// created before the failure was destroyed again, in reverse order.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The prototype could not be loaded or decoded.
    #[error("prototype '{id}' could not be loaded: {source}")]
    Prototype {
        /// Prototype resource identifier.
        id: String,
        /// Underlying loader failure.
        source: ResourceError,
    },

    /// The collection has reached its configured instance capacity.
    #[error("collection is full ({max} instances)")]
    CollectionFull {
        /// Configured capacity.
        max: usize,
    },

    /// The prototype names a component type that was never registered.
    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),

    /// The component type's `max_instance_count` is already reached.
    /// Its `create` callback was not invoked.
    #[error("component limit reached for type '{name}' (max {max})")]
    ComponentLimitExceeded {
        /// Component type name.
        name: String,
        /// Configured limit.
        max: u32,
    },

    /// The resource is not of the type the component type registered for.
    #[error("resource '{resource}' does not match the type registered for component '{component_type}'")]
    ResourceTypeMismatch {
        /// Offending resource identifier.
        resource: String,
        /// Component type that rejected it.
        component_type: String,
    },

    /// A component resource failed to load.
    #[error("failed to load resource '{id}': {source}")]
    Resource {
        /// Resource identifier.
        id: String,
        /// Underlying loader failure.
        source: ResourceError,
    },

    /// A component `create` callback failed.
    #[error("component '{name}' failed to create: {source}")]
    ComponentCreateFailed {
        /// Component type name.
        name: String,
        /// Failure the callback reported.
        source: ComponentError,
    },
}

/// Errors from the per-frame update sweep
#[derive(Debug, Error)]
pub enum UpdateError {
    /// A component type's update callback reported a fatal error.
    /// The remaining types still ran; the frame counts as having run.
    #[error("update of component type '{name}' failed: {source}")]
    ComponentUpdateFailed {
        /// Component type name.
        name: String,
        /// Failure the callback reported.
        source: ComponentError,
    },
}

/// Per-frame context passed to every component update
#[derive(Debug, Clone)]
pub struct UpdateContext {
    /// Frame delta time, in seconds.
    pub dt: f32,
    /// View-projection matrix for visibility-aware components, if the
    /// caller has one.
    pub view_proj: Option<Mat4>,
}

impl UpdateContext {
    /// Context for a frame of `dt` seconds.
    #[must_use]
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            view_proj: None,
        }
    }

    /// Attach camera/view parameters.
    #[must_use]
    pub fn with_view_proj(mut self, view_proj: Mat4) -> Self {
        self.view_proj = Some(view_proj);
        self
    }
}

#[derive(Default)]
struct Deferred {
    messages: Vec<Message>,
    deletes: Vec<InstanceKey>,
    spawns: Vec<String>,
}

/// Deferred collection operations available to component callbacks
///
/// Callbacks never hold a reference to the collection; anything that would
/// mutate the instance tables mid-iteration is requested here and applied
/// by the collection at the next phase boundary.
#[derive(Default)]
pub struct CallbackOps {
    deferred: RefCell<Deferred>,
}

impl CallbackOps {
    /// Request deletion of an instance. Marks at the next boundary; the
    /// instance is destroyed at the following `post_update`.
    pub fn delete(&self, key: InstanceKey) {
        self.deferred.borrow_mut().deletes.push(key);
    }

    /// Enqueue a message on the collection mailbox.
    pub fn post(&self, message: Message) {
        self.deferred.borrow_mut().messages.push(message);
    }

    /// Request a spawn from a prototype. Failures are logged, not returned.
    pub fn spawn(&self, prototype_id: impl Into<String>) {
        self.deferred.borrow_mut().spawns.push(prototype_id.into());
    }

    fn take(&self) -> Deferred {
        self.deferred.take()
    }
}

/// One self-contained world of instances, components, and their mailbox
pub struct Collection {
    registry: Rc<Registry>,
    loader: Box<dyn ResourceLoader>,
    config: RuntimeConfig,
    instances: SlotMap<InstanceKey, Instance>,
    /// Keys in creation order; teardown destroys in reverse.
    spawn_order: Vec<InstanceKey>,
    /// Live component count per registered type, for limit enforcement.
    live_counts: Vec<u32>,
    mailbox: Mailbox,
    focus: FocusStack,
    pending_delete: Vec<InstanceKey>,
}

impl Collection {
    /// Create a collection with default configuration.
    #[must_use]
    pub fn new(registry: Rc<Registry>, loader: Box<dyn ResourceLoader>) -> Self {
        Self::with_config(registry, loader, RuntimeConfig::default())
    }

    /// Create a collection with explicit configuration.
    #[must_use]
    pub fn with_config(
        registry: Rc<Registry>,
        loader: Box<dyn ResourceLoader>,
        config: RuntimeConfig,
    ) -> Self {
        let live_counts = vec![0; registry.len()];
        Self {
            registry,
            loader,
            mailbox: Mailbox::with_capacity(config.mailbox_capacity),
            config,
            instances: SlotMap::with_key(),
            spawn_order: Vec::new(),
            live_counts,
            focus: FocusStack::new(),
            pending_delete: Vec::new(),
        }
    }

    // ----- creation ---------------------------------------------------

    /// Spawn an instance from a prototype.
    ///
    /// The creation protocol is transactional: on any failure every
    /// component created so far is destroyed in reverse creation order,
    /// its resource released, and the instance record freed, so no
    /// partially constructed instance is ever observable.
    ///
    /// After a fully successful creation each component's `init` runs in
    /// creation order. A failing `init` is logged but *not* rolled back;
    /// the instance remains live. That asymmetry is intentional and pinned
    /// by the test suite.
    ///
    /// # Errors
    ///
    /// See [`SpawnError`]; every variant leaves the collection unchanged.
    pub fn spawn(&mut self, prototype_id: &str) -> Result<InstanceKey, SpawnError> {
        let registry = Rc::clone(&self.registry);
        let proto = self.load_prototype(prototype_id)?;

        if self.instances.len() >= self.config.max_instances {
            return Err(SpawnError::CollectionFull {
                max: self.config.max_instances,
            });
        }
        let key = self.instances.insert(Instance::new());
        self.spawn_order.push(key);

        for pair in &proto.components {
            let Some(type_index) = registry.find(&pair.component_type) else {
                self.rollback_spawn(key);
                return Err(SpawnError::UnknownComponentType(pair.component_type.clone()));
            };
            let def = registry.get(type_index);

            if let Some(max) = def.max_instance_count() {
                if self.live_counts[type_index.as_usize()] >= max {
                    self.rollback_spawn(key);
                    return Err(SpawnError::ComponentLimitExceeded {
                        name: def.name().to_string(),
                        max,
                    });
                }
            }

            // Typed resource binding: the component only ever sees a
            // resource of the type it registered for.
            match self.loader.type_tag(&pair.resource) {
                Ok(tag) if tag == def.resource_type() => {}
                Ok(_) => {
                    self.rollback_spawn(key);
                    return Err(SpawnError::ResourceTypeMismatch {
                        resource: pair.resource.clone(),
                        component_type: def.name().to_string(),
                    });
                }
                Err(source) => {
                    self.rollback_spawn(key);
                    return Err(SpawnError::Resource {
                        id: pair.resource.clone(),
                        source,
                    });
                }
            }

            let resource_handle = match self.loader.load(&pair.resource) {
                Ok(handle) => handle,
                Err(source) => {
                    self.rollback_spawn(key);
                    return Err(SpawnError::Resource {
                        id: pair.resource.clone(),
                        source,
                    });
                }
            };

            let mut user_data: u64 = 0;
            let created = match self.loader.get(resource_handle) {
                Ok(resource) => def.lifecycle_mut().create(CreateContext {
                    instance: key,
                    resource,
                    user_data: def.has_user_data().then_some(&mut user_data),
                }),
                Err(source) => {
                    self.loader.release(resource_handle);
                    self.rollback_spawn(key);
                    return Err(SpawnError::Resource {
                        id: pair.resource.clone(),
                        source,
                    });
                }
            };

            match created {
                Ok(handle) => {
                    self.instances[key].slots.push(ComponentSlot {
                        type_index,
                        handle,
                        resource: resource_handle,
                        user_data,
                    });
                    self.live_counts[type_index.as_usize()] += 1;
                }
                Err(source) => {
                    // The resource was resolved before create ran; it must
                    // still be released on this path.
                    self.loader.release(resource_handle);
                    let name = def.name().to_string();
                    self.rollback_spawn(key);
                    return Err(SpawnError::ComponentCreateFailed { name, source });
                }
            }
        }

        // Init phase, deliberately non-transactional.
        let slot_count = self.instances[key].slots.len();
        for slot_index in 0..slot_count {
            let slot = self.instances[key].slots[slot_index];
            let def = registry.get(slot.type_index);
            let mut entry = ComponentEntry {
                instance: key,
                handle: slot.handle,
                user_data: slot.user_data,
            };
            match def.lifecycle_mut().init(&mut entry) {
                Ok(()) => {
                    if def.has_user_data() {
                        self.instances[key].slots[slot_index].user_data = entry.user_data;
                    }
                }
                Err(err) => {
                    log::error!(
                        "init of component '{}' failed on freshly spawned instance: {err}",
                        def.name()
                    );
                }
            }
        }

        log::debug!("spawned instance from '{prototype_id}' with {slot_count} component(s)");
        Ok(key)
    }

    fn load_prototype(&mut self, prototype_id: &str) -> Result<Prototype, SpawnError> {
        let handle = self
            .loader
            .load(prototype_id)
            .map_err(|source| SpawnError::Prototype {
                id: prototype_id.to_string(),
                source,
            })?;
        let decoded = match self.loader.get(handle) {
            Ok(resource) => resource.downcast_ref::<Prototype>().cloned(),
            Err(_) => None,
        };
        // The prototype is only needed during creation.
        self.loader.release(handle);
        decoded.ok_or_else(|| SpawnError::Prototype {
            id: prototype_id.to_string(),
            source: ResourceError::DecodeFailed {
                id: prototype_id.to_string(),
                reason: "resource is not a prototype".to_string(),
            },
        })
    }

    /// Destroy the partial instance `key` and undo all bookkeeping.
    fn rollback_spawn(&mut self, key: InstanceKey) {
        let registry = Rc::clone(&self.registry);
        let Some(mut instance) = self.instances.remove(key) else {
            return;
        };
        while let Some(slot) = instance.slots.pop() {
            let def = registry.get(slot.type_index);
            let mut entry = ComponentEntry {
                instance: key,
                handle: slot.handle,
                user_data: slot.user_data,
            };
            def.lifecycle_mut().destroy(&mut entry);
            self.loader.release(slot.resource);
            self.live_counts[slot.type_index.as_usize()] -= 1;
        }
        self.spawn_order.retain(|&k| k != key);
    }

    // ----- frame loop -------------------------------------------------

    /// Run one update over every registered component type.
    ///
    /// Types run in priority order, each receiving the dense set of its
    /// live components (instances marked for deletion are excluded). A
    /// failing type does not stop the sweep; the first failure is returned
    /// once every type has run.
    ///
    /// # Errors
    ///
    /// The first [`UpdateError::ComponentUpdateFailed`] reported, if any.
    pub fn update(&mut self, ctx: &UpdateContext) -> Result<(), UpdateError> {
        let registry = Rc::clone(&self.registry);
        let mut first_error = None;

        for &type_index in registry.update_order() {
            let def = registry.get(type_index);

            let mut entries = Vec::new();
            let mut locations = Vec::new();
            for &key in &self.spawn_order {
                let Some(instance) = self.instances.get(key) else {
                    continue;
                };
                if instance.is_marked_for_deletion() {
                    continue;
                }
                for (slot_index, slot) in instance.slots.iter().enumerate() {
                    if slot.type_index == type_index {
                        entries.push(ComponentEntry {
                            instance: key,
                            handle: slot.handle,
                            user_data: slot.user_data,
                        });
                        locations.push((key, slot_index));
                    }
                }
            }

            let ops = CallbackOps::default();
            let result = def.lifecycle_mut().update(&mut entries, ctx, &ops);

            if def.has_user_data() {
                for (entry, &(key, slot_index)) in entries.iter().zip(&locations) {
                    if let Some(instance) = self.instances.get_mut(key) {
                        if let Some(slot) = instance.slots.get_mut(slot_index) {
                            slot.user_data = entry.user_data;
                        }
                    }
                }
            }

            if let Err(source) = result {
                if self.config.log_component_failures {
                    log::warn!("update of component type '{}' failed: {source}", def.name());
                }
                if first_error.is_none() {
                    first_error = Some(UpdateError::ComponentUpdateFailed {
                        name: def.name().to_string(),
                        source,
                    });
                }
            }

            self.apply_ops(&ops);
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Route input actions to the focus stack.
    ///
    /// Each action goes to the most recently focused instance that is not
    /// marked for deletion. Within that instance the action is offered to
    /// its components in slot order until one consumes it. The action
    /// never falls through to older focus holders, whether or not any
    /// component consumed it.
    pub fn dispatch_input(&mut self, actions: &[InputAction]) {
        let registry = Rc::clone(&self.registry);
        for action in actions {
            let Some(target) = self.focus.iter_top_down().find(|&key| {
                self.instances
                    .get(key)
                    .is_some_and(|instance| !instance.is_marked_for_deletion())
            }) else {
                continue;
            };

            let slot_count = self.instances[target].slots.len();
            for slot_index in 0..slot_count {
                let slot = self.instances[target].slots[slot_index];
                let def = registry.get(slot.type_index);
                let mut entry = ComponentEntry {
                    instance: target,
                    handle: slot.handle,
                    user_data: slot.user_data,
                };
                let response = def.lifecycle_mut().on_input(&mut entry, action);
                if def.has_user_data() {
                    self.instances[target].slots[slot_index].user_data = entry.user_data;
                }
                if response == InputResponse::Consumed {
                    break;
                }
            }
        }
    }

    /// Drain the mailbox, then destroy every instance marked for deletion.
    ///
    /// The drain walks the queue as it stood at entry; messages posted by
    /// handlers land in the next cycle. Messages addressed to stale or
    /// marked instances are dropped silently. Destruction runs per
    /// instance in reverse component-creation order, releases resources,
    /// unlinks the parent, and cascades a *mark* to children so each level
    /// of a hierarchy is destroyed one `post_update` at a time.
    pub fn post_update(&mut self) {
        self.drain_mailbox();
        let doomed = std::mem::take(&mut self.pending_delete);
        for key in doomed {
            self.destroy_instance(key, true);
        }
    }

    /// Mark an instance for deferred deletion.
    ///
    /// Callable at any time, including (through [`CallbackOps`]) from
    /// component callbacks. The instance stays enumerable but is excluded
    /// from updates, input, and message delivery until it is destroyed at
    /// the next `post_update`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidHandle`] if the key is stale.
    pub fn delete(&mut self, key: InstanceKey) -> Result<(), CollectionError> {
        if self.mark_for_deletion(key) {
            Ok(())
        } else {
            Err(CollectionError::InvalidHandle)
        }
    }

    /// Enqueue a message for the next drain. Never dispatches synchronously.
    pub fn post_message(&mut self, message: Message) {
        self.mailbox.post(message);
    }

    fn mark_for_deletion(&mut self, key: InstanceKey) -> bool {
        let Some(instance) = self.instances.get_mut(key) else {
            return false;
        };
        if !instance.flags.contains(InstanceFlags::MARKED_FOR_DELETION) {
            instance.flags.insert(InstanceFlags::MARKED_FOR_DELETION);
            self.pending_delete.push(key);
        }
        true
    }

    fn drain_mailbox(&mut self) {
        let registry = Rc::clone(&self.registry);
        let cycle = self.mailbox.take_cycle();
        for message in cycle {
            let Some(instance) = self.instances.get(message.target) else {
                log::trace!("dropping message to stale instance");
                continue;
            };
            if instance.is_marked_for_deletion() {
                log::trace!("dropping message to instance marked for deletion");
                continue;
            }
            let slot_count = instance.slots.len();

            let slots: Vec<usize> = match message.component {
                Some(slot_index) if slot_index < slot_count => vec![slot_index],
                Some(slot_index) => {
                    log::warn!("dropping message to out-of-range component slot {slot_index}");
                    continue;
                }
                None => (0..slot_count).collect(),
            };

            for slot_index in slots {
                let slot = self.instances[message.target].slots[slot_index];
                let def = registry.get(slot.type_index);
                let mut entry = ComponentEntry {
                    instance: message.target,
                    handle: slot.handle,
                    user_data: slot.user_data,
                };
                let ops = CallbackOps::default();
                let result = def.lifecycle_mut().on_message(&mut entry, &message, &ops);
                if def.has_user_data() {
                    if let Some(instance) = self.instances.get_mut(message.target) {
                        if let Some(slot) = instance.slots.get_mut(slot_index) {
                            slot.user_data = entry.user_data;
                        }
                    }
                }
                if let Err(err) = result {
                    if self.config.log_component_failures {
                        log::warn!(
                            "component '{}' failed handling message: {err}",
                            def.name()
                        );
                    }
                }
                self.apply_ops(&ops);

                // A handler may have marked the target; stop delivering the
                // rest of a broadcast to it.
                let still_live = self
                    .instances
                    .get(message.target)
                    .is_some_and(|i| !i.is_marked_for_deletion());
                if !still_live {
                    break;
                }
            }
        }
    }

    fn apply_ops(&mut self, ops: &CallbackOps) {
        let deferred = ops.take();
        for message in deferred.messages {
            self.mailbox.post(message);
        }
        for key in deferred.deletes {
            if !self.mark_for_deletion(key) {
                log::trace!("deferred delete of stale instance ignored");
            }
        }
        for prototype_id in deferred.spawns {
            if let Err(err) = self.spawn(&prototype_id) {
                log::error!("deferred spawn of '{prototype_id}' failed: {err}");
            }
        }
    }

    /// Destroy one instance now. `cascade` marks its children for the next
    /// `post_update` pass; teardown passes `false` because every child has
    /// its own entry in the spawn order.
    fn destroy_instance(&mut self, key: InstanceKey, cascade: bool) {
        let registry = Rc::clone(&self.registry);
        let Some(mut instance) = self.instances.remove(key) else {
            return;
        };
        while let Some(slot) = instance.slots.pop() {
            let def = registry.get(slot.type_index);
            let mut entry = ComponentEntry {
                instance: key,
                handle: slot.handle,
                user_data: slot.user_data,
            };
            def.lifecycle_mut().destroy(&mut entry);
            self.loader.release(slot.resource);
            self.live_counts[slot.type_index.as_usize()] -= 1;
        }
        if let Some(parent) = instance.parent {
            if let Some(parent_instance) = self.instances.get_mut(parent) {
                parent_instance.children.retain(|&child| child != key);
            }
        }
        for &child in &instance.children {
            if let Some(child_instance) = self.instances.get_mut(child) {
                child_instance.parent = None;
            }
            if cascade && !self.mark_for_deletion(child) {
                log::trace!("cascading delete to already-destroyed child ignored");
            }
        }
        self.focus.release(key);
        self.spawn_order.retain(|&k| k != key);
    }

    /// Destroy every remaining instance, most recently created first.
    pub fn clear(&mut self) {
        self.mailbox.clear();
        self.focus.clear();
        self.pending_delete.clear();
        while let Some(key) = self.spawn_order.pop() {
            if self.instances.contains_key(key) {
                self.destroy_instance(key, false);
            }
        }
        self.instances.clear();
    }

    // ----- hierarchy and transforms -----------------------------------

    /// Reparent an instance, updating both ends of the link atomically.
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidHandle`] for stale keys,
    /// [`CollectionError::WouldCycle`] if `parent` sits below `child` in
    /// the hierarchy (or equals it).
    pub fn set_parent(
        &mut self,
        child: InstanceKey,
        parent: Option<InstanceKey>,
    ) -> Result<(), CollectionError> {
        if !self.instances.contains_key(child) {
            return Err(CollectionError::InvalidHandle);
        }
        if let Some(parent) = parent {
            if !self.instances.contains_key(parent) {
                return Err(CollectionError::InvalidHandle);
            }
            if parent == child || self.is_ancestor(child, parent) {
                return Err(CollectionError::WouldCycle);
            }
        }

        let old_parent = self.instances[child].parent;
        if old_parent == parent {
            return Ok(());
        }
        if let Some(old_parent) = old_parent {
            if let Some(instance) = self.instances.get_mut(old_parent) {
                instance.children.retain(|&k| k != child);
            }
        }
        self.instances[child].parent = parent;
        if let Some(parent) = parent {
            self.instances[parent].children.push(child);
        }
        self.mark_world_dirty(child);
        Ok(())
    }

    /// Attach `child` under `parent`.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::set_parent`].
    pub fn add_child(
        &mut self,
        parent: InstanceKey,
        child: InstanceKey,
    ) -> Result<(), CollectionError> {
        self.set_parent(child, Some(parent))
    }

    /// Detach `child` from `parent`.
    ///
    /// # Errors
    ///
    /// [`CollectionError::NotLinked`] if `parent` is not actually the
    /// child's parent; [`CollectionError::InvalidHandle`] for stale keys.
    pub fn remove_child(
        &mut self,
        parent: InstanceKey,
        child: InstanceKey,
    ) -> Result<(), CollectionError> {
        let child_instance = self
            .instances
            .get(child)
            .ok_or(CollectionError::InvalidHandle)?;
        if child_instance.parent != Some(parent) {
            return Err(CollectionError::NotLinked);
        }
        self.set_parent(child, None)
    }

    /// True if `candidate` appears on `of`'s parent chain.
    fn is_ancestor(&self, candidate: InstanceKey, of: InstanceKey) -> bool {
        let mut cursor = self.instances.get(of).and_then(|i| i.parent);
        while let Some(key) = cursor {
            if key == candidate {
                return true;
            }
            cursor = self.instances.get(key).and_then(|i| i.parent);
        }
        false
    }

    /// Replace an instance's local transform, invalidating the cached
    /// world transforms of its whole subtree.
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidHandle`] for stale keys.
    pub fn set_local_transform(
        &mut self,
        key: InstanceKey,
        transform: Transform,
    ) -> Result<(), CollectionError> {
        let instance = self
            .instances
            .get_mut(key)
            .ok_or(CollectionError::InvalidHandle)?;
        instance.transform = transform;
        self.mark_world_dirty(key);
        Ok(())
    }

    /// World transform of an instance: the product of its parent chain,
    /// lazily recomputed and memoized.
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidHandle`] for stale keys.
    pub fn world_transform(&mut self, key: InstanceKey) -> Result<Mat4, CollectionError> {
        let instance = self
            .instances
            .get(key)
            .ok_or(CollectionError::InvalidHandle)?;
        if !instance.flags.contains(InstanceFlags::WORLD_DIRTY) {
            return Ok(instance.world);
        }
        let parent = instance.parent;
        let local = instance.transform.to_matrix();
        let world = match parent {
            Some(parent) => self.world_transform(parent)? * local,
            None => local,
        };
        if let Some(instance) = self.instances.get_mut(key) {
            instance.world = world;
            instance.flags.remove(InstanceFlags::WORLD_DIRTY);
        }
        Ok(world)
    }

    fn mark_world_dirty(&mut self, key: InstanceKey) {
        let mut stack = vec![key];
        while let Some(key) = stack.pop() {
            if let Some(instance) = self.instances.get_mut(key) {
                instance.flags.insert(InstanceFlags::WORLD_DIRTY);
                stack.extend(instance.children.iter().copied());
            }
        }
    }

    // ----- input focus ------------------------------------------------

    /// Push the instance onto the focus stack (most-recent-first order).
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidHandle`] for stale keys.
    pub fn acquire_input_focus(&mut self, key: InstanceKey) -> Result<(), CollectionError> {
        if !self.instances.contains_key(key) {
            return Err(CollectionError::InvalidHandle);
        }
        self.focus.acquire(key);
        Ok(())
    }

    /// Remove the instance from the focus stack, wherever it sits.
    pub fn release_input_focus(&mut self, key: InstanceKey) {
        self.focus.release(key);
    }

    // ----- queries ----------------------------------------------------

    /// Number of instance records, including ones marked for deletion.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Borrow an instance record.
    ///
    /// # Errors
    ///
    /// [`CollectionError::InvalidHandle`] for stale keys.
    pub fn instance(&self, key: InstanceKey) -> Result<&Instance, CollectionError> {
        self.instances.get(key).ok_or(CollectionError::InvalidHandle)
    }

    /// Live component count for a registered type.
    #[must_use]
    pub fn live_component_count(&self, type_index: ComponentTypeIndex) -> u32 {
        self.live_counts[type_index.as_usize()]
    }

    /// Number of queued, undelivered messages.
    #[must_use]
    pub fn queued_messages(&self) -> usize {
        self.mailbox.len()
    }
}

impl Drop for Collection {
    fn drop(&mut self) {
        self.clear();
    }
}
