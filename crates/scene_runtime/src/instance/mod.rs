//! Instance records
//!
//! An instance is one entity in a collection: a local transform, weak
//! parent/child links, and an ordered list of component slots. Instances
//! are stored in a slot map, so an [`InstanceKey`] is generation-tagged:
//! a key kept past the instance's destruction is detectably stale instead
//! of silently aliasing a reused slot.

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::foundation::math::{Mat4, Transform};
use crate::registry::{ComponentHandle, ComponentTypeIndex};
use crate::resource::ResourceHandle;

new_key_type! {
    /// Generation-tagged handle to an instance within its collection.
    pub struct InstanceKey;
}

bitflags! {
    /// Per-instance state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct InstanceFlags: u8 {
        /// Two-phase deletion: marked now, destroyed at the next
        /// `post_update` boundary.
        const MARKED_FOR_DELETION = 1 << 0;
        /// The cached world transform is out of date.
        const WORLD_DIRTY = 1 << 1;
    }
}

/// One component bound to an instance
#[derive(Debug, Clone, Copy)]
pub struct ComponentSlot {
    /// Registered type of the component.
    pub type_index: ComponentTypeIndex,
    /// Handle the component implementation returned from `create`.
    pub handle: ComponentHandle,
    /// The resource backing this slot, released when the slot is destroyed.
    pub resource: ResourceHandle,
    /// User-data word; meaningful only if the type declares `has_user_data`.
    pub user_data: u64,
}

/// One entity: transform, hierarchy links, and component slots
#[derive(Debug)]
pub struct Instance {
    pub(crate) transform: Transform,
    pub(crate) world: Mat4,
    pub(crate) flags: InstanceFlags,
    pub(crate) parent: Option<InstanceKey>,
    pub(crate) children: Vec<InstanceKey>,
    pub(crate) slots: Vec<ComponentSlot>,
}

impl Instance {
    pub(crate) fn new() -> Self {
        Self {
            transform: Transform::identity(),
            world: Mat4::identity(),
            flags: InstanceFlags::WORLD_DIRTY,
            parent: None,
            children: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Local transform relative to the parent.
    #[must_use]
    pub fn local_transform(&self) -> &Transform {
        &self.transform
    }

    /// Parent link, if any (weak, collection-scoped).
    #[must_use]
    pub fn parent(&self) -> Option<InstanceKey> {
        self.parent
    }

    /// Child links in attach order.
    #[must_use]
    pub fn children(&self) -> &[InstanceKey] {
        &self.children
    }

    /// Component slots in creation order.
    #[must_use]
    pub fn slots(&self) -> &[ComponentSlot] {
        &self.slots
    }

    /// Whether the instance is marked for deferred deletion.
    #[must_use]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.flags.contains(InstanceFlags::MARKED_FOR_DELETION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_instance_starts_clean() {
        let inst = Instance::new();
        assert!(!inst.is_marked_for_deletion());
        assert!(inst.parent().is_none());
        assert!(inst.children().is_empty());
        assert!(inst.slots().is_empty());
    }

    #[test]
    fn new_instance_has_dirty_world_transform() {
        let inst = Instance::new();
        assert!(inst.flags.contains(InstanceFlags::WORLD_DIRTY));
    }
}
