//! Input actions and focus
//!
//! Input is routed through a per-collection focus stack: instances acquire
//! focus in LIFO order and the most recent live holder receives each
//! action. Whether an unhandled action falls through is collection policy,
//! not a component decision; the default is no fallthrough past the first
//! live focus holder.

use crate::foundation::hash::hash_name;
use crate::instance::InstanceKey;

/// Identifier of an input action, a stable 64-bit hash of its name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(pub u64);

impl ActionId {
    /// Identifier for a named action.
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        Self(hash_name(name))
    }
}

/// One input action for a frame
#[derive(Debug, Clone, Copy)]
pub struct InputAction {
    /// Which action this is.
    pub action_id: ActionId,
    /// Analog value, 0.0 to 1.0 for buttons.
    pub value: f32,
    /// The action was pressed this frame.
    pub pressed: bool,
    /// The action was released this frame.
    pub released: bool,
    /// The action auto-repeated this frame.
    pub repeated: bool,
}

impl InputAction {
    /// A pressed action with full value.
    #[must_use]
    pub fn pressed(action_id: ActionId) -> Self {
        Self {
            action_id,
            value: 1.0,
            pressed: true,
            released: false,
            repeated: false,
        }
    }

    /// A released action.
    #[must_use]
    pub fn released(action_id: ActionId) -> Self {
        Self {
            action_id,
            value: 0.0,
            pressed: false,
            released: true,
            repeated: false,
        }
    }
}

/// Component verdict on an offered input action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    /// The component handled the action; stop offering it to later slots.
    Consumed,
    /// The component declined the action.
    Ignored,
}

/// LIFO list of instances eligible to receive input
#[derive(Debug, Default)]
pub struct FocusStack {
    stack: Vec<InstanceKey>,
}

impl FocusStack {
    /// An empty focus stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an instance on top; re-acquiring moves it to the top.
    pub fn acquire(&mut self, key: InstanceKey) {
        self.stack.retain(|&k| k != key);
        self.stack.push(key);
    }

    /// Remove an instance wherever it sits in the stack.
    pub fn release(&mut self, key: InstanceKey) {
        self.stack.retain(|&k| k != key);
    }

    /// Iterate holders most-recently-acquired first.
    pub fn iter_top_down(&self) -> impl Iterator<Item = InstanceKey> + '_ {
        self.stack.iter().rev().copied()
    }

    /// Whether the instance currently holds a focus entry.
    #[must_use]
    pub fn contains(&self, key: InstanceKey) -> bool {
        self.stack.contains(&key)
    }

    /// Number of focus holders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Whether nothing holds focus.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drop all focus entries.
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn keys(n: usize) -> Vec<InstanceKey> {
        let mut map: SlotMap<InstanceKey, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[test]
    fn most_recent_holder_is_first() {
        let ks = keys(3);
        let mut focus = FocusStack::new();
        for &k in &ks {
            focus.acquire(k);
        }
        let order: Vec<InstanceKey> = focus.iter_top_down().collect();
        assert_eq!(order, [ks[2], ks[1], ks[0]]);
    }

    #[test]
    fn reacquire_moves_to_top() {
        let ks = keys(3);
        let mut focus = FocusStack::new();
        for &k in &ks {
            focus.acquire(k);
        }
        focus.acquire(ks[0]);
        assert_eq!(focus.len(), 3);
        assert_eq!(focus.iter_top_down().next(), Some(ks[0]));
    }

    #[test]
    fn release_removes_from_anywhere() {
        let ks = keys(3);
        let mut focus = FocusStack::new();
        for &k in &ks {
            focus.acquire(k);
        }
        focus.release(ks[1]);
        let order: Vec<InstanceKey> = focus.iter_top_down().collect();
        assert_eq!(order, [ks[2], ks[0]]);
        assert!(!focus.contains(ks[1]));
    }
}
