//! Change notification for entities.
//!
//! A `ChangeNotifier` is a cheap, cloneable handle. The entity owns one and
//! observed lists nested under it hold clones, so a list can report a
//! mutation to its owner without holding the owner itself.

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::EntityId;

/// One reported change: `field` of entity `owner` now holds `value`.
pub struct ChangeEvent<'a> {
    pub owner: EntityId,
    pub field: &'a str,
    pub value: &'a dyn Any,
}

type Hook = Arc<dyn Fn(&ChangeEvent<'_>) + Send + Sync>;

#[derive(Default)]
struct NotifierState {
    hooks: Vec<Hook>,
    changed: BTreeSet<String>,
}

/// Records changed field names and forwards each change to subscribers.
#[derive(Clone, Default)]
pub struct ChangeNotifier {
    state: Arc<Mutex<NotifierState>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, hook: impl Fn(&ChangeEvent<'_>) + Send + Sync + 'static) {
        self.state.lock().hooks.push(Arc::new(hook));
    }

    pub fn notify(&self, owner: EntityId, field: &str, value: &dyn Any) {
        // Hooks run outside the lock so they may subscribe or inspect state.
        let hooks = {
            let mut state = self.state.lock();
            state.changed.insert(field.to_string());
            state.hooks.clone()
        };
        let event = ChangeEvent { owner, field, value };
        for hook in &hooks {
            hook(&event);
        }
    }

    /// Field names reported since creation or the last `clear_changes`.
    pub fn changed_fields(&self) -> Vec<String> {
        self.state.lock().changed.iter().cloned().collect()
    }

    pub fn clear_changes(&self) {
        self.state.lock().changed.clear();
    }

    pub fn same_as(&self, other: &ChangeNotifier) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ChangeNotifier")
            .field("hooks", &state.hooks.len())
            .field("changed", &state.changed)
            .finish()
    }
}
