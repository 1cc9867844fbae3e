//! Activation observers.

use crate::core::{LayerId, Pattern};
use std::fmt;
use std::sync::Arc;

/// Callback invoked synchronously after every activation change.
///
/// Listeners of Layer1 and Layer6 run on fork/join worker threads, hence
/// the `Send + Sync` bound.
pub trait ActivationListener: Send + Sync {
    fn on_activation_change(&self, layer: LayerId, old: &Pattern, new: &Pattern);
}

impl<F> ActivationListener for F
where
    F: Fn(LayerId, &Pattern, &Pattern) + Send + Sync,
{
    fn on_activation_change(&self, layer: LayerId, old: &Pattern, new: &Pattern) {
        self(layer, old, new);
    }
}

/// Token returned on registration, used to remove a listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Listeners registered on one layer, notified in registration order.
#[derive(Clone, Default)]
pub struct ListenerSet {
    next_id: u64,
    entries: Vec<(ListenerHandle, Arc<dyn ActivationListener>)>,
}

impl ListenerSet {
    pub fn add(&mut self, listener: Arc<dyn ActivationListener>) -> ListenerHandle {
        let handle = ListenerHandle(self.next_id);
        self.next_id += 1;
        self.entries.push((handle, listener));
        handle
    }

    /// Returns `false` if the handle was not registered here.
    pub fn remove(&mut self, handle: ListenerHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(h, _)| *h != handle);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn notify(&self, layer: LayerId, old: &Pattern, new: &Pattern) {
        for (_, listener) in &self.entries {
            listener.on_activation_change(layer, old, new);
        }
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.entries.len())
            .finish()
    }
}
