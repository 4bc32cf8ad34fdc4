//! Change notification for proxy writes.

use rpcctx_model::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

/// A write observed on a proxy field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    /// Edit-map value before the write, or null if the field was unset.
    pub old: Value,
    /// Edit-map value after the write.
    pub new: Value,
}

type Listener = Rc<dyn Fn(&FieldChange) -> anyhow::Result<()>>;

/// Subscribers notified synchronously, in registration order, on every write.
#[derive(Default)]
pub(crate) struct ChangeListeners {
    listeners: RefCell<Vec<Listener>>,
}

impl ChangeListeners {
    pub(crate) fn add(&self, listener: Listener) {
        self.listeners.borrow_mut().push(listener);
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Notifies every listener. A failing listener is logged and skipped;
    /// it never stops the remaining listeners.
    pub(crate) fn fire(&self, change: &FieldChange) {
        // Listeners may subscribe further listeners while being notified.
        let snapshot: Vec<Listener> = self.listeners.borrow().clone();
        for listener in snapshot {
            if let Err(e) = listener(change) {
                warn!(field = %change.field, error = %e, "Change listener failed");
            }
        }
    }
}
