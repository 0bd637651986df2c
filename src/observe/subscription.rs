//! The single-subscriber slot shared by an observable and its callbacks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::event::ChangeEvent;

/// A subscriber callback. Shared so it can be invoked re-entrantly.
pub type Subscriber = Rc<dyn Fn(&ChangeEvent)>;

/// Holder of the single active subscriber of one observable.
///
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct SubscriptionSlot {
    inner: Rc<RefCell<Option<Subscriber>>>,
}

impl SubscriptionSlot {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `subscriber`, discarding any previous one.
    pub fn replace(&self, subscriber: Subscriber) {
        let previous = self.inner.borrow_mut().replace(subscriber);
        debug!(replaced = previous.is_some(), "subscriber installed");
    }

    /// Returns true if a subscriber is installed.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.borrow().is_some()
    }

    /// The active subscriber, detached from the slot so that it may call
    /// back into the observable (or replace itself) while running.
    #[must_use]
    pub fn current(&self) -> Option<Subscriber> {
        self.inner.borrow().clone()
    }
}

impl fmt::Debug for SubscriptionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionSlot")
            .field("set", &self.is_set())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::observe::event::{PropertyCall, PropertyEvent};
    use crate::value::{Key, Value};

    fn event() -> ChangeEvent {
        ChangeEvent::Property(PropertyEvent {
            call: PropertyCall::Get,
            obj: Value::Undefined,
            key: Key::Index(0),
            old_value: Value::Null,
            value: Value::Undefined,
        })
    }

    #[test]
    fn test_empty_slot() {
        let slot = SubscriptionSlot::new();
        assert!(!slot.is_set());
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_replace_discards_previous() {
        let slot = SubscriptionSlot::new();
        let first = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(0));

        let counter = Rc::clone(&first);
        slot.replace(Rc::new(move |_| counter.set(counter.get() + 1)));
        let counter = Rc::clone(&second);
        slot.replace(Rc::new(move |_| counter.set(counter.get() + 1)));

        (slot.current().unwrap())(&event());
        assert_eq!(first.get(), 0);
        assert_eq!(second.get(), 1);
    }

    #[test]
    fn test_clones_share_slot() {
        let slot = SubscriptionSlot::new();
        let shared = slot.clone();
        slot.replace(Rc::new(|_| {}));
        assert!(shared.is_set());
    }

    #[test]
    fn test_subscriber_may_replace_itself() {
        let slot = SubscriptionSlot::new();
        let inner_slot = slot.clone();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        slot.replace(Rc::new(move |_| {
            counter.set(counter.get() + 1);
            inner_slot.replace(Rc::new(|_| {}));
        }));
        (slot.current().unwrap())(&event());
        (slot.current().unwrap())(&event());
        assert_eq!(hits.get(), 1);
    }
}
