//! Property interception for records and sequences.

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::classify::Category;
use crate::clone::clone_value;
use crate::value::{Key, Value};

use super::config::ObserveConfig;
use super::event::{ChangeEvent, PropertyCall, PropertyEvent};
use super::subscription::SubscriptionSlot;

/// An observed record or sequence.
///
/// Reads, writes and deletes go through [`get`](Self::get),
/// [`set`](Self::set) and [`delete`](Self::delete); each one notifies the
/// subscriber synchronously before returning. Values of other categories are
/// wrapped as inert passthroughs that never notify.
#[derive(Debug)]
pub struct ObservedValue {
    storage: Value,
    category: Category,
    copied: bool,
    slot: SubscriptionSlot,
    config: ObserveConfig,
}

impl ObservedValue {
    pub(crate) fn new(storage: Value, category: Category, config: ObserveConfig) -> Self {
        Self {
            storage,
            category,
            copied: config.copy,
            slot: SubscriptionSlot::new(),
            config,
        }
    }

    /// Makes `callback` the only subscriber. Returns `self` for chaining.
    pub fn subscribe<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.slot.replace(Rc::new(callback));
        self
    }

    /// Reads `key`. Emits a `get` event unless the key is silent.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let value = read_key(&self.storage, &key);
        if self.category.is_container() && !self.config.is_silent(&key) {
            self.emit(PropertyCall::Get, key, Value::Null, value.clone());
        }
        value
    }

    /// Writes `value` at `key`. Always returns true.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        let key = key.into();
        let value = value.into();
        if !self.category.is_container() {
            return true;
        }
        let old_value = clone_value(&read_key(&self.storage, &key));
        write_key(&self.storage, &key, value.clone());
        self.emit(PropertyCall::Set, key, old_value, clone_value(&value));
        true
    }

    /// Removes `key`. Always returns true, even if the key was absent.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        if !self.category.is_container() {
            return true;
        }
        let current = read_key(&self.storage, &key);
        let old_value = if self.config.clone_deleted_value {
            clone_value(&current)
        } else {
            current
        };
        remove_key(&self.storage, &key);
        self.emit(PropertyCall::Delete, key, old_value, Value::Undefined);
        true
    }

    /// Number of items (sequences) or entries (records). Never notifies.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.storage {
            Value::Array(items) => items.len(),
            Value::Object(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Returns true if [`len`](Self::len) is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The working storage: the root itself, or its copy.
    #[must_use]
    pub const fn storage(&self) -> &Value {
        &self.storage
    }

    /// Category of the observed root.
    #[must_use]
    pub const fn category(&self) -> Category {
        self.category
    }

    /// Returns true if the observable owns a copy of the root.
    #[must_use]
    pub const fn is_copy(&self) -> bool {
        self.copied
    }

    /// Returns true once a subscriber is installed.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.slot.is_set()
    }

    fn emit(&self, call: PropertyCall, key: Key, old_value: Value, value: Value) {
        let Some(subscriber) = self.slot.current() else {
            return;
        };
        trace!(call = call.as_str(), key = %key, "property event");
        subscriber(&ChangeEvent::Property(PropertyEvent {
            call,
            obj: self.storage.clone(),
            key,
            old_value,
            value,
        }));
    }
}

fn read_key(storage: &Value, key: &Key) -> Value {
    match storage {
        Value::Array(items) => {
            if key.is_named("length") {
                return Value::Int(i64::try_from(items.len()).unwrap_or(i64::MAX));
            }
            key.as_index()
                .and_then(|index| items.get(index))
                .unwrap_or_default()
        }
        Value::Object(entries) => entries.get(&key.to_name()).unwrap_or_default(),
        _ => Value::Undefined,
    }
}

fn write_key(storage: &Value, key: &Key, value: Value) {
    match storage {
        Value::Array(items) => {
            if key.is_named("length") {
                let len = value
                    .as_int()
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|&len| len <= Key::MAX_LENGTH);
                match len {
                    Some(len) => {
                        resize_sequence(&mut items.borrow_mut(), len);
                    }
                    None => debug!(value = %value, "invalid sequence length ignored"),
                }
                return;
            }
            // Sequences carry no named properties.
            let Some(index) = key.as_index() else {
                return;
            };
            let mut items = items.borrow_mut();
            if index >= items.len() {
                let grown = index
                    .checked_add(1)
                    .is_some_and(|len| resize_sequence(&mut items, len));
                if !grown {
                    return;
                }
            }
            items[index] = value;
        }
        Value::Object(entries) => {
            entries.borrow_mut().insert(key.to_name(), value);
        }
        _ => {}
    }
}

/// Truncates or pads `items` to `len`. Returns false, leaving `items`
/// untouched, if the memory cannot be reserved.
fn resize_sequence(items: &mut Vec<Value>, len: usize) -> bool {
    if let Some(additional) = len.checked_sub(items.len()) {
        if let Err(error) = items.try_reserve(additional) {
            warn!(len, %error, "sequence resize refused");
            return false;
        }
    }
    items.resize(len, Value::Undefined);
    true
}

fn remove_key(storage: &Value, key: &Key) {
    match storage {
        Value::Array(items) => {
            if let Some(index) = key.as_index() {
                if let Some(slot) = items.borrow_mut().get_mut(index) {
                    *slot = Value::Undefined;
                }
            }
        }
        Value::Object(entries) => {
            entries.borrow_mut().remove(&key.to_name());
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::classify::classify;

    fn observed(root: Value) -> ObservedValue {
        let category = classify(&root);
        ObservedValue::new(root, category, ObserveConfig::default())
    }

    fn recorded(value: &ObservedValue) -> Rc<RefCell<Vec<PropertyEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        value.subscribe(move |event| {
            if let Some(event) = event.as_property() {
                sink.borrow_mut().push(event.clone());
            }
        });
        log
    }

    #[test]
    fn test_get_missing_key_is_undefined() {
        let obs = observed(Value::object([("a", 1)]));
        assert!(obs.get("missing").is_undefined());
        assert!(obs.get(5usize).is_undefined());
    }

    #[test]
    fn test_reads_succeed_without_subscriber() {
        let obs = observed(Value::array([10, 20]));
        assert!(!obs.has_subscriber());
        assert_eq!(obs.get(1usize), Value::Int(20));
    }

    #[test]
    fn test_get_event_shape() {
        let obs = observed(Value::object([("a", 1)]));
        let log = recorded(&obs);
        assert_eq!(obs.get("a"), Value::Int(1));
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].call, PropertyCall::Get);
        assert_eq!(log[0].key, Key::from("a"));
        assert!(log[0].old_value.is_null());
        assert_eq!(log[0].value, Value::Int(1));
        assert!(log[0].obj.same(obs.storage()));
    }

    #[test]
    fn test_array_write_past_end_pads() {
        let obs = observed(Value::array([1]));
        obs.set(3usize, 4);
        let items = obs.storage().as_array().unwrap().borrow().clone();
        assert_eq!(items, vec![Value::Int(1), Value::Undefined, Value::Undefined, Value::Int(4)]);
    }

    #[test]
    fn test_array_length_write_resizes() {
        let obs = observed(Value::array([1, 2, 3]));
        let log = recorded(&obs);
        obs.set("length", 1);
        assert_eq!(obs.len(), 1);
        obs.set("length", 2);
        assert!(obs.storage().as_array().unwrap().get(1).unwrap().is_undefined());

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].old_value, Value::Int(3));
        assert_eq!(log[0].value, Value::Int(1));
    }

    #[test]
    fn test_oversized_array_writes_are_ignored() {
        let obs = observed(Value::array([1]));
        let log = recorded(&obs);

        assert!(obs.set(usize::MAX, 1));
        assert!(obs.set("length", i64::MAX));
        assert!(obs.set("18446744073709551614", 1));
        assert!(obs.set("4294967295", 1));

        assert_eq!(obs.len(), 1);
        assert_eq!(obs.get(0usize), Value::Int(1));
        assert!(obs.get(usize::MAX).is_undefined());
        assert_eq!(log.borrow().iter().filter(|e| e.call == PropertyCall::Set).count(), 4);
    }

    #[test]
    fn test_array_named_write_is_ignored() {
        let obs = observed(Value::array([1]));
        assert!(obs.set("name", "x"));
        assert_eq!(obs.len(), 1);
        assert!(obs.get("name").is_undefined());
    }

    #[test]
    fn test_numeric_name_addresses_index() {
        let obs = observed(Value::array([1, 2]));
        assert_eq!(obs.get("1"), Value::Int(2));
    }

    #[test]
    fn test_object_index_key_uses_decimal_name() {
        let obs = observed(Value::object([("0", "zero")]));
        assert_eq!(obs.get(0usize), Value::from("zero"));
    }

    #[test]
    fn test_array_delete_leaves_hole() {
        let obs = observed(Value::array([1, 2, 3]));
        let log = recorded(&obs);
        assert!(obs.delete(1usize));
        assert_eq!(obs.len(), 3);
        assert!(obs.storage().as_array().unwrap().get(1).unwrap().is_undefined());
        let log = log.borrow();
        assert_eq!(log[0].call, PropertyCall::Delete);
        assert_eq!(log[0].old_value, Value::Int(2));
        assert!(log[0].value.is_undefined());
    }

    #[test]
    fn test_set_snapshots_are_copies() {
        let nested = Value::array([1]);
        let obs = observed(Value::object([("list", nested.clone())]));
        let log = recorded(&obs);
        let replacement = Value::array([2]);
        obs.set("list", replacement.clone());

        nested.as_array().unwrap().push(99);
        replacement.as_array().unwrap().push(99);

        let log = log.borrow();
        assert_eq!(log[0].old_value, Value::array([1]));
        assert_eq!(log[0].value, Value::array([2]));
    }

    #[test]
    fn test_delete_snapshot_respects_config() {
        let nested = Value::array([1]);
        let root = Value::object([("list", nested.clone())]);

        let cloned = observed(root.clone());
        let cloned_log = recorded(&cloned);
        cloned.delete("list");
        assert!(!cloned_log.borrow()[0].old_value.same(&nested));

        root.as_object().unwrap().insert("list", nested.clone());
        let config = ObserveConfig {
            clone_deleted_value: false,
            ..ObserveConfig::default()
        };
        let live = ObservedValue::new(root, Category::Object, config);
        let live_log = recorded(&live);
        live.delete("list");
        assert!(live_log.borrow()[0].old_value.same(&nested));
    }

    #[test]
    fn test_custom_silent_keys() {
        let config = ObserveConfig {
            silent_keys: vec!["secret".to_string()],
            ..ObserveConfig::default()
        };
        let obs = ObservedValue::new(Value::object([("secret", 1), ("length", 2)]), Category::Object, config);
        let log = recorded(&obs);
        assert_eq!(obs.get("secret"), Value::Int(1));
        assert_eq!(obs.get("length"), Value::Int(2));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].key, Key::from("length"));
    }

    #[test]
    fn test_primitive_passthrough_never_notifies() {
        let obs = observed(Value::Int(5));
        let log = recorded(&obs);
        assert!(obs.get("x").is_undefined());
        assert!(obs.set("x", 1));
        assert!(obs.delete("x"));
        assert!(log.borrow().is_empty());
        assert_eq!(obs.storage(), &Value::Int(5));
        assert!(obs.is_empty());
    }

    #[test]
    fn test_reentrant_subscriber_recurses() {
        let obs = Rc::new(observed(Value::object([("a", 1), ("b", 2)])));
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let weak = Rc::downgrade(&obs);
        obs.subscribe(move |event| {
            let Some(event) = event.as_property() else {
                return;
            };
            sink.borrow_mut().push(event.key.to_name());
            if event.key.is_named("a") {
                if let Some(obs) = weak.upgrade() {
                    obs.get("b");
                }
            }
        });
        obs.get("a");
        assert_eq!(*log.borrow(), vec!["a".to_string(), "b".to_string()]);
    }
}
