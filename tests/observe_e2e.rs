use std::cell::RefCell;
use std::rc::Rc;

use kobserve::{observe, observe_with, ChangeEvent, Key, Observable, ObserveConfig, PropertyCall, PropertyEvent, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn record_events(observed: &Observable) -> Rc<RefCell<Vec<PropertyEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    observed.subscribe(move |event: &ChangeEvent| {
        if let Some(event) = event.as_property() {
            sink.borrow_mut().push(event.clone());
        }
    });
    log
}

#[test]
fn write_then_read_reports_each_access_in_order() {
    init_tracing();
    let root = Value::object([("a", 1)]);
    let observed = observe(root, false);
    let log = record_events(&observed);

    assert!(observed.set("b", "two"));
    assert_eq!(observed.get("b"), Value::from("two"));

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].call, PropertyCall::Set);
    assert_eq!(log[0].key, Key::from("b"));
    assert!(log[0].old_value.is_undefined());
    assert_eq!(log[0].value, Value::from("two"));
    assert_eq!(log[1].call, PropertyCall::Get);
    assert!(log[1].old_value.is_null());
    assert_eq!(log[1].value, Value::from("two"));
}

#[test]
fn copy_mode_never_touches_root() {
    init_tracing();
    let root = Value::object([("a", 1), ("b", 2)]);
    let observed = observe(root.clone(), true);
    observed.set("a", 10);
    observed.set("c", 3);
    observed.delete("b");

    let entries = root.as_object().unwrap().borrow().clone();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["a"], Value::Int(1));
    assert_eq!(entries["b"], Value::Int(2));
    assert_eq!(observed.get("a"), Value::Int(10));
}

#[test]
fn alias_mode_edits_root() {
    let root = Value::array([1, 2, 3]);
    let observed = observe(root.clone(), false);
    observed.set(0usize, 100);
    observed.delete(2usize);

    assert_eq!(root.as_array().unwrap().get(0), Some(Value::Int(100)));
    assert!(root.as_array().unwrap().get(2).unwrap().is_undefined());
}

#[test]
fn write_snapshots_survive_later_overwrites() {
    let observed = observe(Value::object([("a", 1)]), false);
    let log = record_events(&observed);
    observed.set("a", 2);
    observed.set("a", 3);

    let json: Vec<_> = log
        .borrow()
        .iter()
        .map(|event| ChangeEvent::Property(event.clone()).to_json())
        .collect();
    assert_eq!(
        json[0],
        serde_json::json!({"call": "set", "obj": {"a": 3}, "key": "a", "oldValue": 1, "value": 2})
    );
    assert_eq!(
        json[1],
        serde_json::json!({"call": "set", "obj": {"a": 3}, "key": "a", "oldValue": 2, "value": 3})
    );
}

#[test]
fn nested_snapshots_do_not_follow_live_storage() {
    let observed = observe(Value::object([("list", Value::array([1]))]), false);
    let log = record_events(&observed);
    let list = Value::array([1, 2]);
    observed.set("list", list.clone());
    list.as_array().unwrap().push(3);

    assert_eq!(observed.get("list"), Value::array([1, 2, 3]));
    let log = log.borrow();
    assert_eq!(log[0].value, Value::array([1, 2]));
    assert_eq!(log[1].value, Value::array([1, 2, 3]));
}

#[test]
fn deleting_unknown_key_still_reports() {
    let observed = observe(Value::object([("a", 1)]), false);
    let log = record_events(&observed);
    assert!(observed.delete("never"));
    assert!(observed.delete("a"));

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert!(log[0].old_value.is_undefined());
    assert!(log[0].value.is_undefined());
    assert_eq!(log[1].old_value, Value::Int(1));
    assert!(log[1].value.is_undefined());
}

#[test]
fn sequence_length_reads_are_silent() {
    let observed = observe(Value::array([1, 2, 3]), false);
    let log = record_events(&observed);
    assert_eq!(observed.get("length"), Value::Int(3));
    assert_eq!(observed.get(0usize), Value::Int(1));

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].key, Key::Index(0));
}

#[test]
fn oversized_sequence_writes_never_panic() {
    let observed = observe(Value::array([1]), false);
    let log = record_events(&observed);

    assert!(observed.set(usize::MAX, 1));
    assert!(observed.set("length", i64::MAX));
    assert!(observed.set("18446744073709551614", 1));

    assert_eq!(observed.as_value().unwrap().len(), 1);
    assert_eq!(log.borrow().len(), 3);
}

#[test]
fn second_subscribe_replaces_first() {
    let observed = observe(Value::object([("a", 1)]), false);
    let first = record_events(&observed);
    observed.get("a");
    let second = record_events(&observed);
    observed.get("a");
    observed.set("a", 2);

    assert_eq!(first.borrow().len(), 1);
    assert_eq!(second.borrow().len(), 2);
}

#[test]
fn subscribe_chains() {
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    let observed = observe(Value::array([1]), false);
    observed
        .subscribe(|_| {})
        .subscribe(move |_| *counter.borrow_mut() += 1)
        .get(0usize);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn primitive_root_is_inert() {
    let observed = observe(Value::from("text"), true);
    let log = record_events(&observed);
    assert!(observed.get(0usize).is_undefined());
    assert!(observed.set("x", 1));
    assert!(observed.delete("x"));
    assert!(log.borrow().is_empty());
    assert_eq!(observed.as_value().unwrap().storage(), &Value::from("text"));
}

#[test]
fn subscriber_may_read_back_without_deadlock() {
    let observed = Rc::new(observe(Value::object([("a", 1), ("b", 2)]), false));
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let weak = Rc::downgrade(&observed);
    observed.subscribe(move |event| {
        let Some(event) = event.as_property() else {
            return;
        };
        sink.borrow_mut().push((event.call, event.key.to_name()));
        if event.call == PropertyCall::Set {
            if let Some(observed) = weak.upgrade() {
                observed.get("b");
            }
        }
    });

    observed.set("a", 5);
    assert_eq!(
        *seen.borrow(),
        vec![(PropertyCall::Set, "a".to_string()), (PropertyCall::Get, "b".to_string())]
    );
}

#[test]
fn json_config_drives_observation() {
    init_tracing();
    let config = ObserveConfig::from_json_str(
        r#"{"copy": true, "clone_deleted_value": false, "silent_keys": ["length", "secret"]}"#,
    )
    .unwrap();
    let root = Value::object([("secret", 1), ("open", 2)]);
    let observed = observe_with(root.clone(), config);
    let log = record_events(&observed);

    observed.get("secret");
    observed.get("open");
    observed.set("open", 3);

    assert_eq!(log.borrow().len(), 2);
    assert_eq!(root.as_object().unwrap().get("open"), Some(Value::Int(2)));
}
