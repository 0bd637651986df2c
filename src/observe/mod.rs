//! Observation entry points.
//!
//! [`observe`] classifies a root value and picks one of two strategies:
//!
//! - records and sequences are wrapped in an [`ObservedValue`], which reports
//!   every read, write and delete synchronously;
//! - document nodes are wrapped in an [`ObservedNode`], which reports tree
//!   and attribute edits when the owning document delivers its mutations.
//!
//! Every other value is wrapped as an inert passthrough.

pub mod config;
pub mod event;
pub mod node;
pub mod property;
pub mod subscription;

use tracing::{debug, warn};

use crate::classify::{classify, Category};
use crate::clone::clone_value;
use crate::dom::NodeRef;
use crate::value::{Key, Value};

pub use config::ObserveConfig;
pub use event::{ChangeEvent, MutationEvent, PropertyCall, PropertyEvent};
pub use node::ObservedNode;
pub use property::ObservedValue;
pub use subscription::Subscriber;

/// The result of [`observe`].
#[derive(Debug)]
pub enum Observable {
    /// A record, sequence or passthrough value.
    Property(ObservedValue),
    /// A document node.
    Node(ObservedNode),
}

impl Observable {
    /// Makes `callback` the only subscriber. Returns `self` for chaining.
    pub fn subscribe<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        match self {
            Self::Property(value) => {
                value.subscribe(callback);
            }
            Self::Node(node) => {
                node.subscribe(callback);
            }
        }
        self
    }

    /// Category of the observed root.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Property(value) => value.category(),
            Self::Node(_) => Category::Html,
        }
    }

    /// Reads `key`. Nodes have no observed properties and yield `Undefined`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        match self {
            Self::Property(value) => value.get(key),
            Self::Node(_) => Value::Undefined,
        }
    }

    /// Writes `value` at `key`. A no-op on nodes. Always returns true.
    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) -> bool {
        match self {
            Self::Property(observed) => observed.set(key, value),
            Self::Node(_) => true,
        }
    }

    /// Removes `key`. A no-op on nodes. Always returns true.
    pub fn delete(&self, key: impl Into<Key>) -> bool {
        match self {
            Self::Property(value) => value.delete(key),
            Self::Node(_) => true,
        }
    }

    /// The property observable, unless a node is being watched.
    #[must_use]
    pub const fn as_value(&self) -> Option<&ObservedValue> {
        match self {
            Self::Property(value) => Some(value),
            Self::Node(_) => None,
        }
    }

    /// The node observable, if a node is being watched.
    #[must_use]
    pub const fn as_node(&self) -> Option<&ObservedNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Property(_) => None,
        }
    }

    /// Unwraps the property observable.
    #[must_use]
    pub fn into_value(self) -> Option<ObservedValue> {
        match self {
            Self::Property(value) => Some(value),
            Self::Node(_) => None,
        }
    }

    /// Unwraps the node observable.
    #[must_use]
    pub fn into_node(self) -> Option<ObservedNode> {
        match self {
            Self::Node(node) => Some(node),
            Self::Property(_) => None,
        }
    }
}

/// Observes `root` with default options.
///
/// With `copy` false the observable aliases `root`, so edits made through it
/// are visible through every other handle to the same value. With `copy`
/// true it works on a copy (shallow for records and sequences, deep for
/// nodes) and the caller's value is never touched.
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// use kobserve::{observe, Value};
///
/// let calls = Rc::new(RefCell::new(Vec::new()));
/// let sink = Rc::clone(&calls);
/// let data = Value::object([("a", 1)]);
///
/// let observed = observe(data.clone(), false);
/// observed.subscribe(move |event| sink.borrow_mut().push(event.call()));
/// observed.set("a", 2);
///
/// assert_eq!(*calls.borrow(), vec!["set"]);
/// assert_eq!(data.as_object().unwrap().get("a"), Some(Value::Int(2)));
/// ```
#[must_use]
pub fn observe(root: Value, copy: bool) -> Observable {
    observe_with(root, ObserveConfig::with_copy(copy))
}

/// Observes `root` with explicit options.
#[must_use]
pub fn observe_with(root: Value, config: ObserveConfig) -> Observable {
    let category = classify(&root);
    let storage = if config.copy {
        clone_value(&root)
    } else {
        root.clone()
    };
    debug!(category = %category, copy = config.copy, "observing value");

    match (category, &storage, &root) {
        (Category::Html, Value::Node(node), Value::Node(original)) => {
            match attach_node(node, original, &config) {
                Ok(observed) => Observable::Node(observed),
                Err(error) => {
                    warn!(%error, "structural watch failed; falling back to passthrough");
                    Observable::Property(ObservedValue::new(storage, category, config))
                }
            }
        }
        _ => Observable::Property(ObservedValue::new(storage, category, config)),
    }
}

fn attach_node(
    node: &NodeRef,
    original: &NodeRef,
    config: &ObserveConfig,
) -> crate::error::DomResult<ObservedNode> {
    ObservedNode::attach(
        node.clone(),
        original.clone(),
        config.copy,
        config.mutation.clone(),
    )
}
