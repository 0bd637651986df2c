//! # kobserve - Dual-Mode Observables
//!
//! kobserve wraps a value so that every interaction with it is reported to a
//! single subscriber. The strategy depends on what the value is:
//!
//! - **Records and sequences** are intercepted property by property. Each
//!   read, write and delete notifies the subscriber synchronously, with a
//!   snapshot of the previous value.
//! - **Document nodes** are watched structurally. Attribute, text and child
//!   list edits anywhere in the subtree are queued and reported when the
//!   owning [`Document`] delivers its pending mutations.
//! - **Everything else** is wrapped as an inert passthrough.
//!
//! An observable either aliases its root (edits are visible through every
//! other handle to it) or works on a private copy.
//!
//! ## Usage
//!
//! ```rust
//! use kobserve::{observe, Document, Value};
//!
//! let doc = Document::new();
//! let list = doc.create_element("ul")?;
//!
//! let observed = observe(Value::Node(list.clone()), false);
//! observed.subscribe(|event| println!("{}", event.to_json()));
//!
//! list.append_child(&doc.create_element("li")?)?;
//! assert_eq!(doc.deliver_mutations(), 1);
//! # Ok::<(), kobserve::DomError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Value model and classification
pub mod classify;
pub mod clone;
pub mod error;
pub mod value;

// Document model and observation
pub mod dom;
pub mod observe;

// Re-export primary types at crate root for convenience
pub use classify::{classify, Category};
pub use clone::clone_value;
pub use dom::{
    Document, MutationKind, MutationObserver, MutationObserverInit, MutationRecord, NodeRef,
    NodeType,
};
pub use error::{ConfigError, DomError, DomResult, ObserveError, ObserveResult};
pub use observe::{
    observe, observe_with, ChangeEvent, MutationEvent, Observable, ObserveConfig, ObservedNode,
    ObservedValue, PropertyCall, PropertyEvent, Subscriber,
};
pub use value::{ArrayRef, Key, ObjectRef, Record, Value};
