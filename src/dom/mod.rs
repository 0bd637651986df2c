//! Minimal structured-document model.
//!
//! Nodes live in a [`Document`] that owns the mutation-observer registry.
//! Every tree or attribute edit is recorded as it happens and queued for the
//! interested observers; queued records are handed to observer callbacks only
//! at [`Document::deliver_mutations`], the microtask-equivalent checkpoint.

/// Owning document context and observer delivery.
pub mod document;
/// Mutation observers, options and records.
pub mod mutation;
/// Node handles and tree editing.
pub mod node;
/// HTML and text serialization of nodes.
pub mod serialize;

pub use document::Document;
pub use mutation::{MutationKind, MutationObserver, MutationObserverInit, MutationRecord, ObserverId};
pub use node::{NodeRef, NodeType};
