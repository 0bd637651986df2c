//! Structural observation for document nodes.

use std::ops::Deref;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::dom::{MutationObserver, MutationObserverInit, MutationRecord, NodeRef};
use crate::error::DomResult;

use super::event::{ChangeEvent, MutationEvent};
use super::subscription::SubscriptionSlot;

/// An observed document node.
///
/// The node itself is used directly (the wrapper dereferences to it); edits
/// are reported to the subscriber as [`MutationEvent`]s when the owning
/// document delivers its pending mutations. Dropping the wrapper stops
/// observation.
#[derive(Debug)]
pub struct ObservedNode {
    node: NodeRef,
    root: NodeRef,
    copied: bool,
    slot: SubscriptionSlot,
    observer: MutationObserver,
}

impl ObservedNode {
    /// Starts watching `node`. Events name `root` as their receiver.
    pub(crate) fn attach(
        node: NodeRef,
        root: NodeRef,
        copied: bool,
        init: MutationObserverInit,
    ) -> DomResult<Self> {
        let slot = SubscriptionSlot::new();
        let callback_slot = slot.clone();
        let receiver = root.clone();
        let observer = MutationObserver::new(move |records: &[MutationRecord], _| {
            for record in records {
                // Looked up per record: a subscriber may be replaced mid-batch.
                let Some(subscriber) = callback_slot.current() else {
                    trace!(kind = %record.kind, "no subscriber; mutation dropped");
                    continue;
                };
                subscriber(&ChangeEvent::Mutation(MutationEvent::from_record(record, &receiver)));
            }
        });
        observer.observe(&node, init)?;
        debug!(node = %node.node_name(), copied, "observing document node");

        Ok(Self {
            node,
            root,
            copied,
            slot,
            observer,
        })
    }

    /// Makes `callback` the only subscriber. Returns `self` for chaining.
    pub fn subscribe<F>(&self, callback: F) -> &Self
    where
        F: Fn(&ChangeEvent) + 'static,
    {
        self.slot.replace(Rc::new(callback));
        self
    }

    /// The watched node: the root itself, or its copy.
    #[must_use]
    pub const fn node(&self) -> &NodeRef {
        &self.node
    }

    /// The node originally passed to `observe`.
    #[must_use]
    pub const fn root(&self) -> &NodeRef {
        &self.root
    }

    /// Returns true if the observable watches a copy of the root.
    #[must_use]
    pub const fn is_copy(&self) -> bool {
        self.copied
    }

    /// Returns true once a subscriber is installed.
    #[must_use]
    pub fn has_subscriber(&self) -> bool {
        self.slot.is_set()
    }

    /// Stops structural observation and discards undelivered mutations.
    pub fn disconnect(&self) {
        self.observer.disconnect();
    }

    /// Returns true until [`disconnect`](Self::disconnect) is called.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.observer.is_observing()
    }

    /// Drains undelivered mutations without notifying the subscriber.
    #[must_use]
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.observer.take_records()
    }
}

impl Deref for ObservedNode {
    type Target = NodeRef;

    fn deref(&self) -> &NodeRef {
        &self.node
    }
}

impl Drop for ObservedNode {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
