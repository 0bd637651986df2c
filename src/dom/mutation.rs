use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{DomError, DomResult};

use super::document::DocumentInner;
use super::node::{NodeRef, WeakNode};

/// Unique identifier for a mutation observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObserverId(Uuid);

impl ObserverId {
    /// Create a new random observer id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of change a [`MutationRecord`] describes.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    Attributes,
    ChildList,
    CharacterData,
}

impl MutationKind {
    /// Host spelling of the kind (`attributes`, `childList`, `characterData`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attributes => "attributes",
            Self::ChildList => "childList",
            Self::CharacterData => "characterData",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded change to a document node.
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: MutationKind,
    pub target: NodeRef,
    pub added_nodes: Vec<NodeRef>,
    pub removed_nodes: Vec<NodeRef>,
    pub previous_sibling: Option<NodeRef>,
    pub next_sibling: Option<NodeRef>,
    pub attribute_name: Option<String>,
    /// Previous attribute value or character data, when the observer asked for it.
    pub old_value: Option<String>,
}

/// Which changes a [`MutationObserver`] registration reports.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationObserverInit {
    pub attributes: bool,
    pub attribute_old_value: bool,
    pub child_list: bool,
    pub character_data: bool,
    pub character_data_old_value: bool,
    pub subtree: bool,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    /// Attribute changes with previous values and child list changes,
    /// through the whole subtree. Character data is not observed.
    #[must_use]
    pub fn structural() -> Self {
        Self {
            attributes: true,
            attribute_old_value: true,
            child_list: true,
            character_data: false,
            character_data_old_value: false,
            subtree: true,
            attribute_filter: None,
        }
    }

    /// Applies implied flags and rejects options that observe nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomError::InvalidObserverInit` if no kind of change is observed.
    pub fn normalized(mut self) -> DomResult<Self> {
        if self.attribute_old_value || self.attribute_filter.is_some() {
            self.attributes = true;
        }
        if self.character_data_old_value {
            self.character_data = true;
        }
        if !(self.attributes || self.child_list || self.character_data) {
            return Err(DomError::InvalidObserverInit {
                reason: "at least one of attributes, child_list or character_data must be set"
                    .to_string(),
            });
        }
        if let Some(filter) = &mut self.attribute_filter {
            for name in filter.iter_mut() {
                *name = name.to_ascii_lowercase();
            }
        }
        Ok(self)
    }

    fn wants(&self, pending: &PendingMutation) -> bool {
        match pending.kind {
            MutationKind::Attributes => {
                self.attributes
                    && match (&self.attribute_filter, &pending.attribute_name) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        _ => true,
                    }
            }
            MutationKind::ChildList => self.child_list,
            MutationKind::CharacterData => self.character_data,
        }
    }

    fn keeps_old_value(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::Attributes => self.attribute_old_value,
            MutationKind::CharacterData => self.character_data_old_value,
            MutationKind::ChildList => false,
        }
    }
}

/// A change about to be recorded, before per-observer old-value filtering.
#[derive(Debug, Clone)]
pub(crate) struct PendingMutation {
    kind: MutationKind,
    added_nodes: Vec<NodeRef>,
    removed_nodes: Vec<NodeRef>,
    previous_sibling: Option<NodeRef>,
    next_sibling: Option<NodeRef>,
    attribute_name: Option<String>,
    old_value: Option<String>,
}

impl PendingMutation {
    pub(crate) fn attribute(name: String, old_value: Option<String>) -> Self {
        Self {
            kind: MutationKind::Attributes,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: Some(name),
            old_value,
        }
    }

    pub(crate) fn character_data(old_value: String) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            previous_sibling: None,
            next_sibling: None,
            attribute_name: None,
            old_value: Some(old_value),
        }
    }

    pub(crate) fn child_list(
        added_nodes: Vec<NodeRef>,
        removed_nodes: Vec<NodeRef>,
        previous_sibling: Option<NodeRef>,
        next_sibling: Option<NodeRef>,
    ) -> Self {
        Self {
            kind: MutationKind::ChildList,
            added_nodes,
            removed_nodes,
            previous_sibling,
            next_sibling,
            attribute_name: None,
            old_value: None,
        }
    }

    fn to_record(&self, target: &NodeRef, keep_old_value: bool) -> MutationRecord {
        MutationRecord {
            kind: self.kind,
            target: target.clone(),
            added_nodes: self.added_nodes.clone(),
            removed_nodes: self.removed_nodes.clone(),
            previous_sibling: self.previous_sibling.clone(),
            next_sibling: self.next_sibling.clone(),
            attribute_name: self.attribute_name.clone(),
            old_value: if keep_old_value { self.old_value.clone() } else { None },
        }
    }
}

/// Records `pending` against `target` for every interested observer of the
/// target's document.
pub(crate) fn queue_mutation(target: &NodeRef, pending: PendingMutation) {
    let Some(document) = target.owner_document() else {
        return;
    };
    let chain = target.inclusive_ancestors();
    let interested = document.inner().observers.borrow_mut().interested(&chain, &pending);
    for (observer, keep_old_value) in interested {
        trace!(
            observer = %observer.id,
            kind = %pending.kind,
            target = %target.node_name(),
            "queued mutation record"
        );
        observer.enqueue(pending.to_record(target, keep_old_value));
    }
}

/// Moves the registrations targeting `node` from `from` to `to` when the
/// node is adopted by another document.
pub(crate) fn migrate_registrations(node: &NodeRef, from: &Rc<DocumentInner>, to: &Rc<DocumentInner>) {
    let moved = from.observers.borrow_mut().take_registrations(node);
    for (observer, init) in moved {
        debug!(observer = %observer.id, target = %node.node_name(), "registration follows adopted node");
        to.observers.borrow_mut().register(&observer, node, init);
        observer.track_document(to);
    }
}

struct Registration {
    target: WeakNode,
    init: MutationObserverInit,
}

struct RegistryEntry {
    id: ObserverId,
    observer: Weak<ObserverInner>,
    registrations: Vec<Registration>,
}

/// Per-document list of observers and the nodes they watch.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    entries: Vec<RegistryEntry>,
}

impl ObserverRegistry {
    fn register(&mut self, observer: &Rc<ObserverInner>, target: &NodeRef, init: MutationObserverInit) {
        let index = match self.entries.iter().position(|e| e.id == observer.id) {
            Some(index) => index,
            None => {
                self.entries.push(RegistryEntry {
                    id: observer.id,
                    observer: Rc::downgrade(observer),
                    registrations: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[index];
        match entry.registrations.iter_mut().find(|r| r.target.points_to(target)) {
            Some(existing) => existing.init = init,
            None => entry.registrations.push(Registration {
                target: target.downgrade(),
                init,
            }),
        }
    }

    fn unregister(&mut self, id: ObserverId) {
        self.entries.retain(|e| e.id != id);
    }

    /// Removes and returns every live registration whose target is `node`.
    fn take_registrations(&mut self, node: &NodeRef) -> Vec<(Rc<ObserverInner>, MutationObserverInit)> {
        let mut taken = Vec::new();
        for entry in &mut self.entries {
            let Some(observer) = entry.observer.upgrade() else {
                continue;
            };
            entry.registrations.retain(|registration| {
                if registration.target.points_to(node) {
                    taken.push((Rc::clone(&observer), registration.init.clone()));
                    false
                } else {
                    true
                }
            });
        }
        self.prune();
        taken
    }

    fn prune(&mut self) {
        self.entries.retain_mut(|entry| {
            entry.registrations.retain(|r| r.target.upgrade().is_some());
            entry.observer.strong_count() > 0 && !entry.registrations.is_empty()
        });
    }

    /// Observers that should receive `pending` for a change on `chain[0]`,
    /// paired with whether their record keeps the old value.
    fn interested(
        &mut self,
        chain: &[NodeRef],
        pending: &PendingMutation,
    ) -> Vec<(Rc<ObserverInner>, bool)> {
        self.prune();
        let mut out = Vec::new();
        for entry in &self.entries {
            let Some(observer) = entry.observer.upgrade() else {
                continue;
            };
            let mut matched = false;
            let mut keep_old_value = false;
            for registration in &entry.registrations {
                let Some(position) = chain.iter().position(|n| registration.target.points_to(n)) else {
                    continue;
                };
                if position > 0 && !registration.init.subtree {
                    continue;
                }
                if registration.init.wants(pending) {
                    matched = true;
                    keep_old_value |= registration.init.keeps_old_value(pending.kind);
                }
            }
            if matched {
                out.push((observer, keep_old_value));
            }
        }
        out
    }

    pub(crate) fn live_observers(&mut self) -> Vec<Rc<ObserverInner>> {
        self.prune();
        self.entries.iter().filter_map(|e| e.observer.upgrade()).collect()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

type MutationCallback = Box<dyn Fn(&[MutationRecord], &MutationObserver)>;

pub(crate) struct ObserverInner {
    id: ObserverId,
    callback: MutationCallback,
    tx: Sender<MutationRecord>,
    rx: Receiver<MutationRecord>,
    documents: RefCell<Vec<Weak<DocumentInner>>>,
}

impl ObserverInner {
    fn enqueue(&self, record: MutationRecord) {
        if self.tx.send(record).is_err() {
            warn!(observer = %self.id, "mutation queue closed; record dropped");
        }
    }

    fn track_document(&self, document: &Rc<DocumentInner>) {
        let weak = Rc::downgrade(document);
        let mut documents = self.documents.borrow_mut();
        if !documents.iter().any(|d| Weak::ptr_eq(d, &weak)) {
            documents.push(weak);
        }
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.rx.is_empty()
    }

    /// Hands every pending record to the callback as one batch.
    pub(crate) fn deliver(self: &Rc<Self>) -> usize {
        let records: Vec<MutationRecord> = self.rx.try_iter().collect();
        if records.is_empty() {
            return 0;
        }
        trace!(observer = %self.id, records = records.len(), "delivering mutation batch");
        let handle = MutationObserver {
            inner: Rc::clone(self),
        };
        (self.callback)(&records, &handle);
        records.len()
    }
}

/// Watches document nodes for structural and attribute changes.
///
/// Records are queued as edits happen and handed to the callback in batches
/// when the owning document runs [`crate::dom::Document::deliver_mutations`].
/// Dropping every handle to an observer stops it.
#[derive(Clone)]
pub struct MutationObserver {
    inner: Rc<ObserverInner>,
}

impl MutationObserver {
    /// Creates an observer that calls `callback` with each delivered batch.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&[MutationRecord], &MutationObserver) + 'static,
    {
        let (tx, rx) = unbounded();
        Self {
            inner: Rc::new(ObserverInner {
                id: ObserverId::new(),
                callback: Box::new(callback),
                tx,
                rx,
                documents: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> ObserverId {
        self.inner.id
    }

    /// Starts observing `target`. Observing the same target again replaces
    /// its options.
    ///
    /// # Errors
    ///
    /// Returns `DomError::InvalidObserverInit` for options that observe
    /// nothing and `DomError::DocumentGone` if the target's document was dropped.
    pub fn observe(&self, target: &NodeRef, init: MutationObserverInit) -> DomResult<()> {
        let init = init.normalized()?;
        let document = target.owner_document().ok_or(DomError::DocumentGone)?;
        debug!(observer = %self.inner.id, target = %target.node_name(), subtree = init.subtree, "observing node");
        document.inner().observers.borrow_mut().register(&self.inner, target, init);
        self.inner.track_document(document.inner());
        Ok(())
    }

    /// Stops observing every node and discards pending records.
    pub fn disconnect(&self) {
        let documents = std::mem::take(&mut *self.inner.documents.borrow_mut());
        for document in documents.iter().filter_map(Weak::upgrade) {
            document.observers.borrow_mut().unregister(self.inner.id);
        }
        let discarded = self.inner.rx.try_iter().count();
        debug!(observer = %self.inner.id, discarded, "observer disconnected");
    }

    /// Drains pending records without invoking the callback.
    #[must_use]
    pub fn take_records(&self) -> Vec<MutationRecord> {
        self.inner.rx.try_iter().collect()
    }

    /// Number of records waiting for delivery.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.rx.len()
    }

    /// Returns true while the observer is registered with at least one document.
    #[must_use]
    pub fn is_observing(&self) -> bool {
        !self.inner.documents.borrow().is_empty()
    }
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("id", &self.inner.id)
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
