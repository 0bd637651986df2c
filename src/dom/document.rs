use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::DomResult;

use super::mutation::ObserverRegistry;
use super::node::{validate_tag_name, NodeKind, NodeRef};

pub(crate) struct DocumentInner {
    pub(crate) observers: RefCell<ObserverRegistry>,
}

/// Owning context for document nodes.
///
/// Nodes hold a weak reference to their document; the document owns the
/// mutation-observer registry and runs delivery checkpoints.
///
/// # Examples
///
/// ```
/// use kobserve::dom::Document;
///
/// let doc = Document::new();
/// let div = doc.create_element("div").unwrap();
/// div.append_child(&doc.create_text_node("hello")).unwrap();
/// assert_eq!(div.outer_html(), "<div>hello</div>");
/// ```
#[derive(Clone)]
pub struct Document(Rc<DocumentInner>);

impl Document {
    /// Creates an empty document with no observers.
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(DocumentInner {
            observers: RefCell::new(ObserverRegistry::default()),
        }))
    }

    pub(crate) fn from_inner(inner: Rc<DocumentInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn inner(&self) -> &Rc<DocumentInner> {
        &self.0
    }

    /// Creates a detached element.
    ///
    /// # Errors
    ///
    /// Returns `DomError::InvalidTagName` for malformed tag names.
    pub fn create_element(&self, tag: &str) -> DomResult<NodeRef> {
        let local_name = validate_tag_name(tag)?;
        Ok(NodeRef::new(
            NodeKind::Element {
                local_name,
                attributes: Vec::new(),
            },
            Rc::downgrade(&self.0),
        ))
    }

    /// Creates a detached text node.
    #[must_use]
    pub fn create_text_node(&self, data: &str) -> NodeRef {
        NodeRef::new(NodeKind::Text(data.to_string()), Rc::downgrade(&self.0))
    }

    /// Creates a detached comment.
    #[must_use]
    pub fn create_comment(&self, data: &str) -> NodeRef {
        NodeRef::new(NodeKind::Comment(data.to_string()), Rc::downgrade(&self.0))
    }

    /// Creates an empty fragment.
    #[must_use]
    pub fn create_document_fragment(&self) -> NodeRef {
        NodeRef::new(NodeKind::Fragment, Rc::downgrade(&self.0))
    }

    /// Duplicates `node` (and its subtree if `deep`) into this document.
    /// The copy is detached and can later be inserted anywhere in this document.
    #[must_use]
    pub fn import_node(&self, node: &NodeRef, deep: bool) -> NodeRef {
        node.clone_into(&Rc::downgrade(&self.0), deep)
    }

    /// Returns true if any observer of this document has queued records.
    #[must_use]
    pub fn has_pending_mutations(&self) -> bool {
        self.0
            .observers
            .borrow_mut()
            .live_observers()
            .iter()
            .any(|o| o.has_pending())
    }

    /// Delivery checkpoint: hands each observer its pending records as one
    /// batch, repeating until no records remain. Returns the number of
    /// records delivered.
    ///
    /// Records queued by a callback are delivered in a later pass of the
    /// same call, so a callback that always mutates what it observes never
    /// returns.
    pub fn deliver_mutations(&self) -> usize {
        let mut delivered = 0;
        loop {
            let observers = self.0.observers.borrow_mut().live_observers();
            let pass: usize = observers.iter().map(|observer| observer.deliver()).sum();
            if pass == 0 {
                break;
            }
            trace!(records = pass, "mutation delivery pass");
            delivered += pass;
        }
        delivered
    }

    /// Returns true if both handles refer to the same document.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{MutationObserver, MutationObserverInit};

    #[test]
    fn test_created_nodes_belong_to_document() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        assert!(div.owner_document().unwrap().ptr_eq(&doc));
        assert!(div.parent().is_none());
    }

    #[test]
    fn test_import_node_from_other_document() {
        let source = Document::new();
        let div = source.create_element("div").unwrap();
        div.append_child(&source.create_text_node("x")).unwrap();

        let target = Document::new();
        let imported = target.import_node(&div, true);
        assert!(imported.owner_document().unwrap().ptr_eq(&target));
        assert!(imported.first_child().unwrap().owner_document().unwrap().ptr_eq(&target));
        assert_eq!(imported.text_content(), "x");
        assert_ne!(imported, div);
    }

    #[test]
    fn test_insertion_adopts_foreign_nodes() {
        let a = Document::new();
        let b = Document::new();
        let parent = a.create_element("div").unwrap();
        let child = b.create_element("span").unwrap();
        parent.append_child(&child).unwrap();
        assert!(child.owner_document().unwrap().ptr_eq(&a));
    }

    #[test]
    fn test_has_pending_mutations() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let observer = MutationObserver::new(|_, _| {});
        observer.observe(&div, MutationObserverInit::structural()).unwrap();
        assert!(!doc.has_pending_mutations());
        div.set_attribute("id", "x").unwrap();
        assert!(doc.has_pending_mutations());
        doc.deliver_mutations();
        assert!(!doc.has_pending_mutations());
    }
}
