use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::error::{DomError, DomResult};

use super::document::{Document, DocumentInner};
use super::mutation::{migrate_registrations, queue_mutation, PendingMutation};

/// The kind of a document node.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Element,
    Text,
    Comment,
    DocumentFragment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub(crate) name: String,
    pub(crate) value: String,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element {
        local_name: String,
        attributes: Vec<Attribute>,
    },
    Text(String),
    Comment(String),
    Fragment,
}

pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Weak<RefCell<NodeData>>,
    pub(crate) children: Vec<NodeRef>,
    pub(crate) document: Weak<DocumentInner>,
}

/// Shared handle to a document node.
///
/// Handles compare by identity: two handles are equal only if they point at
/// the same node.
#[derive(Clone)]
pub struct NodeRef(Rc<RefCell<NodeData>>);

/// Non-owning node handle used by observer registrations.
#[derive(Clone)]
pub(crate) struct WeakNode(Weak<RefCell<NodeData>>);

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<NodeRef> {
        self.0.upgrade().map(NodeRef)
    }

    pub(crate) fn points_to(&self, node: &NodeRef) -> bool {
        std::ptr::eq(self.0.as_ptr(), Rc::as_ptr(&node.0))
    }
}

fn attribute_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_:][A-Za-z0-9_:.\-]*$").expect("valid attribute name regex"))
}

fn tag_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9\-]*$").expect("valid tag name regex"))
}

pub(crate) fn validate_tag_name(name: &str) -> DomResult<String> {
    if tag_name_re().is_match(name) {
        Ok(name.to_ascii_lowercase())
    } else {
        Err(DomError::InvalidTagName { name: name.to_string() })
    }
}

fn validate_attribute_name(name: &str) -> DomResult<String> {
    if attribute_name_re().is_match(name) {
        Ok(name.to_ascii_lowercase())
    } else {
        Err(DomError::InvalidAttributeName { name: name.to_string() })
    }
}

/// Interface name reported for an element with the given local name.
fn element_interface(local_name: &str) -> &'static str {
    match local_name {
        "a" => "HTMLAnchorElement",
        "area" => "HTMLAreaElement",
        "audio" => "HTMLAudioElement",
        "base" => "HTMLBaseElement",
        "body" => "HTMLBodyElement",
        "br" => "HTMLBRElement",
        "button" => "HTMLButtonElement",
        "canvas" => "HTMLCanvasElement",
        "div" => "HTMLDivElement",
        "dl" => "HTMLDListElement",
        "form" => "HTMLFormElement",
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => "HTMLHeadingElement",
        "head" => "HTMLHeadElement",
        "hr" => "HTMLHRElement",
        "html" => "HTMLHtmlElement",
        "iframe" => "HTMLIFrameElement",
        "img" => "HTMLImageElement",
        "input" => "HTMLInputElement",
        "label" => "HTMLLabelElement",
        "li" => "HTMLLIElement",
        "link" => "HTMLLinkElement",
        "ol" => "HTMLOListElement",
        "option" => "HTMLOptionElement",
        "p" => "HTMLParagraphElement",
        "pre" => "HTMLPreElement",
        "script" => "HTMLScriptElement",
        "select" => "HTMLSelectElement",
        "span" => "HTMLSpanElement",
        "style" => "HTMLStyleElement",
        "table" => "HTMLTableElement",
        "td" | "th" => "HTMLTableCellElement",
        "textarea" => "HTMLTextAreaElement",
        "title" => "HTMLTitleElement",
        "tr" => "HTMLTableRowElement",
        "ul" => "HTMLUListElement",
        "video" => "HTMLVideoElement",
        "article" | "aside" | "b" | "code" | "em" | "footer" | "header" | "i" | "main" | "nav"
        | "section" | "small" | "strong" => "HTMLElement",
        custom if custom.contains('-') => "HTMLElement",
        _ => "HTMLUnknownElement",
    }
}

impl NodeRef {
    pub(crate) fn new(kind: NodeKind, document: Weak<DocumentInner>) -> Self {
        Self(Rc::new(RefCell::new(NodeData {
            kind,
            parent: Weak::new(),
            children: Vec::new(),
            document,
        })))
    }

    pub(crate) fn data(&self) -> Ref<'_, NodeData> {
        self.0.borrow()
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        WeakNode(Rc::downgrade(&self.0))
    }

    /// The kind of this node.
    #[must_use]
    pub fn node_type(&self) -> NodeType {
        match self.0.borrow().kind {
            NodeKind::Element { .. } => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
            NodeKind::Comment(_) => NodeType::Comment,
            NodeKind::Fragment => NodeType::DocumentFragment,
        }
    }

    /// Uppercased tag name for elements, `#text`, `#comment` or
    /// `#document-fragment` otherwise.
    #[must_use]
    pub fn node_name(&self) -> String {
        match &self.0.borrow().kind {
            NodeKind::Element { local_name, .. } => local_name.to_ascii_uppercase(),
            NodeKind::Text(_) => "#text".to_string(),
            NodeKind::Comment(_) => "#comment".to_string(),
            NodeKind::Fragment => "#document-fragment".to_string(),
        }
    }

    /// Lowercase local name of an element.
    #[must_use]
    pub fn tag_name(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { local_name, .. } => Some(local_name.clone()),
            _ => None,
        }
    }

    /// Concrete interface name, e.g. `HTMLAnchorElement` or `DocumentFragment`.
    #[must_use]
    pub fn interface_name(&self) -> &'static str {
        match &self.0.borrow().kind {
            NodeKind::Element { local_name, .. } => element_interface(local_name),
            NodeKind::Text(_) => "text",
            NodeKind::Comment(_) => "comment",
            NodeKind::Fragment => "DocumentFragment",
        }
    }

    /// Returns true for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        self.node_type() == NodeType::Element
    }

    /// The parent node, if attached.
    #[must_use]
    pub fn parent(&self) -> Option<NodeRef> {
        self.0.borrow().parent.upgrade().map(NodeRef)
    }

    /// Snapshot of the child list.
    #[must_use]
    pub fn children(&self) -> Vec<NodeRef> {
        self.0.borrow().children.clone()
    }

    /// Number of children.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.0.borrow().children.len()
    }

    /// First child, if any.
    #[must_use]
    pub fn first_child(&self) -> Option<NodeRef> {
        self.0.borrow().children.first().cloned()
    }

    /// Last child, if any.
    #[must_use]
    pub fn last_child(&self) -> Option<NodeRef> {
        self.0.borrow().children.last().cloned()
    }

    /// Sibling immediately before this node.
    #[must_use]
    pub fn previous_sibling(&self) -> Option<NodeRef> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        let index = data.children.iter().position(|c| c == self)?;
        index.checked_sub(1).map(|i| data.children[i].clone())
    }

    /// Sibling immediately after this node.
    #[must_use]
    pub fn next_sibling(&self) -> Option<NodeRef> {
        let parent = self.parent()?;
        let data = parent.0.borrow();
        let index = data.children.iter().position(|c| c == self)?;
        data.children.get(index + 1).cloned()
    }

    /// The document this node belongs to, if it is still alive.
    #[must_use]
    pub fn owner_document(&self) -> Option<Document> {
        self.0.borrow().document.upgrade().map(Document::from_inner)
    }

    /// Returns true if `other` is this node or one of its descendants.
    #[must_use]
    pub fn contains(&self, other: &NodeRef) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node == *self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// This node followed by its ancestors, nearest first.
    pub(crate) fn inclusive_ancestors(&self) -> Vec<NodeRef> {
        let mut chain = vec![self.clone()];
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            chain.push(node);
        }
        chain
    }

    /// Value of the attribute `name` (case-insensitive).
    #[must_use]
    pub fn get_attribute(&self, name: &str) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attributes, .. } => {
                let name = name.to_ascii_lowercase();
                attributes.iter().find(|a| a.name == name).map(|a| a.value.clone())
            }
            _ => None,
        }
    }

    /// Returns true if the attribute `name` is present.
    #[must_use]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Attribute names in insertion order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        match &self.0.borrow().kind {
            NodeKind::Element { attributes, .. } => attributes.iter().map(|a| a.name.clone()).collect(),
            _ => Vec::new(),
        }
    }

    /// Sets an attribute, recording an `attributes` mutation.
    ///
    /// # Errors
    ///
    /// Returns `DomError::InvalidAttributeName` for malformed names and
    /// `DomError::InvalidNodeType` if this node is not an element.
    pub fn set_attribute(&self, name: &str, value: &str) -> DomResult<()> {
        let name = validate_attribute_name(name)?;
        let replaced = {
            let mut data = self.0.borrow_mut();
            match &mut data.kind {
                NodeKind::Element { attributes, .. } => Some(
                    match attributes.iter_mut().find(|a| a.name == name) {
                        Some(attr) => Some(std::mem::replace(&mut attr.value, value.to_string())),
                        None => {
                            attributes.push(Attribute {
                                name: name.clone(),
                                value: value.to_string(),
                            });
                            None
                        }
                    },
                ),
                _ => None,
            }
        };
        let Some(old_value) = replaced else {
            return Err(self.unsupported("setAttribute"));
        };
        queue_mutation(self, PendingMutation::attribute(name, old_value));
        Ok(())
    }

    /// Removes an attribute. Returns false (and records nothing) if it was absent.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        let removed = {
            let mut data = self.0.borrow_mut();
            match &mut data.kind {
                NodeKind::Element { attributes, .. } => attributes
                    .iter()
                    .position(|a| a.name == name)
                    .map(|index| attributes.remove(index).value),
                _ => None,
            }
        };
        match removed {
            Some(old_value) => {
                queue_mutation(self, PendingMutation::attribute(name, Some(old_value)));
                true
            }
            None => false,
        }
    }

    /// Appends `node` as the last child of this node.
    ///
    /// A fragment is emptied into this node. A node that already has a parent
    /// is moved.
    ///
    /// # Errors
    ///
    /// Returns `DomError::HierarchyRequest` if this node cannot hold children
    /// or `node` is an inclusive ancestor of it.
    pub fn append_child(&self, node: &NodeRef) -> DomResult<NodeRef> {
        self.insert_before(node, None)
    }

    /// Inserts `node` before `child`, or at the end if `child` is `None`.
    ///
    /// # Errors
    ///
    /// Returns `DomError::HierarchyRequest` for invalid trees and
    /// `DomError::NotFound` if `child` is not a child of this node.
    pub fn insert_before(&self, node: &NodeRef, child: Option<&NodeRef>) -> DomResult<NodeRef> {
        self.ensure_can_insert(node)?;
        if let Some(child) = child {
            self.ensure_is_child(child)?;
        }

        let mut reference = child.cloned();
        if reference.as_ref() == Some(node) {
            reference = node.next_sibling();
        }

        let nodes = take_insertion_nodes(node);
        if nodes.is_empty() {
            return Ok(node.clone());
        }

        let previous_sibling = match &reference {
            Some(r) => r.previous_sibling(),
            None => self.last_child(),
        };
        for n in &nodes {
            self.insert_silently(n, reference.as_ref());
        }
        queue_mutation(
            self,
            PendingMutation::child_list(nodes, Vec::new(), previous_sibling, reference),
        );
        Ok(node.clone())
    }

    /// Removes `child` from this node.
    ///
    /// # Errors
    ///
    /// Returns `DomError::NotFound` if `child` is not a child of this node.
    pub fn remove_child(&self, child: &NodeRef) -> DomResult<NodeRef> {
        self.ensure_is_child(child)?;
        child.remove();
        Ok(child.clone())
    }

    /// Replaces `child` with `node`, recording a single `childList` mutation.
    ///
    /// # Errors
    ///
    /// Same conditions as [`NodeRef::insert_before`].
    pub fn replace_child(&self, node: &NodeRef, child: &NodeRef) -> DomResult<NodeRef> {
        self.ensure_can_insert(node)?;
        self.ensure_is_child(child)?;
        if node == child {
            return Ok(child.clone());
        }

        let mut reference = child.next_sibling();
        if reference.as_ref() == Some(node) {
            reference = node.next_sibling();
        }

        let nodes = take_insertion_nodes(node);
        let previous_sibling = child.previous_sibling();
        child.detach_silently();
        for n in &nodes {
            self.insert_silently(n, reference.as_ref());
        }
        queue_mutation(
            self,
            PendingMutation::child_list(nodes, vec![child.clone()], previous_sibling, reference),
        );
        Ok(child.clone())
    }

    /// Detaches this node from its parent, if any.
    pub fn remove(&self) {
        if let Some((parent, previous_sibling, next_sibling)) = self.detach_silently() {
            queue_mutation(
                &parent,
                PendingMutation::child_list(Vec::new(), vec![self.clone()], previous_sibling, next_sibling),
            );
        }
    }

    /// Character data of a text or comment node.
    #[must_use]
    pub fn character_data(&self) -> Option<String> {
        match &self.0.borrow().kind {
            NodeKind::Text(data) | NodeKind::Comment(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Replaces the character data of a text or comment node, recording a
    /// `characterData` mutation.
    ///
    /// # Errors
    ///
    /// Returns `DomError::InvalidNodeType` for elements and fragments.
    pub fn set_data(&self, data: &str) -> DomResult<()> {
        let replaced = {
            let mut node = self.0.borrow_mut();
            match &mut node.kind {
                NodeKind::Text(current) | NodeKind::Comment(current) => {
                    Some(std::mem::replace(current, data.to_string()))
                }
                _ => None,
            }
        };
        let Some(old_value) = replaced else {
            return Err(self.unsupported("setData"));
        };
        queue_mutation(self, PendingMutation::character_data(old_value));
        Ok(())
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self) -> String {
        let data = self.0.borrow();
        match &data.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => text.clone(),
            NodeKind::Element { .. } | NodeKind::Fragment => {
                let mut out = String::new();
                collect_text(&data.children, &mut out);
                out
            }
        }
    }

    /// Replaces all children with a single text node (none if `text` is empty).
    ///
    /// On text and comment nodes this sets the character data instead.
    pub fn set_text_content(&self, text: &str) {
        if matches!(self.node_type(), NodeType::Text | NodeType::Comment) {
            // Only fails for elements and fragments.
            let _ = self.set_data(text);
            return;
        }

        let removed = {
            let mut data = self.0.borrow_mut();
            std::mem::take(&mut data.children)
        };
        for child in &removed {
            child.0.borrow_mut().parent = Weak::new();
        }

        let mut added = Vec::new();
        if !text.is_empty() {
            let document = self.0.borrow().document.clone();
            let node = NodeRef::new(NodeKind::Text(text.to_string()), document);
            self.insert_silently(&node, None);
            added.push(node);
        }

        if !removed.is_empty() || !added.is_empty() {
            queue_mutation(self, PendingMutation::child_list(added, removed, None, None));
        }
    }

    /// Duplicates this node (and its subtree if `deep`) within the same document.
    #[must_use]
    pub fn clone_node(&self, deep: bool) -> NodeRef {
        let document = self.0.borrow().document.clone();
        self.clone_into(&document, deep)
    }

    pub(crate) fn clone_into(&self, document: &Weak<DocumentInner>, deep: bool) -> NodeRef {
        let kind = self.0.borrow().kind.clone();
        let copy = NodeRef::new(kind, document.clone());
        if deep {
            for child in self.children() {
                let child_copy = child.clone_into(document, true);
                child_copy.0.borrow_mut().parent = Rc::downgrade(&copy.0);
                copy.0.borrow_mut().children.push(child_copy);
            }
        }
        copy
    }

    fn unsupported(&self, operation: &str) -> DomError {
        DomError::InvalidNodeType {
            operation: operation.to_string(),
            node_name: self.node_name(),
        }
    }

    fn ensure_can_insert(&self, node: &NodeRef) -> DomResult<()> {
        if !matches!(self.node_type(), NodeType::Element | NodeType::DocumentFragment) {
            return Err(DomError::HierarchyRequest {
                reason: format!("{} nodes cannot have children", self.node_name()),
            });
        }
        if node.contains(self) {
            return Err(DomError::HierarchyRequest {
                reason: "the new child is an inclusive ancestor of the parent".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_is_child(&self, child: &NodeRef) -> DomResult<()> {
        if child.parent().as_ref() == Some(self) {
            Ok(())
        } else {
            Err(DomError::NotFound {
                context: format!("{} is not a child of {}", child.node_name(), self.node_name()),
            })
        }
    }

    /// Unlinks this node from its parent without recording a mutation.
    /// Returns the former parent and the siblings around the gap.
    fn detach_silently(&self) -> Option<(NodeRef, Option<NodeRef>, Option<NodeRef>)> {
        let parent = self.parent()?;
        let (previous_sibling, next_sibling) = {
            let mut data = parent.0.borrow_mut();
            let index = data.children.iter().position(|c| c == self)?;
            data.children.remove(index);
            let previous = index.checked_sub(1).map(|i| data.children[i].clone());
            (previous, data.children.get(index).cloned())
        };
        self.0.borrow_mut().parent = Weak::new();
        Some((parent, previous_sibling, next_sibling))
    }

    /// Links `node` under this node before `reference` without recording a
    /// mutation. `node` must already be detached.
    fn insert_silently(&self, node: &NodeRef, reference: Option<&NodeRef>) {
        let document = self.0.borrow().document.clone();
        node.adopt(&document);
        node.0.borrow_mut().parent = Rc::downgrade(&self.0);

        let mut data = self.0.borrow_mut();
        let index = reference
            .and_then(|r| data.children.iter().position(|c| c == r))
            .unwrap_or(data.children.len());
        data.children.insert(index, node.clone());
    }

    fn adopt(&self, document: &Weak<DocumentInner>) {
        let previous = {
            let mut data = self.0.borrow_mut();
            if Weak::ptr_eq(&data.document, document) {
                return;
            }
            std::mem::replace(&mut data.document, document.clone())
        };
        // Observers registered on this node follow it into the new document.
        if let (Some(from), Some(to)) = (previous.upgrade(), document.upgrade()) {
            migrate_registrations(self, &from, &to);
        }
        for child in self.children() {
            child.adopt(document);
        }
    }
}

/// Detaches the nodes that an insertion of `node` will place: the children
/// of a fragment, or the node itself.
fn take_insertion_nodes(node: &NodeRef) -> Vec<NodeRef> {
    if node.node_type() == NodeType::DocumentFragment {
        let children = std::mem::take(&mut node.0.borrow_mut().children);
        for child in &children {
            child.0.borrow_mut().parent = Weak::new();
        }
        if !children.is_empty() {
            queue_mutation(
                node,
                PendingMutation::child_list(Vec::new(), children.clone(), None, None),
            );
        }
        children
    } else {
        node.remove();
        vec![node.clone()]
    }
}

fn collect_text(children: &[NodeRef], out: &mut String) {
    for child in children {
        let data = child.0.borrow();
        match &data.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            NodeKind::Element { .. } | NodeKind::Fragment => collect_text(&data.children, out),
        }
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeRef {}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(_) => f.debug_tuple("NodeRef").field(&self.node_name()).finish(),
            Err(_) => f.write_str("NodeRef(<borrowed>)"),
        }
    }
}

impl Serialize for NodeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.outer_html())
    }
}
