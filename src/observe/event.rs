//! Change events delivered to subscribers.

use serde::Serialize;

use crate::dom::{MutationRecord, NodeRef};
use crate::value::{Key, Value};

/// Which property operation produced a [`PropertyEvent`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyCall {
    Get,
    Set,
    Delete,
}

impl PropertyCall {
    /// `get`, `set` or `delete`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Set => "set",
            Self::Delete => "delete",
        }
    }
}

/// A read, write or delete on an observed record or sequence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyEvent {
    /// The intercepted operation.
    pub call: PropertyCall,
    /// The storage operated on (a reference, not a snapshot).
    pub obj: Value,
    /// The property or index operated on.
    pub key: Key,
    /// Snapshot of the value before the operation; `Null` for reads.
    pub old_value: Value,
    /// The new or current value; `Undefined` for deletes.
    pub value: Value,
}

/// A structural or attribute change on an observed document node.
///
/// The serializations are taken when the event is built, after the whole
/// batch it belongs to has been applied.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "call", rename = "mutation", rename_all = "camelCase")]
pub struct MutationEvent {
    /// The raw record.
    pub mutation: MutationRecord,
    /// Lowercased record kind (`attributes`, `childlist`, `characterdata`).
    #[serde(rename = "type")]
    pub kind: String,
    /// The node that changed.
    pub target: NodeRef,
    /// Changed attribute, for `attributes` events.
    pub attribute_name: Option<String>,
    /// Previous attribute value, when recorded.
    pub old_attribute: Option<String>,
    /// Current value of `attribute_name` on the target.
    pub attribute: Option<String>,
    /// Nodes removed from the target, in order.
    pub removed_nodes: Vec<NodeRef>,
    /// Nodes added to the target, in order.
    pub added_nodes: Vec<NodeRef>,
    /// Markup of the target's children.
    #[serde(rename = "innerHTML")]
    pub inner_html: String,
    /// Markup of the target.
    #[serde(rename = "outerHTML")]
    pub outer_html: String,
    /// Rendered text of the target.
    pub inner_text: String,
    /// The root passed to `observe`, even when a copy is being watched.
    #[serde(skip)]
    pub receiver: NodeRef,
}

impl MutationEvent {
    pub(crate) fn from_record(record: &MutationRecord, receiver: &NodeRef) -> Self {
        let target = record.target.clone();
        let attribute = record
            .attribute_name
            .as_deref()
            .and_then(|name| target.get_attribute(name));
        Self {
            mutation: record.clone(),
            kind: record.kind.as_str().to_ascii_lowercase(),
            attribute_name: record.attribute_name.clone(),
            old_attribute: record.old_value.clone(),
            attribute,
            removed_nodes: record.removed_nodes.clone(),
            added_nodes: record.added_nodes.clone(),
            inner_html: target.inner_html(),
            outer_html: target.outer_html(),
            inner_text: target.inner_text(),
            target,
            receiver: receiver.clone(),
        }
    }
}

/// One observed operation.
#[allow(missing_docs)]
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ChangeEvent {
    Property(PropertyEvent),
    Mutation(MutationEvent),
}

impl ChangeEvent {
    /// `get`, `set`, `delete` or `mutation`.
    #[must_use]
    pub const fn call(&self) -> &'static str {
        match self {
            Self::Property(event) => event.call.as_str(),
            Self::Mutation(_) => "mutation",
        }
    }

    /// The property event, if this is one.
    #[must_use]
    pub const fn as_property(&self) -> Option<&PropertyEvent> {
        match self {
            Self::Property(event) => Some(event),
            Self::Mutation(_) => None,
        }
    }

    /// The mutation event, if this is one.
    #[must_use]
    pub const fn as_mutation(&self) -> Option<&MutationEvent> {
        match self {
            Self::Mutation(event) => Some(event),
            Self::Property(_) => None,
        }
    }

    /// Converts the event to JSON for logging or transport.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
