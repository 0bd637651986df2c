//! Category-aware value copies.
//!
//! Records and sequences get a shallow copy (nested containers stay shared),
//! document nodes a deep structural copy in the same document, and
//! everything else is returned as is.

use tracing::warn;

use crate::classify::{classify, Category};
use crate::value::{ArrayRef, ObjectRef, Value};

/// Returns an independent copy of `value` suited to its category.
///
/// Never fails: a container that cannot be read right now (it is mutably
/// borrowed) degrades to sharing the original reference.
///
/// # Examples
///
/// ```
/// use kobserve::{clone_value, Value};
///
/// let inner = Value::array([1]);
/// let outer = Value::object([("inner", inner.clone())]);
/// let copy = clone_value(&outer);
///
/// assert!(!copy.same(&outer));
/// assert!(copy.as_object().unwrap().get("inner").unwrap().same(&inner));
/// ```
#[must_use]
pub fn clone_value(value: &Value) -> Value {
    match (classify(value), value) {
        (Category::Array, Value::Array(items)) => match items.try_to_vec() {
            Some(items) => Value::Array(ArrayRef::new(items)),
            None => {
                warn!("sequence is mutably borrowed; sharing the original reference");
                value.clone()
            }
        },
        (Category::Object, Value::Object(entries)) => match entries.try_to_record() {
            Some(entries) => Value::Object(ObjectRef::new(entries)),
            None => {
                warn!("record is mutably borrowed; sharing the original reference");
                value.clone()
            }
        },
        (Category::Html, Value::Node(node)) => match node.owner_document() {
            Some(document) => Value::Node(document.import_node(node, true)),
            None => Value::Node(node.clone_node(true)),
        },
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    #[test]
    fn test_clone_array_is_shallow() {
        let nested = Value::object([("x", 1)]);
        let original = Value::array([Value::Int(1), nested.clone()]);
        let copy = clone_value(&original);

        assert_eq!(copy, original);
        assert!(!copy.same(&original));
        copy.as_array().unwrap().push(3);
        assert_eq!(original.as_array().unwrap().len(), 2);
        assert!(copy.as_array().unwrap().get(1).unwrap().same(&nested));
    }

    #[test]
    fn test_clone_object_is_shallow() {
        let original = Value::object([("a", Value::Int(1))]);
        let copy = clone_value(&original);
        copy.as_object().unwrap().insert("b", 2);
        assert!(!original.as_object().unwrap().contains_key("b"));
    }

    #[test]
    fn test_clone_borrowed_array_shares_reference() {
        let original = Value::array([1, 2]);
        let _guard = original.as_array().unwrap().borrow_mut();
        let copy = clone_value(&original);
        assert!(copy.same(&original));
    }

    #[test]
    fn test_clone_node_is_deep_and_same_document() {
        let doc = Document::new();
        let div = doc.create_element("div").unwrap();
        let span = doc.create_element("span").unwrap();
        div.append_child(&span).unwrap();

        let copy = clone_value(&Value::Node(div.clone()));
        let copy = copy.as_node().unwrap();
        assert_ne!(*copy, div);
        assert_eq!(copy.outer_html(), div.outer_html());
        assert_ne!(copy.first_child().unwrap(), span);
        assert!(copy.owner_document().unwrap().ptr_eq(&doc));

        // The copy can be inserted into the original document.
        div.append_child(copy).unwrap();
        assert_eq!(div.child_count(), 2);
    }

    #[test]
    fn test_clone_primitives_unchanged() {
        assert_eq!(clone_value(&Value::Int(5)), Value::Int(5));
        assert_eq!(clone_value(&Value::from("s")), Value::from("s"));
        assert!(clone_value(&Value::Undefined).is_undefined());
    }

    #[test]
    fn test_clone_text_node_shares_reference() {
        let doc = Document::new();
        let text = Value::Node(doc.create_text_node("t"));
        assert!(clone_value(&text).same(&text));
    }
}
