//! Dynamic values that can be observed.
//!
//! Records and sequences are shared handles: cloning a [`Value`] copies the
//! reference, not the contents, so two values can alias the same storage.
//! Use [`crate::clone_value`] for an independent (shallow) copy.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::dom::NodeRef;

/// Key-ordered record storage.
pub type Record = BTreeMap<String, Value>;

/// Shared handle to an ordered, resizable sequence.
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    /// Wraps the given items in a new sequence.
    #[must_use]
    pub fn new(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    /// Borrows the items.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    /// Mutably borrows the items.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.0.borrow_mut()
    }

    /// Copies the item handles out, or `None` if the sequence is mutably borrowed.
    #[must_use]
    pub fn try_to_vec(&self) -> Option<Vec<Value>> {
        self.0.try_borrow().ok().map(|items| items.clone())
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true if the sequence has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Returns the item at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Appends a value.
    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    /// Returns true if both handles point at the same sequence.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ArrayRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => f.write_str("[<borrowed>]"),
        }
    }
}

/// Shared handle to a keyed record.
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<Record>>);

impl ObjectRef {
    /// Wraps the given entries in a new record.
    #[must_use]
    pub fn new(entries: Record) -> Self {
        Self(Rc::new(RefCell::new(entries)))
    }

    /// Borrows the entries.
    ///
    /// # Panics
    ///
    /// Panics if the record is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, Record> {
        self.0.borrow()
    }

    /// Mutably borrows the entries.
    ///
    /// # Panics
    ///
    /// Panics if the record is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Record> {
        self.0.borrow_mut()
    }

    /// Copies the entries out, or `None` if the record is mutably borrowed.
    #[must_use]
    pub fn try_to_record(&self) -> Option<Record> {
        self.0.try_borrow().ok().map(|entries| entries.clone())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true if the record has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Copy of the handle stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    /// Returns true if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Returns true if both handles point at the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0.borrow() == *other.0.borrow()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
            Err(_) => f.write_str("{<borrowed>}"),
        }
    }
}

/// A dynamically typed value.
///
/// # Examples
///
/// ```
/// use kobserve::Value;
///
/// let record = Value::object([("a", Value::from(1))]);
/// let alias = record.clone();
///
/// record.as_object().unwrap().insert("b", 2);
/// assert!(alias.same(&record));
/// assert_eq!(alias.as_object().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integral number.
    Int(i64),
    /// Fractional number.
    Float(f64),
    /// Text.
    String(String),
    /// Point in time.
    Date(DateTime<Utc>),
    /// Shared sequence.
    Array(ArrayRef),
    /// Shared record.
    Object(ObjectRef),
    /// Document node.
    Node(NodeRef),
}

impl Value {
    /// Creates a new sequence value.
    pub fn array<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Array(ArrayRef::new(items.into_iter().map(Into::into).collect()))
    }

    /// Creates a new record value.
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Object(ObjectRef::new(
            entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }

    /// Returns true for `Undefined`.
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns true for `Null`.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for sequences.
    pub const fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Returns true for records.
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Returns true for document nodes.
    pub const fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// The boolean, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The number as a float, for either numeric variant.
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// The sequence handle, if this is one.
    pub const fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// The record handle, if this is one.
    pub const fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(v) => Some(v),
            _ => None,
        }
    }

    /// The node handle, if this is one.
    pub const fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Self::Node(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the concrete category name of this value.
    ///
    /// Element nodes report their interface name (`HTMLDivElement`, ...).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Date(_) => "date",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Node(node) => node.interface_name(),
        }
    }

    /// Identity comparison: containers and nodes compare by reference,
    /// primitives by value.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Node(a), Self::Node(b)) => a == b,
            (a, b) => a == b,
        }
    }

    /// Converts this value to a JSON value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl PartialEq for Value {
    #[allow(clippy::cast_precision_loss)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => (*a as f64) == *b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Node(a), Self::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::String(v) => serializer.serialize_str(v),
            Self::Date(v) => v.serialize(serializer),
            Self::Array(items) => {
                let items = items.borrow();
                serializer.collect_seq(items.iter())
            }
            Self::Object(entries) => {
                let entries = entries.borrow();
                serializer.collect_map(entries.iter())
            }
            Self::Node(node) => node.serialize(serializer),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Date(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Node(node) => write!(f, "{}", node.outer_html()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Array(ArrayRef::new(v))
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Self::Object(ObjectRef::new(v))
    }
}

impl From<ArrayRef> for Value {
    fn from(v: ArrayRef) -> Self {
        Self::Array(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

impl From<NodeRef> for Value {
    fn from(v: NodeRef) -> Self {
        Self::Node(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::array(items.into_iter().map(Self::from)),
            serde_json::Value::Object(entries) => {
                Self::object(entries.into_iter().map(|(k, v)| (k, Self::from(v))))
            }
        }
    }
}

/// A property address: a sequence index or a record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Key {
    /// Sequence index.
    Index(usize),
    /// Property name.
    Name(String),
}

impl Key {
    /// Largest sequence index. Larger numbers address named properties.
    pub const MAX_INDEX: usize = 4_294_967_294;

    /// Largest sequence length.
    pub const MAX_LENGTH: usize = Self::MAX_INDEX + 1;

    /// Returns the index this key addresses, parsing canonical decimal names.
    /// Numbers above [`Key::MAX_INDEX`] are not indices.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        let index = match self {
            Self::Index(i) => Some(*i),
            Self::Name(name) => {
                let canonical = !name.is_empty()
                    && name.bytes().all(|b| b.is_ascii_digit())
                    && (name == "0" || !name.starts_with('0'));
                if canonical {
                    name.parse().ok()
                } else {
                    None
                }
            }
        };
        index.filter(|&i| i <= Self::MAX_INDEX)
    }

    /// Returns the record key this key addresses.
    #[must_use]
    pub fn to_name(&self) -> String {
        match self {
            Self::Index(i) => i.to_string(),
            Self::Name(name) => name.clone(),
        }
    }

    /// Returns true if this is the named key `name`.
    #[must_use]
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self, Self::Name(n) if n == name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<usize> for Key {
    fn from(v: usize) -> Self {
        Self::Index(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Self::Name(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Self::Name(v)
    }
}
