//! Coarse value classification.
//!
//! The category selects both the cloning strategy and the observation
//! strategy for a value.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::value::Value;

/// Coarse category of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Ordered, indexable, resizable sequence.
    Array,
    /// Generic keyed record.
    Object,
    /// Any document-node-like value.
    Html,
    /// Every other category, carrying its native name (`number`, `string`, ...).
    Other(&'static str),
}

fn html_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^html").expect("valid html category regex"))
}

impl Category {
    /// Classifies a concrete category name.
    ///
    /// Names starting with `html` in any case (`HTMLAnchorElement`,
    /// `HTMLDivElement`, ...) and document fragments are `Html`.
    #[must_use]
    pub fn from_type_name(name: &'static str) -> Self {
        if html_re().is_match(name) || name.eq_ignore_ascii_case("documentfragment") {
            return Self::Html;
        }
        match name {
            "array" => Self::Array,
            "object" => Self::Object,
            other => Self::Other(other),
        }
    }

    /// Lowercase category name, or the residual name unchanged.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Object => "object",
            Self::Html => "html",
            Self::Other(name) => name,
        }
    }

    /// Returns true for categories whose properties are intercepted.
    #[must_use]
    pub const fn is_container(self) -> bool {
        matches!(self, Self::Array | Self::Object)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns the category of `value`. Never fails.
///
/// # Examples
///
/// ```
/// use kobserve::{classify, Category, Value};
///
/// assert_eq!(classify(&Value::array([1, 2])), Category::Array);
/// assert_eq!(classify(&Value::from(3)), Category::Other("number"));
/// ```
#[must_use]
pub fn classify(value: &Value) -> Category {
    Category::from_type_name(value.type_name())
}
