//! Attribute value types.
//!
//! [`AttrValue`] is the runtime representation of anything the predicate
//! engine compares: an entry field read through `get_attr()`, or the target a
//! search term compares it against.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::model::{EntryKind, Scalar};
use crate::tags::TagSet;

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// An optional field that is not set, or a read that produced no data.
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Uuid(Uuid),
    Time(DateTime<Utc>),
    /// Group id to selected tag ids.
    Tags(TagSet),
    /// An entry variant, used as `entry_type` target.
    Kind(EntryKind),
    /// Container target for `in`, or the `[target, rel_tol, abs_tol]` triple
    /// of the client-level `isclose` operator.
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Short name of the value's shape, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::Str(_) => "string",
            AttrValue::Uuid(_) => "uuid",
            AttrValue::Time(_) => "datetime",
            AttrValue::Tags(_) => "tagset",
            AttrValue::Kind(_) => "entry type",
            AttrValue::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Numeric view for Int and Float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view for `like`: strings as-is, UUIDs stringified.
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Str(s) => Some(s.clone()),
            AttrValue::Uuid(id) => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tags(&self) -> Option<&TagSet> {
        match self {
            AttrValue::Tags(tags) => Some(tags),
            _ => None,
        }
    }
}

impl From<Scalar> for AttrValue {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Str(s) => AttrValue::Str(s),
            Scalar::Int(v) => AttrValue::Int(v),
            Scalar::Float(v) => AttrValue::Float(v),
            Scalar::Enum(v) => AttrValue::Int(i64::from(v)),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Str(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Float(value)
    }
}

impl From<Uuid> for AttrValue {
    fn from(value: Uuid) -> Self {
        AttrValue::Uuid(value)
    }
}

impl From<TagSet> for AttrValue {
    fn from(value: TagSet) -> Self {
        AttrValue::Tags(value)
    }
}

impl From<EntryKind> for AttrValue {
    fn from(value: EntryKind) -> Self {
        AttrValue::Kind(value)
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Null => write!(f, "None"),
            AttrValue::Int(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Uuid(id) => write!(f, "{}", id),
            AttrValue::Time(t) => write!(f, "{}", t.to_rfc3339()),
            AttrValue::Tags(tags) => {
                let groups: Vec<String> = tags
                    .iter()
                    .map(|(group, ids)| {
                        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                        format!("{}:{}", group, ids.join(","))
                    })
                    .collect();
                write!(f, "{{{}}}", groups.join(";"))
            }
            AttrValue::Kind(kind) => write!(f, "{}", kind),
            AttrValue::List(items) => {
                let items: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn scalar_enum_becomes_int() {
        assert_eq!(AttrValue::from(Scalar::Enum(3)), AttrValue::Int(3));
        assert_eq!(AttrValue::from(Scalar::from("x")), AttrValue::Str("x".into()));
    }

    #[test]
    fn text_view_stringifies_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(AttrValue::Uuid(id).as_text(), Some(id.to_string()));
        assert_eq!(AttrValue::Int(5).as_text(), None);
        assert_eq!(AttrValue::Null.as_text(), None);
    }

    #[test]
    fn numeric_view() {
        assert_eq!(AttrValue::Int(2).as_f64(), Some(2.0));
        assert_eq!(AttrValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(AttrValue::Str("2".into()).as_f64(), None);
    }

    #[test]
    fn display_tags_and_lists() {
        let tags = TagSet::from([(0, BTreeSet::from([0, 1])), (2, BTreeSet::from([5]))]);
        assert_eq!(AttrValue::Tags(tags).to_string(), "{0:0,1;2:5}");
        let list = AttrValue::List(vec![AttrValue::Int(1), AttrValue::Str("a".into())]);
        assert_eq!(list.to_string(), "[1, a]");
    }
}
