//! Typed output of a successful validation.
//!
//! A [`ResultValue`] mirrors the content tree but carries the matched
//! rule's meaning: scalars are converted to their primitive type, tuples
//! are distinguished from lists, and merge results keep their unioned
//! field set. The value is owned by the caller and holds no reference
//! back into the rule graph.

use serde::Serialize;

/// A scalar converted to its matched primitive type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ScalarValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// The typed tree produced by a successful validation.
///
/// Map-shaped variants keep entries as ordered pairs rather than a keyed
/// map: `_mapOf` admits non-string keys, whose rendered forms need not be
/// unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResultValue {
    Scalar(ScalarValue),
    List(Vec<ResultValue>),
    Tuple(Vec<ResultValue>),
    Map(Vec<(String, ResultValue)>),
    Merged(Vec<(String, ResultValue)>),
}

impl ResultValue {
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Self::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// Elements of a `List` or `Tuple`.
    pub fn items(&self) -> Option<&[ResultValue]> {
        match self {
            Self::List(items) | Self::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a `Map` or `Merged`, in content order.
    pub fn entries(&self) -> Option<&[(String, ResultValue)]> {
        match self {
            Self::Map(entries) | Self::Merged(entries) => Some(entries),
            _ => None,
        }
    }

    /// First entry with the given key in a `Map` or `Merged`.
    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.entries()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_accessors() {
        assert_eq!(ScalarValue::Int(4).as_f64(), Some(4.0));
        assert_eq!(ScalarValue::Str("x".into()).as_str(), Some("x"));
        assert!(ScalarValue::Null.is_null());
        assert_eq!(ScalarValue::Bool(true).as_i64(), None);
    }

    #[test]
    fn map_lookup_by_key() {
        let value = ResultValue::Map(vec![
            ("a".into(), ResultValue::Scalar(ScalarValue::Int(1))),
            ("b".into(), ResultValue::Scalar(ScalarValue::Int(2))),
        ]);
        assert_eq!(
            value.get("b"),
            Some(&ResultValue::Scalar(ScalarValue::Int(2)))
        );
        assert_eq!(value.get("missing"), None);
    }

    #[test]
    fn serializes_scalars_untagged() {
        let json = serde_yaml::to_string(&ScalarValue::Int(3)).unwrap();
        assert_eq!(json.trim(), "3");
    }
}
