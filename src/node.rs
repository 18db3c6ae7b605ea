//! Generic document model shared by schema source and content.
//!
//! A [`Node`] is an order-preserving tree of scalars, sequences and
//! mappings produced from YAML text. The YAML parser itself is an external
//! collaborator (`serde_yaml`); this module only adapts its output:
//! - mapping entry order is preserved,
//! - duplicate mapping keys are a [`SyntaxError`] (the parser rejects them),
//! - tags are unwrapped transparently,
//! - scalars keep both their YAML type and their canonical text form.

use crate::error::SyntaxError;

/// The YAML type a scalar resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

/// A leaf value: its resolved kind plus the canonical text form used for
/// equality checks (`_in`), regex matching and diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub text: String,
}

impl Scalar {
    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, ScalarKind::Int | ScalarKind::Float)
    }
}

/// A parsed document tree. Read-only after loading.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    /// Entries in source order. Keys are full nodes: YAML allows complex
    /// keys, and `_mapOf` can match them.
    Mapping(Vec<(Node, Node)>),
}

impl Node {
    /// The node's shape, for "expected a ..." messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Scalar(_) => "scalar",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// A scalar's text when the node is a string-typed scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(scalar) if scalar.kind == ScalarKind::Str => Some(&scalar.text),
            _ => None,
        }
    }

    /// Compact one-line rendering for diagnostics. Scalars render their
    /// text; containers render only their shape and size.
    pub fn repr(&self) -> String {
        match self {
            Node::Scalar(scalar) => match scalar.kind {
                ScalarKind::Str => format!("'{}'", scalar.text),
                _ => scalar.text.clone(),
            },
            Node::Sequence(items) => format!("[sequence of {}]", items.len()),
            Node::Mapping(entries) => format!("{{mapping of {}}}", entries.len()),
        }
    }
}

/// Parse YAML text into a [`Node`] tree.
///
/// Malformed text, unterminated structures and duplicate mapping keys all
/// surface as [`SyntaxError`] with the parser's line/column location.
pub fn load_str(text: &str) -> Result<Node, SyntaxError> {
    // An empty document is the null scalar; serde_yaml reports EOF instead.
    if text.trim().is_empty() {
        return Ok(Node::Scalar(Scalar {
            kind: ScalarKind::Null,
            text: "null".to_string(),
        }));
    }
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(syntax_error)?;
    Ok(from_yaml(value))
}

fn syntax_error(err: serde_yaml::Error) -> SyntaxError {
    let (line, column) = err
        .location()
        .map(|loc| (loc.line(), loc.column()))
        .unwrap_or((0, 0));
    SyntaxError {
        line,
        column,
        message: err.to_string(),
    }
}

fn from_yaml(value: serde_yaml::Value) -> Node {
    match value {
        serde_yaml::Value::Null => Node::Scalar(Scalar {
            kind: ScalarKind::Null,
            text: "null".to_string(),
        }),
        serde_yaml::Value::Bool(b) => Node::Scalar(Scalar {
            kind: ScalarKind::Bool,
            text: b.to_string(),
        }),
        serde_yaml::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Node::Scalar(Scalar {
                    kind: ScalarKind::Int,
                    text: n.to_string(),
                })
            } else {
                Node::Scalar(Scalar {
                    kind: ScalarKind::Float,
                    text: n.to_string(),
                })
            }
        }
        serde_yaml::Value::String(s) => Node::Scalar(Scalar {
            kind: ScalarKind::Str,
            text: s,
        }),
        serde_yaml::Value::Sequence(items) => {
            Node::Sequence(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(mapping) => Node::Mapping(
            mapping
                .into_iter()
                .map(|(k, v)| (from_yaml(k), from_yaml(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_keep_kind_and_text() {
        let cases = [
            ("hello", ScalarKind::Str, "hello"),
            ("42", ScalarKind::Int, "42"),
            ("-7", ScalarKind::Int, "-7"),
            ("2.5", ScalarKind::Float, "2.5"),
            ("true", ScalarKind::Bool, "true"),
            ("null", ScalarKind::Null, "null"),
            ("~", ScalarKind::Null, "null"),
            ("'42'", ScalarKind::Str, "42"),
        ];
        for (source, kind, text) in cases {
            let node = load_str(source).unwrap();
            let scalar = node.as_scalar().unwrap();
            assert_eq!(scalar.kind, kind, "source: {source}");
            assert_eq!(scalar.text, text, "source: {source}");
        }
    }

    #[test]
    fn mapping_order_is_preserved() {
        let node = load_str("z: 1\na: 2\nm: 3\n").unwrap();
        let Node::Mapping(entries) = node else {
            panic!("expected a mapping")
        };
        let keys: Vec<_> = entries
            .iter()
            .map(|(k, _)| k.as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn duplicate_keys_are_a_syntax_error() {
        let err = load_str("a: 1\na: 2\n").unwrap_err();
        assert!(err.message.contains("duplicate"), "got: {}", err.message);
    }

    #[test]
    fn unterminated_structure_is_a_syntax_error() {
        let err = load_str("a: [1, 2").unwrap_err();
        assert!(err.line > 0);
    }

    #[test]
    fn nested_tree_shape() {
        let node = load_str("items:\n  - 1\n  - name: x\n").unwrap();
        let Node::Mapping(entries) = &node else {
            panic!("expected a mapping")
        };
        let Node::Sequence(items) = &entries[0].1 else {
            panic!("expected a sequence")
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_scalar().unwrap().kind, ScalarKind::Int);
        assert!(matches!(items[1], Node::Mapping(_)));
    }

    #[test]
    fn empty_document_is_null() {
        let node = load_str("").unwrap();
        assert_eq!(node.as_scalar().unwrap().kind, ScalarKind::Null);
    }
}
