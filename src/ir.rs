//! Strongly-typed rule IR. No `serde_yaml::Value` past the compiler.
//!
//! The rule vocabulary is a closed enum: adding a combinator means adding
//! a variant, which forces the compiler checks, the matcher and the
//! diagnostics to handle it explicitly. Cyclic schemas are expressed as
//! name references into the [`RuleGraph`] arena, never as owned pointers.

use indexmap::IndexMap;
use regex::Regex;

/// Predefined scalar rules, resolvable from any expression without being
/// declared. A user rule of the same name shadows the predefined one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Str,
    Int,
    Float,
    Boolean,
    Null,
    Timestamp,
    Binary,
    Any,
}

impl ScalarType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::Str),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "boolean" => Some(Self::Boolean),
            "nullType" => Some(Self::Null),
            "timestamp" => Some(Self::Timestamp),
            "binary" => Some(Self::Binary),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "int",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Null => "nullType",
            Self::Timestamp => "timestamp",
            Self::Binary => "binary",
            Self::Any => "any",
        }
    }
}

/// A regex constraint, compiled once at schema-compile time.
///
/// Matching is always full-match: the source pattern is anchored as
/// `^(?:pattern)$` so `_regex: ab` does not accept `"xaby"`.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn compile(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{source})$"))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_full_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Whether a `_range` constrains integers or floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Int,
    Float,
}

/// Numeric bounds parsed from `_range: "1 <= int <= 3"` syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBounds {
    pub kind: NumberKind,
    pub min: Option<f64>,
    pub min_inclusive: bool,
    pub max: Option<f64>,
    pub max_inclusive: bool,
}

impl RangeBounds {
    /// Source-syntax rendering, used in out-of-bounds diagnostics.
    pub fn describe(&self) -> String {
        let kind = match self.kind {
            NumberKind::Int => "int",
            NumberKind::Float => "float",
        };
        let mut out = String::new();
        if let Some(min) = self.min {
            let op = if self.min_inclusive { "<=" } else { "<" };
            out.push_str(&format!("{min} {op} "));
        }
        out.push_str(kind);
        if let Some(max) = self.max {
            let op = if self.max_inclusive { "<=" } else { "<" };
            out.push_str(&format!(" {op} {max}"));
        }
        out
    }

    pub fn contains(&self, value: f64) -> bool {
        let above_min = match self.min {
            Some(min) if self.min_inclusive => min <= value,
            Some(min) => min < value,
            None => true,
        };
        let below_max = match self.max {
            Some(max) if self.max_inclusive => value <= max,
            Some(max) => value < max,
            None => true,
        };
        above_min && below_max
    }
}

/// A rule position: either a reference to a named rule or an inline body.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ref(String),
    Inline(Box<RuleBody>),
}

impl Expr {
    pub fn describe(&self) -> String {
        match self {
            Expr::Ref(name) => name.clone(),
            Expr::Inline(body) => body.describe(),
        }
    }
}

/// One declared field of a `Map` rule.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub expr: Expr,
    pub required: bool,
}

/// Declared fields of a `Map` rule, in declaration order.
pub type MapSpec = IndexMap<String, FieldSpec>;

/// The closed vocabulary of rule kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleBody {
    /// Scalar convertible to a predefined primitive.
    Scalar(ScalarType),
    /// Scalar equal to one of the listed literals (`_in`).
    Enum(Vec<String>),
    /// Numeric scalar inside bounds (`_range`).
    Range(RangeBounds),
    /// String scalar fully matching a pattern (`_regex`).
    Regexp(Pattern),
    /// Sequence whose every element matches one rule (`_listOf`).
    ListOf(Expr),
    /// Sequence with fixed arity, position i matching rule i (`_list`).
    Tuple(Vec<Expr>),
    /// Mapping with declared fields (`_map` / `_mapFacultative`).
    Map(MapSpec),
    /// Mapping whose keys and values each match a rule (`_mapOf`).
    MapOf { key: Expr, value: Expr },
    /// Union of several map-shaped rules (`_merge`).
    Merge(Vec<Expr>),
    /// `_listOf` with `_min` / `_max` / `_nb` length bounds.
    CountBound {
        element: Expr,
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Ordered alternation, first match wins (`_oneOf`).
    OneOf(Vec<Expr>),
    /// Schema root: transparent alias to the entry rule.
    Document(String),
    /// Schema root compiled from a bare, unnamed expression.
    Expression(Expr),
    /// Schema root matching the whole content scalar against a pattern.
    RegexSchema(Pattern),
}

impl RuleBody {
    /// Compact schema-syntax rendering for diagnostics, e.g. merge
    /// conflict messages quoting both sides.
    pub fn describe(&self) -> String {
        match self {
            RuleBody::Scalar(scalar_type) => scalar_type.name().to_string(),
            RuleBody::Enum(literals) => format!("_in [{}]", literals.join(", ")),
            RuleBody::Range(bounds) => format!("_range {}", bounds.describe()),
            RuleBody::Regexp(pattern) => format!("_regex /{}/", pattern.source()),
            RuleBody::ListOf(element) => format!("_listOf {}", element.describe()),
            RuleBody::Tuple(elements) => {
                let inner: Vec<String> = elements.iter().map(Expr::describe).collect();
                format!("_list [{}]", inner.join(", "))
            }
            RuleBody::Map(fields) => {
                let inner: Vec<&str> = fields.keys().map(String::as_str).collect();
                format!("_map {{{}}}", inner.join(", "))
            }
            RuleBody::MapOf { key, value } => {
                format!("_mapOf {{{}: {}}}", key.describe(), value.describe())
            }
            RuleBody::Merge(members) => {
                let inner: Vec<String> = members.iter().map(Expr::describe).collect();
                format!("_merge [{}]", inner.join(", "))
            }
            RuleBody::CountBound { element, min, max } => {
                let mut out = format!("_listOf {}", element.describe());
                if let Some(min) = min {
                    out.push_str(&format!(" _min {min}"));
                }
                if let Some(max) = max {
                    out.push_str(&format!(" _max {max}"));
                }
                out
            }
            RuleBody::OneOf(alternatives) => {
                let inner: Vec<String> = alternatives.iter().map(Expr::describe).collect();
                format!("_oneOf [{}]", inner.join(", "))
            }
            RuleBody::Document(entry) => entry.clone(),
            RuleBody::Expression(expr) => expr.describe(),
            RuleBody::RegexSchema(pattern) => format!("_regex /{}/", pattern.source()),
        }
    }
}

/// A named, reusable validation definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub body: RuleBody,
}

/// The immutable, name-resolved collection of all rules from one compiled
/// schema. Safe to share across concurrent validations.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleGraph {
    rules: IndexMap<String, Rule>,
}

impl RuleGraph {
    pub(crate) fn from_rules(rules: IndexMap<String, Rule>) -> Self {
        Self { rules }
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_match_is_anchored() {
        let pattern = Pattern::compile("ab?").unwrap();
        assert!(pattern.is_full_match("a"));
        assert!(pattern.is_full_match("ab"));
        assert!(!pattern.is_full_match("xaby"));
        assert!(!pattern.is_full_match("abb"));
    }

    #[test]
    fn pattern_anchoring_groups_alternations() {
        let pattern = Pattern::compile("yes|no").unwrap();
        assert!(pattern.is_full_match("yes"));
        assert!(pattern.is_full_match("no"));
        assert!(!pattern.is_full_match("yesno"));
    }

    #[test]
    fn range_bounds_contains() {
        let bounds = RangeBounds {
            kind: NumberKind::Int,
            min: Some(1.0),
            min_inclusive: true,
            max: Some(3.0),
            max_inclusive: true,
        };
        assert!(!bounds.contains(0.0));
        assert!(bounds.contains(1.0));
        assert!(bounds.contains(3.0));
        assert!(!bounds.contains(4.0));

        let open = RangeBounds {
            kind: NumberKind::Float,
            min: Some(0.0),
            min_inclusive: false,
            max: None,
            max_inclusive: false,
        };
        assert!(!open.contains(0.0));
        assert!(open.contains(0.1));
    }

    #[test]
    fn range_describe_round_trips_syntax() {
        let bounds = RangeBounds {
            kind: NumberKind::Int,
            min: Some(1.0),
            min_inclusive: true,
            max: Some(3.0),
            max_inclusive: false,
        };
        assert_eq!(bounds.describe(), "1 <= int < 3");
    }

    #[test]
    fn structural_equality_ignores_pattern_internals() {
        let a = RuleBody::Regexp(Pattern::compile("a+").unwrap());
        let b = RuleBody::Regexp(Pattern::compile("a+").unwrap());
        let c = RuleBody::Regexp(Pattern::compile("b+").unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn describe_is_compact_schema_syntax() {
        let body = RuleBody::OneOf(vec![
            Expr::Ref("user".to_string()),
            Expr::Inline(Box::new(RuleBody::Scalar(ScalarType::Int))),
        ]);
        assert_eq!(body.describe(), "_oneOf [user, int]");
    }
}
