//! Validating matcher: walks a content tree against a compiled rule graph.
//!
//! Dispatch is exhaustive over the closed rule vocabulary. Failures are
//! values carrying the accumulated path; aggregation happens exactly where
//! a complete diagnosis helps the author (map key sets, mapOf entries,
//! merge collisions, oneOf alternatives) and everything else fails fast.
//! A depth counter bounds recursion: schemas that slip past the static
//! productivity check (or pathological content) end in
//! `RecursionLimitExceeded` instead of a blown stack.

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::compile::merge;
use crate::error::{Path, PathSegment, ValidationError};
use crate::ir::{Expr, MapSpec, NumberKind, Pattern, RangeBounds, RuleBody, RuleGraph, ScalarType};
use crate::node::{Node, Scalar, ScalarKind};
use crate::result::{ResultValue, ScalarValue};

/// Loose shape check for base64 text, whitespace tolerated.
static BASE64_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+/\s]*={0,2}\s*$").unwrap()
});

/// Matcher configuration.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Maximum rule-application depth before giving up with
    /// [`ValidationError::RecursionLimitExceeded`].
    pub max_depth: usize,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self { max_depth: 400 }
    }
}

impl RuleGraph {
    /// Match `content` against the rule named `entry`.
    ///
    /// Asking for an entry rule the graph does not define is a caller
    /// error ([`ValidationError::UnknownEntryRule`]), deliberately
    /// distinct from a schema-compile failure.
    pub fn validate(
        &self,
        entry: &str,
        content: &Node,
        options: &MatchOptions,
    ) -> Result<ResultValue, ValidationError> {
        if self.get(entry).is_none() {
            return Err(ValidationError::UnknownEntryRule {
                name: entry.to_string(),
            });
        }
        tracing::debug!(entry, "validating content");
        let mut matcher = Matcher::new(self, options);
        matcher.apply_rule(entry, content)
    }

    /// Match `content` against a detached root body (the `Document` /
    /// `Expression` / `RegexSchema` wrappers held by a parser handle).
    pub(crate) fn validate_body(
        &self,
        body: &RuleBody,
        content: &Node,
        options: &MatchOptions,
    ) -> Result<ResultValue, ValidationError> {
        let mut matcher = Matcher::new(self, options);
        matcher.apply_body(body, content)
    }
}

type MatchResult = Result<ResultValue, ValidationError>;

struct Matcher<'a> {
    graph: &'a RuleGraph,
    path: Path,
    depth: usize,
    max_depth: usize,
}

impl<'a> Matcher<'a> {
    fn new(graph: &'a RuleGraph, options: &MatchOptions) -> Self {
        Self {
            graph,
            path: Path::root(),
            depth: 0,
            max_depth: options.max_depth,
        }
    }

    fn fail(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::new(self.path.clone(), message)
    }

    fn apply_expr(&mut self, expr: &Expr, content: &Node) -> MatchResult {
        match expr {
            Expr::Ref(name) => self.apply_rule(name, content),
            Expr::Inline(body) => self.apply_body(body, content),
        }
    }

    fn apply_rule(&mut self, name: &str, content: &Node) -> MatchResult {
        let Some(rule) = self.graph.get(name) else {
            // The compiler resolves every reference; this can only trip on
            // a hand-assembled graph.
            return Err(self.fail(format!("rule '{name}' not found in the schema")));
        };
        tracing::trace!(rule = name, "applying rule");
        self.path.push(PathSegment::Rule(name.to_string()));
        let result = self.apply_body(&rule.body, content);
        self.path.pop();
        result
    }

    fn apply_body(&mut self, body: &RuleBody, content: &Node) -> MatchResult {
        if self.depth >= self.max_depth {
            return Err(ValidationError::RecursionLimitExceeded {
                path: self.path.clone(),
            });
        }
        self.depth += 1;
        let result = self.dispatch(body, content);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, body: &RuleBody, content: &Node) -> MatchResult {
        match body {
            RuleBody::Scalar(scalar_type) => self.match_scalar_type(*scalar_type, content),
            RuleBody::Enum(literals) => self.match_enum(literals, content),
            RuleBody::Range(bounds) => self.match_range(bounds, content),
            RuleBody::Regexp(pattern) | RuleBody::RegexSchema(pattern) => {
                self.match_regexp(pattern, content)
            }
            RuleBody::ListOf(element) => self.match_sequence(element, content, None, None),
            RuleBody::CountBound { element, min, max } => {
                self.match_sequence(element, content, *min, *max)
            }
            RuleBody::Tuple(elements) => self.match_tuple(elements, content),
            RuleBody::Map(fields) => self.match_map(fields, content),
            RuleBody::MapOf { key, value } => self.match_map_of(key, value, content),
            RuleBody::Merge(members) => self.match_merge(members, content),
            RuleBody::OneOf(alternatives) => self.match_one_of(alternatives, content),
            RuleBody::Document(entry) => self.apply_rule(entry, content),
            RuleBody::Expression(expr) => self.apply_expr(expr, content),
        }
    }

    // ------------------------------ scalars ------------------------------ //

    fn match_scalar_type(&mut self, scalar_type: ScalarType, content: &Node) -> MatchResult {
        if scalar_type == ScalarType::Any {
            return Ok(any_value(content));
        }
        let mismatch = || {
            self.fail(format!(
                "expected {}, got {}",
                expectation(scalar_type),
                content.repr()
            ))
        };
        let Node::Scalar(scalar) = content else {
            return Err(mismatch());
        };
        match scalar_type {
            ScalarType::Str if scalar.kind == ScalarKind::Str => {
                Ok(ResultValue::Scalar(ScalarValue::Str(scalar.text.clone())))
            }
            ScalarType::Int if scalar.kind == ScalarKind::Int => scalar
                .text
                .parse::<i64>()
                .map(|value| ResultValue::Scalar(ScalarValue::Int(value)))
                .map_err(|_| mismatch()),
            ScalarType::Float if scalar.is_numeric() => scalar
                .text
                .parse::<f64>()
                .map(|value| ResultValue::Scalar(ScalarValue::Float(value)))
                .map_err(|_| mismatch()),
            ScalarType::Boolean if scalar.kind == ScalarKind::Bool => Ok(ResultValue::Scalar(
                ScalarValue::Bool(scalar.text == "true"),
            )),
            ScalarType::Null if scalar.kind == ScalarKind::Null => {
                Ok(ResultValue::Scalar(ScalarValue::Null))
            }
            ScalarType::Timestamp if scalar.kind == ScalarKind::Str => {
                match DateTime::parse_from_rfc3339(&scalar.text) {
                    Ok(_) => Ok(ResultValue::Scalar(ScalarValue::Str(scalar.text.clone()))),
                    Err(_) => Err(mismatch()),
                }
            }
            ScalarType::Binary if scalar.kind == ScalarKind::Str => {
                if BASE64_RE.is_match(&scalar.text) {
                    Ok(ResultValue::Scalar(ScalarValue::Str(scalar.text.clone())))
                } else {
                    Err(mismatch())
                }
            }
            _ => Err(mismatch()),
        }
    }

    fn match_enum(&mut self, literals: &[String], content: &Node) -> MatchResult {
        let Node::Scalar(scalar) = content else {
            return Err(self.fail(format!("expected a scalar, got {}", content.repr())));
        };
        if literals.iter().any(|literal| *literal == scalar.text) {
            Ok(ResultValue::Scalar(scalar_value(scalar)))
        } else {
            Err(self.fail(format!(
                "value {} is not one of [{}]",
                content.repr(),
                literals.join(", ")
            )))
        }
    }

    fn match_range(&mut self, bounds: &RangeBounds, content: &Node) -> MatchResult {
        let noun = match bounds.kind {
            NumberKind::Int => "an integer",
            NumberKind::Float => "a number",
        };
        let mismatch = || self.fail(format!("expected {noun}, got {}", content.repr()));
        let Node::Scalar(scalar) = content else {
            return Err(mismatch());
        };
        let value = match bounds.kind {
            NumberKind::Int if scalar.kind == ScalarKind::Int => {
                match scalar.text.parse::<i64>() {
                    Ok(value) => value as f64,
                    Err(_) => return Err(mismatch()),
                }
            }
            NumberKind::Float if scalar.is_numeric() => match scalar.text.parse::<f64>() {
                Ok(value) => value,
                Err(_) => return Err(mismatch()),
            },
            _ => return Err(mismatch()),
        };
        if !bounds.contains(value) {
            return Err(self.fail(format!(
                "value {} is outside the range {}",
                scalar.text,
                bounds.describe()
            )));
        }
        match bounds.kind {
            NumberKind::Int => Ok(ResultValue::Scalar(ScalarValue::Int(value as i64))),
            NumberKind::Float => Ok(ResultValue::Scalar(ScalarValue::Float(value))),
        }
    }

    fn match_regexp(&mut self, pattern: &Pattern, content: &Node) -> MatchResult {
        let Some(text) = content.as_str() else {
            return Err(self.fail(format!("expected a string, got {}", content.repr())));
        };
        if pattern.is_full_match(text) {
            Ok(ResultValue::Scalar(ScalarValue::Str(text.to_string())))
        } else {
            Err(self.fail(format!(
                "{} does not match /{}/",
                content.repr(),
                pattern.source()
            )))
        }
    }

    // ----------------------------- sequences ----------------------------- //

    /// `_listOf`, with optional inclusive length bounds for `_min` /
    /// `_max` / `_nb`. A length violation is reported before any element
    /// is matched; element failures are fail-fast.
    fn match_sequence(
        &mut self,
        element: &Expr,
        content: &Node,
        min: Option<usize>,
        max: Option<usize>,
    ) -> MatchResult {
        let Node::Sequence(items) = content else {
            return Err(self.fail(format!("expected a sequence, got {}", content.repr())));
        };
        if let Some(min) = min {
            if items.len() < min {
                return Err(self.fail(format!(
                    "expected at least {min} entries, found {}",
                    items.len()
                )));
            }
        }
        if let Some(max) = max {
            if items.len() > max {
                return Err(self.fail(format!(
                    "expected at most {max} entries, found {}",
                    items.len()
                )));
            }
        }
        let mut out = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            self.path.push(PathSegment::Index(index));
            let result = self.apply_expr(element, item);
            self.path.pop();
            out.push(result?);
        }
        Ok(ResultValue::List(out))
    }

    /// `_list`: exact arity, checked before any element.
    fn match_tuple(&mut self, elements: &[Expr], content: &Node) -> MatchResult {
        let Node::Sequence(items) = content else {
            return Err(self.fail(format!("expected a sequence, got {}", content.repr())));
        };
        if items.len() != elements.len() {
            return Err(self.fail(format!(
                "expected {} entries, found {}",
                elements.len(),
                items.len()
            )));
        }
        let mut out = Vec::with_capacity(items.len());
        for (index, (element, item)) in elements.iter().zip(items).enumerate() {
            self.path.push(PathSegment::Index(index));
            let result = self.apply_expr(element, item);
            self.path.pop();
            out.push(result?);
        }
        Ok(ResultValue::Tuple(out))
    }

    // ------------------------------ mappings ------------------------------ //

    /// `_map`: the whole key set is diagnosed first (missing required keys
    /// and undeclared keys collected together); values are only matched,
    /// fail-fast, once the key set is sound.
    fn match_map(&mut self, fields: &MapSpec, content: &Node) -> MatchResult {
        let Node::Mapping(entries) = content else {
            return Err(self.fail(format!("expected a mapping, got {}", content.repr())));
        };

        let mut defects = Vec::new();
        for (name, spec) in fields {
            if spec.required && !has_key(entries, name) {
                defects.push(self.fail(format!("missing key '{name}' in mapping")));
            }
        }
        for (key, _) in entries {
            match key.as_scalar() {
                Some(scalar) if fields.contains_key(&scalar.text) => {}
                Some(scalar) => defects.push(ValidationError::new(
                    self.path.child(PathSegment::Key(scalar.text.clone())),
                    format!("unknown key '{}'", scalar.text),
                )),
                None => defects.push(self.fail(format!(
                    "expected a scalar key in mapping, got {}",
                    key.repr()
                ))),
            }
        }
        if !defects.is_empty() {
            return Err(self.key_set_error(defects));
        }

        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let Some(scalar) = key.as_scalar() else { continue };
            let Some(spec) = fields.get(&scalar.text) else {
                continue;
            };
            self.path.push(PathSegment::Key(scalar.text.clone()));
            let result = self.apply_expr(&spec.expr, value);
            self.path.pop();
            out.push((scalar.text.clone(), result?));
        }
        Ok(ResultValue::Map(out))
    }

    /// `_mapOf`: every entry's key and value are checked; failures
    /// aggregate per offending entry.
    fn match_map_of(&mut self, key_rule: &Expr, value_rule: &Expr, content: &Node) -> MatchResult {
        let Node::Mapping(entries) = content else {
            return Err(self.fail(format!("expected a mapping, got {}", content.repr())));
        };
        let mut out = Vec::with_capacity(entries.len());
        let mut defects = Vec::new();
        for (key, value) in entries {
            let label = key_string(key);
            self.path.push(PathSegment::Key(label.clone()));
            let entry = match self.apply_expr(key_rule, key) {
                Err(err) => Err(ValidationError::with_causes(
                    self.path.clone(),
                    format!("key {} does not match the key rule", key.repr()),
                    vec![err],
                )),
                Ok(_) => self.apply_expr(value_rule, value),
            };
            self.path.pop();
            match entry {
                Ok(result) => out.push((label, result)),
                Err(err) => defects.push(err),
            }
        }
        if defects.is_empty() {
            Ok(ResultValue::Map(out))
        } else {
            let message = if defects.len() == 1 {
                "1 invalid entry in mapping".to_string()
            } else {
                format!("{} invalid entries in mapping", defects.len())
            };
            Err(ValidationError::with_causes(
                self.path.clone(),
                message,
                defects,
            ))
        }
    }

    /// `_merge`: declared fields from map members take their declared
    /// rules; remaining keys fall through to the `_mapOf` members in
    /// declaration order. A key accepted by several `_mapOf` members with
    /// differing results is a runtime collision.
    fn match_merge(&mut self, members: &[Expr], content: &Node) -> MatchResult {
        let graph = self.graph;
        let lookup = move |name: &str| graph.get(name).map(|rule| &rule.body);
        let (flat, merge_defects) = merge::flatten(members, &lookup);
        if let Some(defect) = merge_defects.first() {
            // Statically impossible after compile; guards hand-built graphs.
            return Err(self.fail(format!("invalid merge: {}", defect.message())));
        }

        let Node::Mapping(entries) = content else {
            return Err(self.fail(format!("expected a mapping, got {}", content.repr())));
        };

        let mut defects = Vec::new();
        for (name, spec) in &flat.fields {
            if spec.required && !has_key(entries, name) {
                defects.push(self.fail(format!("missing key '{name}' in mapping")));
            }
        }
        for (key, _) in entries {
            if let Some(scalar) = key.as_scalar() {
                if flat.fields.contains_key(&scalar.text) {
                    continue;
                }
            }
            if flat.map_ofs.is_empty() {
                let label = key_string(key);
                defects.push(ValidationError::new(
                    self.path.child(PathSegment::Key(label.clone())),
                    format!("unknown key '{label}'"),
                ));
            } else if !flat
                .map_ofs
                .iter()
                .any(|(key_rule, _)| self.silently_matches(key_rule, key))
            {
                let label = key_string(key);
                defects.push(ValidationError::new(
                    self.path.child(PathSegment::Key(label.clone())),
                    format!("key '{label}' is not declared and matches no merge member"),
                ));
            }
        }
        if !defects.is_empty() {
            return Err(self.key_set_error(defects));
        }

        let mut out = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let declared = key
                .as_scalar()
                .and_then(|scalar| flat.fields.get(&scalar.text).map(|spec| (scalar, spec)));
            if let Some((scalar, spec)) = declared {
                self.path.push(PathSegment::Key(scalar.text.clone()));
                let result = self.apply_expr(&spec.expr, value);
                self.path.pop();
                out.push((scalar.text.clone(), result?));
                continue;
            }

            let label = key_string(key);
            self.path.push(PathSegment::Key(label.clone()));
            let absorbed = self.absorb_entry(&flat.map_ofs, key, value, &label);
            self.path.pop();
            out.push((label, absorbed?));
        }
        Ok(ResultValue::Merged(out))
    }

    /// Match one undeclared merged-mapping entry against the `_mapOf`
    /// members whose key rule accepts it.
    fn absorb_entry(
        &mut self,
        map_ofs: &[(Expr, Expr)],
        key: &Node,
        value: &Node,
        label: &str,
    ) -> MatchResult {
        let mut successes: Vec<ResultValue> = Vec::new();
        let mut failures = Vec::new();
        for (key_rule, value_rule) in map_ofs {
            if !self.silently_matches(key_rule, key) {
                continue;
            }
            match self.apply_expr(value_rule, value) {
                Ok(result) => successes.push(result),
                Err(err) => failures.push(err),
            }
        }
        if successes.is_empty() {
            return Err(ValidationError::with_causes(
                self.path.clone(),
                format!("key '{label}' does not satisfy any merge member"),
                failures,
            ));
        }
        if successes.iter().all(|result| result == &successes[0]) {
            Ok(successes.swap_remove(0))
        } else {
            Err(self.fail(format!(
                "conflicting values for key '{label}' in merged mapping"
            )))
        }
    }

    /// Probe a rule without keeping its result or error.
    fn silently_matches(&mut self, expr: &Expr, content: &Node) -> bool {
        self.apply_expr(expr, content).is_ok()
    }

    fn key_set_error(&self, defects: Vec<ValidationError>) -> ValidationError {
        let message = if defects.len() == 1 {
            "the mapping key set has 1 defect".to_string()
        } else {
            format!("the mapping key set has {} defects", defects.len())
        };
        ValidationError::with_causes(self.path.clone(), message, defects)
    }

    // ----------------------------- alternation ---------------------------- //

    /// `_oneOf`: strictly in declared order, first success wins. The
    /// recursion guard is never swallowed as an ordinary failed branch.
    fn match_one_of(&mut self, alternatives: &[Expr], content: &Node) -> MatchResult {
        let mut causes = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            match self.apply_expr(alternative, content) {
                Ok(result) => return Ok(result),
                Err(err @ ValidationError::RecursionLimitExceeded { .. }) => return Err(err),
                Err(err) => causes.push(err),
            }
        }
        Err(ValidationError::with_causes(
            self.path.clone(),
            format!("none of the {} alternatives matched", alternatives.len()),
            causes,
        ))
    }
}

// ------------------------------- helpers --------------------------------- //

fn has_key(entries: &[(Node, Node)], name: &str) -> bool {
    entries
        .iter()
        .any(|(key, _)| key.as_scalar().is_some_and(|scalar| scalar.text == name))
}

fn key_string(key: &Node) -> String {
    match key.as_scalar() {
        Some(scalar) => scalar.text.clone(),
        None => key.repr(),
    }
}

fn expectation(scalar_type: ScalarType) -> &'static str {
    match scalar_type {
        ScalarType::Str => "a string",
        ScalarType::Int => "an integer",
        ScalarType::Float => "a float",
        ScalarType::Boolean => "a boolean",
        ScalarType::Null => "the null value",
        ScalarType::Timestamp => "a timestamp (an ISO 8601 datetime)",
        ScalarType::Binary => "a base64 value",
        ScalarType::Any => "any value",
    }
}

fn scalar_value(scalar: &Scalar) -> ScalarValue {
    match scalar.kind {
        ScalarKind::Null => ScalarValue::Null,
        ScalarKind::Bool => ScalarValue::Bool(scalar.text == "true"),
        ScalarKind::Int => scalar
            .text
            .parse::<i64>()
            .map(ScalarValue::Int)
            .unwrap_or_else(|_| ScalarValue::Str(scalar.text.clone())),
        ScalarKind::Float => scalar
            .text
            .parse::<f64>()
            .map(ScalarValue::Float)
            .unwrap_or_else(|_| ScalarValue::Str(scalar.text.clone())),
        ScalarKind::Str => ScalarValue::Str(scalar.text.clone()),
    }
}

/// Generic mirror of a node, used by the `any` rule.
fn any_value(content: &Node) -> ResultValue {
    match content {
        Node::Scalar(scalar) => ResultValue::Scalar(scalar_value(scalar)),
        Node::Sequence(items) => ResultValue::List(items.iter().map(any_value).collect()),
        Node::Mapping(entries) => ResultValue::Map(
            entries
                .iter()
                .map(|(key, value)| (key_string(key), any_value(value)))
                .collect(),
        ),
    }
}
