//! `_merge` flattening and static conflict detection.
//!
//! A merge composes map-shaped members (`_map`, nested `_merge`, `_mapOf`,
//! or references resolving to those) into one combined shape. Flattening
//! is shared with the matcher; the compile-time pass runs it on every
//! merge in the graph and reports *all* field conflicts across all member
//! pairs at once, not just the first.

use indexmap::IndexMap;

use crate::error::{Path, PathSegment, SchemaError, SchemaErrorKind};
use crate::ir::{Expr, FieldSpec, MapSpec, Rule, RuleBody};

/// The combined shape of a merge: unioned declared fields plus the
/// `_mapOf` members that absorb undeclared keys, in declaration order.
pub(crate) struct FlatMerge {
    pub fields: MapSpec,
    pub map_ofs: Vec<(Expr, Expr)>,
}

/// A reason a merge cannot be flattened cleanly.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MergeDefect {
    UnknownRule(String),
    NotMapShaped { description: String },
    Cyclic { name: String },
    Conflict {
        field: String,
        left: String,
        right: String,
    },
}

impl MergeDefect {
    pub fn message(&self) -> String {
        match self {
            Self::UnknownRule(name) => {
                format!("merge member references the unknown rule '{name}'")
            }
            Self::NotMapShaped { description } => format!(
                "merge member '{description}' is not map-shaped; expected `_map`, `_merge` or `_mapOf`"
            ),
            Self::Cyclic { name } => {
                format!("merge member '{name}' resolves back to itself")
            }
            Self::Conflict { field, left, right } => format!(
                "merge members declare field '{field}' with conflicting rules: {left} vs {right}"
            ),
        }
    }
}

/// Union the members' shapes. Every defect is collected; the returned
/// shape covers whatever flattened cleanly.
pub(crate) fn flatten<'a, F>(members: &'a [Expr], lookup: &F) -> (FlatMerge, Vec<MergeDefect>)
where
    F: Fn(&str) -> Option<&'a RuleBody>,
{
    let mut flat = FlatMerge {
        fields: MapSpec::new(),
        map_ofs: Vec::new(),
    };
    let mut defects = Vec::new();
    let mut visiting: Vec<&'a str> = Vec::new();
    for member in members {
        flatten_member(member, lookup, &mut flat, &mut defects, &mut visiting);
    }
    (flat, defects)
}

fn flatten_member<'a, F>(
    member: &'a Expr,
    lookup: &F,
    flat: &mut FlatMerge,
    defects: &mut Vec<MergeDefect>,
    visiting: &mut Vec<&'a str>,
) where
    F: Fn(&str) -> Option<&'a RuleBody>,
{
    match member {
        Expr::Ref(name) => resolve_named(name, lookup, flat, defects, visiting),
        Expr::Inline(body) => flatten_body(body, lookup, flat, defects, visiting),
    }
}

fn resolve_named<'a, F>(
    name: &'a str,
    lookup: &F,
    flat: &mut FlatMerge,
    defects: &mut Vec<MergeDefect>,
    visiting: &mut Vec<&'a str>,
) where
    F: Fn(&str) -> Option<&'a RuleBody>,
{
    if visiting.contains(&name) {
        defects.push(MergeDefect::Cyclic {
            name: name.to_string(),
        });
        return;
    }
    match lookup(name) {
        Some(body) => {
            visiting.push(name);
            flatten_body(body, lookup, flat, defects, visiting);
            visiting.pop();
        }
        None => defects.push(MergeDefect::UnknownRule(name.to_string())),
    }
}

fn flatten_body<'a, F>(
    body: &'a RuleBody,
    lookup: &F,
    flat: &mut FlatMerge,
    defects: &mut Vec<MergeDefect>,
    visiting: &mut Vec<&'a str>,
) where
    F: Fn(&str) -> Option<&'a RuleBody>,
{
    match body {
        RuleBody::Map(fields) => {
            for (name, spec) in fields {
                contribute(name, spec, flat, defects);
            }
        }
        RuleBody::Merge(members) => {
            for member in members {
                flatten_member(member, lookup, flat, defects, visiting);
            }
        }
        RuleBody::MapOf { key, value } => {
            flat.map_ofs.push((key.clone(), value.clone()));
        }
        RuleBody::Expression(expr) => flatten_member(expr, lookup, flat, defects, visiting),
        RuleBody::Document(entry) => resolve_named(entry, lookup, flat, defects, visiting),
        other => defects.push(MergeDefect::NotMapShaped {
            description: other.describe(),
        }),
    }
}

fn contribute(name: &str, spec: &FieldSpec, flat: &mut FlatMerge, defects: &mut Vec<MergeDefect>) {
    match flat.fields.get(name) {
        None => {
            flat.fields.insert(name.to_string(), spec.clone());
        }
        Some(existing) if existing == spec => {}
        Some(existing) => defects.push(MergeDefect::Conflict {
            field: name.to_string(),
            left: describe_field(existing),
            right: describe_field(spec),
        }),
    }
}

fn describe_field(spec: &FieldSpec) -> String {
    if spec.required {
        spec.expr.describe()
    } else {
        format!("{} (facultative)", spec.expr.describe())
    }
}

/// Compile-time pass: flatten every merge in the graph and turn its
/// defects into one `SchemaError` with one cause per defect.
pub(crate) fn check_merges(rules: &IndexMap<String, Rule>) -> Vec<SchemaError> {
    let lookup = |name: &str| rules.get(name).map(|rule| &rule.body);
    let mut errors = Vec::new();
    for rule in rules.values() {
        let path = Path::root().child(PathSegment::Rule(rule.name.clone()));
        visit_merges(&rule.body, &mut |members| {
            let (_, defects) = flatten(members, &lookup);
            if defects.is_empty() {
                return;
            }
            let causes: Vec<SchemaError> = defects
                .iter()
                .map(|defect| {
                    let kind = match defect {
                        MergeDefect::Conflict { .. } => SchemaErrorKind::MergeConflict,
                        _ => SchemaErrorKind::Combinator,
                    };
                    SchemaError::new(kind, path.clone(), defect.message())
                })
                .collect();
            errors.push(SchemaError::with_causes(
                SchemaErrorKind::MergeConflict,
                path.clone(),
                format!("invalid `_merge`: {} defect(s)", defects.len()),
                causes,
            ));
        });
    }
    errors
}

/// Depth-first walk calling `f` on the member list of every merge body,
/// including merges nested inside inline expressions.
fn visit_merges<'a>(body: &'a RuleBody, f: &mut dyn FnMut(&'a [Expr])) {
    fn visit_expr<'a>(expr: &'a Expr, f: &mut dyn FnMut(&'a [Expr])) {
        if let Expr::Inline(inner) = expr {
            visit_merges(inner, f);
        }
    }
    match body {
        RuleBody::Merge(members) => {
            f(members);
            for member in members {
                visit_expr(member, f);
            }
        }
        RuleBody::ListOf(element) | RuleBody::CountBound { element, .. } => visit_expr(element, f),
        RuleBody::Tuple(exprs) | RuleBody::OneOf(exprs) => {
            for expr in exprs {
                visit_expr(expr, f);
            }
        }
        RuleBody::Map(fields) => {
            for field in fields.values() {
                visit_expr(&field.expr, f);
            }
        }
        RuleBody::MapOf { key, value } => {
            visit_expr(key, f);
            visit_expr(value, f);
        }
        RuleBody::Expression(expr) => visit_expr(expr, f),
        RuleBody::Scalar(_)
        | RuleBody::Enum(_)
        | RuleBody::Range(_)
        | RuleBody::Regexp(_)
        | RuleBody::Document(_)
        | RuleBody::RegexSchema(_) => {}
    }
}
