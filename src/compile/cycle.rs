//! Non-productive recursion detection.
//!
//! Recursive schemas are allowed (trees need them), but only when every
//! cycle consumes at least one content node per revolution. Descending
//! into a sequence or mapping consumes; a direct reference, a `_oneOf`
//! alternative, a `_merge` member and the `Document`/`Expression` wrappers
//! do not. A cycle built only from non-consuming edges would let the
//! matcher revisit the same rule on the same node forever, so it is
//! rejected at compile time.

use indexmap::IndexMap;

use crate::error::{Path, PathSegment, SchemaError, SchemaErrorKind};
use crate::ir::{Expr, Rule, RuleBody};

pub(crate) fn check_productivity(rules: &IndexMap<String, Rule>) -> Vec<SchemaError> {
    let mut edges: IndexMap<&str, Vec<&str>> = IndexMap::new();
    for rule in rules.values() {
        let mut targets = Vec::new();
        epsilon_refs(&rule.body, &mut targets);
        targets.retain(|target| rules.contains_key(*target));
        edges.insert(rule.name.as_str(), targets);
    }

    let mut walker = Walker {
        edges: &edges,
        marks: rules.keys().map(|name| (name.as_str(), Mark::White)).collect(),
        stack: Vec::new(),
        errors: Vec::new(),
    };
    for name in rules.keys() {
        walker.visit(name.as_str());
    }
    walker.errors
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    White,
    Gray,
    Black,
}

struct Walker<'a> {
    edges: &'a IndexMap<&'a str, Vec<&'a str>>,
    marks: IndexMap<&'a str, Mark>,
    stack: Vec<&'a str>,
    errors: Vec<SchemaError>,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, name: &'a str) {
        match self.marks.get(name) {
            Some(Mark::White) => {}
            _ => return,
        }
        self.marks.insert(name, Mark::Gray);
        self.stack.push(name);
        let targets = self.edges.get(name).cloned().unwrap_or_default();
        for target in targets {
            match self.marks.get(target) {
                Some(Mark::Gray) => self.report(target),
                Some(Mark::White) => self.visit(target),
                _ => {}
            }
        }
        self.stack.pop();
        self.marks.insert(name, Mark::Black);
    }

    fn report(&mut self, start: &str) {
        let from = self
            .stack
            .iter()
            .position(|name| *name == start)
            .unwrap_or(0);
        let cycle: Vec<&str> = self.stack[from..].iter().copied().collect();
        let message = if cycle.len() == 1 {
            format!("rule '{start}' references itself")
        } else {
            format!(
                "rule '{start}' can reach itself without consuming input: {} -> {start}",
                cycle.join(" -> ")
            )
        };
        self.errors.push(SchemaError::new(
            SchemaErrorKind::NonProductiveCycle,
            Path::root().child(PathSegment::Rule(start.to_string())),
            message,
        ));
    }
}

/// Rule names reachable from this body without consuming any content.
fn epsilon_refs<'a>(body: &'a RuleBody, out: &mut Vec<&'a str>) {
    fn from_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
        match expr {
            Expr::Ref(name) => out.push(name),
            Expr::Inline(inner) => epsilon_refs(inner, out),
        }
    }
    match body {
        RuleBody::Expression(expr) => from_expr(expr, out),
        RuleBody::Document(entry) => out.push(entry),
        RuleBody::OneOf(exprs) | RuleBody::Merge(exprs) => {
            for expr in exprs {
                from_expr(expr, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crate::compile::compile_graph;
    use crate::error::SchemaErrorKind;
    use crate::node::load_str;

    fn compile(text: &str) -> Result<crate::ir::RuleGraph, crate::error::SchemaError> {
        compile_graph(&load_str(text).unwrap())
    }

    #[test]
    fn self_reference_is_rejected() {
        let err = compile("main: main\n").unwrap_err();
        assert_eq!(err.kind, SchemaErrorKind::NonProductiveCycle);
        assert!(err.to_string().contains("rule 'main' references itself"));
    }

    #[test]
    fn mutual_reference_through_one_of_is_rejected() {
        let err = compile("main:\n  _oneOf: [other, int]\nother: main\n").unwrap_err();
        let rendered = err.to_string();
        assert!(
            rendered.contains("without consuming input"),
            "got: {rendered}"
        );
    }

    #[test]
    fn recursion_through_a_container_is_productive() {
        // A classic recursive tree: the cycle passes through `_map`, which
        // consumes a node per revolution.
        let schema = "\
main: tree
tree:
  _map:
    label: string
  _mapFacultative:
    children:
      _listOf: tree
";
        assert!(compile(schema).is_ok());
    }

    #[test]
    fn one_of_recursion_behind_a_list_is_productive() {
        let schema = "\
main:
  _oneOf:
    - string
    - _listOf: main
";
        assert!(compile(schema).is_ok());
    }

    #[test]
    fn merge_cycle_is_rejected() {
        // Reported by both the merge flattener and the cycle walker; the
        // joined error must mention the cycle either way.
        let err = compile("main:\n  _merge: [main]\n").unwrap_err();
        assert!(err.to_string().contains("itself"), "got: {err}");
    }
}
