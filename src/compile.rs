//! Schema compiler: interprets a document tree as a rule graph.
//!
//! Compilation is two-pass so rules can reference each other in any order:
//! rule names are collected first, then every body is compiled against the
//! full name set. Static checking is exhaustive: unknown references,
//! malformed combinator configuration, merge conflicts, non-productive
//! cycles and unused rules are all collected before reporting, so schema
//! authors get the complete diagnosis in one run.
//!
//! Reserved marker prefix: `_`. A mapping whose keys carry no marker is
//! shorthand for `_map` with every field required. Alternation and tuples
//! must be spelled out with `_oneOf` / `_list`; a bare sequence is never
//! an expression.

pub mod cycle;
pub mod merge;
pub mod range;

use indexmap::IndexMap;

use crate::error::{Path, PathSegment, SchemaError, SchemaErrorKind};
use crate::ir::{Expr, FieldSpec, MapSpec, Pattern, Rule, RuleBody, RuleGraph, ScalarType};
use crate::node::{Node, ScalarKind};

/// Compile a schema document (a mapping of named rules) into a rule graph.
///
/// The graph is checked: the `main` entry rule must exist, every reference
/// must resolve, merges must be statically consistent, every cycle must
/// consume input, and every rule must be reachable from `main`.
pub fn compile_graph(schema: &Node) -> Result<RuleGraph, SchemaError> {
    let Node::Mapping(entries) = schema else {
        return Err(SchemaError::new(
            SchemaErrorKind::Root,
            Path::root(),
            format!(
                "the schema root must be a mapping of rule definitions, got {}",
                schema.repr()
            ),
        ));
    };

    let mut compiler = Compiler::new();
    for (key, _) in entries {
        compiler.declare_rule_name(key);
    }

    let mut rules: IndexMap<String, Rule> = IndexMap::new();
    for (key, value) in entries {
        let Some(name) = key.as_str() else { continue };
        if name.starts_with('_') {
            continue;
        }
        let path = Path::root().child(PathSegment::Rule(name.to_string()));
        if let Some(expr) = compiler.compile_expr(value, &path) {
            rules.insert(
                name.to_string(),
                Rule {
                    name: name.to_string(),
                    body: body_of(expr),
                },
            );
        }
    }

    if !compiler.errors.is_empty() {
        SchemaError::join(compiler.errors)?;
    }

    check_graph(&rules, true)?;
    tracing::debug!(rules = rules.len(), "compiled schema");
    Ok(RuleGraph::from_rules(rules))
}

/// Compile a bare, unnamed expression into a one-rule graph binding `main`
/// to an [`RuleBody::Expression`] body.
pub fn compile_expression(expression: &Node) -> Result<RuleGraph, SchemaError> {
    let mut compiler = Compiler::new();
    let path = Path::root().child(PathSegment::Rule("main".to_string()));
    let expr = compiler.compile_expr(expression, &path);
    if !compiler.errors.is_empty() {
        SchemaError::join(compiler.errors)?;
    }
    let Some(expr) = expr else {
        // compile_expr only returns None after recording an error
        return Err(SchemaError::new(
            SchemaErrorKind::Combinator,
            path,
            "invalid expression",
        ));
    };
    let mut rules = IndexMap::new();
    rules.insert(
        "main".to_string(),
        Rule {
            name: "main".to_string(),
            body: RuleBody::Expression(expr),
        },
    );
    check_graph(&rules, false)?;
    Ok(RuleGraph::from_rules(rules))
}

/// Compile a bare regex pattern into a one-rule graph binding `main` to a
/// [`RuleBody::RegexSchema`] body.
pub fn compile_regex(pattern: &str) -> Result<RuleGraph, SchemaError> {
    let path = Path::root().child(PathSegment::Rule("main".to_string()));
    let pattern = Pattern::compile(pattern).map_err(|err| {
        SchemaError::new(
            SchemaErrorKind::Combinator,
            path.clone(),
            format!("invalid regex /{pattern}/: {err}"),
        )
    })?;
    let mut rules = IndexMap::new();
    rules.insert(
        "main".to_string(),
        Rule {
            name: "main".to_string(),
            body: RuleBody::RegexSchema(pattern),
        },
    );
    Ok(RuleGraph::from_rules(rules))
}

/// Post-compile whole-graph checks, errors collected exhaustively.
fn check_graph(rules: &IndexMap<String, Rule>, require_reachability: bool) -> Result<(), SchemaError> {
    let mut errors = Vec::new();

    if !rules.contains_key("main") {
        errors.push(SchemaError::new(
            SchemaErrorKind::MissingMain,
            Path::root(),
            "could not find the 'main' rule",
        ));
    }

    errors.extend(merge::check_merges(rules));
    errors.extend(cycle::check_productivity(rules));
    if require_reachability && rules.contains_key("main") {
        errors.extend(check_reachability(rules));
    }

    SchemaError::join(errors)
}

/// Every rule must be reachable from `main`.
fn check_reachability(rules: &IndexMap<String, Rule>) -> Vec<SchemaError> {
    let mut reached: Vec<&str> = Vec::new();
    let mut queue: Vec<&str> = vec!["main"];
    while let Some(name) = queue.pop() {
        if reached.contains(&name) {
            continue;
        }
        reached.push(name);
        if let Some(rule) = rules.get(name) {
            let mut refs = Vec::new();
            collect_refs(&rule.body, &mut refs);
            for target in refs {
                if rules.contains_key(target) && !reached.contains(&target) {
                    queue.push(target);
                }
            }
        }
    }

    rules
        .keys()
        .filter(|name| !reached.contains(&name.as_str()))
        .map(|name| {
            SchemaError::new(
                SchemaErrorKind::UnusedRule,
                Path::root().child(PathSegment::Rule(name.clone())),
                format!("rule '{name}' is defined but never used"),
            )
        })
        .collect()
}

/// All rule names referenced by a body, through any nesting of inline
/// expressions.
pub(crate) fn collect_refs<'a>(body: &'a RuleBody, out: &mut Vec<&'a str>) {
    fn push_expr<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
        match expr {
            Expr::Ref(name) => out.push(name),
            Expr::Inline(inner) => collect_refs(inner, out),
        }
    }
    match body {
        RuleBody::Scalar(_)
        | RuleBody::Enum(_)
        | RuleBody::Range(_)
        | RuleBody::Regexp(_)
        | RuleBody::RegexSchema(_) => {}
        RuleBody::ListOf(element) | RuleBody::CountBound { element, .. } => {
            push_expr(element, out);
        }
        RuleBody::Tuple(exprs) | RuleBody::Merge(exprs) | RuleBody::OneOf(exprs) => {
            for expr in exprs {
                push_expr(expr, out);
            }
        }
        RuleBody::Map(fields) => {
            for field in fields.values() {
                push_expr(&field.expr, out);
            }
        }
        RuleBody::MapOf { key, value } => {
            push_expr(key, out);
            push_expr(value, out);
        }
        RuleBody::Document(entry) => out.push(entry),
        RuleBody::Expression(expr) => push_expr(expr, out),
    }
}

fn body_of(expr: Expr) -> RuleBody {
    match expr {
        Expr::Inline(body) => *body,
        // A rule defined as a bare reference stays a transparent alias.
        reference @ Expr::Ref(_) => RuleBody::Expression(reference),
    }
}

// ----------------------------- Compiler ---------------------------------- //

const KEYWORDS: &[&str] = &[
    "_regex",
    "_in",
    "_range",
    "_oneOf",
    "_listOf",
    "_list",
    "_map",
    "_mapFacultative",
    "_mapOf",
    "_merge",
    "_min",
    "_max",
    "_nb",
];

struct Compiler {
    rule_names: Vec<String>,
    errors: Vec<SchemaError>,
}

impl Compiler {
    fn new() -> Self {
        Self {
            rule_names: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn error(&mut self, kind: SchemaErrorKind, path: &Path, message: impl Into<String>) {
        self.errors.push(SchemaError::new(kind, path.clone(), message));
    }

    fn declare_rule_name(&mut self, key: &Node) {
        match key.as_str() {
            Some(name) if name.starts_with('_') => self.error(
                SchemaErrorKind::Root,
                &Path::root(),
                format!("rule name '{name}' uses the reserved marker prefix '_'"),
            ),
            Some(name) => self.rule_names.push(name.to_string()),
            None => self.error(
                SchemaErrorKind::Root,
                &Path::root(),
                format!("rule names must be strings, got {}", key.repr()),
            ),
        }
    }

    /// Compile one expression node. Returns `None` after recording at
    /// least one error.
    fn compile_expr(&mut self, node: &Node, path: &Path) -> Option<Expr> {
        match node {
            Node::Scalar(scalar) => {
                let Some(name) = node.as_str() else {
                    self.error(
                        SchemaErrorKind::Combinator,
                        path,
                        format!(
                            "expected an expression (rule name or checker mapping), got {}",
                            scalar.text
                        ),
                    );
                    return None;
                };
                self.resolve_identifier(name, path)
            }
            Node::Sequence(_) => {
                self.error(
                    SchemaErrorKind::Combinator,
                    path,
                    "a bare sequence is not an expression; wrap it in `_oneOf` or `_list`",
                );
                None
            }
            Node::Mapping(entries) => self
                .compile_checker(entries, path)
                .map(|body| Expr::Inline(Box::new(body))),
        }
    }

    /// A scalar identifier: a user rule (which may shadow a predefined
    /// scalar rule) or a predefined scalar rule.
    fn resolve_identifier(&mut self, name: &str, path: &Path) -> Option<Expr> {
        if self.rule_names.iter().any(|rule| rule == name) {
            return Some(Expr::Ref(name.to_string()));
        }
        if let Some(scalar_type) = ScalarType::from_name(name) {
            return Some(Expr::Inline(Box::new(RuleBody::Scalar(scalar_type))));
        }
        let known = self.rule_names.join(", ");
        self.error(
            SchemaErrorKind::Reference,
            path,
            format!("encountered unknown rule identifier '{name}'. Known rules are: [{known}]"),
        );
        None
    }

    fn compile_checker(&mut self, entries: &[(Node, Node)], path: &Path) -> Option<RuleBody> {
        let mut markers: Vec<(&str, &Node)> = Vec::new();
        let mut has_plain = false;
        for (key, value) in entries {
            match key.as_str() {
                Some(k) if k.starts_with('_') => markers.push((k, value)),
                _ => has_plain = true,
            }
        }

        if markers.is_empty() {
            return self.compile_plain_map(entries, path);
        }
        if has_plain {
            self.error(
                SchemaErrorKind::Combinator,
                path,
                "combinator keywords cannot be mixed with plain fields in one mapping",
            );
            return None;
        }

        let mut ok = true;
        for (keyword, _) in &markers {
            if !KEYWORDS.contains(keyword) {
                self.error(
                    SchemaErrorKind::Combinator,
                    path,
                    format!("unknown combinator keyword '{keyword}'"),
                );
                ok = false;
            }
        }
        if !ok {
            return None;
        }

        let lookup = |keyword: &str| -> Option<&Node> {
            markers
                .iter()
                .find(|(k, _)| *k == keyword)
                .map(|(_, value)| *value)
        };

        let size_keywords: Vec<&str> = ["_min", "_max", "_nb"]
            .into_iter()
            .filter(|k| lookup(k).is_some())
            .collect();
        let mut primaries: Vec<&str> = [
            "_regex", "_in", "_range", "_oneOf", "_listOf", "_list", "_mapOf", "_merge",
        ]
        .into_iter()
        .filter(|k| lookup(k).is_some())
        .collect();
        if lookup("_map").is_some() || lookup("_mapFacultative").is_some() {
            primaries.push("_map");
        }

        match primaries.len() {
            0 => {
                if size_keywords.is_empty() {
                    self.error(
                        SchemaErrorKind::Combinator,
                        path,
                        "an expression mapping must contain a combinator keyword",
                    );
                } else {
                    self.error(
                        SchemaErrorKind::Combinator,
                        path,
                        "`_min`, `_max` and `_nb` require `_listOf`",
                    );
                }
                return None;
            }
            1 => {}
            _ => {
                self.error(
                    SchemaErrorKind::Combinator,
                    path,
                    format!(
                        "combinator keywords cannot be combined: {}",
                        primaries.join(", ")
                    ),
                );
                return None;
            }
        }
        let primary = primaries[0];
        if !size_keywords.is_empty() && primary != "_listOf" {
            self.error(
                SchemaErrorKind::Combinator,
                path,
                "`_min`, `_max` and `_nb` only apply to `_listOf`",
            );
            return None;
        }

        match primary {
            "_regex" => self.compile_regex_checker(lookup("_regex")?, path),
            "_in" => self.compile_in(lookup("_in")?, path),
            "_range" => self.compile_range(lookup("_range")?, path),
            "_oneOf" => self
                .compile_expr_list(lookup("_oneOf")?, "_oneOf", path)
                .map(RuleBody::OneOf),
            "_list" => self
                .compile_expr_list(lookup("_list")?, "_list", path)
                .map(RuleBody::Tuple),
            "_listOf" => self.compile_list_of(
                lookup("_listOf")?,
                lookup("_min"),
                lookup("_max"),
                lookup("_nb"),
                path,
            ),
            "_mapOf" => self.compile_map_of(lookup("_mapOf")?, path),
            "_merge" => self
                .compile_expr_list(lookup("_merge")?, "_merge", path)
                .map(RuleBody::Merge),
            "_map" => self.compile_map(lookup("_map"), lookup("_mapFacultative"), path),
            _ => None,
        }
    }

    /// A mapping without markers: `_map` shorthand, every field required.
    fn compile_plain_map(&mut self, entries: &[(Node, Node)], path: &Path) -> Option<RuleBody> {
        let mut fields = MapSpec::new();
        let mut ok = true;
        for (key, value) in entries {
            let Some(scalar) = key.as_scalar() else {
                self.error(
                    SchemaErrorKind::Combinator,
                    path,
                    format!("field names must be scalars, got {}", key.repr()),
                );
                ok = false;
                continue;
            };
            let name = scalar.text.clone();
            let field_path = path.child(PathSegment::Key(name.clone()));
            match self.compile_expr(value, &field_path) {
                Some(expr) => {
                    fields.insert(
                        name,
                        FieldSpec {
                            expr,
                            required: true,
                        },
                    );
                }
                None => ok = false,
            }
        }
        ok.then_some(RuleBody::Map(fields))
    }

    fn compile_regex_checker(&mut self, value: &Node, path: &Path) -> Option<RuleBody> {
        let path = path.child(PathSegment::Key("_regex".to_string()));
        let Some(source) = value.as_str() else {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!("`_regex` expects a pattern string, got {}", value.repr()),
            );
            return None;
        };
        match Pattern::compile(source) {
            Ok(pattern) => Some(RuleBody::Regexp(pattern)),
            Err(err) => {
                self.error(
                    SchemaErrorKind::Combinator,
                    &path,
                    format!("invalid regex /{source}/: {err}"),
                );
                None
            }
        }
    }

    fn compile_in(&mut self, value: &Node, path: &Path) -> Option<RuleBody> {
        let path = path.child(PathSegment::Key("_in".to_string()));
        let Node::Sequence(items) = value else {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!(
                    "`_in` expects a non-empty sequence of scalar literals, got {}",
                    value.repr()
                ),
            );
            return None;
        };
        if items.is_empty() {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                "`_in` expects a non-empty sequence of scalar literals",
            );
            return None;
        }
        let mut literals = Vec::with_capacity(items.len());
        let mut ok = true;
        for (index, item) in items.iter().enumerate() {
            match item.as_scalar() {
                Some(scalar) => literals.push(scalar.text.clone()),
                None => {
                    self.error(
                        SchemaErrorKind::Combinator,
                        &path.child(PathSegment::Index(index)),
                        format!("`_in` literals must be scalars, got {}", item.repr()),
                    );
                    ok = false;
                }
            }
        }
        ok.then_some(RuleBody::Enum(literals))
    }

    fn compile_range(&mut self, value: &Node, path: &Path) -> Option<RuleBody> {
        let path = path.child(PathSegment::Key("_range".to_string()));
        let Some(scalar) = value.as_scalar() else {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!(
                    "`_range` expects an expression like '1 <= int <= 10', got {}",
                    value.repr()
                ),
            );
            return None;
        };
        match range::parse_range(&scalar.text) {
            Ok(bounds) => Some(RuleBody::Range(bounds)),
            Err(message) => {
                self.error(SchemaErrorKind::Combinator, &path, message);
                None
            }
        }
    }

    /// A non-empty sequence of expressions, shared by `_oneOf`, `_list`
    /// and `_merge`.
    fn compile_expr_list(&mut self, value: &Node, keyword: &str, path: &Path) -> Option<Vec<Expr>> {
        let path = path.child(PathSegment::Key(keyword.to_string()));
        let Node::Sequence(items) = value else {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!(
                    "`{keyword}` expects a non-empty sequence of expressions, got {}",
                    value.repr()
                ),
            );
            return None;
        };
        if items.is_empty() {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!("`{keyword}` expects a non-empty sequence of expressions"),
            );
            return None;
        }
        let mut exprs = Vec::with_capacity(items.len());
        let mut ok = true;
        for (index, item) in items.iter().enumerate() {
            match self.compile_expr(item, &path.child(PathSegment::Index(index))) {
                Some(expr) => exprs.push(expr),
                None => ok = false,
            }
        }
        ok.then_some(exprs)
    }

    fn compile_list_of(
        &mut self,
        value: &Node,
        min: Option<&Node>,
        max: Option<&Node>,
        nb: Option<&Node>,
        path: &Path,
    ) -> Option<RuleBody> {
        let element = self.compile_expr(value, &path.child(PathSegment::Key("_listOf".to_string())))?;
        if min.is_none() && max.is_none() && nb.is_none() {
            return Some(RuleBody::ListOf(element));
        }

        if nb.is_some() && min.is_some() {
            self.error(
                SchemaErrorKind::Combinator,
                path,
                "it makes no sense to use `_nb` and `_min` together",
            );
            return None;
        }
        if nb.is_some() && max.is_some() {
            self.error(
                SchemaErrorKind::Combinator,
                path,
                "it makes no sense to use `_nb` and `_max` together",
            );
            return None;
        }

        let min = self.size_bound(min, "_min", path)?;
        let max = self.size_bound(max, "_max", path)?;
        let nb = self.size_bound(nb, "_nb", path)?;
        if let (Some(min), Some(max)) = (min, max) {
            if max < min {
                self.error(
                    SchemaErrorKind::Combinator,
                    path,
                    "`_max` cannot be lower than `_min`",
                );
                return None;
            }
        }
        let (min, max) = match nb {
            Some(nb) => (Some(nb), Some(nb)),
            None => (min, max),
        };
        Some(RuleBody::CountBound { element, min, max })
    }

    /// `Some(node)` parsed as a non-negative integer bound; `None` passes
    /// through. Errors and returns `None` (the outer `?` aborts) only for
    /// a present-but-invalid bound.
    fn size_bound(
        &mut self,
        node: Option<&Node>,
        keyword: &str,
        path: &Path,
    ) -> Option<Option<usize>> {
        let Some(node) = node else {
            return Some(None);
        };
        let parsed = node
            .as_scalar()
            .filter(|scalar| scalar.kind == ScalarKind::Int)
            .and_then(|scalar| scalar.text.parse::<usize>().ok());
        match parsed {
            Some(bound) => Some(Some(bound)),
            None => {
                self.error(
                    SchemaErrorKind::Combinator,
                    &path.child(PathSegment::Key(keyword.to_string())),
                    format!(
                        "`{keyword}` expects a non-negative integer, got {}",
                        node.repr()
                    ),
                );
                None
            }
        }
    }

    fn compile_map_of(&mut self, value: &Node, path: &Path) -> Option<RuleBody> {
        let path = path.child(PathSegment::Key("_mapOf".to_string()));
        let Node::Mapping(entries) = value else {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!(
                    "`_mapOf` expects a single key-expression to value-expression entry, got {}",
                    value.repr()
                ),
            );
            return None;
        };
        if entries.len() != 1 {
            self.error(
                SchemaErrorKind::Combinator,
                &path,
                format!(
                    "`_mapOf` expects exactly one key-value entry, got {}",
                    entries.len()
                ),
            );
            return None;
        }
        let (key_node, value_node) = &entries[0];
        let key = self.compile_expr(key_node, &path);
        let value = self.compile_expr(value_node, &path);
        Some(RuleBody::MapOf {
            key: key?,
            value: value?,
        })
    }

    fn compile_map(
        &mut self,
        map: Option<&Node>,
        facultative: Option<&Node>,
        path: &Path,
    ) -> Option<RuleBody> {
        let mut fields = MapSpec::new();
        let mut ok = true;
        for (node, keyword, required) in [
            (map, "_map", true),
            (facultative, "_mapFacultative", false),
        ] {
            let Some(node) = node else { continue };
            let keyword_path = path.child(PathSegment::Key(keyword.to_string()));
            let Node::Mapping(entries) = node else {
                self.error(
                    SchemaErrorKind::Combinator,
                    &keyword_path,
                    format!(
                        "`{keyword}` expects a mapping of field names to expressions, got {}",
                        node.repr()
                    ),
                );
                ok = false;
                continue;
            };
            for (key, value) in entries {
                let Some(scalar) = key.as_scalar() else {
                    self.error(
                        SchemaErrorKind::Combinator,
                        &keyword_path,
                        format!("field names must be scalars, got {}", key.repr()),
                    );
                    ok = false;
                    continue;
                };
                let name = scalar.text.clone();
                if fields.contains_key(&name) {
                    self.error(
                        SchemaErrorKind::Combinator,
                        &keyword_path,
                        format!("key '{name}' is declared in both `_map` and `_mapFacultative`"),
                    );
                    ok = false;
                    continue;
                }
                let field_path = keyword_path.child(PathSegment::Key(name.clone()));
                match self.compile_expr(value, &field_path) {
                    Some(expr) => {
                        fields.insert(name, FieldSpec { expr, required });
                    }
                    None => ok = false,
                }
            }
        }
        if ok && fields.is_empty() {
            self.error(
                SchemaErrorKind::Combinator,
                path,
                "`_map` expects at least one declared field",
            );
            return None;
        }
        ok.then_some(RuleBody::Map(fields))
    }
}
