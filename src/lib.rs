//! Declarative YAML schema validation.
//!
//! A schema is itself YAML: a mapping of named rules built from a closed
//! set of combinators (`_regex`, `_in`, `_range`, `_oneOf`, `_list`,
//! `_listOf`, `_map`, `_mapFacultative`, `_mapOf`, `_merge`, `_min`,
//! `_max`, `_nb`) plus predefined scalar rules (`string`, `int`, `float`,
//! `boolean`, `nullType`, `timestamp`, `binary`, `any`). Compiling a
//! schema produces an immutable rule graph rooted at the `main` rule;
//! validating walks a document against that graph and returns either a
//! typed result tree or a path-located error.
//!
//! Design goals:
//! - Compilation is eagerly and exhaustively checked: unknown references,
//!   malformed combinators, merge conflicts, non-productive recursion and
//!   unused rules are all reported in one pass.
//! - Validation is linear in the document, deterministic, and never
//!   panics on user input; a depth guard bounds recursion.
//! - A compiled [`Parser`] is immutable and can be shared freely across
//!   threads; every validation owns its own result or error.
//!
//! ```
//! use yaml_sieve::Parser;
//!
//! let parser = Parser::compile(
//!     "main:\n  name: string\n  age:\n    _range: 0 <= int <= 150\n",
//! )?;
//! let result = parser.validate_str("name: Ada\nage: 36\n")?;
//! assert!(result.get("name").is_some());
//! # Ok::<(), yaml_sieve::Error>(())
//! ```

pub mod compile;
pub mod error;
pub mod ir;
pub mod matcher;
pub mod node;
pub mod result;

pub use error::{
    Error, Path, PathSegment, SchemaError, SchemaErrorKind, SyntaxError, ValidationError,
};
pub use ir::{Expr, Rule, RuleBody, RuleGraph, ScalarType};
pub use matcher::MatchOptions;
pub use node::{load_str, Node, Scalar, ScalarKind};
pub use result::{ResultValue, ScalarValue};

/// Compile schema text into a ready-to-use [`Parser`].
///
/// Shorthand for [`Parser::compile`].
pub fn compile_schema(schema_text: &str) -> Result<Parser, Error> {
    Parser::compile(schema_text)
}

/// An opaque handle over a compiled rule graph, bound to its `main` entry
/// rule. Immutable once built; share it across threads at will.
#[derive(Debug, Clone)]
pub struct Parser {
    graph: RuleGraph,
    root: RuleBody,
    options: MatchOptions,
}

impl Parser {
    /// Compile a schema document: a YAML mapping of named rules, with
    /// `main` as the entry rule.
    pub fn compile(schema_text: &str) -> Result<Self, Error> {
        let schema = node::load_str(schema_text)?;
        let graph = compile::compile_graph(&schema)?;
        Ok(Self::over(graph))
    }

    /// Compile a single bare expression, wrapped as a one-rule schema
    /// with `main` bound to it. Useful for testing one rule at a time.
    pub fn from_expression(expression_text: &str) -> Result<Self, Error> {
        let expression = node::load_str(expression_text)?;
        let graph = compile::compile_expression(&expression)?;
        Ok(Self::over(graph))
    }

    /// Compile a bare regex check: the whole content document must be a
    /// string scalar fully matching `pattern`.
    pub fn from_regex(pattern: &str) -> Result<Self, Error> {
        let graph = compile::compile_regex(pattern)?;
        Ok(Self::over(graph))
    }

    fn over(graph: RuleGraph) -> Self {
        Self {
            graph,
            root: RuleBody::Document("main".to_string()),
            options: MatchOptions::default(),
        }
    }

    /// Replace the matcher options (e.g. the recursion limit).
    pub fn with_options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// The compiled rule graph behind this parser.
    pub fn graph(&self) -> &RuleGraph {
        &self.graph
    }

    /// Parse `content_text` as YAML and validate it against the schema.
    pub fn validate_str(&self, content_text: &str) -> Result<ResultValue, Error> {
        let content = node::load_str(content_text)?;
        self.validate(&content).map_err(Error::from)
    }

    /// Validate an already-loaded document against the schema.
    pub fn validate(&self, content: &Node) -> Result<ResultValue, ValidationError> {
        self.graph
            .validate_body(&self.root, content, &self.options)
    }
}
