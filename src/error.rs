//! Path-aware error values for schema compilation and document validation.
//!
//! Every failure is a value, never a panic. Errors carry the path from the
//! document root to the offending node and, where a complete diagnosis
//! helps (map key sets, merge conflicts, alternation), a list of nested
//! causes. The rendered `Display` output is deterministic and is the
//! contract consumers substring-match against.

use std::fmt;

use thiserror::Error;

/// One step in the location trail attached to an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A mapping key.
    Key(String),
    /// A sequence index.
    Index(usize),
    /// A named rule the matcher descended into.
    Rule(String),
}

/// Ordered trail from the document root to a node.
///
/// Renders as `$` for the root, then `.key`, `[index]` and `(rule)`
/// segments, e.g. `$(main).users[3](user).name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    pub fn pop(&mut self) {
        self.segments.pop();
    }

    /// A copy of this path extended by one segment.
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut child = self.clone();
        child.push(segment);
        child
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Rule(rule) => write!(f, "({rule})")?,
            }
        }
        Ok(())
    }
}

/// Malformed YAML text, reported by the loader.
///
/// Duplicate mapping keys are a syntax error: the loader rejects the
/// document instead of letting one entry silently win.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    /// 1-based line of the failure, 0 when the parser gave no location.
    pub line: usize,
    /// 1-based column of the failure, 0 when the parser gave no location.
    pub column: usize,
    pub message: String,
}

/// Classification of a schema-compile failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// The schema root is not a mapping of rule names.
    Root,
    /// An expression names a rule that does not exist.
    Reference,
    /// A combinator keyword received parameters of the wrong shape.
    Combinator,
    /// Two merge members declare the same field with different rules.
    MergeConflict,
    /// A reference cycle can revisit a rule without consuming input.
    NonProductiveCycle,
    /// The schema never defines the `main` entry rule.
    MissingMain,
    /// A rule is defined but unreachable from `main`.
    UnusedRule,
    /// Aggregate of several independent schema defects.
    Multiple,
}

/// A schema that cannot be compiled into a rule graph.
///
/// Compile-time checking is exhaustive: all defects found in one pass are
/// collected as `causes` of a single `Multiple` error rather than stopping
/// at the first one.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub path: Path,
    pub message: String,
    pub causes: Vec<SchemaError>,
}

impl SchemaError {
    pub fn new(kind: SchemaErrorKind, path: Path, message: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub fn with_causes(
        kind: SchemaErrorKind,
        path: Path,
        message: impl Into<String>,
        causes: Vec<SchemaError>,
    ) -> Self {
        Self {
            kind,
            path,
            message: message.into(),
            causes,
        }
    }

    /// Collapse a list of defects into one error value.
    ///
    /// Returns `Ok(())` for an empty list, the sole defect unchanged for a
    /// singleton, and a `Multiple` wrapper otherwise.
    pub fn join(mut errors: Vec<SchemaError>) -> Result<(), SchemaError> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            n => Err(SchemaError::with_causes(
                SchemaErrorKind::Multiple,
                Path::root(),
                format!("schema has {n} errors"),
                errors,
            )),
        }
    }

    fn fmt_at_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        for cause in &self.causes {
            writeln!(f)?;
            write!(f, "{:indent$}", "", indent = (depth + 1) * 2)?;
            cause.fmt_at_depth(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at_depth(f, 0)
    }
}

impl std::error::Error for SchemaError {}

/// A document that does not satisfy the schema, or a misuse of the
/// validation entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Content failed a rule at `path`.
    Mismatch {
        path: Path,
        message: String,
        /// Non-empty only for alternation, map key-set defects, mapOf
        /// entries and merge collisions.
        causes: Vec<ValidationError>,
    },
    /// The matcher exceeded its configured recursion depth.
    RecursionLimitExceeded { path: Path },
    /// The caller asked for an entry rule the graph does not define.
    UnknownEntryRule { name: String },
}

impl ValidationError {
    pub fn new(path: Path, message: impl Into<String>) -> Self {
        Self::Mismatch {
            path,
            message: message.into(),
            causes: Vec::new(),
        }
    }

    pub fn with_causes(
        path: Path,
        message: impl Into<String>,
        causes: Vec<ValidationError>,
    ) -> Self {
        Self::Mismatch {
            path,
            message: message.into(),
            causes,
        }
    }

    /// The location the error points at, when it has one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Mismatch { path, .. } | Self::RecursionLimitExceeded { path } => Some(path),
            Self::UnknownEntryRule { .. } => None,
        }
    }

    /// Nested causes, empty for leaf errors.
    pub fn causes(&self) -> &[ValidationError] {
        match self {
            Self::Mismatch { causes, .. } => causes,
            _ => &[],
        }
    }

    fn fmt_at_depth(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        match self {
            Self::Mismatch {
                path,
                message,
                causes,
            } => {
                write!(f, "{path}: {message}")?;
                for cause in causes {
                    writeln!(f)?;
                    write!(f, "{:indent$}", "", indent = (depth + 1) * 2)?;
                    cause.fmt_at_depth(f, depth + 1)?;
                }
                Ok(())
            }
            Self::RecursionLimitExceeded { path } => {
                write!(f, "{path}: recursion limit exceeded")
            }
            Self::UnknownEntryRule { name } => {
                write!(f, "entry rule '{name}' is not defined in the schema")
            }
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_at_depth(f, 0)
    }
}

impl std::error::Error for ValidationError {}

/// Umbrella error for the text-in/text-out API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
