//! Schema compilation contract: exhaustive static checking, stable error
//! rendering, and the three parser construction modes.

use yaml_sieve::{Error, Parser, SchemaErrorKind};

fn compile_err(schema: &str) -> String {
    match Parser::compile(schema) {
        Ok(_) => panic!("expected a schema error for {schema:?}"),
        Err(err) => err.to_string(),
    }
}

#[test]
fn missing_main_rule() {
    let message = compile_err("root: int\n");
    assert!(message.contains("could not find the 'main' rule"), "got: {message}");
}

#[test]
fn unknown_reference_lists_known_rules() {
    let message = compile_err("main: missing\nuser:\n  name: string\n");
    assert!(
        message.contains("unknown rule identifier 'missing'"),
        "got: {message}"
    );
    assert!(message.contains("main"), "got: {message}");
    assert!(message.contains("user"), "got: {message}");
}

#[test]
fn merge_conflict_names_the_field_and_both_rules() {
    let schema = "\
main:
  _merge: [a, b]
a:
  _map:
    x: int
b:
  _map:
    x: string
";
    let message = compile_err(schema);
    assert!(message.contains("'x'"), "got: {message}");
    assert!(message.contains("int"), "got: {message}");
    assert!(message.contains("string"), "got: {message}");
}

#[test]
fn all_merge_conflicts_are_reported_together() {
    let schema = "\
main:
  _merge: [a, b, c]
a:
  _map:
    x: int
    y: int
b:
  _map:
    x: string
c:
  _map:
    y: boolean
";
    let message = compile_err(schema);
    assert!(message.contains("field 'x'"), "got: {message}");
    assert!(message.contains("field 'y'"), "got: {message}");
}

#[test]
fn non_productive_cycles_are_rejected() {
    assert!(compile_err("main: main\n").contains("references itself"));

    let message = compile_err("main:\n  _oneOf: [other, int]\nother: main\n");
    assert!(message.contains("without consuming input"), "got: {message}");
}

#[test]
fn unused_rules_are_rejected() {
    let message = compile_err("main: int\nleftover: string\n");
    assert!(
        message.contains("rule 'leftover' is defined but never used"),
        "got: {message}"
    );
}

#[test]
fn schema_root_must_be_a_mapping() {
    let message = compile_err("- not\n- a\n- mapping\n");
    assert!(message.contains("must be a mapping"), "got: {message}");
}

#[test]
fn malformed_yaml_is_a_syntax_error() {
    let err = Parser::compile("main: [1, 2\n").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)), "got: {err}");
}

#[test]
fn duplicate_rule_names_are_a_syntax_error() {
    let err = Parser::compile("main: int\nmain: string\n").unwrap_err();
    assert!(matches!(err, Error::Syntax(_)), "got: {err}");
}

#[test]
fn schema_error_kind_is_exposed() {
    let Err(Error::Schema(err)) = Parser::compile("other: int\n") else {
        panic!("expected a schema error");
    };
    assert_eq!(err.kind, SchemaErrorKind::MissingMain);
}

#[test]
fn several_defects_surface_in_one_compile() {
    // unknown reference and unused rule at the same time
    let schema = "main: missing\nleftover: int\n";
    let message = compile_err(schema);
    assert!(message.contains("'missing'"), "got: {message}");
}

#[test]
fn schema_error_rendering_is_deterministic() {
    let schema = "\
main:
  _merge: [a, b]
a:
  _map:
    x: int
    y: int
b:
  _map:
    x: string
    y: string
";
    assert_eq!(compile_err(schema), compile_err(schema));
}

#[test]
fn expression_mode_rejects_schema_level_defects() {
    let err = Parser::from_expression("_listOf: missing").unwrap_err();
    assert!(
        err.to_string().contains("unknown rule identifier 'missing'"),
        "got: {err}"
    );
}

#[test]
fn regex_mode_rejects_invalid_patterns() {
    let err = Parser::from_regex("(").unwrap_err();
    assert!(err.to_string().contains("invalid regex"), "got: {err}");
}

#[test]
fn graph_introspection() -> anyhow::Result<()> {
    let parser = Parser::compile("main: user\nuser:\n  name: string\n")?;
    assert_eq!(parser.graph().len(), 2);
    assert!(parser.graph().contains("user"));
    let names: Vec<&str> = parser.graph().rule_names().collect();
    assert_eq!(names, ["main", "user"]);
    Ok(())
}

#[test]
fn empty_map_checker_is_rejected() {
    let message = compile_err("main:\n  _map: {}\n");
    assert!(
        message.contains("at least one declared field"),
        "got: {message}"
    );
}

#[test]
fn combinator_misconfiguration_is_located() {
    let message = compile_err("main:\n  _range: sideways\n");
    assert!(message.contains("$(main)"), "got: {message}");
    assert!(message.contains("_range"), "got: {message}");
}
