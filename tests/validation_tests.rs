//! End-to-end validation behavior: combinator semantics, result shapes,
//! error paths and aggregation policy, all through the public text API.

use yaml_sieve::{MatchOptions, Parser, ResultValue, ScalarValue};

fn accepts(schema: &str, content: &str) -> ResultValue {
    let parser = Parser::compile(schema).expect("schema should compile");
    match parser.validate_str(content) {
        Ok(value) => value,
        Err(err) => panic!("expected accept for {content:?}, got: {err}"),
    }
}

fn rejects(schema: &str, content: &str) -> String {
    let parser = Parser::compile(schema).expect("schema should compile");
    match parser.validate_str(content) {
        Ok(value) => panic!("expected reject for {content:?}, got: {value:?}"),
        Err(err) => err.to_string(),
    }
}

// ------------------------------- scalars --------------------------------- //

#[test]
fn scalar_type_matrix() {
    assert_eq!(
        accepts("main: string\n", "hello"),
        ResultValue::Scalar(ScalarValue::Str("hello".into()))
    );
    assert_eq!(
        accepts("main: int\n", "42"),
        ResultValue::Scalar(ScalarValue::Int(42))
    );
    // int content satisfies a float rule
    assert_eq!(
        accepts("main: float\n", "3"),
        ResultValue::Scalar(ScalarValue::Float(3.0))
    );
    assert_eq!(
        accepts("main: boolean\n", "true"),
        ResultValue::Scalar(ScalarValue::Bool(true))
    );
    assert_eq!(
        accepts("main: nullType\n", "~"),
        ResultValue::Scalar(ScalarValue::Null)
    );

    // a quoted number is a string, not an int
    assert!(rejects("main: int\n", "'42'").contains("expected an integer"));
    assert!(rejects("main: string\n", "42").contains("expected a string"));
    assert!(rejects("main: boolean\n", "yes").contains("expected a boolean"));
    assert!(rejects("main: int\n", "[1, 2]").contains("expected an integer"));
}

#[test]
fn timestamp_and_binary_scalars() {
    accepts("main: timestamp\n", "2023-01-15T10:30:00Z");
    accepts("main: timestamp\n", "2023-01-15T10:30:00.250+02:00");
    assert!(rejects("main: timestamp\n", "not-a-date").contains("timestamp"));

    accepts("main: binary\n", "SGVsbG8gd29ybGQ=");
    assert!(rejects("main: binary\n", "né…!").contains("base64"));
}

#[test]
fn any_accepts_arbitrary_trees() {
    let value = accepts("main: any\n", "items:\n  - 1\n  - nested:\n      x: true\n");
    let items = value.get("items").expect("items key");
    assert_eq!(items.items().map(<[ResultValue]>::len), Some(2));
}

// ---------------------- enum / range / regex ------------------------------ //

#[test]
fn enum_end_to_end() {
    let schema = "main:\n  _in: [a, b, c]\n";
    assert_eq!(
        accepts(schema, "b"),
        ResultValue::Scalar(ScalarValue::Str("b".into()))
    );
    let message = rejects(schema, "d");
    assert!(message.contains("'d'"), "got: {message}");
    assert!(message.contains("[a, b, c]"), "got: {message}");
}

#[test]
fn range_accepts_the_closed_interval() {
    let schema = "main:\n  _range: 1 <= int <= 3\n";
    for good in ["1", "2", "3"] {
        accepts(schema, good);
    }
    for bad in ["0", "4"] {
        let message = rejects(schema, bad);
        assert!(
            message.contains("outside the range 1 <= int <= 3"),
            "got: {message}"
        );
    }
}

#[test]
fn range_type_mismatch_is_distinct_from_out_of_bounds() {
    let schema = "main:\n  _range: 1 <= int <= 3\n";
    let message = rejects(schema, "x");
    assert!(message.contains("expected an integer"), "got: {message}");
    assert!(!message.contains("outside the range"), "got: {message}");
    // a float is not an int either
    assert!(rejects(schema, "2.5").contains("expected an integer"));
}

#[test]
fn float_range_accepts_ints_and_floats() {
    let schema = "main:\n  _range: 0 < float <= 1.5\n";
    accepts(schema, "0.5");
    accepts(schema, "1");
    assert!(rejects(schema, "0").contains("outside the range"));
    assert!(rejects(schema, "1.6").contains("outside the range"));
}

#[test]
fn regex_is_full_match_on_strings_only() {
    let schema = "main:\n  _regex: '[0-9]+'\n";
    accepts(schema, "'123'");
    let message = rejects(schema, "'12x'");
    assert!(message.contains("does not match /[0-9]+/"), "got: {message}");
    // an unquoted number is an int scalar, not a string
    assert!(rejects(schema, "123").contains("expected a string"));
}

// --------------------------- sequences ------------------------------------ //

#[test]
fn list_of_fails_fast_with_the_index_in_the_path() {
    let schema = "main:\n  _listOf: int\n";
    accepts(schema, "[1, 2, 3]");
    accepts(schema, "[]");
    let message = rejects(schema, "[1, oops, 2]");
    assert!(message.contains("[1]"), "got: {message}");
    assert!(message.contains("expected an integer"), "got: {message}");
    assert!(rejects(schema, "not-a-list").contains("expected a sequence"));
}

#[test]
fn tuple_checks_arity_before_elements() {
    let schema = "main:\n  _list: [int, string]\n";
    let message = rejects(schema, "[1]");
    assert!(message.contains("expected 2 entries, found 1"), "got: {message}");
    let message = rejects(schema, "[1, a, 3]");
    assert!(message.contains("expected 2 entries, found 3"), "got: {message}");

    let value = accepts(schema, "[1, two]");
    assert_eq!(
        value,
        ResultValue::Tuple(vec![
            ResultValue::Scalar(ScalarValue::Int(1)),
            ResultValue::Scalar(ScalarValue::Str("two".into())),
        ])
    );

    let message = rejects(schema, "[one, two]");
    assert!(message.contains("[0]"), "got: {message}");
}

#[test]
fn count_bounds_are_inclusive() {
    let schema = "main:\n  _listOf: int\n  _min: 2\n  _max: 4\n";
    for bad in ["[]", "[1]"] {
        let message = rejects(schema, bad);
        assert!(message.contains("at least 2"), "got: {message}");
    }
    for good in ["[1, 2]", "[1, 2, 3]", "[1, 2, 3, 4]"] {
        accepts(schema, good);
    }
    let message = rejects(schema, "[1, 2, 3, 4, 5]");
    assert!(message.contains("at most 4"), "got: {message}");
}

#[test]
fn length_violation_is_reported_before_element_errors() {
    let schema = "main:\n  _listOf: int\n  _min: 3\n";
    let message = rejects(schema, "[oops]");
    assert!(message.contains("at least 3"), "got: {message}");
    assert!(!message.contains("expected an integer"), "got: {message}");
}

#[test]
fn exact_count_via_nb() {
    let schema = "main:\n  _listOf: string\n  _nb: 2\n";
    accepts(schema, "[a, b]");
    assert!(rejects(schema, "[a]").contains("at least 2"));
    assert!(rejects(schema, "[a, b, c]").contains("at most 2"));
}

// ----------------------------- mappings ----------------------------------- //

#[test]
fn map_collects_every_key_defect_at_once() {
    let schema = "main:\n  name: string\n  age: int\n";
    let message = rejects(schema, "name: Ada\nextra: 1\n");
    assert!(message.contains("missing key 'age' in mapping"), "got: {message}");
    assert!(message.contains("unknown key 'extra'"), "got: {message}");
    assert!(message.contains("2 defects"), "got: {message}");
}

#[test]
fn map_values_fail_fast_once_the_key_set_is_sound() {
    let schema = "main:\n  name: string\n  age: int\n";
    let message = rejects(schema, "name: 1\nage: not-a-number\n");
    assert!(message.contains(".name"), "got: {message}");
    assert!(message.contains("expected a string"), "got: {message}");
    // the age defect is not reported: values are fail-fast
    assert!(!message.contains("age"), "got: {message}");
}

#[test]
fn facultative_keys_may_be_absent_but_not_unknown() {
    let schema = "main:\n  _map:\n    name: string\n  _mapFacultative:\n    nick: string\n";
    accepts(schema, "name: Ada\n");
    accepts(schema, "name: Ada\nnick: countess\n");
    assert!(rejects(schema, "nick: countess\n").contains("missing key 'name'"));
    assert!(rejects(schema, "name: Ada\nnick: 7\n").contains("expected a string"));
}

#[test]
fn map_of_aggregates_entry_failures() {
    let schema = "main:\n  _mapOf:\n    string: int\n";
    let value = accepts(schema, "a: 1\nb: 2\n");
    assert_eq!(value.get("b"), Some(&ResultValue::Scalar(ScalarValue::Int(2))));

    assert!(rejects(schema, "a: x\nb: 2\n").contains("1 invalid entry in mapping"));
    assert!(rejects(schema, "a: x\nb: y\n").contains("2 invalid entries in mapping"));
    assert!(rejects(schema, "1: 2\n").contains("does not match the key rule"));
}

#[test]
fn empty_mapping_matches_map_of() {
    accepts("main:\n  _mapOf:\n    string: int\n", "{}");
}

// ------------------------------- merge ------------------------------------ //

#[test]
fn merge_unions_declared_fields_with_map_of_members() {
    let schema = "\
main:
  _merge:
    - a
    - _mapOf:
        string: int
a:
  _map:
    x: string
";
    let value = accepts(schema, "extra: 5\nx: hi\n");
    let entries = value.entries().expect("merged entries");
    assert_eq!(entries[0].0, "extra");
    assert_eq!(entries[0].1, ResultValue::Scalar(ScalarValue::Int(5)));
    assert_eq!(entries[1].1, ResultValue::Scalar(ScalarValue::Str("hi".into())));

    let message = rejects(schema, "x: hi\nextra: nope\n");
    assert!(
        message.contains("key 'extra' does not satisfy any merge member"),
        "got: {message}"
    );
    assert!(rejects(schema, "extra: 5\n").contains("missing key 'x'"));
}

#[test]
fn merge_without_map_of_rejects_unknown_keys() {
    let schema = "\
main:
  _merge: [a, b]
a:
  _map:
    x: int
b:
  _map:
    y: string
";
    accepts(schema, "x: 1\ny: two\n");
    assert!(rejects(schema, "x: 1\ny: two\nz: 3\n").contains("unknown key 'z'"));
}

#[test]
fn merge_collision_between_map_of_members_is_a_runtime_error() {
    let schema = "\
main:
  _merge:
    - _mapOf:
        string: int
    - _mapOf:
        string: float
";
    // 5 converts to Int(5) and Float(5.0): two differing results
    let message = rejects(schema, "a: 5\n");
    assert!(
        message.contains("conflicting values for key 'a' in merged mapping"),
        "got: {message}"
    );
}

#[test]
fn merge_identical_map_of_results_deduplicate() {
    let schema = "\
main:
  _merge:
    - _mapOf:
        string: int
    - _mapOf:
        string: int
";
    let value = accepts(schema, "a: 5\n");
    assert_eq!(value.get("a"), Some(&ResultValue::Scalar(ScalarValue::Int(5))));
}

// ------------------------------ alternation ------------------------------- //

#[test]
fn one_of_returns_the_first_match() {
    // 5 satisfies both alternatives; the declared order decides the result.
    let float_first = accepts("main:\n  _oneOf: [float, int]\n", "5");
    assert_eq!(float_first, ResultValue::Scalar(ScalarValue::Float(5.0)));

    let int_first = accepts("main:\n  _oneOf: [int, float]\n", "5");
    assert_eq!(int_first, ResultValue::Scalar(ScalarValue::Int(5)));
}

#[test]
fn one_of_failure_carries_one_cause_per_alternative() {
    let parser = Parser::compile("main:\n  _oneOf: [int, string]\n").unwrap();
    let content = yaml_sieve::load_str("[]").unwrap();
    let err = parser.validate(&content).unwrap_err();
    assert_eq!(err.causes().len(), 2);
    let message = err.to_string();
    assert!(message.contains("none of the 2 alternatives matched"), "got: {message}");
    assert!(message.contains("expected an integer"), "got: {message}");
    assert!(message.contains("expected a string"), "got: {message}");
}

// ----------------------- recursion and paths ------------------------------ //

#[test]
fn recursive_tree_schemas_validate() {
    let schema = "\
main: tree
tree:
  _oneOf:
    - string
    - _map:
        left: tree
        right: tree
";
    accepts(schema, "left: a\nright:\n  left: b\n  right: c\n");
    let message = rejects(schema, "left: a\nright: [1]\n");
    assert!(message.contains("none of the 2 alternatives matched"), "got: {message}");
}

#[test]
fn recursion_limit_guards_deep_content() {
    let schema = "\
main:
  _oneOf:
    - string
    - _listOf: main
";
    let parser = Parser::compile(schema)
        .unwrap()
        .with_options(MatchOptions { max_depth: 10 });
    let deep = format!("{}x{}", "[".repeat(50), "]".repeat(50));
    let err = parser.validate_str(&deep).unwrap_err();
    assert!(
        err.to_string().contains("recursion limit exceeded"),
        "got: {err}"
    );

    // shallow content is fine under the same options
    parser.validate_str("[x, y]").unwrap();
}

#[test]
fn error_paths_point_at_the_violating_node() {
    let schema = "\
main:
  users:
    _listOf: user
user:
  name: string
";
    let message = rejects(schema, "users:\n  - name: Ada\n  - name: 5\n");
    assert!(
        message.contains("$(main).users[1](user).name"),
        "got: {message}"
    );
    assert!(message.contains("expected a string, got 5"), "got: {message}");
}

// ------------------------- API level properties --------------------------- //

#[test]
fn identical_compiles_validate_identically() {
    let schema = "main:\n  _oneOf: [int, user]\nuser:\n  name: string\n";
    let first = Parser::compile(schema).unwrap();
    let second = Parser::compile(schema).unwrap();

    let accept = "name: Ada\n";
    assert_eq!(
        first.validate_str(accept).unwrap(),
        second.validate_str(accept).unwrap()
    );

    let reject = "name: [broken]\n";
    assert_eq!(
        first.validate_str(reject).unwrap_err().to_string(),
        second.validate_str(reject).unwrap_err().to_string()
    );
}

#[test]
fn unknown_entry_rule_is_a_caller_error() {
    let parser = Parser::compile("main: int\n").unwrap();
    let content = yaml_sieve::load_str("3").unwrap();
    let err = parser
        .graph()
        .validate("nope", &content, &MatchOptions::default())
        .unwrap_err();
    assert!(
        err.to_string()
            .contains("entry rule 'nope' is not defined in the schema"),
        "got: {err}"
    );

    parser
        .graph()
        .validate("main", &content, &MatchOptions::default())
        .unwrap();
}

#[test]
fn a_compiled_parser_is_shared_across_threads() {
    let parser = Parser::compile("main:\n  _listOf:\n    _in: [a, b]\n").unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    parser.validate_str("[a, b, a]").unwrap();
                    assert!(parser.validate_str("[a, c]").is_err());
                }
            });
        }
    });
}

#[test]
fn expression_parser_wraps_main() {
    let parser = Parser::from_expression("_in: [a, b]").unwrap();
    parser.validate_str("a").unwrap();
    let err = parser.validate_str("c").unwrap_err();
    assert!(err.to_string().contains("'c'"), "got: {err}");
}

#[test]
fn regex_parser_checks_the_whole_document_scalar() {
    let parser = Parser::from_regex("[0-9]+").unwrap();
    parser.validate_str("'123'").unwrap();
    assert!(parser.validate_str("'12x'").unwrap_err().to_string().contains("/[0-9]+/"));
    assert!(parser
        .validate_str("[1]")
        .unwrap_err()
        .to_string()
        .contains("expected a string"));
}
