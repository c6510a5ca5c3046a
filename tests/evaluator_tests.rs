use caraway::evaluator::{
    collect_array_lengths, evaluate, index_combinations, matching_index_combinations,
    EvaluateOptions,
};
use caraway::{check_ast_against_data_structure, convert_query, QueryError};
use caraway::ast::Ast;
use serde_json::{json, Value};

fn patients_schema() -> Value {
    json!({
        "type": "object",
        "search": {"database": {"relation": "patients", "primary_key": "id"}},
        "properties": {
            "id": {
                "type": "string",
                "search": {"queryable": "internal", "operations": ["eq"]}
            },
            "karyotypic_sex": {
                "type": "string",
                "search": {"queryable": "all", "operations": ["eq", "in"]}
            },
            "age": {
                "type": "integer",
                "search": {"queryable": "all", "operations": ["eq", "lt", "le", "gt", "ge"]}
            },
            "notes": {
                "type": "string",
                "search": {
                    "queryable": "all",
                    "operations": ["co", "ico", "isw", "iew", "like", "ilike"]
                }
            },
            "biosamples": {
                "type": "array",
                "search": {"queryable": "all"},
                "items": {
                    "type": "object",
                    "search": {"queryable": "all"},
                    "properties": {
                        "sample_type": {
                            "type": "string",
                            "search": {"queryable": "all", "operations": ["eq", "co", "ico"]}
                        },
                        "procedures": {
                            "type": "array",
                            "search": {"queryable": "all"},
                            "items": {
                                "type": "object",
                                "search": {"queryable": "all"},
                                "properties": {
                                    "code": {
                                        "type": "string",
                                        "search": {"queryable": "all", "operations": ["eq"]}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "diseases": {
                "type": "array",
                "search": {"queryable": "all"},
                "items": {
                    "type": "object",
                    "search": {"queryable": "all"},
                    "properties": {
                        "label": {
                            "type": "string",
                            "search": {"queryable": "all", "operations": ["eq", "co"]}
                        }
                    }
                }
            }
        }
    })
}

fn patient_data() -> Value {
    json!({
        "id": "pat-1",
        "karyotypic_sex": "XO",
        "age": 30,
        "notes": "100% certain",
        "biosamples": [
            {"sample_type": "TEST", "procedures": [{"code": "A"}, {"code": "B"}]},
            {"sample_type": "DUMMY", "procedures": [{"code": "C"}]}
        ],
        "diseases": [{"label": "flu"}, {"label": "cold"}]
    })
}

fn query(payload: Value) -> Ast {
    convert_query(&payload).unwrap()
}

fn matches(payload: Value) -> bool {
    check_ast_against_data_structure(
        &query(payload),
        &patient_data(),
        &patients_schema(),
        &EvaluateOptions::default(),
    )
    .unwrap()
}

fn eval_one(payload: Value) -> Result<Value, QueryError> {
    evaluate(
        &query(payload),
        &patient_data(),
        &patients_schema(),
        None,
        &EvaluateOptions::default(),
    )
}

// ============================================================================
// Scalar comparisons
// ============================================================================

#[test]
fn test_eq_on_scalar_field() {
    assert!(matches(json!(["#eq", ["#resolve", "karyotypic_sex"], "XO"])));
    assert!(!matches(json!(["#eq", ["#resolve", "karyotypic_sex"], "XX"])));
}

#[test]
fn test_numeric_equality_is_exact_across_types() {
    // An integer field compared against a float literal with the same value
    assert!(matches(json!(["#eq", ["#resolve", "age"], 30.0])));
    assert!(!matches(json!(["#eq", ["#resolve", "age"], 30.5])));
}

#[test]
fn test_ordering_comparisons() {
    assert!(matches(json!(["#lt", ["#resolve", "age"], 30.5])));
    assert!(matches(json!(["#ge", ["#resolve", "age"], 30])));
    assert!(!matches(json!(["#gt", ["#resolve", "age"], 30])));
    assert!(matches(json!(["#le", ["#resolve", "age"], 30])));
}

#[test]
fn test_string_ordering_is_lexicographic() {
    assert_eq!(eval_one(json!(["#gt", "b", "a"])).unwrap(), json!(true));
    assert_eq!(eval_one(json!(["#lt", "Z", "a"])).unwrap(), json!(true));
}

#[test]
fn test_ordering_across_types_is_a_type_error() {
    assert!(matches!(
        eval_one(json!(["#lt", ["#resolve", "age"], "x"])),
        Err(QueryError::Type(_))
    ));
    assert!(matches!(
        eval_one(json!(["#gt", true, false])),
        Err(QueryError::Type(_))
    ));
}

// ============================================================================
// Boolean combinators
// ============================================================================

#[test]
fn test_combinator_truthiness() {
    assert_eq!(eval_one(json!(["#and", 1, "x"])).unwrap(), json!(true));
    assert_eq!(eval_one(json!(["#or", 0, ""])).unwrap(), json!(false));
    assert_eq!(eval_one(json!(["#not", 0])).unwrap(), json!(true));
}

#[test]
fn test_and_short_circuits_before_the_rhs_errors() {
    // The RHS would be a type error if evaluated
    let result = eval_one(json!([
        "#and",
        ["#eq", ["#resolve", "age"], 0],
        ["#lt", ["#resolve", "age"], "x"]
    ]));
    assert_eq!(result.unwrap(), json!(false));

    // With a truthy LHS the same RHS error does surface
    assert!(matches!(
        eval_one(json!([
            "#and",
            ["#eq", ["#resolve", "age"], 30],
            ["#lt", ["#resolve", "age"], "x"]
        ])),
        Err(QueryError::Type(_))
    ));
}

#[test]
fn test_or_short_circuits_before_the_rhs_errors() {
    let result = eval_one(json!([
        "#or",
        ["#eq", ["#resolve", "age"], 30],
        ["#lt", ["#resolve", "age"], "x"]
    ]));
    assert_eq!(result.unwrap(), json!(true));
}

// ============================================================================
// String matching
// ============================================================================

#[test]
fn test_containment_and_affix_matching() {
    assert!(matches(json!(["#co", ["#resolve", "notes"], "% cert"])));
    assert!(!matches(json!(["#co", ["#resolve", "notes"], "CERT"])));
    assert!(matches(json!(["#ico", ["#resolve", "notes"], "CERT"])));
    assert!(matches(json!(["#isw", ["#resolve", "notes"], "100"])));
    assert!(matches(json!(["#iew", ["#resolve", "notes"], "CERTAIN"])));
    assert!(!matches(json!(["#isw", ["#resolve", "notes"], "certain"])));
}

#[test]
fn test_string_matching_requires_string_operands() {
    assert!(matches!(
        eval_one(json!(["#isw", 5, "x"])),
        Err(QueryError::Type(_))
    ));
    assert!(matches!(
        eval_one(json!(["#co", "x", 5])),
        Err(QueryError::Type(_))
    ));
}

#[test]
fn test_like_wildcards() {
    // notes is "100% certain"
    assert!(matches(json!(["#like", ["#resolve", "notes"], "100%"])));
    assert!(matches(json!(["#like", ["#resolve", "notes"], "100_ certain"])));
    assert!(matches(json!(["#like", ["#resolve", "notes"], "%certain"])));
    // Patterns are anchored over the whole string
    assert!(!matches(json!(["#like", ["#resolve", "notes"], "certain"])));
}

#[test]
fn test_like_backslash_escapes_wildcards() {
    assert!(matches(json!(["#like", ["#resolve", "notes"], "100\\% certain"])));
    assert!(!matches(json!(["#like", ["#resolve", "notes"], "100\\%"])));
}

#[test]
fn test_like_treats_regex_metacharacters_literally() {
    assert!(!matches(json!(["#like", ["#resolve", "notes"], "100. certain"])));
    assert!(!matches(json!(["#like", ["#resolve", "notes"], "(100%) certain"])));
}

#[test]
fn test_ilike_is_case_insensitive() {
    assert!(matches(json!(["#ilike", ["#resolve", "notes"], "100% CERTAIN"])));
    assert!(!matches(json!(["#like", ["#resolve", "notes"], "100% CERTAIN"])));
}

// ============================================================================
// Membership
// ============================================================================

#[test]
fn test_in_list_membership() {
    assert!(matches(json!([
        "#in", ["#resolve", "karyotypic_sex"], ["#list", "XO", "XX"]
    ])));
    assert!(!matches(json!([
        "#in", ["#resolve", "karyotypic_sex"], ["#list", "XX", "XY"]
    ])));
}

#[test]
fn test_in_requires_a_list_rhs() {
    assert!(matches!(
        eval_one(json!(["#in", ["#resolve", "karyotypic_sex"], "XO"])),
        Err(QueryError::Type(_))
    ));
}

// ============================================================================
// Index combinations
// ============================================================================

#[test]
fn test_no_arrays_yields_one_empty_combination() {
    let ast = query(json!(["#eq", ["#resolve", "karyotypic_sex"], "XO"]));
    let forest = collect_array_lengths(&ast, &patient_data());
    let combinations = index_combinations(&forest);
    assert_eq!(combinations, vec![Default::default()]);
}

#[test]
fn test_single_array_yields_one_combination_per_element() {
    let ast = query(json!(["#eq", ["#resolve", "biosamples", "[item]", "sample_type"], "TEST"]));
    let forest = collect_array_lengths(&ast, &patient_data());
    let combinations = index_combinations(&forest);
    assert_eq!(combinations.len(), 2);
    for (i, combination) in combinations.iter().enumerate() {
        assert_eq!(combination["_root.biosamples"], i);
    }
}

#[test]
fn test_nested_arrays_sum_over_parent_indices() {
    // biosample 0 has two procedures, biosample 1 has one: 2 + 1
    let ast = query(json!([
        "#eq",
        ["#resolve", "biosamples", "[item]", "procedures", "[item]", "code"],
        "C"
    ]));
    let forest = collect_array_lengths(&ast, &patient_data());
    assert_eq!(index_combinations(&forest).len(), 3);
}

#[test]
fn test_independent_arrays_cross_multiply() {
    let ast = query(json!([
        "#and",
        ["#co", ["#resolve", "biosamples", "[item]", "sample_type"], "TE"],
        ["#eq", ["#resolve", "diseases", "[item]", "label"], "flu"]
    ]));
    let forest = collect_array_lengths(&ast, &patient_data());
    assert_eq!(index_combinations(&forest).len(), 4);
}

#[test]
fn test_combination_bound_is_enforced() {
    let options = EvaluateOptions {
        max_index_combinations: Some(2),
        ..EvaluateOptions::default()
    };
    let ast = query(json!([
        "#eq",
        ["#resolve", "biosamples", "[item]", "procedures", "[item]", "code"],
        "C"
    ]));
    let err = check_ast_against_data_structure(&ast, &patient_data(), &patients_schema(), &options)
        .unwrap_err();
    match err {
        QueryError::Value(msg) => assert!(msg.contains("index combinations"), "{}", msg),
        other => panic!("expected a value error, got {:?}", other),
    }
}

// ============================================================================
// Existential matching
// ============================================================================

#[test]
fn test_existential_match_over_array_elements() {
    assert!(matches(json!([
        "#co", ["#resolve", "biosamples", "[item]", "sample_type"], "TE"
    ])));
    assert!(!matches(json!([
        "#co", ["#resolve", "biosamples", "[item]", "sample_type"], "XYZ"
    ])));
}

#[test]
fn test_matching_combinations_name_the_elements() {
    let ast = query(json!(["#co", ["#resolve", "biosamples", "[item]", "sample_type"], "TE"]));
    let found = matching_index_combinations(
        &ast,
        &patient_data(),
        &patients_schema(),
        &EvaluateOptions::default(),
    )
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["_root.biosamples"], 0);
}

#[test]
fn test_matching_combinations_through_nested_arrays() {
    let ast = query(json!([
        "#eq",
        ["#resolve", "biosamples", "[item]", "procedures", "[item]", "code"],
        "C"
    ]));
    let found = matching_index_combinations(
        &ast,
        &patient_data(),
        &patients_schema(),
        &EvaluateOptions::default(),
    )
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["_root.biosamples"], 1);
    assert_eq!(found[0]["_root.biosamples.[item].procedures"], 0);
}

#[test]
fn test_conjunction_across_independent_arrays() {
    let ast = query(json!([
        "#and",
        ["#co", ["#resolve", "biosamples", "[item]", "sample_type"], "TE"],
        ["#eq", ["#resolve", "diseases", "[item]", "label"], "flu"]
    ]));
    let found = matching_index_combinations(
        &ast,
        &patient_data(),
        &patients_schema(),
        &EvaluateOptions::default(),
    )
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["_root.biosamples"], 0);
    assert_eq!(found[0]["_root.diseases"], 0);
}

// ============================================================================
// Resolution errors
// ============================================================================

#[test]
fn test_item_without_binding_is_an_index_binding_error() {
    // Single-combination evaluation with no combination supplied
    assert!(matches!(
        eval_one(json!(["#eq", ["#resolve", "biosamples", "[item]", "sample_type"], "TEST"])),
        Err(QueryError::IndexBinding(_))
    ));
}

#[test]
fn test_unknown_field_is_a_value_error() {
    assert!(matches!(
        eval_one(json!(["#eq", ["#resolve", "nonexistent"], 1])),
        Err(QueryError::Value(_))
    ));
}

#[test]
fn test_item_on_a_scalar_field_is_rejected() {
    assert!(eval_one(json!(["#eq", ["#resolve", "age", "[item]"], 1])).is_err());
}

// ============================================================================
// Wildcard helper is compiler-internal
// ============================================================================

#[test]
fn test_wildcard_function_is_rejected() {
    assert!(matches!(
        eval_one(json!(["#_wc", "abc", "contains"])),
        Err(QueryError::Type(_))
    ));
    // Rejected even when nested
    assert!(matches!(
        eval_one(json!(["#and", true, ["#_wc", "abc", "contains"]])),
        Err(QueryError::Type(_))
    ));
}

// ============================================================================
// Data validation
// ============================================================================

#[test]
fn test_mismatched_data_fails_validation() {
    let bad_data = json!({"age": "thirty"});
    let err = check_ast_against_data_structure(
        &query(json!(["#ge", ["#resolve", "age"], 18])),
        &bad_data,
        &patients_schema(),
        &EvaluateOptions::default(),
    )
    .unwrap_err();
    match err {
        // Secure by default: no data contents in the message
        QueryError::SchemaMismatch(msg) => assert!(!msg.contains("thirty"), "{}", msg),
        other => panic!("expected a schema mismatch, got {:?}", other),
    }
}

#[test]
fn test_verbose_validation_errors_name_the_path() {
    let bad_data = json!({"age": "thirty"});
    let options = EvaluateOptions {
        secure_errors: false,
        ..EvaluateOptions::default()
    };
    let err = check_ast_against_data_structure(
        &query(json!(["#ge", ["#resolve", "age"], 18])),
        &bad_data,
        &patients_schema(),
        &options,
    )
    .unwrap_err();
    match err {
        QueryError::SchemaMismatch(msg) => assert!(msg.contains("_root.age"), "{}", msg),
        other => panic!("expected a schema mismatch, got {:?}", other),
    }
}

#[test]
fn test_validation_can_be_skipped() {
    let bad_data = json!({"age": "thirty", "karyotypic_sex": "XO"});
    let options = EvaluateOptions {
        validate: false,
        ..EvaluateOptions::default()
    };
    let result = check_ast_against_data_structure(
        &query(json!(["#eq", ["#resolve", "karyotypic_sex"], "XO"])),
        &bad_data,
        &patients_schema(),
        &options,
    );
    assert_eq!(result.unwrap(), true);
}
