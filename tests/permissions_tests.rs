use caraway::evaluator::EvaluateOptions;
use caraway::permissions::check_ast_permissions;
use caraway::schema::search_props_for_path;
use caraway::{check_ast_against_data_structure, convert_query, QueryError};
use serde_json::{json, Value};

fn records_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "public_code": {
                "type": "string",
                "search": {"queryable": "all", "operations": ["eq", "co"]}
            },
            "staff_code": {
                "type": "string",
                "search": {"queryable": "internal", "operations": ["eq"]}
            },
            "hidden_code": {
                "type": "string",
                "search": {"queryable": "none", "operations": ["eq"]}
            },
            "unannotated": {"type": "string"}
        }
    })
}

fn record_data() -> Value {
    json!({
        "public_code": "AAA",
        "staff_code": "BBB",
        "hidden_code": "CCC",
        "unannotated": "DDD"
    })
}

fn check(payload: Value, internal: bool) -> Result<(), QueryError> {
    let ast = convert_query(&payload).unwrap();
    check_ast_permissions(
        &ast,
        &records_schema(),
        &mut |path, schema| search_props_for_path(schema, path),
        internal,
    )
}

fn value_message(result: Result<(), QueryError>) -> String {
    match result.unwrap_err() {
        QueryError::Value(msg) => msg,
        other => panic!("expected a value error, got {:?}", other),
    }
}

// ============================================================================
// Queryable tiers
// ============================================================================

#[test]
fn test_all_tier_is_visible_to_everyone() {
    assert!(check(json!(["#eq", ["#resolve", "public_code"], "AAA"]), false).is_ok());
    assert!(check(json!(["#eq", ["#resolve", "public_code"], "AAA"]), true).is_ok());
}

#[test]
fn test_internal_tier_requires_elevated_access() {
    let msg = value_message(check(json!(["#eq", ["#resolve", "staff_code"], "BBB"]), false));
    assert!(msg.contains("staff_code"), "{}", msg);
    assert!(msg.contains("tier: internal"), "{}", msg);
    assert!(msg.contains("access: external"), "{}", msg);

    assert!(check(json!(["#eq", ["#resolve", "staff_code"], "BBB"]), true).is_ok());
}

#[test]
fn test_none_tier_is_never_visible() {
    assert!(check(json!(["#not", ["#resolve", "hidden_code"]]), false).is_err());
    let msg = value_message(check(json!(["#not", ["#resolve", "hidden_code"]]), true));
    assert!(msg.contains("tier: none"), "{}", msg);
}

#[test]
fn test_unannotated_fields_default_to_not_queryable() {
    assert!(check(json!(["#not", ["#resolve", "unannotated"]]), true).is_err());
}

// ============================================================================
// Operation allow-lists
// ============================================================================

#[test]
fn test_undeclared_operation_is_rejected() {
    let msg = value_message(check(json!(["#co", ["#resolve", "staff_code"], "B"]), true));
    assert!(msg.contains("Operation co"), "{}", msg);
    assert!(msg.contains("staff_code"), "{}", msg);
}

#[test]
fn test_declared_operations_are_accepted() {
    assert!(check(json!(["#co", ["#resolve", "public_code"], "A"]), false).is_ok());
}

#[test]
fn test_operations_between_literals_are_unrestricted() {
    // The allow-list governs fields, not literal-only comparisons
    assert!(check(json!(["#lt", 1, 2]), false).is_ok());
}

#[test]
fn test_operation_check_applies_to_either_argument_position() {
    assert!(check(json!(["#co", "B", ["#resolve", "staff_code"]]), true).is_err());
}

// The operation check only inspects *direct* resolve arguments of a
// comparison. A resolve wrapped in another expression gets its queryable
// tier enforced through recursion, but not its operations list. Pinned
// here as a known limitation.
#[test]
fn test_operation_check_is_shallow() {
    let result = check(
        json!(["#eq", ["#not", ["#resolve", "staff_code"]], true]),
        true,
    );
    assert!(result.is_ok());

    // The tier check still applies to the nested resolve
    let result = check(
        json!(["#eq", ["#not", ["#resolve", "staff_code"]], true]),
        false,
    );
    assert!(result.is_err());
}

// ============================================================================
// Enforcement through evaluation
// ============================================================================

#[test]
fn test_evaluation_runs_the_permission_check() {
    let ast = convert_query(&json!(["#eq", ["#resolve", "staff_code"], "BBB"])).unwrap();

    let external = EvaluateOptions::default();
    assert!(matches!(
        check_ast_against_data_structure(&ast, &record_data(), &records_schema(), &external),
        Err(QueryError::Value(_))
    ));

    let internal = EvaluateOptions {
        internal: true,
        ..EvaluateOptions::default()
    };
    let result =
        check_ast_against_data_structure(&ast, &record_data(), &records_schema(), &internal);
    assert_eq!(result.unwrap(), true);
}

#[test]
fn test_permission_check_can_be_skipped() {
    let ast = convert_query(&json!(["#eq", ["#resolve", "hidden_code"], "CCC"])).unwrap();
    let options = EvaluateOptions {
        check_permissions: false,
        ..EvaluateOptions::default()
    };
    let result =
        check_ast_against_data_structure(&ast, &record_data(), &records_schema(), &options);
    assert_eq!(result.unwrap(), true);
}
