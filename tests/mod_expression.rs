use querylite::errors::EngineError;
use querylite::expr::{evaluate, expression};
use serde_json::{Value, json};

fn ctx() -> Value {
    json!({"a": 5, "b": 10, "c": 20})
}

#[test]
fn field_references_resolve_by_path() {
    assert_eq!(evaluate(&json!("$a"), &ctx()).unwrap(), json!(5));
    assert_eq!(
        evaluate(&json!("$x.y"), &json!({"x": {"y": [7]}})).unwrap(),
        json!([7])
    );
    // A missing path is null, not an error.
    assert_eq!(evaluate(&json!("$missing.deep"), &ctx()).unwrap(), Value::Null);
}

#[test]
fn literals_pass_through_unchanged() {
    assert_eq!(evaluate(&json!(42), &ctx()).unwrap(), json!(42));
    assert_eq!(evaluate(&json!("plain"), &ctx()).unwrap(), json!("plain"));
    assert_eq!(evaluate(&json!([1, "$a"]), &ctx()).unwrap(), json!([1, "$a"]));
}

#[test]
fn arithmetic_operators() {
    assert_eq!(evaluate(&json!({"$add": ["$a", "$b"]}), &ctx()).unwrap(), json!(15));
    assert_eq!(evaluate(&json!({"$subtract": ["$b", "$a"]}), &ctx()).unwrap(), json!(5));
    assert_eq!(evaluate(&json!({"$multiply": ["$a", "$c"]}), &ctx()).unwrap(), json!(100));
    assert_eq!(evaluate(&json!({"$divide": ["$c", "$a"]}), &ctx()).unwrap(), json!(4));
    // Identity seeds accept any arity.
    assert_eq!(evaluate(&json!({"$add": []}), &ctx()).unwrap(), json!(0));
    assert_eq!(evaluate(&json!({"$multiply": "$a"}), &ctx()).unwrap(), json!(5));
    // Seedless folds require at least one operand.
    let err = evaluate(&json!({"$divide": []}), &ctx()).unwrap_err();
    assert!(matches!(err, EngineError::BadArgument(_)));
    let err = evaluate(&json!({"$add": ["$a", "oops"]}), &ctx()).unwrap_err();
    assert!(matches!(err, EngineError::TypeMismatch(_)));
}

#[test]
fn concat_joins_rendered_values() {
    let out = evaluate(&json!({"$concat": ["n=", "$a", "!"]}), &ctx()).unwrap();
    assert_eq!(out, json!("n=5!"));
}

#[test]
fn reductions_flatten_one_array_level() {
    let grades = json!({"scores": [3, 9, 6]});
    assert_eq!(evaluate(&json!({"$sum": "$scores"}), &grades).unwrap(), json!(18));
    assert_eq!(evaluate(&json!({"$avg": "$scores"}), &grades).unwrap(), json!(6));
    assert_eq!(evaluate(&json!({"$min": "$scores"}), &grades).unwrap(), json!(3));
    assert_eq!(evaluate(&json!({"$max": "$scores"}), &grades).unwrap(), json!(9));
    // The same operators also take N scalar arguments.
    assert_eq!(evaluate(&json!({"$max": ["$a", "$b"]}), &ctx()).unwrap(), json!(10));
    assert_eq!(evaluate(&json!({"$min": ["$a", "$b", 2]}), &ctx()).unwrap(), json!(2));
    assert_eq!(evaluate(&json!({"$min": []}), &ctx()).unwrap(), Value::Null);
    assert_eq!(evaluate(&json!({"$avg": [1, 2]}), &ctx()).unwrap(), json!(1.5));
}

#[test]
fn comparisons_and_membership() {
    assert_eq!(evaluate(&json!({"$eq": ["$a", 5]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$ne": ["$a", 10]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$gt": ["$c", "$b"]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$lt": ["$a", "$b"]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$gte": ["$b", 10]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$lte": ["$a", 5]}), &ctx()).unwrap(), json!(true));
    // Incomparable pairs simply do not match.
    assert_eq!(evaluate(&json!({"$gt": ["$a", "five"]}), &ctx()).unwrap(), json!(false));

    assert_eq!(evaluate(&json!({"$in": ["$a", 5]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$in": ["$a", [4, 6]]}), &ctx()).unwrap(), json!(false));
    assert_eq!(evaluate(&json!({"$nin": ["$a", [4, 6]]}), &ctx()).unwrap(), json!(true));
}

#[test]
fn logic_coerces_truthiness() {
    assert_eq!(evaluate(&json!({"$and": ["$a", "$b"]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$and": ["$a", "$missing"]}), &ctx()).unwrap(), json!(false));
    assert_eq!(evaluate(&json!({"$or": [0, "", "x"]}), &ctx()).unwrap(), json!(true));
    assert_eq!(evaluate(&json!({"$not": ["$missing"]}), &ctx()).unwrap(), json!(true));
}

#[test]
fn cond_evaluates_only_the_selected_branch() {
    let expr = json!({"$cond": [{"$gte": ["$a", 5]}, "big", {"$divide": []}]});
    // The malformed else-branch is never touched.
    assert_eq!(evaluate(&expr, &ctx()).unwrap(), json!("big"));
}

#[test]
fn switch_returns_the_first_matching_branch() {
    let expr = json!({"$switch": {
        "branches": [
            {"case": {"$lt": ["$a", 3]}, "then": "small"},
            {"case": {"$lt": ["$a", 8]}, "then": "medium"},
            {"case": {"$lt": ["$a", 100]}, "then": "large"}
        ],
        "default": "huge"
    }});
    assert_eq!(evaluate(&expr, &ctx()).unwrap(), json!("medium"));

    let no_match = json!({"$switch": {
        "branches": [{"case": false, "then": "never"}]
    }});
    let err = evaluate(&no_match, &ctx()).unwrap_err();
    assert!(matches!(err, EngineError::BadArgument(_)));
}

#[test]
fn unknown_operator_falls_back_to_the_literal_mapping() {
    let expr = json!({"$nosuch": [1, 2]});
    assert_eq!(evaluate(&expr, &ctx()).unwrap(), expr);
    // Multi-key mappings are literals, not operator invocations.
    let multi = json!({"$add": [1], "$multiply": [2]});
    assert_eq!(evaluate(&multi, &ctx()).unwrap(), multi);
}

#[test]
fn curried_adapter_matches_evaluate() {
    let double = expression(json!({"$multiply": ["$a", 2]}));
    assert_eq!(double(&ctx()).unwrap(), json!(10));
}
