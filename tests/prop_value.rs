use proptest::prelude::*;
use querylite::path::set_path;
use querylite::value::deep_eq;
use serde_json::{Value, json};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|i| json!(i)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            proptest::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_deep_eq_reflexive(v in arb_json()) {
        prop_assert!(deep_eq(&v, &v));
    }

    #[test]
    fn prop_deep_eq_symmetric(a in arb_json(), b in arb_json()) {
        prop_assert_eq!(deep_eq(&a, &b), deep_eq(&b, &a));
    }

    #[test]
    fn prop_reversed_arrays_only_equal_when_palindromic(v in proptest::collection::vec(any::<i64>(), 0..8)) {
        let forward = json!(v);
        let mut r = v.clone();
        r.reverse();
        let backward = json!(r);
        prop_assert_eq!(deep_eq(&forward, &backward), v == r);
    }

    #[test]
    fn prop_set_path_is_copy_on_write(v in arb_json(), x in any::<i64>()) {
        let before = v.clone();
        let _ = set_path(&v, "a.b", json!(x));
        prop_assert!(deep_eq(&v, &before));
    }

    #[test]
    fn prop_set_then_get_round_trips_on_objects(x in any::<i64>()) {
        let doc = json!({"k": 1});
        let out = set_path(&doc, "a.b.c", json!(x));
        prop_assert_eq!(querylite::path::get_path(&out, "a.b.c"), Some(&json!(x)));
    }
}
