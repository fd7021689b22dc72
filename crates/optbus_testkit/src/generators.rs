//! Property-based test generators using proptest.

use optbus_core::ini::{encode_hex, format_value};
use optbus_core::{Value, ValueType};
use proptest::prelude::*;

/// Strategy for value types that hold data (everything but events).
pub fn value_type_strategy() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::Array),
        Just(ValueType::Bool),
        Just(ValueType::Blob),
        Just(ValueType::Int),
        Just(ValueType::Str),
        Just(ValueType::Pointer),
    ]
}

/// Strategy for valid paths of the given type, outside the built-in `k/` tree.
pub fn path_strategy(value_type: ValueType) -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,8}(/[a-z0-9_]{1,8}){0,3}")
        .expect("Invalid regex")
        .prop_map(move |name| format!("{}:/t/{}", value_type.tag(), name))
}

/// Strategy for values of the given type that survive the text format.
pub fn value_strategy(value_type: ValueType) -> BoxedStrategy<Value> {
    match value_type {
        ValueType::Int | ValueType::Event => any::<i64>().prop_map(Value::Int).boxed(),
        ValueType::Bool => (0i64..=1).prop_map(Value::Int).boxed(),
        ValueType::Str => prop::string::string_regex("[ -~]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::Str)
            .boxed(),
        ValueType::Blob => prop::collection::vec(any::<u8>(), 0..32)
            .prop_map(Value::Blob)
            .boxed(),
        ValueType::Pointer => any::<usize>().prop_map(Value::Pointer).boxed(),
        ValueType::Array => prop::collection::vec(
            prop::string::string_regex("[a-z0-9]{1,6}").expect("Invalid regex"),
            0..4,
        )
        .prop_map(Value::Array)
        .boxed(),
    }
}

/// Strategy for one `(path, value)` pair.
pub fn entry_strategy() -> impl Strategy<Value = (String, Value)> {
    value_type_strategy()
        .prop_flat_map(|value_type| (path_strategy(value_type), value_strategy(value_type)))
}

/// Strategy for ini text with distinct keys, plus the pairs it encodes.
pub fn batch_strategy(max_lines: usize) -> impl Strategy<Value = (String, Vec<(String, Value)>)> {
    prop::collection::btree_map(
        value_type_strategy().prop_flat_map(path_strategy),
        Just(()),
        1..max_lines.max(2),
    )
    .prop_flat_map(|paths| {
        let values: Vec<_> = paths
            .keys()
            .map(|path| {
                let value_type = ValueType::from_path(path).expect("Generated path is valid");
                value_strategy(value_type)
            })
            .collect();
        (Just(paths.into_keys().collect::<Vec<_>>()), values)
    })
    .prop_map(|(paths, values)| {
        let pairs: Vec<_> = paths.into_iter().zip(values).collect();
        let text = pairs
            .iter()
            .map(|(path, value)| format!("{path}={}\n", format_value(value)))
            .collect();
        (text, pairs)
    })
}

/// Hex text of `bytes`, as blobs appear on the wire.
pub fn blob_text(bytes: &[u8]) -> String {
    encode_hex(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use optbus_core::{BatchOptions, Registry};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn generated_paths_are_valid(path in value_type_strategy().prop_flat_map(path_strategy)) {
            prop_assert!(ValueType::from_path(&path).is_ok());
            prop_assert!(!path.contains(' '));
        }

        #[test]
        fn batches_apply_to_a_fresh_registry((text, pairs) in batch_strategy(6)) {
            let registry = Registry::new();
            let applied = registry
                .set_batch_with(&text, BatchOptions::new().with_create_missing(true))
                .unwrap();
            prop_assert_eq!(applied, pairs.len());
            for (path, value) in &pairs {
                prop_assert_eq!(&registry.get(path).unwrap(), value);
            }
        }
    }

    #[test]
    fn blob_text_is_lowercase() {
        assert_eq!(blob_text(&[0xAB, 0x01]), "ab01");
    }
}
