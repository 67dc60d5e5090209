//! Key-case conversion between the wire (snake_case) and memory (camelCase).

use heck::{ToLowerCamelCase, ToSnakeCase};
use serde_json::{Map, Value};

/// Rename every object key to camelCase, descending into arrays and nested
/// objects. Values are left untouched.
///
/// Leading underscores (`_id`, `__v`) are kept as they are.
pub fn to_camel_keys(value: Value) -> Value {
    rename_keys(value, &|key| keep_leading_underscores(key, |rest| rest.to_lower_camel_case()))
}

/// Rename every object key to snake_case.
pub fn to_snake_keys(value: Value) -> Value {
    rename_keys(value, &|key| keep_leading_underscores(key, |rest| rest.to_snake_case()))
}

fn keep_leading_underscores(key: &str, convert: impl Fn(&str) -> String) -> String {
    let rest = key.trim_start_matches('_');
    let prefix = &key[..key.len() - rest.len()];
    format!("{prefix}{}", convert(rest))
}

fn rename_keys(value: Value, rename: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (rename(&key), rename_keys(value, rename)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| rename_keys(item, rename))
                .collect(),
        ),
        other => other,
    }
}
