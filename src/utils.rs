//! Small helpers shared by the API client.

use serde_json::{Map, Value};

/// Convert a `snake_case` key to `camelCase`
pub fn to_camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for (i, ch) in key.chars().enumerate() {
        if ch == '_' && i > 0 {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Convert the top-level keys of a JSON object to `camelCase`.
///
/// Nested values are left alone so that user-defined keys such as metadata
/// survive unchanged.
pub fn convert_keys_to_camel_case(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .map(|(key, value)| (to_camel_case(&key), value))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Split items into consecutive chunks of at most `size` elements
pub fn split_into_chunks<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Render a JSON value as a query parameter value
pub fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
