//! Dot-path JSON extractor (§4.8(c), §9 "small enough to implement
//! in-crate rather than pull in a JSONPath library").

use serde_json::Value;

/// Walks `root` following dot-separated `path` segments. Numeric segments
/// index into arrays; everything else indexes into objects.
pub fn extract<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Extracts and coerces to a number, accepting both JSON numbers and
/// numeric strings (§4.8(d): "require the extracted value to be numeric").
pub fn extract_numeric(root: &Value, path: &str) -> Option<f64> {
    let value = extract(root, path)?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_nested_object_field() {
        let body = json!({"data": {"price": {"usd": 42.5}}});
        assert_eq!(extract_numeric(&body, "data.price.usd"), Some(42.5));
    }

    #[test]
    fn extracts_through_array_index() {
        let body = json!({"items": [{"value": 7}, {"value": 9}]});
        assert_eq!(extract_numeric(&body, "items.1.value"), Some(9.0));
    }

    #[test]
    fn coerces_numeric_string() {
        let body = json!({"price": "123.45"});
        assert_eq!(extract_numeric(&body, "price"), Some(123.45));
    }

    #[test]
    fn missing_path_yields_none() {
        let body = json!({"data": {}});
        assert_eq!(extract_numeric(&body, "data.price.usd"), None);
    }

    #[test]
    fn non_numeric_leaf_yields_none() {
        let body = json!({"price": "not-a-number"});
        assert_eq!(extract_numeric(&body, "price"), None);
    }
}
