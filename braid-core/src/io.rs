//! Input/output value maps — the lingua franca between modules.

use serde_json::Value;

/// The value map passed into and out of every [`crate::Module`].
///
/// Keys are field names; values are arbitrary JSON. Pipelines merge these
/// maps as data flows between stages.
pub type IoMap = serde_json::Map<String, Value>;

/// Merge `overlay` into a copy of `base`. Keys in `overlay` win.
pub fn merge_maps(base: &IoMap, overlay: &IoMap) -> IoMap {
    let mut out = base.clone();
    for (k, v) in overlay {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// Build an [`IoMap`] from string key/value pairs. Test and demo helper.
pub fn map_of<I, K, V>(pairs: I) -> IoMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Read a field as a string slice, if present and textual.
pub fn get_str<'a>(map: &'a IoMap, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_overlay_wins() {
        let base = map_of([("a", json!(1)), ("b", json!(2))]);
        let overlay = map_of([("b", json!(20)), ("c", json!(3))]);
        let merged = merge_maps(&base, &overlay);
        assert_eq!(merged["a"], json!(1));
        assert_eq!(merged["b"], json!(20));
        assert_eq!(merged["c"], json!(3));
    }

    #[test]
    fn get_str_reads_textual_fields() {
        let m = map_of([("q", json!("hello")), ("n", json!(4))]);
        assert_eq!(get_str(&m, "q"), Some("hello"));
        assert_eq!(get_str(&m, "n"), None);
        assert_eq!(get_str(&m, "missing"), None);
    }
}
