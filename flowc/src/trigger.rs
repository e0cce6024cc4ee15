//! Decodes a trigger JSON file into the runtime's [`Value`] domain.
//!
//! This is the one input-decoding responsibility `flowc` keeps: a trigger
//! payload is an arbitrary JSON object, read with `serde_json` and mapped
//! field-for-field onto `Value`. Anything beyond JSON (CSV, spreadsheets)
//! is explicitly out of scope.

use flow_runtime::Value;
use std::path::Path;

use crate::error::{FlowcError, Result};

pub fn load_trigger_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| FlowcError::TriggerIo {
        path: path.to_path_buf(),
        source,
    })?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    json_to_value(json)
}

fn json_to_value(json: serde_json::Value) -> Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Empty,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => {
            let values = items.into_iter().map(json_to_value).collect::<Result<Vec<_>>>()?;
            Value::List(values)
        }
        serde_json::Value::Object(fields) => {
            let mut entries = Vec::with_capacity(fields.len());
            for (key, value) in fields {
                entries.push((key, json_to_value(value)?));
            }
            Value::record(entries)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn decodes_a_nested_object() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"request": {{"n": 42, "tags": ["a", "b"]}}}}"#).unwrap();

        let value = load_trigger_file(file.path()).unwrap();
        let Value::Record(fields) = value else {
            panic!("expected a record");
        };
        let Some(Value::Record(request)) = fields.get("request").cloned() else {
            panic!("expected a nested record");
        };
        assert_eq!(request.get("n"), Some(&Value::Number(42.0)));
        assert_eq!(
            request.get("tags"),
            Some(&Value::List(vec![Value::Text("a".to_string()), Value::Text("b".to_string())]))
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = load_trigger_file(Path::new("/nonexistent/trigger.json"));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        let result = load_trigger_file(file.path());
        assert!(matches!(result, Err(FlowcError::TriggerJson(_))));
    }
}
