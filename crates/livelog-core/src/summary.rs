//! Summary document: latest value of every scalar plus the current step.
//!
//! The same file doubles as the resume checkpoint, so reading it back only
//! ever needs the `"step"` field.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{LiveError, Result};
use crate::storage;

/// Recursively merge `src` into `dst`.
///
/// Keys mapping to objects on both sides are merged; any other collision is
/// resolved in favour of `src`.
pub fn nested_update(dst: &mut Map<String, Value>, src: &Map<String, Value>) {
    for (key, incoming) in src {
        match (dst.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                nested_update(existing, incoming);
            }
            _ => {
                dst.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Build the summary from the step (if any) and each scalar's nested view.
pub fn build<'a>(step: Option<u64>, views: impl IntoIterator<Item = &'a Value>) -> Value {
    let mut summary = Map::new();
    if let Some(step) = step {
        summary.insert("step".to_string(), Value::from(step));
    }
    for view in views {
        if let Value::Object(view) = view {
            nested_update(&mut summary, view);
        }
    }
    Value::Object(summary)
}

pub fn write_summary(path: &Path, summary: &Value) -> Result<()> {
    storage::save_json(path, summary)
}

/// Parsed summary, or an empty object if the file does not exist.
pub fn read_latest(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }
    storage::load_json(path)
}

/// Step recorded in the summary; `0` if the file or the field is missing.
///
/// Integral floats (`5.0`) are accepted; any other value is an error.
pub fn read_step(path: &Path) -> Result<u64> {
    let latest = read_latest(path)?;
    let Some(step) = latest.get("step") else {
        return Ok(0);
    };
    if let Some(step) = step.as_u64() {
        return Ok(step);
    }
    match step.as_f64() {
        Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
        _ => Err(LiveError::InvalidOption(format!(
            "recorded step `{}` in {} is not a non-negative integer",
            step,
            path.display()
        ))),
    }
}

/// Flatten nested objects into `a/b` keys, in document order.
pub fn flatten(summary: &Value) -> Vec<(String, Value)> {
    let mut out = vec![];
    if let Value::Object(map) = summary {
        flatten_into("", map, &mut out);
    }
    out
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut Vec<(String, Value)>) {
    for (key, value) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}/{}", prefix, key)
        };
        match value {
            Value::Object(inner) => flatten_into(&name, inner, out),
            other => out.push((name, other.clone())),
        }
    }
}
