//! Typed access to tool input objects.

use alin_core::ToolError;
use serde_json::Value;

pub(crate) fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    input[key]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("missing '{key}' argument")))
}

pub(crate) fn optional_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input[key].as_str()
}

pub(crate) fn optional_usize(input: &Value, key: &str) -> Option<usize> {
    input[key].as_u64().map(|n| usize::try_from(n).unwrap_or(usize::MAX))
}

pub(crate) fn flag(input: &Value, key: &str) -> bool {
    input[key].as_bool().unwrap_or(false)
}

/// Strings from an array argument, or from a whitespace-separated string.
pub(crate) fn string_list(input: &Value, key: &str) -> Result<Vec<String>, ToolError> {
    match &input[key] {
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must hold strings")))
            })
            .collect(),
        Value::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        _ => Err(ToolError::InvalidArguments(format!("missing '{key}' argument"))),
    }
}
