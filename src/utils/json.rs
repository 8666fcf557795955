use serde_json::Value;

/// A PATCH field that distinguishes "leave alone" from "clear".
#[derive(Debug, PartialEq)]
pub enum NullableValue {
    Omitted,
    Null,
    String(String),
}

impl NullableValue {
    /// Collapses to the service convention where `Some("")` clears a field.
    pub fn into_change(self) -> Option<String> {
        match self {
            NullableValue::Omitted => None,
            NullableValue::Null => Some(String::new()),
            NullableValue::String(value) => Some(value),
        }
    }
}

pub fn classify_nullable(optional_value: Option<&Value>) -> Result<NullableValue, String> {
    match optional_value {
        None => Ok(NullableValue::Omitted),
        Some(Value::Null) => Ok(NullableValue::Null),
        Some(Value::String(s)) => Ok(NullableValue::String(s.to_owned())),
        Some(other) => Err(format!("expected string or null, got {other}")),
    }
}
