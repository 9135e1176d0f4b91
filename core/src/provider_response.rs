//! Response-shape decoding shared by the HTTP clients.
//!
//! Providers answer either with an envelope object holding a list under a
//! known key, or with the bare list. Each client decodes the body exactly once
//! into [`ProviderResponse`] and works on the items from there.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    /// Object carrying the item list under `key`.
    Envelope { key: &'static str, items: Vec<Value> },
    /// A top-level JSON array.
    RawList(Vec<Value>),
    /// Anything else; the string describes what was found.
    Malformed(String),
}

impl ProviderResponse {
    /// Decode `body`, trying the envelope keys in order of preference.
    ///
    /// A key that is present but not a list is skipped so a later key can
    /// still match; an object matching none of the keys is malformed.
    pub fn decode(body: Value, envelope_keys: &[&'static str]) -> Self {
        match body {
            Value::Array(items) => ProviderResponse::RawList(items),
            Value::Object(mut object) => {
                for &key in envelope_keys {
                    if !matches!(object.get(key), Some(Value::Array(_))) {
                        continue;
                    }
                    if let Some(Value::Array(items)) = object.remove(key) {
                        return ProviderResponse::Envelope { key, items };
                    }
                }
                let found: Vec<&str> = object.keys().map(String::as_str).collect();
                ProviderResponse::Malformed(format!(
                    "expected one of {envelope_keys:?} holding a list, found keys {found:?}"
                ))
            }
            other => ProviderResponse::Malformed(format!(
                "expected an object or a list, found {}",
                json_kind(&other)
            )),
        }
    }

    /// The decoded items, or the malformation description.
    pub fn into_items(self) -> Result<Vec<Value>, String> {
        match self {
            ProviderResponse::Envelope { items, .. } | ProviderResponse::RawList(items) => Ok(items),
            ProviderResponse::Malformed(reason) => Err(reason),
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
