use serde_json::{Map, Value};
use thiserror::Error;

/// Schema-less structured document attached to terminals (metadata) and jobs
/// (payload, result).
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("stored payload is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("stored payload is a JSON {found}, expected an object")]
    NotAnObject { found: &'static str },
}

/// Encode a document for storage.
///
/// A missing or empty document is stored as SQL `NULL`, never as `{}`, so
/// that it decodes back to `None`.
pub fn encode(document: Option<&Document>) -> Result<Option<String>, PayloadError> {
    match document {
        Some(doc) if !doc.is_empty() => Ok(Some(serde_json::to_string(doc)?)),
        _ => Ok(None),
    }
}

/// Decode a stored document. `NULL` and the JSON literal `null` both decode
/// to `None`; anything else must be a JSON object.
pub fn decode<B: AsRef<[u8]>>(stored: Option<B>) -> Result<Option<Document>, PayloadError> {
    let Some(bytes) = stored else {
        return Ok(None);
    };
    match serde_json::from_slice::<Value>(bytes.as_ref())? {
        Value::Null => Ok(None),
        Value::Object(doc) => Ok(Some(doc)),
        other => Err(PayloadError::NotAnObject {
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
