pub mod download;
pub mod project;
pub mod version;
pub mod workspace;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Checks `fields` in order and reports the first one absent from `record`.
pub(crate) fn require_fields<'a>(
    record: &'a Value,
    fields: &[&'static str],
) -> Result<&'a Map<String, Value>> {
    let object = record
        .as_object()
        .ok_or_else(|| Error::MalformedRecord(format!("expected a JSON object, got {record}")))?;
    for &field in fields {
        if !object.contains_key(field) {
            return Err(Error::MissingField { field });
        }
    }
    Ok(object)
}
