mod upload;

use reqwest::blocking::Response;
use serde_json::Value;

pub use upload::{
    save_annotation, upload_image, AnnotationOutcome, AnnotationRequest, UploadOptions,
};

/// Reads a response body as JSON, keeping non-JSON bodies as a JSON string.
pub(crate) fn response_body(response: Response) -> Value {
    match response.text() {
        Ok(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        Err(error) => Value::String(error.to_string()),
    }
}

/// Redacts the `api_key` query value so URLs can be logged.
pub(crate) fn redact_key(url: &str) -> String {
    let Some(start) = url.find("api_key=") else {
        return url.to_string();
    };
    let value_start = start + "api_key=".len();
    let value_end = url[value_start..]
        .find('&')
        .map_or(url.len(), |offset| value_start + offset);
    format!("{}***{}", &url[..value_start], &url[value_end..])
}
