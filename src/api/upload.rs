use std::{fs, path::Path};

use reqwest::{
    blocking::{
        multipart::{Form, Part},
        Client, Response,
    },
    StatusCode, Url,
};
use serde_json::{json, Value};

use crate::{
    config,
    error::{Error, IoContext, Result},
};

use super::redact_key;

const DEFAULT_SPLIT: &str = "train";
const UPLOAD_FILE_NAME: &str = "imageToUpload";

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// `image_path` is a URL the API fetches itself instead of a local file.
    pub hosted_image: bool,
    /// Defaults to `train`.
    pub split: Option<String>,
    /// Defaults to the configured `DEFAULT_BATCH_NAME`. Ignored for hosted images.
    pub batch_name: Option<String>,
    pub tag_names: Vec<String>,
    /// Extra query parameters forwarded on local uploads.
    pub extra_params: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct AnnotationRequest<'a> {
    pub annotation_name: &'a str,
    pub annotation_string: &'a str,
    pub image_id: &'a str,
    pub is_prediction: bool,
    pub labelmap: Option<&'a Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationOutcome {
    Saved(Value),
    AlreadyAnnotated,
}

/// Uploads one image to `project_url` under `api_url` and returns the API's JSON reply.
pub fn upload_image(
    api_url: &str,
    api_key: &str,
    project_url: &str,
    image_path: &str,
    options: &UploadOptions,
) -> Result<Value> {
    let split = options.split.as_deref().unwrap_or(DEFAULT_SPLIT);
    let client = Client::builder().build()?;

    let response = if options.hosted_image {
        let url = hosted_upload_url(api_url, api_key, project_url, image_path, split)?;
        tracing::debug!("POST {}", redact_key(url.as_str()));
        client.post(url).send()?
    } else {
        let config = config::current();
        let batch_name = options
            .batch_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&config.default_batch_name);
        let url = local_upload_url(api_url, api_key, project_url, batch_name, options)?;
        let bytes = fs::read(image_path)
            .with_context(|| format!("read image {image_path}"))?;
        let form = Form::new()
            .text("name", file_name(image_path).to_string())
            .text("split", split.to_string())
            .part(
                "file",
                Part::bytes(bytes)
                    .file_name(UPLOAD_FILE_NAME)
                    .mime_str("image/jpeg")?,
            );
        tracing::debug!("POST {}", redact_key(url.as_str()));
        client.post(url).multipart(form).send()?
    };

    let (status, text, body) = read_reply(response);
    if status != StatusCode::OK {
        return Err(Error::Upload(match body {
            Some(body) => format!("Bad response: {}: {body}", status.as_u16()),
            None => format!("Bad response: {}: {text}", status.as_u16()),
        }));
    }
    let Some(body) = body else {
        return Err(Error::Upload(format!(
            "upload image {image_path} 200 OK, unexpected response: {text}"
        )));
    };
    if !(truthy(body.get("success")) || truthy(body.get("duplicate"))) {
        return Err(Error::Upload(format!("Server rejected image: {body}")));
    }
    tracing::info!("Uploaded {image_path} to {project_url}");
    Ok(body)
}

/// Saves an annotation for an already uploaded image.
pub fn save_annotation(
    api_url: &str,
    api_key: &str,
    project_url: &str,
    request: &AnnotationRequest<'_>,
) -> Result<AnnotationOutcome> {
    let url = annotation_url(api_url, api_key, project_url, request)?;
    let payload = json!({
        "data": request.annotation_string,
        "labelmap": request.labelmap,
    });

    tracing::debug!("POST {}", redact_key(url.as_str()));
    let response = Client::builder().build()?.post(url).json(&payload).send()?;
    let (status, text, body) = read_reply(response);

    let Some(body) = body else {
        return Err(annotation_error(request.image_id, status, &text, None));
    };
    if status != StatusCode::OK && status != StatusCode::CONFLICT {
        return Err(annotation_error(request.image_id, status, &text, Some(&body)));
    }
    if status == StatusCode::CONFLICT {
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if message.contains("already annotated") {
            tracing::warn!("Image {} is already annotated", request.image_id);
            return Ok(AnnotationOutcome::AlreadyAnnotated);
        }
        return Err(annotation_error(request.image_id, status, &text, Some(&body)));
    }
    if truthy(body.get("error")) || !truthy(body.get("success")) {
        return Err(annotation_error(request.image_id, status, &text, Some(&body)));
    }
    Ok(AnnotationOutcome::Saved(body))
}

fn local_upload_url(
    api_url: &str,
    api_key: &str,
    project_url: &str,
    batch_name: &str,
    options: &UploadOptions,
) -> Result<Url> {
    let mut url = endpoint(api_url, &format!("dataset/{project_url}/upload"))?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("api_key", api_key);
        query.append_pair("batch", batch_name);
        for (key, value) in &options.extra_params {
            query.append_pair(key, value);
        }
        for tag in &options.tag_names {
            query.append_pair("tag", tag);
        }
    }
    Ok(url)
}

fn hosted_upload_url(
    api_url: &str,
    api_key: &str,
    project_url: &str,
    image_path: &str,
    split: &str,
) -> Result<Url> {
    let mut url = endpoint(api_url, &format!("dataset/{project_url}/upload"))?;
    url.query_pairs_mut()
        .append_pair("api_key", api_key)
        .append_pair("name", file_name(image_path))
        .append_pair("split", split)
        .append_pair("image", image_path);
    Ok(url)
}

fn annotation_url(
    api_url: &str,
    api_key: &str,
    project_url: &str,
    request: &AnnotationRequest<'_>,
) -> Result<Url> {
    let path = format!("dataset/{project_url}/annotate/{}", request.image_id);
    let mut url = endpoint(api_url, &path)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("api_key", api_key);
        query.append_pair("name", request.annotation_name);
        if request.is_prediction {
            query.append_pair("prediction", "true");
        }
    }
    Ok(url)
}

fn endpoint(api_url: &str, path: &str) -> Result<Url> {
    let raw = format!("{}/{path}", api_url.trim_end_matches('/'));
    Url::parse(&raw).map_err(|error| Error::Upload(format!("invalid endpoint {raw}: {error}")))
}

fn file_name(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path)
}

/// Status, raw text and the JSON body when it is present and non-empty.
fn read_reply(response: Response) -> (StatusCode, String, Option<Value>) {
    let status = response.status();
    let text = response.text().unwrap_or_default();
    let body = serde_json::from_str::<Value>(&text)
        .ok()
        .filter(|value| truthy(Some(value)));
    (status, text, body)
}

fn annotation_error(image_id: &str, status: StatusCode, text: &str, body: Option<&Value>) -> Error {
    let detail = match body {
        None => text.to_string(),
        Some(body) => match body.get("error").filter(|error| truthy(Some(*error))) {
            Some(error) => error.to_string(),
            None => body.to_string(),
        },
    };
    Error::Upload(format!(
        "save annotation for {image_id} / bad response: {}: {detail}",
        status.as_u16()
    ))
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
