use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{
    api::{self, AnnotationOutcome, AnnotationRequest, UploadOptions},
    error::{Error, Result},
};

pub const OBJECT_DETECTION: &str = "object-detection";
pub const CLASSIFICATION: &str = "classification";

/// Project type tag as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectType {
    ObjectDetection,
    Classification,
    Other(String),
}

impl ProjectType {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            OBJECT_DETECTION => ProjectType::ObjectDetection,
            CLASSIFICATION => ProjectType::Classification,
            other => ProjectType::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ProjectType::ObjectDetection => OBJECT_DETECTION,
            ProjectType::Classification => CLASSIFICATION,
            ProjectType::Other(value) => value,
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProjectType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A project as described by the API, bound to the credential and API base that fetched it.
#[derive(Clone)]
pub struct Project {
    api_url: String,
    api_key: String,
    info: Value,
    model_format: Option<String>,
}

impl Project {
    pub(crate) fn new(api_url: &str, api_key: &str, info: Value, model_format: Option<&str>) -> Self {
        Self {
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
            info,
            model_format: model_format.map(str::to_string),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.info.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.info.get("name").and_then(Value::as_str)
    }

    pub fn project_type(&self) -> Option<ProjectType> {
        self.info
            .get("type")
            .and_then(Value::as_str)
            .map(ProjectType::parse)
    }

    pub fn model_format(&self) -> Option<&str> {
        self.model_format.as_deref()
    }

    /// Raw project description.
    pub fn info(&self) -> &Value {
        &self.info
    }

    /// Project slug used by the dataset endpoints: the id without its workspace.
    pub fn url(&self) -> Option<&str> {
        let id = self.id()?;
        Some(id.rsplit_once('/').map_or(id, |(_, project)| project))
    }

    pub fn upload(&self, image_path: &str, options: &UploadOptions) -> Result<Value> {
        api::upload_image(
            &self.api_url,
            &self.api_key,
            self.require_url()?,
            image_path,
            options,
        )
    }

    pub fn save_annotation(&self, request: &AnnotationRequest<'_>) -> Result<AnnotationOutcome> {
        api::save_annotation(&self.api_url, &self.api_key, self.require_url()?, request)
    }

    fn require_url(&self) -> Result<&str> {
        self.url()
            .ok_or_else(|| Error::MalformedRecord("project description has no `id`".into()))
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("api_url", &self.api_url)
            .field("info", &self.info)
            .field("model_format", &self.model_format)
            .finish_non_exhaustive()
    }
}
