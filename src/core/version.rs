use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use reqwest::{blocking::Client, StatusCode};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{
    api::{redact_key, response_body},
    config,
    error::{Error, IoContext, Result},
    models::{ClassificationModel, ModelHandle, ObjectDetectionModel},
};

use super::{
    download::{
        download_and_extract_with_progress, ConsoleProgress, DownloadOutcome, DownloadPlan,
        Progress,
    },
    project::ProjectType,
    require_fields,
};

pub const DEFAULT_DATASETS_DIR: &str = "../datasets";
pub const YOLOV5_MODEL_FORMAT: &str = "yolov5";
pub const YOLOV5_DOWNLOAD_TYPE: &str = "yolov5pytorch";

const REQUIRED_FIELDS: [&str; 6] = [
    "augmentation",
    "created",
    "id",
    "images",
    "preprocessing",
    "splits",
];

#[derive(Deserialize)]
struct VersionRecord {
    augmentation: Value,
    created: Value,
    id: String,
    #[serde(deserialize_with = "image_count")]
    images: u64,
    #[serde(deserialize_with = "map_or_empty")]
    preprocessing: Map<String, Value>,
    #[serde(deserialize_with = "map_or_empty")]
    splits: Map<String, Value>,
}

/// Accepts integral floats (`693.0`) as well as integers.
fn image_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|count| *count >= 0.0 && count.fract() == 0.0)
                .map(|count| count as u64)
        })
        .ok_or_else(|| de::Error::custom(format!("`images` is not an image count: {value}")))
}

fn map_or_empty<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Map<String, Value>, D::Error> {
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Serialize)]
struct VersionSummary<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a ProjectType,
    version: &'a str,
    augmentation: &'a Value,
    created: &'a Value,
    preprocessing: &'a Map<String, Value>,
    splits: &'a Map<String, Value>,
}

/// One immutable snapshot of a dataset and the model trained on it.
#[derive(Clone)]
pub struct Version {
    api_key: String,
    api_url: String,
    id: String,
    name: String,
    version: String,
    kind: ProjectType,
    augmentation: Value,
    created: Value,
    images: u64,
    preprocessing: Map<String, Value>,
    splits: Map<String, Value>,
    model_format: Option<String>,
    model: Option<ModelHandle>,
}

impl Version {
    /// Builds a version from the API's version description.
    ///
    /// `record` must carry `augmentation`, `created`, `id`, `images`,
    /// `preprocessing` and `splits`; the first absent key is reported as
    /// [`Error::MissingField`]. `images` is a non-negative count (integral
    /// floats included); a `null` `preprocessing` or `splits` reads as empty.
    /// Other shapes are [`Error::MalformedRecord`]. `id` must have the
    /// `"<workspace>/<project>"` form. The model handle is chosen by `kind` and is absent for types
    /// other than `object-detection` and `classification`.
    pub fn new(
        record: &Value,
        kind: &str,
        api_key: &str,
        name: &str,
        version: &str,
        model_format: Option<&str>,
        local: bool,
    ) -> Result<Self> {
        require_fields(record, &REQUIRED_FIELDS)?;
        let record: VersionRecord = serde_json::from_value(record.clone())
            .map_err(|error| Error::MalformedRecord(error.to_string()))?;
        if split_id(&record.id).is_none() {
            return Err(Error::InvalidId(record.id));
        }

        let kind = ProjectType::parse(kind);
        let model_version = basename(version);
        let model = match kind {
            ProjectType::ObjectDetection => Some(ModelHandle::ObjectDetection(
                ObjectDetectionModel::new(api_key, &record.id, name, model_version, local),
            )),
            ProjectType::Classification => Some(ModelHandle::Classification(
                ClassificationModel::new(
                    api_key,
                    &record.id,
                    name,
                    model_version,
                    &record.id,
                    local,
                ),
            )),
            ProjectType::Other(_) => None,
        };

        Ok(Self {
            api_key: api_key.to_string(),
            api_url: config::current().api_url.clone(),
            id: record.id,
            name: name.to_string(),
            version: version.to_string(),
            kind,
            augmentation: record.augmentation,
            created: record.created,
            images: record.images,
            preprocessing: record.preprocessing,
            splits: record.splits,
            model_format: model_format.map(str::to_string),
            model,
        })
    }

    /// Points this version at another API deployment.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn workspace(&self) -> &str {
        self.id_parts().0
    }

    pub fn project(&self) -> &str {
        self.id_parts().1
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> &ProjectType {
        &self.kind
    }

    pub fn augmentation(&self) -> &Value {
        &self.augmentation
    }

    pub fn created(&self) -> &Value {
        &self.created
    }

    /// `created` as a timestamp, when the API reported epoch seconds.
    pub fn created_at(&self) -> Option<OffsetDateTime> {
        let seconds = self.created.as_f64()?;
        OffsetDateTime::from_unix_timestamp_nanos((seconds * 1e9) as i128).ok()
    }

    pub fn images(&self) -> u64 {
        self.images
    }

    pub fn preprocessing(&self) -> &Map<String, Value> {
        &self.preprocessing
    }

    pub fn splits(&self) -> &Map<String, Value> {
        &self.splits
    }

    pub fn model_format(&self) -> Option<&str> {
        self.model_format.as_deref()
    }

    pub fn model(&self) -> Option<&ModelHandle> {
        self.model.as_ref()
    }

    /// `../datasets/<name>-<version>`
    #[must_use]
    pub fn default_location(&self) -> PathBuf {
        Path::new(DEFAULT_DATASETS_DIR).join(format!("{}-{}", self.name, self.version))
    }

    /// Resolves the export format, defaulting to `yolov5pytorch` for `yolov5` models.
    pub fn resolve_download_type<'a>(&self, download_type: Option<&'a str>) -> Result<&'a str> {
        match download_type {
            Some(download_type) => Ok(download_type),
            None if self.model_format.as_deref() == Some(YOLOV5_MODEL_FORMAT) => {
                Ok(YOLOV5_DOWNLOAD_TYPE)
            }
            None => Err(Error::MissingDownloadType {
                model_format: self.model_format.clone(),
            }),
        }
    }

    /// Downloads the export and extracts it into `location`, printing progress to stdout.
    pub fn download(
        &self,
        download_type: Option<&str>,
        location: Option<&Path>,
    ) -> Result<DownloadOutcome> {
        let download_type = self.resolve_download_type(download_type)?;
        let location = location
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_location());
        let mut console = ConsoleProgress::new(&location, download_type);
        self.download_with_progress(Some(download_type), Some(&location), |progress| {
            console.report(progress)
        })
    }

    /// Same as [`Version::download`], reporting progress to `progress` instead of stdout.
    pub fn download_with_progress<F>(
        &self,
        download_type: Option<&str>,
        location: Option<&Path>,
        progress: F,
    ) -> Result<DownloadOutcome>
    where
        F: FnMut(Progress<'_>),
    {
        let download_type = self.resolve_download_type(download_type)?;
        let location = location
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_location());
        fs::create_dir_all(&location)
            .with_context(|| format!("create download location {}", location.display()))?;

        let client = Client::builder().build()?;
        let link = self.export_link(&client, download_type)?;
        tracing::info!(
            "Downloading {} version {} as {} into {}",
            self.id,
            self.version,
            download_type,
            location.display()
        );

        let plan = DownloadPlan {
            uri: link,
            destination: location,
        };
        let outcome = download_and_extract_with_progress(&client, &plan, progress)?;
        tracing::info!(
            "Extracted {} entries into {}",
            outcome.extracted_entries,
            outcome.final_path.display()
        );
        Ok(outcome)
    }

    fn export_link(&self, client: &Client, download_type: &str) -> Result<String> {
        let url = self.download_url(download_type);
        tracing::debug!("GET {}", redact_key(&url));
        let response = client.get(&url).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Remote {
                status: status.as_u16(),
                body: response_body(response),
            });
        }

        let body: Value = response.json()?;
        let link = body
            .pointer("/export/link")
            .and_then(Value::as_str)
            .map(str::to_string);
        match link {
            Some(link) => Ok(link),
            None => Err(Error::UnexpectedResponse(body)),
        }
    }

    fn download_url(&self, download_type: &str) -> String {
        let (workspace, project) = self.id_parts();
        format!(
            "{}/{}/{}/{}/{}?api_key={}",
            self.api_url, workspace, project, self.version, download_type, self.api_key
        )
    }

    fn id_parts(&self) -> (&str, &str) {
        split_id(&self.id).unwrap_or((self.id.as_str(), ""))
    }

    fn summary(&self) -> VersionSummary<'_> {
        VersionSummary {
            name: &self.name,
            kind: &self.kind,
            version: &self.version,
            augmentation: &self.augmentation,
            created: &self.created,
            preprocessing: &self.preprocessing,
            splits: &self.splits,
        }
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        self.summary().serialize(serializer)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(&self.summary()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Version")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kind", &self.kind)
            .field("images", &self.images)
            .field("model_format", &self.model_format)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn split_id(id: &str) -> Option<(&str, &str)> {
    let (workspace, project) = id.split_once('/')?;
    if workspace.is_empty() || project.is_empty() || project.contains('/') {
        return None;
    }
    Some((workspace, project))
}

fn basename(version: &str) -> &str {
    version.rsplit('/').next().unwrap_or(version)
}
