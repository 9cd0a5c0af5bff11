use std::io;

use serde_json::Value;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("version record is missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("invalid version id {0:?}: expected \"<workspace>/<project>\"")]
    InvalidId(String),

    #[error(
        "no download type given and model format {model_format:?} has no default; \
         pass a download type or set the model format to \"yolov5\""
    )]
    MissingDownloadType { model_format: Option<String> },

    #[error("API request failed (HTTP {status}): {body}")]
    Remote { status: u16, body: Value },

    #[error("unexpected API response: {0}")]
    UnexpectedResponse(Value),

    #[error("the {project} project is not available in this ({workspace}) workspace")]
    ProjectNotInWorkspace { project: String, workspace: String },

    #[error("{0}")]
    Upload(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration: {0}")]
    Config(#[from] envy::Error),
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

/// Mirrors `anyhow::Context` for `io::Result`, producing [`Error::Io`].
pub(crate) trait IoContext<T> {
    fn context(self, context: &str) -> Result<T>;

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> IoContext<T> for io::Result<T> {
    fn context(self, context: &str) -> Result<T> {
        self.map_err(|source| Error::io(context, source))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|source| Error::io(f(), source))
    }
}
