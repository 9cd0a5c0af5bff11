//! Blocking client for dataset versions hosted on the Roboflow API.
//!
//! Hosts call [`config::init`] (and optionally [`logging::setup_logging`])
//! once, then build [`Version`]s from the API's version descriptions and
//! download their exports:
//!
//! ```no_run
//! # fn main() -> roboflow::Result<()> {
//! roboflow::config::init()?;
//! let record = serde_json::json!({
//!     "augmentation": {}, "created": 1650000000.0, "id": "acme/chess-pieces",
//!     "images": 693, "preprocessing": {}, "splits": {"train": 606},
//! });
//! let version = roboflow::Version::new(
//!     &record, "object-detection", "API_KEY", "chess-pieces", "3", Some("yolov5"), false,
//! )?;
//! version.download(None, None)?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod models;

pub use crate::core::{
    download::{DownloadOutcome, Progress, SkippedEntry},
    project::{Project, ProjectType},
    version::Version,
    workspace::Workspace,
};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{ClassificationModel, ModelHandle, ObjectDetectionModel};
