mod classification;
mod object_detection;

pub use classification::ClassificationModel;
pub use object_detection::ObjectDetectionModel;

/// Model bound to a version, chosen by the version's project type.
#[derive(Debug, Clone)]
pub enum ModelHandle {
    ObjectDetection(ObjectDetectionModel),
    Classification(ClassificationModel),
}

impl ModelHandle {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            ModelHandle::ObjectDetection(model) => model.id(),
            ModelHandle::Classification(model) => model.id(),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            ModelHandle::ObjectDetection(model) => model.version(),
            ModelHandle::Classification(model) => model.version(),
        }
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        match self {
            ModelHandle::ObjectDetection(model) => model.is_local(),
            ModelHandle::Classification(model) => model.is_local(),
        }
    }
}
