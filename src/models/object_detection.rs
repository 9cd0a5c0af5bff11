use std::fmt;

#[derive(Clone)]
pub struct ObjectDetectionModel {
    // Credential for inference requests issued by the host.
    #[allow(dead_code)]
    api_key: String,
    id: String,
    name: String,
    version: String,
    local: bool,
}

impl ObjectDetectionModel {
    pub fn new(
        api_key: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        local: bool,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            id: id.into(),
            name: name.into(),
            version: version.into(),
            local,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_local(&self) -> bool {
        self.local
    }
}

impl fmt::Debug for ObjectDetectionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDetectionModel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}
