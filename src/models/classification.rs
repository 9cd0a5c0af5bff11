use std::fmt;

#[derive(Clone)]
pub struct ClassificationModel {
    // Credential for inference requests issued by the host.
    #[allow(dead_code)]
    api_key: String,
    id: String,
    name: String,
    version: String,
    dataset_id: String,
    local: bool,
}

impl ClassificationModel {
    pub fn new(
        api_key: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        dataset_id: impl Into<String>,
        local: bool,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            id: id.into(),
            name: name.into(),
            version: version.into(),
            dataset_id: dataset_id.into(),
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

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    pub fn is_local(&self) -> bool {
        self.local
    }
}

impl fmt::Debug for ClassificationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassificationModel")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("dataset_id", &self.dataset_id)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}
