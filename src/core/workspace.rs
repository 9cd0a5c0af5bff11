use std::fmt;

use reqwest::{blocking::Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::{redact_key, response_body},
    config,
    error::{Error, Result},
};

use super::{project::Project, require_fields};

const REQUIRED_FIELDS: [&str; 4] = ["name", "projects", "members", "url"];

#[derive(Deserialize)]
struct WorkspaceRecord {
    name: String,
    url: String,
    members: Value,
    projects: Vec<Value>,
}

#[derive(Serialize)]
struct WorkspaceSummary<'a> {
    name: &'a str,
    url: &'a str,
    members: &'a Value,
    projects: &'a [Value],
}

#[derive(Clone)]
pub struct Workspace {
    api_key: String,
    api_url: String,
    name: String,
    url: String,
    members: Value,
    project_list: Vec<Value>,
    model_format: Option<String>,
}

impl Workspace {
    /// Builds a workspace from the API's `{"workspace": {...}}` description.
    pub fn new(info: &Value, api_key: &str, model_format: Option<&str>) -> Result<Self> {
        let record = info
            .get("workspace")
            .ok_or(Error::MissingField { field: "workspace" })?;
        require_fields(record, &REQUIRED_FIELDS)?;
        let record: WorkspaceRecord = serde_json::from_value(record.clone())
            .map_err(|error| Error::MalformedRecord(error.to_string()))?;

        Ok(Self {
            api_key: api_key.to_string(),
            api_url: config::current().api_url.clone(),
            name: record.name,
            url: record.url,
            members: record.members,
            project_list: record.projects,
            model_format: model_format.map(str::to_string),
        })
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn members(&self) -> &Value {
        &self.members
    }

    pub fn project_list(&self) -> &[Value] {
        &self.project_list
    }

    pub fn projects(&self) -> Vec<Project> {
        self.project_list
            .iter()
            .map(|info| {
                Project::new(
                    &self.api_url,
                    &self.api_key,
                    info.clone(),
                    self.model_format.as_deref(),
                )
            })
            .collect()
    }

    /// Prints the project descriptions to stdout.
    pub fn list_projects(&self) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(&self.project_list)?);
        Ok(())
    }

    /// Looks up a project of this workspace by name, accepting `"<workspace>/<project>"` too.
    pub fn project(&self, project_name: &str) -> Result<Project> {
        let prefix = format!("{}/", self.url);
        let project_name = project_name.strip_prefix(&prefix).unwrap_or(project_name);
        if project_name.contains('/') {
            return Err(Error::ProjectNotInWorkspace {
                project: project_name.to_string(),
                workspace: self.url.clone(),
            });
        }

        let url = format!(
            "{}/{}/{}?api_key={}",
            self.api_url, self.url, project_name, self.api_key
        );
        tracing::debug!("GET {}", redact_key(&url));
        let response = Client::builder().build()?.get(&url).send()?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Remote {
                status: status.as_u16(),
                body: response_body(response),
            });
        }

        let body: Value = response.json()?;
        let info = body.get("project").filter(|info| info.is_object()).cloned();
        match info {
            Some(info) => Ok(Project::new(
                &self.api_url,
                &self.api_key,
                info,
                self.model_format.as_deref(),
            )),
            None => Err(Error::UnexpectedResponse(body)),
        }
    }

    fn summary(&self) -> WorkspaceSummary<'_> {
        WorkspaceSummary {
            name: &self.name,
            url: &self.url,
            members: &self.members,
            projects: &self.project_list,
        }
    }
}

impl Serialize for Workspace {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.summary().serialize(serializer)
    }
}

impl fmt::Display for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(&self.summary()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("projects", &self.project_list.len())
            .field("model_format", &self.model_format)
            .finish_non_exhaustive()
    }
}
