use schemars::JsonSchema;
use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Page size ceiling for `list_projects`.
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateProjectRequest {
    /// What to build. Sent to the default provider; the generated files become the project.
    pub prompt: String,
    /// Project title. Derived from the first words of the prompt when omitted.
    pub title: Option<String>,
    pub description: Option<String>,
    /// Authenticated user creating (and owning) the project.
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetProjectRequest {
    /// Share id returned by `create_project`.
    pub share_id: String,
    /// Caller's user id, if authenticated. Only used to report `is_owner`.
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListProjectsRequest {
    pub user_id: String,
    /// Max projects to return (default 50, max 200).
    pub limit: Option<usize>,
    /// Projects to skip, newest first (default 0).
    pub offset: Option<usize>,
}

impl ListProjectsRequest {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateFileRequest {
    pub file_id: String,
    /// Full replacement content.
    pub content: String,
    /// Must own the project the file belongs to.
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteProjectRequest {
    pub project_id: String,
    /// Must own the project.
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerationHistoryRequest {
    pub project_id: String,
    /// Must own the project.
    pub user_id: String,
}
