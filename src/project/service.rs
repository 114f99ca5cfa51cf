use std::sync::Arc;

use serde::Serialize;

use crate::error::CodesmithError;
use crate::generate::{GenerationMetadata, Generator};
use crate::parsers::sanitize_filename;
use crate::project::{
    FileRecord, GenerationRecord, GenerationStats, NewGeneration, NewProject, Project,
    ProjectFile, ProjectStore, new_share_id, title_from_prompt,
};
use crate::tools::generate::GenerateCodeRequest;
use crate::tools::project::CreateProjectRequest;

#[derive(Debug, Serialize)]
pub struct CreatedProject {
    pub project: Project,
    pub files: Vec<ProjectFile>,
    pub generation: GenerationMetadata,
}

/// A project's generation records, newest first, with stats over them.
#[derive(Debug, Serialize)]
pub struct GenerationHistory {
    pub project_id: String,
    pub generations: Vec<GenerationRecord>,
    pub stats: GenerationStats,
}

#[derive(Debug, Serialize)]
pub struct ProjectView {
    pub project: Project,
    pub files: Vec<ProjectFile>,
    pub is_owner: bool,
}

/// Ownership-scoped project operations on top of the generator and a store.
pub struct ProjectService {
    generator: Arc<Generator>,
    store: Arc<dyn ProjectStore>,
}

impl ProjectService {
    pub fn new(generator: Arc<Generator>, store: Arc<dyn ProjectStore>) -> Self {
        Self { generator, store }
    }

    /// Generate code for the prompt, then persist the project, its files and
    /// a generation record. Nothing is stored when generation fails, and the
    /// project is removed again if its files or record cannot be saved.
    /// Filenames are stored sanitized, so nested paths flatten to a single name.
    pub async fn create_project(
        &self,
        request: &CreateProjectRequest,
    ) -> Result<CreatedProject, CodesmithError> {
        let generated = self
            .generator
            .generate_code(&GenerateCodeRequest::new(request.prompt.clone()))
            .await?;

        let title = request
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_prompt(&request.prompt));

        let project = self
            .store
            .insert_project(NewProject {
                title,
                description: request.description.clone(),
                prompt: request.prompt.clone(),
                share_id: new_share_id(),
                user_id: request.user_id.clone(),
            })
            .await?;

        let records = generated
            .files
            .into_iter()
            .map(|f| FileRecord {
                project_id: project.id.clone(),
                filename: sanitize_filename(&f.filename),
                content: f.content,
                language: f.language,
            })
            .collect();
        let metadata = generated.metadata;
        let generation = NewGeneration {
            project_id: project.id.clone(),
            prompt: request.prompt.clone(),
            model: metadata.model.clone(),
            provider: metadata.provider.clone(),
            tokens_used: metadata
                .usage
                .as_ref()
                .map(|u| u.input_tokens + u.output_tokens),
            generation_time_ms: metadata.generation_time_ms,
        };

        let files = match self.persist_contents(records, generation).await {
            Ok(files) => files,
            Err(e) => {
                self.discard(&project.id).await;
                return Err(e);
            }
        };

        tracing::info!(
            "created project {} with {} file(s) for user {}",
            project.id,
            files.len(),
            project.user_id
        );

        Ok(CreatedProject {
            project,
            files,
            generation: metadata,
        })
    }

    async fn persist_contents(
        &self,
        records: Vec<FileRecord>,
        generation: NewGeneration,
    ) -> Result<Vec<ProjectFile>, CodesmithError> {
        let files = self.store.insert_files(records).await?;
        self.store.insert_generation(generation).await?;
        Ok(files)
    }

    /// Best-effort removal of a half-created project.
    async fn discard(&self, project_id: &str) {
        let cleanup = async {
            self.store.delete_files_for_project(project_id).await?;
            self.store.delete_project(project_id).await
        };
        if let Err(e) = cleanup.await {
            tracing::warn!("could not remove incomplete project {project_id}: {e}");
        }
    }

    /// Public lookup by share id. `is_owner` is true only for the owning user.
    pub async fn get_project(
        &self,
        share_id: &str,
        user_id: Option<&str>,
    ) -> Result<Option<ProjectView>, CodesmithError> {
        let Some(project) = self.store.project_by_share_id(share_id).await? else {
            return Ok(None);
        };
        let files = self.store.files_for_project(&project.id).await?;
        let is_owner = user_id.is_some_and(|u| u == project.user_id);
        Ok(Some(ProjectView {
            project,
            files,
            is_owner,
        }))
    }

    pub async fn update_file(
        &self,
        file_id: &str,
        content: &str,
        user_id: &str,
    ) -> Result<ProjectFile, CodesmithError> {
        let file = self
            .store
            .file_by_id(file_id)
            .await?
            .ok_or(CodesmithError::NotFound("file"))?;
        self.owned_project(&file.project_id, user_id).await?;
        self.store.update_file_content(file_id, content).await
    }

    /// Delete a project and all of its files.
    pub async fn delete_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<(), CodesmithError> {
        self.owned_project(project_id, user_id).await?;
        self.store.delete_files_for_project(project_id).await?;
        self.store.delete_project(project_id).await?;
        tracing::info!("deleted project {project_id}");
        Ok(())
    }

    pub async fn list_projects(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Project>, CodesmithError> {
        self.store.projects_for_user(user_id, limit, offset).await
    }

    /// Generation records of a project the user owns.
    pub async fn generation_history(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<GenerationHistory, CodesmithError> {
        self.owned_project(project_id, user_id).await?;
        let generations = self.store.generations_for_project(project_id).await?;
        Ok(GenerationHistory {
            project_id: project_id.to_string(),
            stats: GenerationStats::from_records(&generations),
            generations,
        })
    }

    /// Stats across all stored generations.
    pub async fn generation_stats(&self) -> Result<GenerationStats, CodesmithError> {
        self.store.generation_stats().await
    }

    async fn owned_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Project, CodesmithError> {
        let project = self
            .store
            .project_by_id(project_id)
            .await?
            .ok_or(CodesmithError::NotFound("project"))?;
        if project.user_id != user_id {
            return Err(CodesmithError::Forbidden);
        }
        Ok(project)
    }
}
