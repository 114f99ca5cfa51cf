use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::CodesmithError;
use crate::project::{
    FileRecord, GenerationRecord, GenerationStats, NewGeneration, NewProject, Project,
    ProjectFile, ProjectStore,
};

/// Every table keeps insertion order, which breaks `created_at` ties.
#[derive(Default)]
struct Tables {
    projects: Vec<Project>,
    files: Vec<ProjectFile>,
    generations: Vec<GenerationRecord>,
}

impl Tables {
    fn project(&self, id: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }
}

/// Newest first. Stable sort over reversed insertion order, so rows with
/// equal timestamps come back latest-inserted first.
fn newest_first<'a, T: Clone + 'a>(
    rows: impl DoubleEndedIterator<Item = &'a T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<T> {
    let mut rows: Vec<T> = rows.rev().cloned().collect();
    rows.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    rows
}

/// In-process `ProjectStore`. Contents live as long as the server.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn insert_project(&self, project: NewProject) -> Result<Project, CodesmithError> {
        let now = Utc::now();
        let row = Project {
            id: new_id(),
            title: project.title,
            description: project.description,
            prompt: project.prompt,
            share_id: project.share_id,
            user_id: project.user_id,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.inner.lock().await;
        if tables.projects.iter().any(|p| p.share_id == row.share_id) {
            return Err(CodesmithError::Other(format!(
                "share id collision: {}",
                row.share_id
            )));
        }
        tables.projects.push(row.clone());
        Ok(row)
    }

    async fn insert_files(
        &self,
        files: Vec<FileRecord>,
    ) -> Result<Vec<ProjectFile>, CodesmithError> {
        let now = Utc::now();
        let mut tables = self.inner.lock().await;

        // All-or-nothing: validate every record before inserting any.
        if files
            .iter()
            .any(|f| tables.project(&f.project_id).is_none())
        {
            return Err(CodesmithError::NotFound("project"));
        }

        let rows: Vec<ProjectFile> = files
            .into_iter()
            .map(|f| ProjectFile {
                id: new_id(),
                project_id: f.project_id,
                filename: f.filename,
                content: f.content,
                language: f.language,
                created_at: now,
                updated_at: now,
            })
            .collect();
        tables.files.extend(rows.iter().cloned());
        Ok(rows)
    }

    async fn project_by_id(&self, id: &str) -> Result<Option<Project>, CodesmithError> {
        Ok(self.inner.lock().await.project(id).cloned())
    }

    async fn project_by_share_id(
        &self,
        share_id: &str,
    ) -> Result<Option<Project>, CodesmithError> {
        Ok(self
            .inner
            .lock()
            .await
            .projects
            .iter()
            .find(|p| p.share_id == share_id)
            .cloned())
    }

    async fn files_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<ProjectFile>, CodesmithError> {
        Ok(self
            .inner
            .lock()
            .await
            .files
            .iter()
            .filter(|f| f.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn file_by_id(&self, id: &str) -> Result<Option<ProjectFile>, CodesmithError> {
        Ok(self
            .inner
            .lock()
            .await
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned())
    }

    async fn update_file_content(
        &self,
        id: &str,
        content: &str,
    ) -> Result<ProjectFile, CodesmithError> {
        let mut tables = self.inner.lock().await;
        let file = tables
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(CodesmithError::NotFound("file"))?;
        file.content = content.to_string();
        file.updated_at = Utc::now();
        Ok(file.clone())
    }

    async fn delete_files_for_project(&self, project_id: &str) -> Result<(), CodesmithError> {
        self.inner
            .lock()
            .await
            .files
            .retain(|f| f.project_id != project_id);
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<(), CodesmithError> {
        let mut tables = self.inner.lock().await;
        tables.projects.retain(|p| p.id != id);
        tables.generations.retain(|g| g.project_id != id);
        Ok(())
    }

    async fn projects_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Project>, CodesmithError> {
        let tables = self.inner.lock().await;
        let owned = tables.projects.iter().filter(|p| p.user_id == user_id);
        let projects = newest_first(owned, |p| p.created_at);
        Ok(projects.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert_generation(
        &self,
        generation: NewGeneration,
    ) -> Result<GenerationRecord, CodesmithError> {
        let mut tables = self.inner.lock().await;
        if tables.project(&generation.project_id).is_none() {
            return Err(CodesmithError::NotFound("project"));
        }
        let row = GenerationRecord {
            id: new_id(),
            project_id: generation.project_id,
            prompt: generation.prompt,
            model: generation.model,
            provider: generation.provider,
            tokens_used: generation.tokens_used,
            generation_time_ms: generation.generation_time_ms,
            created_at: Utc::now(),
        };
        tables.generations.push(row.clone());
        Ok(row)
    }

    async fn generations_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<GenerationRecord>, CodesmithError> {
        let tables = self.inner.lock().await;
        let rows = tables
            .generations
            .iter()
            .filter(|g| g.project_id == project_id);
        Ok(newest_first(rows, |g| g.created_at))
    }

    async fn generation_stats(&self) -> Result<GenerationStats, CodesmithError> {
        Ok(GenerationStats::from_records(
            &self.inner.lock().await.generations,
        ))
    }
}
