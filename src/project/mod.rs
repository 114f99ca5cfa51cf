pub mod service;
pub mod store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CodesmithError;

pub use service::ProjectService;
pub use store::MemoryStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub prompt: String,
    /// Public id used in share links.
    pub share_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectFile {
    pub id: String,
    pub project_id: String,
    pub filename: String,
    pub content: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Flat record handed to the store for bulk insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub project_id: String,
    pub filename: String,
    pub content: String,
    pub language: String,
}

/// Fields for a new project row; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub title: String,
    pub description: Option<String>,
    pub prompt: String,
    pub share_id: String,
    pub user_id: String,
}

/// One recorded generation run that produced (or refreshed) a project.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub id: String,
    pub project_id: String,
    pub prompt: String,
    /// Model the vendor reported.
    pub model: String,
    pub provider: String,
    /// Input plus output tokens, when the vendor reported usage.
    pub tokens_used: Option<u64>,
    pub generation_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGeneration {
    pub project_id: String,
    pub prompt: String,
    pub model: String,
    pub provider: String,
    pub tokens_used: Option<u64>,
    pub generation_time_ms: u64,
}

/// Aggregates over a set of generation records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    pub total_generations: usize,
    /// Missing usage counts as zero.
    pub total_tokens: u64,
    /// 0.0 when there are no records.
    pub avg_generation_time_ms: f64,
}

impl GenerationStats {
    pub fn from_records(records: &[GenerationRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let total_time: u64 = records.iter().map(|r| r.generation_time_ms).sum();
        Self {
            total_generations: records.len(),
            total_tokens: records.iter().filter_map(|r| r.tokens_used).sum(),
            avg_generation_time_ms: total_time as f64 / records.len() as f64,
        }
    }
}

/// Persistence boundary for projects, their files and generation history.
///
/// Implementations own id generation and timestamps. Lookups return
/// `Ok(None)` for missing rows; errors are reserved for storage failures.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, project: NewProject) -> Result<Project, CodesmithError>;

    async fn insert_files(&self, files: Vec<FileRecord>)
    -> Result<Vec<ProjectFile>, CodesmithError>;

    async fn project_by_id(&self, id: &str) -> Result<Option<Project>, CodesmithError>;

    async fn project_by_share_id(&self, share_id: &str)
    -> Result<Option<Project>, CodesmithError>;

    /// Files of one project in insertion order.
    async fn files_for_project(&self, project_id: &str)
    -> Result<Vec<ProjectFile>, CodesmithError>;

    async fn file_by_id(&self, id: &str) -> Result<Option<ProjectFile>, CodesmithError>;

    async fn update_file_content(
        &self,
        id: &str,
        content: &str,
    ) -> Result<ProjectFile, CodesmithError>;

    async fn delete_files_for_project(&self, project_id: &str) -> Result<(), CodesmithError>;

    /// Removes the project row and its generation records.
    async fn delete_project(&self, id: &str) -> Result<(), CodesmithError>;

    /// A user's projects, newest first.
    async fn projects_for_user(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Project>, CodesmithError>;

    async fn insert_generation(
        &self,
        generation: NewGeneration,
    ) -> Result<GenerationRecord, CodesmithError>;

    /// Generation records of one project, newest first.
    async fn generations_for_project(
        &self,
        project_id: &str,
    ) -> Result<Vec<GenerationRecord>, CodesmithError>;

    /// Stats across every stored generation.
    async fn generation_stats(&self) -> Result<GenerationStats, CodesmithError>;
}

/// Title from the first five words of the prompt, capped at 50 characters,
/// with `...` when the prompt had more words.
pub fn title_from_prompt(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().collect();
    let head: String = words
        .iter()
        .take(5)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(50)
        .collect();
    if words.len() > 5 {
        format!("{head}...")
    } else {
        head
    }
}

/// 16 hex chars from the leading segments of two random UUIDs.
pub fn new_share_id() -> String {
    let segment = || {
        uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(8)
            .collect::<String>()
    };
    format!("{}{}", segment(), segment())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompt_title_is_unchanged() {
        assert_eq!(title_from_prompt("a todo app"), "a todo app");
    }

    #[test]
    fn long_prompt_title_is_truncated_with_ellipsis() {
        assert_eq!(
            title_from_prompt("build me a landing page for my bakery please"),
            "build me a landing page..."
        );
    }

    #[test]
    fn title_is_capped_at_fifty_chars() {
        let prompt = "a".repeat(80);
        assert_eq!(title_from_prompt(&prompt).chars().count(), 50);
    }

    fn record(tokens: Option<u64>, ms: u64) -> GenerationRecord {
        GenerationRecord {
            id: "g".to_string(),
            project_id: "p".to_string(),
            prompt: "x".to_string(),
            model: "m".to_string(),
            provider: "openai".to_string(),
            tokens_used: tokens,
            generation_time_ms: ms,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn stats_over_no_records_are_zero() {
        assert_eq!(GenerationStats::from_records(&[]), GenerationStats::default());
    }

    #[test]
    fn stats_sum_tokens_and_average_time() {
        let stats =
            GenerationStats::from_records(&[record(Some(100), 1000), record(None, 2000)]);
        assert_eq!(stats.total_generations, 2);
        assert_eq!(stats.total_tokens, 100);
        assert_eq!(stats.avg_generation_time_ms, 1500.0);
    }

    #[test]
    fn share_ids_are_sixteen_hex_chars_and_distinct() {
        let a = new_share_id();
        let b = new_share_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
