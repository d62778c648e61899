//! Course persistence
//!
//! Generated courses are handed to a [`CourseStore`]. Two backends ship with
//! the crate: [`InMemoryCourseStore`] for tests and ephemeral servers, and
//! [`SqliteCourseStore`] for durable storage. [`MarkdownCourseWriter`] exports
//! a stored course as a Markdown document.

pub mod markdown;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::StorageConfig;
use crate::models::{CourseCategory, CourseOutline};

pub use markdown::MarkdownCourseWriter;
pub use sqlite::SqliteCourseStore;

/// Storage failure
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("template error: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    #[error("render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("storage lock poisoned")]
    LockPoisoned,

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Lesson as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLesson {
    pub title: String,
    pub brief: String,
    pub content: String,
}

/// Module as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModule {
    pub title: String,
    pub lessons: Vec<StoredLesson>,
}

/// Course ready to be saved
#[derive(Debug, Clone, PartialEq)]
pub struct NewCourse {
    pub title: String,
    pub category: CourseCategory,
    pub modules: Vec<StoredModule>,
    pub published: bool,
}

impl From<CourseOutline> for NewCourse {
    fn from(outline: CourseOutline) -> Self {
        Self {
            title: outline.title,
            category: outline.category,
            modules: outline
                .modules
                .into_iter()
                .map(|m| StoredModule {
                    title: m.title,
                    lessons: m
                        .lessons
                        .into_iter()
                        .map(|l| StoredLesson {
                            title: l.title,
                            brief: l.brief,
                            content: l.content.unwrap_or_default(),
                        })
                        .collect(),
                })
                .collect(),
            published: true,
        }
    }
}

/// Persisted course with its assigned identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCourse {
    pub id: String,
    pub title: String,
    pub category: CourseCategory,
    pub modules: Vec<StoredModule>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

impl StoredCourse {
    /// Assign a fresh identifier and creation time
    pub fn from_new(course: NewCourse) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: course.title,
            category: course.category,
            modules: course.modules,
            published: course.published,
            created_at: Utc::now(),
        }
    }

    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }
}

/// Persistence port for generated courses
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Save a course and return it with its identifier
    async fn save(&self, course: NewCourse) -> Result<StoredCourse, StorageError>;

    /// Fetch a course by identifier
    async fn get(&self, id: &str) -> Result<Option<StoredCourse>, StorageError>;

    /// Remove a course; `false` when it did not exist
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Number of stored courses
    async fn count(&self) -> Result<usize, StorageError>;
}

/// Thread-safe shared store
pub type SharedCourseStore = Arc<dyn CourseStore>;

/// In-memory store
#[derive(Default)]
pub struct InMemoryCourseStore {
    courses: RwLock<HashMap<String, StoredCourse>>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn save(&self, course: NewCourse) -> Result<StoredCourse, StorageError> {
        let stored = StoredCourse::from_new(course);
        self.courses
            .write()
            .await
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<StoredCourse>, StorageError> {
        Ok(self.courses.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.courses.write().await.remove(id).is_some())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.courses.read().await.len())
    }
}

/// Open the store selected by configuration
pub fn open_store(config: &StorageConfig) -> Result<SharedCourseStore, StorageError> {
    match &config.sqlite_path {
        Some(path) => Ok(Arc::new(SqliteCourseStore::new(path)?)),
        None => {
            tracing::info!("No SQLite path configured, courses are kept in memory");
            Ok(Arc::new(InMemoryCourseStore::new()))
        }
    }
}
