// Core data structures for course generation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Course category enumeration
///
/// This is the single list of categories offered to the model in the outline
/// prompt and accepted by the outline validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CourseCategory {
    Frontend,
    Backend,
    #[serde(rename = "Full Stack")]
    FullStack,
    DevOps,
    #[serde(rename = "Bases de Datos")]
    Databases,
    Testing,
    Mobile,
    #[serde(rename = "Data Science")]
    DataScience,
    Seguridad,
    Arquitectura,
}

impl CourseCategory {
    /// All categories, in prompt order
    pub const ALL: [CourseCategory; 10] = [
        Self::Frontend,
        Self::Backend,
        Self::FullStack,
        Self::DevOps,
        Self::Databases,
        Self::Testing,
        Self::Mobile,
        Self::DataScience,
        Self::Seguridad,
        Self::Arquitectura,
    ];

    /// Canonical label, as it must appear in generated JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "Frontend",
            Self::Backend => "Backend",
            Self::FullStack => "Full Stack",
            Self::DevOps => "DevOps",
            Self::Databases => "Bases de Datos",
            Self::Testing => "Testing",
            Self::Mobile => "Mobile",
            Self::DataScience => "Data Science",
            Self::Seguridad => "Seguridad",
            Self::Arquitectura => "Arquitectura",
        }
    }

    /// Short hint listing typical subjects, used in the outline prompt
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Frontend => "React, Vue, Angular, HTML/CSS, UI/UX",
            Self::Backend => "Node.js, Python, Java, APIs, servidores",
            Self::FullStack => "proyectos completos con frontend y backend",
            Self::DevOps => "Docker, CI/CD, Cloud, Kubernetes",
            Self::Databases => "SQL, NoSQL, PostgreSQL, MongoDB",
            Self::Testing => "tests unitarios, E2E, TDD",
            Self::Mobile => "React Native, Flutter, iOS, Android",
            Self::DataScience => "Python, Machine Learning, IA",
            Self::Seguridad => "ciberseguridad, ethical hacking",
            Self::Arquitectura => "patrones de diseño, Clean Code, microservicios",
        }
    }

    /// Parse a category label (exact, case-sensitive match)
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for CourseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lesson as produced by the outline phase
///
/// `content` stays `None` until the content-fill phase attaches a body
/// (either generated Markdown or a failure placeholder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonStub {
    pub title: String,
    pub brief: String,
    #[serde(rename = "content_md", default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Module of a course outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub title: String,
    pub lessons: Vec<LessonStub>,
}

/// Course outline, optionally with lesson bodies filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOutline {
    pub title: String,
    pub category: CourseCategory,
    pub modules: Vec<CourseModule>,
}

impl CourseOutline {
    /// Total number of lessons across all modules
    pub fn lesson_count(&self) -> usize {
        self.modules.iter().map(|m| m.lessons.len()).sum()
    }

    /// Whether every lesson has a body attached
    pub fn is_filled(&self) -> bool {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter())
            .all(|l| l.content.is_some())
    }

    /// Iterate lessons in outline order with their module title
    pub fn lessons(&self) -> impl Iterator<Item = (&str, &LessonStub)> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter().map(move |l| (m.title.as_str(), l)))
    }
}

/// Filled-in lesson body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonContent {
    #[serde(rename = "content_md")]
    pub content: String,
}

/// Generation job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states never transition again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a generation job, as exposed by status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationJob {
    pub id: String,
    pub topic: String,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_lesson: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a running job with zeroed counters
    pub fn new(id: impl Into<String>, topic: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            topic: topic.into(),
            status: JobStatus::Running,
            processed: 0,
            total: 0,
            result_id: None,
            error: None,
            current_lesson: None,
            started_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Progress event emitted after each lesson of the content-fill phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationProgress {
    pub processed: usize,
    pub total: usize,
    pub lesson_title: String,
}
