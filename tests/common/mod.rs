//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use apuntes::app::AppContext;
use apuntes::config::{Config, GenerationConfig};
use apuntes::jobs::JobRegistry;
use apuntes::llm::{LlmError, TextGenerator};
use apuntes::models::GenerationJob;
use apuntes::storage::{
    CourseStore, InMemoryCourseStore, NewCourse, SharedCourseStore, StorageError, StoredCourse,
};

/// Marker present only in outline prompts
const OUTLINE_MARKER: &str = "ESTRUCTURA COMPLETA";

/// Outline payload with `modules` x `lessons` valid entries
pub fn outline_json(title: &str, category: &str, modules: usize, lessons: usize) -> String {
    json!({
        "title": title,
        "category": category,
        "modules": (1..=modules).map(|m| json!({
            "title": format!("Módulo {m}"),
            "lessons": (1..=lessons).map(|l| json!({
                "title": lesson_title(m, l),
                "brief": format!("Resumen de la lección {m}.{l} con detalle suficiente."),
            })).collect::<Vec<_>>(),
        })).collect::<Vec<_>>(),
    })
    .to_string()
}

/// Title given to lesson `l` of module `m` by [`outline_json`]
pub fn lesson_title(m: usize, l: usize) -> String {
    format!("Lección {m}.{l}")
}

/// Valid lesson payload for `title`
pub fn lesson_json(title: &str) -> String {
    let body = format!("# {title}\n\n{}", "Contenido de la lección. ".repeat(12));
    json!({ "content_md": body }).to_string()
}

/// Scripted provider answering outline and lesson prompts
///
/// Outline answers are wrapped in a Markdown fence with prose around it.
pub struct ScriptedGenerator {
    outline: String,
    invalid_outlines: AtomicUsize,
    failing_lessons: HashSet<String>,
    pause_before_lesson: Option<usize>,
    pub outline_calls: AtomicUsize,
    pub lesson_calls: AtomicUsize,
    pub lesson_prompts: Mutex<Vec<String>>,
    /// Notified when the paused lesson call is reached
    pub reached: Notify,
    /// Release the paused lesson call
    pub release: Notify,
}

impl ScriptedGenerator {
    pub fn new(category: &str, modules: usize, lessons: usize) -> Self {
        Self {
            outline: outline_json("Curso de prueba", category, modules, lessons),
            invalid_outlines: AtomicUsize::new(0),
            failing_lessons: HashSet::new(),
            pause_before_lesson: None,
            outline_calls: AtomicUsize::new(0),
            lesson_calls: AtomicUsize::new(0),
            lesson_prompts: Mutex::new(Vec::new()),
            reached: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Answer the first `n` outline requests with schema-violating JSON
    pub fn with_invalid_outlines(self, n: usize) -> Self {
        self.invalid_outlines.store(n, Ordering::SeqCst);
        self
    }

    /// Make every request for this lesson fail at the provider
    pub fn with_failing_lesson(mut self, title: impl Into<String>) -> Self {
        self.failing_lessons.insert(title.into());
        self
    }

    /// Block the `n`-th lesson call (1-based) until [`Self::release`] fires
    pub fn with_pause_before_lesson(mut self, n: usize) -> Self {
        self.pause_before_lesson = Some(n);
        self
    }

    pub fn outline_calls(&self) -> usize {
        self.outline_calls.load(Ordering::SeqCst)
    }

    pub fn lesson_calls(&self) -> usize {
        self.lesson_calls.load(Ordering::SeqCst)
    }

    fn requested_lesson(prompt: &str) -> String {
        prompt
            .split("**Lección**: \"")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.contains(OUTLINE_MARKER) {
            self.outline_calls.fetch_add(1, Ordering::SeqCst);
            let invalid = self
                .invalid_outlines
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if invalid {
                return Ok(r#"{"title": "x", "category": "Cocina", "modules": []}"#.to_string());
            }
            return Ok(format!(
                "Aquí tienes la estructura:\n```json\n{}\n```",
                self.outline
            ));
        }

        let n = self.lesson_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.lesson_prompts
            .lock()
            .unwrap()
            .push(prompt.to_string());

        if self.pause_before_lesson == Some(n) {
            self.reached.notify_one();
            self.release.notified().await;
        }

        let title = Self::requested_lesson(prompt);
        if self.failing_lessons.contains(&title) {
            return Err(LlmError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            });
        }

        Ok(lesson_json(&title))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Generation config with every delay removed
pub fn fast_generation() -> GenerationConfig {
    GenerationConfig {
        deadline_secs: 0,
        ..GenerationConfig::without_delays()
    }
}

/// Application context wired to `client` and an in-memory store
pub fn context_with(client: Arc<ScriptedGenerator>) -> (Arc<AppContext>, SharedCourseStore) {
    let config = Config {
        generation: fast_generation(),
        ..Config::default()
    };
    let store: SharedCourseStore = Arc::new(InMemoryCourseStore::new());
    let context = AppContext::with_parts(config, client, store.clone()).unwrap();
    (Arc::new(context), store)
}

/// Context over an explicit store
pub fn context_with_store(
    client: Arc<ScriptedGenerator>,
    store: SharedCourseStore,
) -> Arc<AppContext> {
    let config = Config {
        generation: fast_generation(),
        ..Config::default()
    };
    Arc::new(AppContext::with_parts(config, client, store).unwrap())
}

/// In-memory store whose `save` blocks until [`Self::release`] fires
#[derive(Default)]
pub struct PausingStore {
    inner: InMemoryCourseStore,
    /// Notified when a save starts
    pub reached: Notify,
    /// Let the pending save finish
    pub release: Notify,
    /// Courses removed through `delete`
    pub deleted: AtomicUsize,
}

#[async_trait]
impl CourseStore for PausingStore {
    async fn save(&self, course: NewCourse) -> Result<StoredCourse, StorageError> {
        self.reached.notify_one();
        self.release.notified().await;
        self.inner.save(course).await
    }

    async fn get(&self, id: &str) -> Result<Option<StoredCourse>, StorageError> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let removed = self.inner.delete(id).await?;
        if removed {
            self.deleted.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StorageError> {
        self.inner.count().await
    }
}

/// Poll until the job leaves `running`
pub async fn wait_for_terminal(registry: &JobRegistry, id: &str) -> GenerationJob {
    for _ in 0..500 {
        let job = registry.get_status(id).await.unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not finish in time");
}

/// Poll until the job has processed at least `n` lessons
pub async fn wait_for_processed(registry: &JobRegistry, id: &str, n: usize) -> GenerationJob {
    for _ in 0..500 {
        let job = registry.get_status(id).await.unwrap();
        if job.processed >= n {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} never reached {n} processed lessons");
}
