//! Two-phase course generation
//!
//! # Phases
//!
//! 1. **Outline**: one provider call returns course/module/lesson titles and
//!    briefs. Failure here (after retries) is fatal.
//! 2. **Content fill**: lessons are filled strictly in outline order, one
//!    provider call each, with a fixed pause before every call. A lesson that
//!    still fails after retries gets placeholder content instead of aborting
//!    the course.
//!
//! Cancellation is cooperative: the token is checked before the outline call
//! and before each lesson, never in the middle of a provider call.

pub mod cancel;
pub mod prompts;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::llm::{generate_safe_json, ExtractError, TextGenerator};
use crate::models::{CourseOutline, GenerationProgress};
use crate::schema::{LessonContentSchema, OutlineSchema, SchemaLimits};
use crate::utils::retry::RetryConfig;

pub use cancel::{CancelReason, CancellationHandle, CancellationToken};
pub use prompts::{PromptBuilder, PromptError};

/// Errors that end a generation
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Outline phase exhausted its attempts
    #[error("course outline generation failed: {0}")]
    Outline(#[source] ExtractError),

    /// Prompt template could not be rendered
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// Cancellation was observed; not a failure
    #[error("generation cancelled: {0}")]
    Cancelled(CancelReason),
}

impl GenerationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Receives progress from a running generation
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    /// Called once, after the outline phase, with the number of lessons
    async fn on_total(&self, total: usize);

    /// Called after every lesson, successful or placeholder
    async fn on_progress(&self, progress: GenerationProgress);
}

/// Observer that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

#[async_trait]
impl ProgressObserver for LoggingObserver {
    async fn on_total(&self, total: usize) {
        info!(total = total, "Outline ready");
    }

    async fn on_progress(&self, progress: GenerationProgress) {
        info!(
            processed = progress.processed,
            total = progress.total,
            lesson = %progress.lesson_title,
            "Lesson done"
        );
    }
}

/// Placeholder body for a lesson whose generation failed permanently
pub fn placeholder_content(error: &ExtractError) -> String {
    format!(
        "> Error: No se pudo generar el contenido para esta lección.\n> Detalles: {error}"
    )
}

/// Orchestrates outline and content-fill generation
pub struct CourseGenerator {
    client: Arc<dyn TextGenerator>,
    prompts: PromptBuilder,
    outline_schema: OutlineSchema,
    lesson_schema: LessonContentSchema,
    retry: RetryConfig,
    config: GenerationConfig,
}

impl CourseGenerator {
    pub fn new(client: Arc<dyn TextGenerator>, config: GenerationConfig) -> Result<Self, PromptError> {
        let limits = SchemaLimits::from(&config);

        Ok(Self {
            client,
            prompts: PromptBuilder::new(config.clone())?,
            outline_schema: OutlineSchema::new(limits),
            lesson_schema: LessonContentSchema::new(limits),
            retry: RetryConfig::from(&config),
            config,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate a complete course for `topic`
    ///
    /// Returns the outline with every lesson's `content` set (generated or
    /// placeholder). No partial course is ever returned.
    pub async fn generate(
        &self,
        topic: &str,
        observer: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> Result<CourseOutline, GenerationError> {
        info!(topic = %topic, client = %self.client.describe(), "Starting course generation");

        if let Some(reason) = cancel.reason() {
            return Err(GenerationError::Cancelled(reason));
        }

        let prompt = self.prompts.outline(topic)?;
        let mut course = generate_safe_json(
            self.client.as_ref(),
            &prompt,
            &self.outline_schema,
            &self.retry,
        )
        .await
        .map_err(GenerationError::Outline)?;

        let total = course.lesson_count();
        info!(
            topic = %topic,
            modules = course.modules.len(),
            total = total,
            "Outline accepted, filling lessons"
        );
        observer.on_total(total).await;

        let lesson_delay = self.config.lesson_delay();
        let mut processed = 0;

        for module in &mut course.modules {
            for lesson in &mut module.lessons {
                if let Some(reason) = cancel.reason() {
                    info!(topic = %topic, processed = processed, total = total, "Generation cancelled");
                    return Err(GenerationError::Cancelled(reason));
                }

                if !lesson_delay.is_zero() {
                    tokio::time::sleep(lesson_delay).await;
                }

                let prompt =
                    self.prompts
                        .lesson(topic, &module.title, &lesson.title, &lesson.brief)?;

                let content = match generate_safe_json(
                    self.client.as_ref(),
                    &prompt,
                    &self.lesson_schema,
                    &self.retry,
                )
                .await
                {
                    Ok(content) => content.content,
                    Err(e) => {
                        warn!(
                            lesson = %lesson.title,
                            error = %e,
                            "Lesson generation failed, using placeholder"
                        );
                        placeholder_content(&e)
                    }
                };

                lesson.content = Some(content);
                processed += 1;

                observer
                    .on_progress(GenerationProgress {
                        processed,
                        total,
                        lesson_title: lesson.title.clone(),
                    })
                    .await;
            }
        }

        info!(topic = %topic, total = total, "Course generated");
        Ok(course)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers outline prompts with a fixed outline and lesson prompts by
    /// echoing the lesson title; fails lessons listed in `failing`.
    struct Scripted {
        modules: usize,
        lessons: usize,
        failing: Vec<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(modules: usize, lessons: usize) -> Self {
            Self {
                modules,
                lessons,
                failing: Vec::new(),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn outline(&self) -> String {
            json!({
                "title": "Testing",
                "category": "Testing",
                "modules": (0..self.modules).map(|m| json!({
                    "title": format!("Módulo {m}"),
                    "lessons": (0..self.lessons).map(|l| json!({
                        "title": format!("Lección {m}-{l}"),
                        "brief": "Un resumen suficientemente largo para la lección."
                    })).collect::<Vec<_>>()
                })).collect::<Vec<_>>()
            })
            .to_string()
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());

            if prompt.contains("ESTRUCTURA COMPLETA") {
                return Ok(self.outline());
            }

            let title = prompt
                .split("**Lección**: \"")
                .nth(1)
                .and_then(|rest| rest.split('"').next())
                .unwrap_or_default()
                .to_string();

            if self.failing.contains(&title) {
                return Err(LlmError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }

            Ok(json!({ "content_md": format!("{title} {}", "x".repeat(250)) }).to_string())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Default)]
    struct Recorder {
        total: Mutex<Option<usize>>,
        events: Mutex<Vec<GenerationProgress>>,
    }

    #[async_trait]
    impl ProgressObserver for Recorder {
        async fn on_total(&self, total: usize) {
            *self.total.lock().unwrap() = Some(total);
        }

        async fn on_progress(&self, progress: GenerationProgress) {
            self.events.lock().unwrap().push(progress);
        }
    }

    fn generator(client: Arc<Scripted>) -> CourseGenerator {
        CourseGenerator::new(client, GenerationConfig::without_delays()).unwrap()
    }

    #[tokio::test]
    async fn test_fills_every_lesson_in_order() {
        let client = Arc::new(Scripted::new(6, 2));
        let recorder = Recorder::default();

        let course = generator(client.clone())
            .generate("Testing", &recorder, &CancellationToken::never())
            .await
            .unwrap();

        assert!(course.is_filled());
        assert_eq!(*recorder.total.lock().unwrap(), Some(12));

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), 12);
        let expected: Vec<_> = course.lessons().map(|(_, l)| l.title.clone()).collect();
        let seen: Vec<_> = events.iter().map(|e| e.lesson_title.clone()).collect();
        assert_eq!(seen, expected);
        assert!(events.windows(2).all(|w| w[0].processed + 1 == w[1].processed));

        // one outline call plus one per lesson
        assert_eq!(client.prompts.lock().unwrap().len(), 13);
    }

    #[tokio::test]
    async fn test_failed_lesson_gets_placeholder() {
        let mut scripted = Scripted::new(6, 2);
        scripted.failing.push("Lección 2-0".to_string());
        let client = Arc::new(scripted);
        let recorder = Recorder::default();

        let course = generator(client)
            .generate("Testing", &recorder, &CancellationToken::never())
            .await
            .unwrap();

        let body = course.modules[2].lessons[0].content.as_deref().unwrap();
        assert!(body.starts_with("> Error: No se pudo generar"));
        assert!(body.contains("after 3 attempts"));
        assert!(body.contains("boom"));
        assert_eq!(recorder.events.lock().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_outline_failure_is_fatal() {
        // 9 modules violates the outline bounds on every attempt
        let client = Arc::new(Scripted::new(9, 2));
        let recorder = Recorder::default();

        let err = generator(client.clone())
            .generate("Testing", &recorder, &CancellationToken::never())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Outline(ref e) if e.attempts() == 3));
        assert!(recorder.total.lock().unwrap().is_none());
        assert_eq!(client.prompts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let client = Arc::new(Scripted::new(6, 2));
        let handle = CancellationHandle::new();
        handle.cancel(CancelReason::User);

        let err = generator(client.clone())
            .generate("Testing", &LoggingObserver, &handle.token())
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(client.prompts.lock().unwrap().is_empty());
    }

    /// Cancels once a given number of lessons have been reported
    struct CancelAfter {
        after: usize,
        handle: CancellationHandle,
    }

    #[async_trait]
    impl ProgressObserver for CancelAfter {
        async fn on_total(&self, _total: usize) {}

        async fn on_progress(&self, progress: GenerationProgress) {
            if progress.processed == self.after {
                self.handle.cancel(CancelReason::User);
            }
        }
    }

    #[tokio::test]
    async fn test_cancel_checked_at_lesson_boundary() {
        let client = Arc::new(Scripted::new(6, 2));
        let observer = CancelAfter {
            after: 3,
            handle: CancellationHandle::new(),
        };
        let token = observer.handle.token();

        let err = generator(client.clone())
            .generate("Testing", &observer, &token)
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Cancelled(CancelReason::User)));
        // outline + 3 lessons, nothing after the signal
        assert_eq!(client.prompts.lock().unwrap().len(), 4);
    }
}
