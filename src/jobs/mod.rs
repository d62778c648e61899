//! Generation job registry
//!
//! Decouples the multi-minute course generation from request/response
//! callers: [`JobRegistry::start_job`] returns an id immediately and runs the
//! generator on a detached task, callers poll [`JobRegistry::get_status`] and
//! may [`JobRegistry::cancel`] at any time.
//!
//! Job state machine: `running -> {completed, failed, cancelled}`. Once a job
//! is terminal no write touches its status, counters or result again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::error::{ApuntesErrorTrait, Error};
use crate::generator::{
    CancelReason, CancellationHandle, CancellationToken, CourseGenerator, GenerationError,
    ProgressObserver,
};
use crate::models::{CourseOutline, GenerationJob, GenerationProgress, JobStatus};
use crate::storage::{NewCourse, SharedCourseStore};
use crate::utils::short_message;

/// Longest error message kept on a job snapshot
const MAX_ERROR_CHARS: usize = 300;

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("topic must not be empty")]
    InvalidTopic,

    #[error("job not found: {0}")]
    NotFound(String),
}

/// Job record plus its exclusively owned cancellation handle
struct JobEntry {
    job: GenerationJob,
    cancel: CancellationHandle,
}

/// Job counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStats {
    pub total: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

/// In-memory registry of generation jobs
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    generator: Arc<CourseGenerator>,
    store: SharedCourseStore,
    deadline: Option<Duration>,
}

impl JobRegistry {
    /// Create a registry; the overall deadline comes from the generator's config
    pub fn new(generator: Arc<CourseGenerator>, store: SharedCourseStore) -> Self {
        let deadline = generator.config().deadline();
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            generator,
            store,
            deadline,
        }
    }

    /// Override the overall per-job deadline (`None` disables it)
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn store(&self) -> &SharedCourseStore {
        &self.store
    }

    /// Register a job and start generating in the background
    pub async fn start_job(&self, topic: &str) -> Result<String, JobError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(JobError::InvalidTopic);
        }

        let id = uuid::Uuid::new_v4().to_string();
        let handle = CancellationHandle::new();
        let token = handle.token();

        self.jobs.write().await.insert(
            id.clone(),
            JobEntry {
                job: GenerationJob::new(id.clone(), topic),
                cancel: handle,
            },
        );

        info!(job_id = %id, topic = %topic, "Generation job started");

        let registry = self.clone();
        let job_id = id.clone();
        let topic = topic.to_string();
        tokio::spawn(async move {
            registry.run(job_id, topic, token).await;
        });

        Ok(id)
    }

    /// Snapshot of a job
    pub async fn get_status(&self, id: &str) -> Result<GenerationJob, JobError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Request cancellation
    ///
    /// Terminal jobs are left untouched and their status returned. A running
    /// job is marked cancelled right away; the background task stops at its
    /// next lesson boundary.
    pub async fn cancel(&self, id: &str) -> Result<JobStatus, JobError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;

        if entry.job.status.is_terminal() {
            return Ok(entry.job.status);
        }

        entry.job.status = JobStatus::Cancelled;
        entry.job.touch();
        entry.cancel.cancel(CancelReason::User);

        info!(job_id = %id, processed = entry.job.processed, total = entry.job.total, "Job cancelled");
        Ok(JobStatus::Cancelled)
    }

    /// All jobs, newest first
    pub async fn list(&self) -> Vec<GenerationJob> {
        let mut jobs: Vec<_> = self
            .jobs
            .read()
            .await
            .values()
            .map(|entry| entry.job.clone())
            .collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    pub async fn stats(&self) -> JobStats {
        let jobs = self.jobs.read().await;
        let mut stats = JobStats {
            total: jobs.len(),
            ..JobStats::default()
        };

        for entry in jobs.values() {
            match entry.job.status {
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
            }
        }

        stats
    }

    /// Apply `update` only while the job is still running
    async fn update_running<F>(&self, id: &str, update: F) -> bool
    where
        F: FnOnce(&mut GenerationJob),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(entry) if entry.job.status == JobStatus::Running => {
                update(&mut entry.job);
                entry.job.touch();
                true
            }
            _ => false,
        }
    }

    /// Background body of one job
    async fn run(self, id: String, topic: String, token: CancellationToken) {
        let watchdog = self.deadline.map(|deadline| {
            let registry = self.clone();
            let id = id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                registry.expire(&id).await;
            })
        });

        let sink = JobProgressSink {
            registry: self.clone(),
            job_id: id.clone(),
        };

        match self.generator.generate(&topic, &sink, &token).await {
            Ok(course) => {
                if let Some(reason) = token.reason() {
                    self.finish_cancelled(&id, reason).await;
                } else {
                    self.persist(&id, course).await;
                }
            }
            Err(GenerationError::Cancelled(reason)) => {
                self.finish_cancelled(&id, reason).await;
            }
            Err(e) => {
                let message = {
                    let err = Error::from(e);
                    error!(job_id = %id, category = ?err.category(), error = %err, "Generation job failed");
                    err.to_string()
                };
                self.finish_failed(&id, &message).await;
            }
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }
    }

    async fn persist(&self, id: &str, course: CourseOutline) {
        match self.store.save(NewCourse::from(course)).await {
            Ok(stored) => {
                let result_id = stored.id.clone();
                let applied = self
                    .update_running(id, |job| {
                        job.status = JobStatus::Completed;
                        job.result_id = Some(result_id);
                    })
                    .await;

                if applied {
                    info!(job_id = %id, result_id = %stored.id, "Generation job completed");
                    return;
                }

                // cancelled while saving: nothing may reference the course
                match self.store.delete(&stored.id).await {
                    Ok(_) => warn!(
                        job_id = %id,
                        course_id = %stored.id,
                        "Job cancelled during save, stored course removed"
                    ),
                    Err(e) => error!(
                        job_id = %id,
                        course_id = %stored.id,
                        error = %e,
                        "Job cancelled during save, failed to remove stored course"
                    ),
                }
            }
            Err(e) => {
                let message = Error::from(e).to_string();
                error!(job_id = %id, error = %message, "Failed to persist generated course");
                self.finish_failed(id, &message).await;
            }
        }
    }

    async fn finish_failed(&self, id: &str, message: &str) {
        let message = short_message(message, MAX_ERROR_CHARS);
        self.update_running(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(message);
        })
        .await;
    }

    /// Covers a cancellation the registry has not recorded yet
    async fn finish_cancelled(&self, id: &str, reason: CancelReason) {
        self.update_running(id, |job| {
            job.status = JobStatus::Cancelled;
            if reason == CancelReason::Deadline {
                job.error = Some(reason.to_string());
            }
        })
        .await;
        info!(job_id = %id, reason = %reason, "Generation job stopped");
    }

    /// Deadline watchdog entry point
    async fn expire(&self, id: &str) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(id) {
            if entry.job.status == JobStatus::Running {
                entry.job.status = JobStatus::Cancelled;
                entry.job.error = Some(CancelReason::Deadline.to_string());
                entry.job.touch();
                entry.cancel.cancel(CancelReason::Deadline);
                warn!(job_id = %id, processed = entry.job.processed, "Generation deadline exceeded");
            }
        }
    }
}

/// Progress observer writing into one job record
pub struct JobProgressSink {
    registry: JobRegistry,
    job_id: String,
}

#[async_trait]
impl ProgressObserver for JobProgressSink {
    async fn on_total(&self, total: usize) {
        self.registry
            .update_running(&self.job_id, |job| job.total = total)
            .await;
    }

    async fn on_progress(&self, progress: GenerationProgress) {
        let applied = self
            .registry
            .update_running(&self.job_id, |job| {
                job.processed = progress.processed;
                job.total = progress.total;
                job.current_lesson = Some(progress.lesson_title.clone());
            })
            .await;

        if applied {
            info!(
                job_id = %self.job_id,
                processed = progress.processed,
                total = progress.total,
                "Lesson done"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::llm::{LlmError, TextGenerator};
    use crate::storage::InMemoryCourseStore;

    struct Unreachable;

    #[async_trait]
    impl TextGenerator for Unreachable {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            Err(LlmError::Status {
                status: 503,
                body: "provider down".to_string(),
            })
        }

        fn describe(&self) -> String {
            "unreachable".to_string()
        }
    }

    fn registry() -> JobRegistry {
        let generator =
            CourseGenerator::new(Arc::new(Unreachable), GenerationConfig::without_delays()).unwrap();
        JobRegistry::new(Arc::new(generator), Arc::new(InMemoryCourseStore::new()))
    }

    async fn wait_terminal(registry: &JobRegistry, id: &str) -> GenerationJob {
        for _ in 0..200 {
            let job = registry.get_status(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let registry = registry();
        assert_eq!(registry.start_job("   ").await, Err(JobError::InvalidTopic));
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = registry();
        assert!(matches!(
            registry.get_status("nope").await,
            Err(JobError::NotFound(_))
        ));
        assert!(matches!(
            registry.cancel("nope").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_outline_failure_marks_failed() {
        let registry = registry();
        let id = registry.start_job("  Kubernetes ").await.unwrap();

        let job = wait_terminal(&registry, &id).await;
        assert_eq!(job.topic, "Kubernetes");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.total, 0);
        assert!(job.result_id.is_none());
        let message = job.error.unwrap();
        assert!(message.contains("503"));
        assert!(message.chars().count() <= MAX_ERROR_CHARS);

        // terminal: cancel is a no-op returning the existing status
        assert_eq!(registry.cancel(&id).await, Ok(JobStatus::Failed));
        assert_eq!(registry.get_status(&id).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_stats_count_statuses() {
        let registry = registry();
        let a = registry.start_job("Go").await.unwrap();
        wait_terminal(&registry, &a).await;

        let stats = registry.stats().await;
        assert_eq!(stats.total, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.running, 0);
    }
}
