//! Application wiring
//!
//! Builds the provider client, course store, generator and job registry from
//! a [`Config`] so the binary, the HTTP server and tests share one setup path.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::generator::{CancelReason, CancellationToken, CourseGenerator, GenerationError, LoggingObserver};
use crate::jobs::{JobError, JobRegistry};
use crate::llm::{build_client, TextGenerator};
use crate::storage::{open_store, NewCourse, SharedCourseStore, StoredCourse};

/// Shared application components
pub struct AppContext {
    pub config: Config,
    pub client: Arc<dyn TextGenerator>,
    pub store: SharedCourseStore,
    pub generator: Arc<CourseGenerator>,
    pub registry: JobRegistry,
}

impl AppContext {
    /// Validate `config` and build every component from it
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let client = build_client(&config.llm)?;
        Self::with_client(config, client)
    }

    /// Build with an externally supplied provider client
    pub fn with_client(config: Config, client: Arc<dyn TextGenerator>) -> Result<Self> {
        let store = open_store(&config.storage)?;
        Self::with_parts(config, client, store)
    }

    /// Build from explicit parts
    pub fn with_parts(
        config: Config,
        client: Arc<dyn TextGenerator>,
        store: SharedCourseStore,
    ) -> Result<Self> {
        let generator = Arc::new(CourseGenerator::new(
            client.clone(),
            config.generation.clone(),
        )?);
        let registry = JobRegistry::new(generator.clone(), store.clone());

        Ok(Self {
            config,
            client,
            store,
            generator,
            registry,
        })
    }

    /// Generate and persist a course in the caller's task
    ///
    /// Blocking counterpart of [`JobRegistry::start_job`]; the overall
    /// deadline still applies.
    pub async fn generate_course(&self, topic: &str) -> Result<StoredCourse> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(JobError::InvalidTopic.into());
        }

        let token = CancellationToken::never();
        let generation = self.generator.generate(topic, &LoggingObserver, &token);

        let course = match self.config.generation.deadline() {
            Some(deadline) => tokio::time::timeout(deadline, generation)
                .await
                .map_err(|_| Error::from(GenerationError::Cancelled(CancelReason::Deadline)))??,
            None => generation.await?,
        };

        let stored = self.store.save(NewCourse::from(course)).await?;
        tracing::info!(id = %stored.id, title = %stored.title, "Course saved");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApuntesErrorTrait, ErrorCategory};
    use crate::llm::{LlmConfig, LlmProvider};

    #[test]
    fn test_from_default_config() {
        let context = AppContext::from_config(Config::default()).unwrap();
        assert!(context.client.describe().starts_with("ollama/"));
    }

    #[test]
    fn test_invalid_provider_config_rejected() {
        let config = Config {
            llm: LlmConfig::for_provider(LlmProvider::Gemini),
            ..Config::default()
        };

        let err = AppContext::from_config(config).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let context = AppContext::from_config(Config::default()).unwrap();
        let err = context.generate_course(" ").await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Input);
    }
}
