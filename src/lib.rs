//! apuntes - AI-backed course generation service
//!
//! Generates structured course notes ("apuntes") from a topic by asking a
//! generative-text provider for an outline and then for every lesson body,
//! with schema validation, bounded retries, progress reporting and
//! cooperative cancellation.
//!
//! # Architecture
//!
//! - [`schema`] - Declarative contracts for the outline and lesson payloads
//! - [`llm`] - Provider clients and safe JSON extraction with retry
//! - [`generator`] - Two-phase course generation with progress and cancellation
//! - [`jobs`] - In-memory registry exposing start/status/cancel over generations
//! - [`storage`] - Course persistence (memory, SQLite) and Markdown export
//! - [`server`] - HTTP API over the job registry
//! - [`config`] - Configuration from environment and TOML files
//!
//! # Example
//!
//! ```no_run
//! use apuntes::app::AppContext;
//! use apuntes::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let context = AppContext::from_config(Config::from_env()?)?;
//!     let job_id = context.registry.start_job("Docker para desarrolladores").await?;
//!     println!("{:?}", context.registry.get_status(&job_id).await?);
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod generator;
pub mod jobs;
pub mod llm;
pub mod models;
pub mod schema;
pub mod server;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::AppContext;
    pub use crate::config::{Config, GenerationConfig};
    pub use crate::error::{ApuntesErrorTrait, Error, ErrorCategory, Result};
    pub use crate::generator::{CancellationToken, CourseGenerator, ProgressObserver};
    pub use crate::jobs::{JobError, JobRegistry};
    pub use crate::llm::{build_client, TextGenerator};
    pub use crate::models::{CourseCategory, CourseOutline, GenerationJob, JobStatus};
    pub use crate::storage::{CourseStore, StoredCourse};
}

pub use models::{CourseCategory, CourseOutline, GenerationJob, JobStatus};
