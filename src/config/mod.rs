//! Configuration management for the apuntes service
//!
//! This module handles loading and validating configuration from environment
//! variables and TOML files. Generation tuning values (retry counts, delays,
//! structural bounds) live here rather than being hardcoded in the pipeline.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::LlmConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generative-text provider configuration
    pub llm: LlmConfig,

    /// Generation pipeline tuning
    pub generation: GenerationConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Course storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Generation pipeline tuning values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per provider call before giving up (including the first)
    pub max_attempts: u32,

    /// Fixed delay between attempts, in milliseconds
    pub retry_delay_ms: u64,

    /// Pause before each lesson request, in milliseconds
    pub lesson_delay_ms: u64,

    pub min_modules: usize,
    pub max_modules: usize,
    pub min_lessons: usize,
    pub max_lessons: usize,

    /// Minimum characters for module and lesson titles
    pub min_title_chars: usize,

    /// Minimum characters for a lesson brief
    pub min_brief_chars: usize,

    /// Minimum characters for a lesson body
    pub min_content_chars: usize,

    /// Wall-clock limit for a whole job in seconds (0 disables)
    pub deadline_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 2000,
            lesson_delay_ms: 1000,
            min_modules: 6,
            max_modules: 8,
            min_lessons: 2,
            max_lessons: 3,
            min_title_chars: 4,
            min_brief_chars: 20,
            min_content_chars: 200,
            deadline_secs: 1800,
        }
    }
}

impl GenerationConfig {
    /// Configuration with all delays removed, for tests and local runs
    pub fn without_delays() -> Self {
        Self {
            retry_delay_ms: 0,
            lesson_delay_ms: 0,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    #[must_use]
    pub fn lesson_delay(&self) -> Duration {
        Duration::from_millis(self.lesson_delay_ms)
    }

    /// Overall job deadline, `None` when disabled
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }

    /// Validate bounds
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            anyhow::bail!("generation.max_attempts must be greater than 0");
        }

        if self.min_modules == 0 || self.min_modules > self.max_modules {
            anyhow::bail!("generation module bounds must satisfy 0 < min_modules <= max_modules");
        }

        if self.min_lessons == 0 || self.min_lessons > self.max_lessons {
            anyhow::bail!("generation lesson bounds must satisfy 0 < min_lessons <= max_lessons");
        }

        Ok(())
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Enable CORS for the API
    pub enable_cors: bool,

    /// Allowed CORS origins (empty allows any origin)
    pub allowed_origins: Vec<String>,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3001)),
            enable_cors: true,
            allowed_origins: vec![
                "http://localhost:4321".to_string(),
                "http://localhost:3000".to_string(),
            ],
            enable_request_logging: true,
        }
    }
}

/// Course storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path (in-memory storage when unset)
    pub sqlite_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = GenerationConfig::default();

        let generation = GenerationConfig {
            max_attempts: env_parse("APUNTES_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            retry_delay_ms: env_parse("APUNTES_RETRY_DELAY_MS").unwrap_or(defaults.retry_delay_ms),
            lesson_delay_ms: env_parse("APUNTES_LESSON_DELAY_MS")
                .unwrap_or(defaults.lesson_delay_ms),
            deadline_secs: env_parse("APUNTES_DEADLINE_SECS").unwrap_or(defaults.deadline_secs),
            ..defaults
        };

        let mut server = ServerConfig::default();
        if let Ok(addr) = std::env::var("APUNTES_BIND_ADDRESS") {
            server.bind_address = addr
                .parse()
                .with_context(|| format!("Invalid APUNTES_BIND_ADDRESS: {addr}"))?;
        } else if let Some(port) = env_parse::<u16>("PORT") {
            server.bind_address.set_port(port);
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            server.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        let storage = StorageConfig {
            sqlite_path: std::env::var("APUNTES_SQLITE_PATH").ok().map(PathBuf::from),
        };

        let logging = LoggingConfig {
            level: std::env::var("APUNTES_LOG_LEVEL").unwrap_or_else(|_| String::from("info")),
            format: std::env::var("APUNTES_LOG_FORMAT").unwrap_or_else(|_| String::from("text")),
        };

        Ok(Self {
            llm: LlmConfig::from_env(),
            generation,
            server,
            storage,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        self.llm.validate().context("Invalid llm configuration")?;

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }
}
