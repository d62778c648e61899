//! Safe JSON extraction from free-text model output
//!
//! Models wrap JSON in prose or Markdown fences and occasionally emit shapes
//! that do not match the requested contract. [`generate_safe_json`] asks the
//! provider, strips the wrapping, parses, validates against a [`Schema`] and
//! retries the whole round-trip with a fixed delay until an attempt succeeds
//! or the attempt budget is spent.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

use super::{LlmError, TextGenerator};
use crate::schema::{Schema, ValidationError};
use crate::utils::retry::{with_retry, RetryConfig};

/// Why a single attempt failed
#[derive(Error, Debug)]
pub enum AttemptError {
    /// Provider call failed
    #[error(transparent)]
    Provider(#[from] LlmError),

    /// Extracted text was not valid JSON
    #[error("invalid JSON in model output: {0}")]
    Parse(#[from] serde_json::Error),

    /// JSON did not satisfy the schema
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Terminal extraction failure
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Every attempt failed; carries the last cause
    #[error("generation failed after {attempts} attempts, last error: {last}")]
    Exhausted { attempts: u32, last: AttemptError },
}

impl ExtractError {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn last_error(&self) -> &AttemptError {
        match self {
            Self::Exhausted { last, .. } => last,
        }
    }
}

/// Strip fences and surrounding prose, keeping the outermost `{...}` span
///
/// Already-clean JSON comes back unchanged. When no brace pair is found the
/// fence-stripped text is returned as-is and parsing will reject it.
pub fn clean_json_string(text: &str) -> &str {
    static FENCE_OPEN: OnceLock<Regex> = OnceLock::new();
    static FENCE_CLOSE: OnceLock<Regex> = OnceLock::new();

    let open = FENCE_OPEN
        .get_or_init(|| Regex::new(r"^```[A-Za-z0-9_-]*\s*").expect("Invalid regex pattern"));
    let close = FENCE_CLOSE.get_or_init(|| Regex::new(r"\s*```$").expect("Invalid regex pattern"));

    let mut clean = text.trim();
    if let Some(m) = open.find(clean) {
        clean = &clean[m.end()..];
    }
    if let Some(m) = close.find(clean) {
        clean = &clean[..m.start()];
    }

    match (clean.find('{'), clean.rfind('}')) {
        (Some(start), Some(end)) if end > start => &clean[start..=end],
        _ => clean,
    }
}

/// Run one request/clean/parse/validate round
async fn attempt<S>(
    client: &dyn TextGenerator,
    prompt: &str,
    schema: &S,
) -> Result<S::Output, AttemptError>
where
    S: Schema + ?Sized,
{
    let raw = client.generate(prompt).await?;
    let json = clean_json_string(&raw);

    tracing::debug!(
        schema = schema.name(),
        raw_chars = raw.len(),
        json_chars = json.len(),
        "Extracted JSON candidate"
    );

    let value: Value = serde_json::from_str(json)?;
    Ok(schema.validate(&value)?)
}

/// Obtain a schema-valid object from the provider
///
/// Provider failures, parse failures and schema violations all consume one
/// attempt. The delay from `retry` is applied before every attempt except
/// the first.
pub async fn generate_safe_json<S>(
    client: &dyn TextGenerator,
    prompt: &str,
    schema: &S,
    retry: &RetryConfig,
) -> Result<S::Output, ExtractError>
where
    S: Schema + ?Sized,
{
    with_retry(retry, |n| {
        if n > 1 {
            tracing::warn!(
                schema = schema.name(),
                attempt = n,
                max_attempts = retry.max_attempts,
                "Retrying generation"
            );
        }
        attempt(client, prompt, schema)
    })
    .await
    .map_err(|e| ExtractError::Exhausted {
        attempts: e.attempts,
        last: e.last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LessonContentSchema, SchemaLimits};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order
    struct Replay {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl Replay {
        fn new(responses: Vec<Result<String, LlmError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextGenerator for Replay {
        async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyResponse))
        }

        fn describe(&self) -> String {
            "replay".to_string()
        }
    }

    fn schema() -> LessonContentSchema {
        LessonContentSchema::new(SchemaLimits {
            min_content_chars: 5,
            ..SchemaLimits::default()
        })
    }

    fn no_delay(attempts: u32) -> RetryConfig {
        RetryConfig::fixed(attempts, 0)
    }

    #[test]
    fn test_clean_json_is_unchanged() {
        let json = r#"{"content_md": "hola {mundo}"}"#;
        assert_eq!(clean_json_string(json), json);
    }

    #[test]
    fn test_strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(clean_json_string(text), "{\"a\": 1}");
    }

    #[test]
    fn test_strips_bare_fence_and_prose() {
        let text = "Claro, aquí tienes:\n```\n{\"a\": {\"b\": 2}}\n```\nSaludos.";
        assert_eq!(clean_json_string(text), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_no_brace_left_as_is() {
        assert_eq!(clean_json_string("```json\nno json\n```"), "no json");
        assert_eq!(clean_json_string("} al revés {"), "} al revés {");
    }

    #[tokio::test]
    async fn test_success_stops_immediately() {
        let client = Replay::new(vec![Ok(r#"{"content_md": "contenido"}"#.to_string())]);
        let content = generate_safe_json(&client, "p", &schema(), &no_delay(3))
            .await
            .unwrap();
        assert_eq!(content.content, "contenido");
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_every_failure_kind_consumes_an_attempt() {
        let client = Replay::new(vec![
            Err(LlmError::EmptyResponse),
            Ok("sin llaves".to_string()),
            Ok(r#"{"content_md": "ok"}"#.to_string()),
            Ok(r#"{"content_md": "por fin"}"#.to_string()),
        ]);

        let content = generate_safe_json(&client, "p", &schema(), &no_delay(4))
            .await
            .unwrap();
        assert_eq!(content.content, "por fin");
        assert_eq!(client.calls(), 4);
    }

    #[tokio::test]
    async fn test_exhausted_carries_last_cause() {
        let client = Replay::new(vec![
            Ok("no json".to_string()),
            Ok(r#"{"content_md": "x"}"#.to_string()),
        ]);

        let err = generate_safe_json(&client, "p", &schema(), &no_delay(2))
            .await
            .unwrap_err();
        assert_eq!(err.attempts(), 2);
        assert!(matches!(err.last_error(), AttemptError::Validation(_)));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts() {
        let client = Replay::new(vec![]);
        let start = tokio::time::Instant::now();

        let result =
            generate_safe_json(&client, "p", &schema(), &RetryConfig::fixed(3, 2000)).await;

        assert!(result.is_err());
        assert_eq!(client.calls(), 3);
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(4));
    }
}
