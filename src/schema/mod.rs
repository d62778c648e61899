//! Declarative contracts for generated course data
//!
//! Provider output is parsed into a generic [`serde_json::Value`] tree first
//! and only converted into typed records after passing these checks. Every
//! violated constraint is collected, so a single rejection explains all of
//! what was wrong with a candidate.
//!
//! Length minimums are counted in characters (`chars().count()`), which
//! stand in for word counts.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::models::{CourseCategory, CourseModule, CourseOutline, LessonContent, LessonStub};

/// A single violated constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Location of the offending value, e.g. `modules[2].lessons[0].brief`
    pub path: String,
    pub message: String,
}

impl Violation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Candidate rejected by a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{schema} validation failed: {}", summarize(.violations))]
pub struct ValidationError {
    pub schema: &'static str,
    pub violations: Vec<Violation>,
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Numeric bounds enforced by the validators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaLimits {
    pub min_modules: usize,
    pub max_modules: usize,
    pub min_lessons: usize,
    pub max_lessons: usize,
    pub min_title_chars: usize,
    pub min_brief_chars: usize,
    pub min_content_chars: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self {
            min_modules: 6,
            max_modules: 8,
            min_lessons: 2,
            max_lessons: 3,
            min_title_chars: 4,
            min_brief_chars: 20,
            min_content_chars: 200,
        }
    }
}

impl From<&GenerationConfig> for SchemaLimits {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            min_modules: config.min_modules,
            max_modules: config.max_modules,
            min_lessons: config.min_lessons,
            max_lessons: config.max_lessons,
            min_title_chars: config.min_title_chars,
            min_brief_chars: config.min_brief_chars,
            min_content_chars: config.min_content_chars,
        }
    }
}

/// A contract that turns an untyped candidate into a typed record
pub trait Schema: Send + Sync {
    type Output: Send;

    /// Name used in error messages
    fn name(&self) -> &'static str;

    fn validate(&self, candidate: &Value) -> Result<Self::Output, ValidationError>;
}

/// Schema for the outline phase
#[derive(Debug, Clone, Copy, Default)]
pub struct OutlineSchema {
    pub limits: SchemaLimits,
}

impl OutlineSchema {
    pub fn new(limits: SchemaLimits) -> Self {
        Self { limits }
    }
}

impl Schema for OutlineSchema {
    type Output = CourseOutline;

    fn name(&self) -> &'static str {
        "outline"
    }

    fn validate(&self, candidate: &Value) -> Result<CourseOutline, ValidationError> {
        validate_outline(candidate, &self.limits)
    }
}

/// Schema for a single lesson body
#[derive(Debug, Clone, Copy, Default)]
pub struct LessonContentSchema {
    pub limits: SchemaLimits,
}

impl LessonContentSchema {
    pub fn new(limits: SchemaLimits) -> Self {
        Self { limits }
    }
}

impl Schema for LessonContentSchema {
    type Output = LessonContent;

    fn name(&self) -> &'static str {
        "lesson content"
    }

    fn validate(&self, candidate: &Value) -> Result<LessonContent, ValidationError> {
        validate_lesson_content(candidate, &self.limits)
    }
}

/// Collects violations while walking a candidate
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    fn fail(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        match value.as_object() {
            Some(obj) => Some(obj),
            None => {
                self.fail(path, format!("expected object, found {}", kind(value)));
                None
            }
        }
    }

    /// Required string field with a minimum character length
    fn string(
        &mut self,
        obj: &Map<String, Value>,
        field: &str,
        path: &str,
        min_chars: usize,
    ) -> Option<String> {
        let path = join(path, field);
        match obj.get(field) {
            None | Some(Value::Null) => {
                self.fail(path, "is required");
                None
            }
            Some(Value::String(s)) => {
                let len = s.chars().count();
                if len < min_chars {
                    self.fail(
                        path,
                        format!("must be at least {min_chars} characters (got {len})"),
                    );
                    None
                } else {
                    Some(s.clone())
                }
            }
            Some(other) => {
                self.fail(path, format!("expected string, found {}", kind(other)));
                None
            }
        }
    }

    /// Required array field whose length lies within `[min, max]`
    fn array<'a>(
        &mut self,
        obj: &'a Map<String, Value>,
        field: &str,
        path: &str,
        min: usize,
        max: usize,
    ) -> Option<&'a Vec<Value>> {
        let path = join(path, field);
        match obj.get(field) {
            None | Some(Value::Null) => {
                self.fail(path, "is required");
                None
            }
            Some(Value::Array(items)) => {
                if items.len() < min || items.len() > max {
                    self.fail(
                        path.clone(),
                        format!("must contain between {min} and {max} items (got {})", items.len()),
                    );
                }
                Some(items)
            }
            Some(other) => {
                self.fail(path, format!("expected array, found {}", kind(other)));
                None
            }
        }
    }

    fn finish<T>(self, schema: &'static str, value: Option<T>) -> Result<T, ValidationError> {
        match value {
            Some(v) if self.violations.is_empty() => Ok(v),
            _ => Err(ValidationError {
                schema,
                violations: if self.violations.is_empty() {
                    vec![Violation::new("", "candidate rejected")]
                } else {
                    self.violations
                },
            }),
        }
    }
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a course outline candidate
pub fn validate_outline(
    candidate: &Value,
    limits: &SchemaLimits,
) -> Result<CourseOutline, ValidationError> {
    let mut check = Checker::new();

    let Some(root) = check.object(candidate, "") else {
        return check.finish("outline", None);
    };

    let title = match check.string(root, "title", "", 1) {
        Some(t) if t.trim().is_empty() => {
            check.fail("title", "must not be blank");
            None
        }
        other => other,
    };

    let category = check
        .string(root, "category", "", 1)
        .and_then(|label| match CourseCategory::parse(&label) {
            Some(c) => Some(c),
            None => {
                let allowed: Vec<_> = CourseCategory::ALL.iter().map(|c| c.as_str()).collect();
                check.fail(
                    "category",
                    format!("'{label}' is not one of: {}", allowed.join(", ")),
                );
                None
            }
        });

    let mut modules = Vec::new();
    if let Some(items) = check.array(root, "modules", "", limits.min_modules, limits.max_modules) {
        for (i, item) in items.iter().enumerate() {
            let path = format!("modules[{i}]");
            if let Some(module) = validate_module(&mut check, item, &path, limits) {
                modules.push(module);
            }
        }
    }

    let outline = match (title, category) {
        (Some(title), Some(category)) => Some(CourseOutline {
            title,
            category,
            modules,
        }),
        _ => None,
    };

    check.finish("outline", outline)
}

fn validate_module(
    check: &mut Checker,
    value: &Value,
    path: &str,
    limits: &SchemaLimits,
) -> Option<CourseModule> {
    let obj = check.object(value, path)?;
    let title = check.string(obj, "title", path, limits.min_title_chars);

    let mut lessons = Vec::new();
    if let Some(items) = check.array(obj, "lessons", path, limits.min_lessons, limits.max_lessons) {
        for (i, item) in items.iter().enumerate() {
            let lesson_path = format!("{path}.lessons[{i}]");
            if let Some(lesson) = validate_lesson_stub(check, item, &lesson_path, limits) {
                lessons.push(lesson);
            }
        }
    }

    Some(CourseModule {
        title: title?,
        lessons,
    })
}

fn validate_lesson_stub(
    check: &mut Checker,
    value: &Value,
    path: &str,
    limits: &SchemaLimits,
) -> Option<LessonStub> {
    let obj = check.object(value, path)?;
    let title = check.string(obj, "title", path, limits.min_title_chars);
    let brief = check.string(obj, "brief", path, limits.min_brief_chars);

    let content = match obj.get("content_md") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => {
            check.fail(
                join(path, "content_md"),
                format!("expected string, found {}", kind(other)),
            );
            None
        }
    };

    Some(LessonStub {
        title: title?,
        brief: brief?,
        content,
    })
}

/// Validate a lesson body candidate
pub fn validate_lesson_content(
    candidate: &Value,
    limits: &SchemaLimits,
) -> Result<LessonContent, ValidationError> {
    let mut check = Checker::new();

    let content = check
        .object(candidate, "")
        .and_then(|root| check.string(root, "content_md", "", limits.min_content_chars));

    check.finish("lesson content", content.map(|content| LessonContent { content }))
}
