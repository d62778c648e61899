//! Markdown export with the Handlebars template engine
//!
//! Renders a stored course as a single Markdown document with YAML front
//! matter and writes it to an output directory.

use handlebars::Handlebars;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use super::{StorageError, StoredCourse};
use crate::utils::sanitize_filename;

/// Default course template
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/course.hbs");

#[derive(Debug, Serialize)]
struct LessonData<'a> {
    title: &'a str,
    brief: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ModuleData<'a> {
    number: usize,
    title: &'a str,
    lessons: Vec<LessonData<'a>>,
}

#[derive(Debug, Serialize)]
struct CourseTemplateData<'a> {
    id: &'a str,
    title: &'a str,
    category: &'a str,
    published: bool,
    created_at: String,
    modules: Vec<ModuleData<'a>>,
}

impl<'a> From<&'a StoredCourse> for CourseTemplateData<'a> {
    fn from(course: &'a StoredCourse) -> Self {
        Self {
            id: &course.id,
            title: &course.title,
            category: course.category.as_str(),
            published: course.published,
            created_at: course.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            modules: course
                .modules
                .iter()
                .enumerate()
                .map(|(i, m)| ModuleData {
                    number: i + 1,
                    title: &m.title,
                    lessons: m
                        .lessons
                        .iter()
                        .map(|l| LessonData {
                            title: &l.title,
                            brief: &l.brief,
                            content: &l.content,
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Markdown writer for generated courses
pub struct MarkdownCourseWriter<'a> {
    handlebars: Handlebars<'a>,
    output_dir: PathBuf,
}

impl<'a> MarkdownCourseWriter<'a> {
    /// Create a writer with the default template, creating `output_dir`
    pub fn new(output_dir: &Path) -> Result<Self, StorageError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string("course", DEFAULT_TEMPLATE)
            .map_err(Box::new)?;

        fs::create_dir_all(output_dir)?;

        Ok(Self {
            handlebars,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Render a course to a Markdown string
    pub fn render(&self, course: &StoredCourse) -> Result<String, StorageError> {
        let data = CourseTemplateData::from(course);
        Ok(self.handlebars.render("course", &data)?)
    }

    /// Write a course to `{title}_{id prefix}.md` and return the path
    pub fn save(&self, course: &StoredCourse) -> Result<PathBuf, StorageError> {
        let markdown = self.render(course)?;
        let filepath = self.output_dir.join(Self::filename(course));

        fs::write(&filepath, markdown)?;

        tracing::debug!(path = %filepath.display(), "Saved course to markdown");
        Ok(filepath)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn filename(course: &StoredCourse) -> String {
        let title: String = sanitize_filename(&course.title)
            .chars()
            .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ' '))
            .take(50)
            .collect();
        let title = title.trim().replace(' ', "_").to_lowercase();
        let short_id: String = course.id.chars().take(8).collect();

        if title.is_empty() {
            format!("{short_id}.md")
        } else {
            format!("{title}_{short_id}.md")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{fixtures, StoredCourse};
    use tempfile::TempDir;

    fn course() -> StoredCourse {
        StoredCourse::from_new(fixtures::new_course())
    }

    #[test]
    fn test_render_contains_structure() {
        let dir = TempDir::new().unwrap();
        let writer = MarkdownCourseWriter::new(dir.path()).unwrap();
        let course = course();

        let markdown = writer.render(&course).unwrap();

        assert!(markdown.starts_with("---\n"));
        assert!(markdown.contains(&format!("id: {}", course.id)));
        assert!(markdown.contains("category: Backend"));
        assert!(markdown.contains("## Módulo 1: Futures"));
        assert!(markdown.contains("### Pin y Unpin"));
        assert!(markdown.contains("# Qué es un Future\n\nContenido."));
    }

    #[test]
    fn test_save_writes_file() {
        let dir = TempDir::new().unwrap();
        let writer = MarkdownCourseWriter::new(&dir.path().join("out")).unwrap();
        let course = course();

        let path = writer.save(&course).unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("rust_async_"));
        assert!(name.ends_with(".md"));
        assert_eq!(writer.output_dir(), dir.path().join("out"));
    }
}
