//! Prompt construction with the Handlebars template engine

use handlebars::Handlebars;
use serde::Serialize;
use thiserror::Error;

use crate::config::GenerationConfig;
use crate::models::CourseCategory;

const OUTLINE_TEMPLATE: &str = include_str!("../../templates/outline_prompt.hbs");
const LESSON_TEMPLATE: &str = include_str!("../../templates/lesson_prompt.hbs");

/// Prompt template failure
#[derive(Error, Debug)]
pub enum PromptError {
    #[error("failed to register prompt template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    #[error("failed to render prompt: {0}")]
    Render(#[from] handlebars::RenderError),
}

#[derive(Debug, Serialize)]
struct CategoryData {
    label: &'static str,
    hint: &'static str,
}

#[derive(Debug, Serialize)]
struct OutlineData<'a> {
    topic: &'a str,
    categories: Vec<CategoryData>,
    min_modules: usize,
    max_modules: usize,
    min_lessons: usize,
    max_lessons: usize,
    min_title_chars: usize,
    min_brief_chars: usize,
}

#[derive(Debug, Serialize)]
struct LessonData<'a> {
    topic: &'a str,
    module_title: &'a str,
    lesson_title: &'a str,
    brief: &'a str,
    min_content_chars: usize,
}

/// Renders the outline and lesson prompts
pub struct PromptBuilder {
    handlebars: Handlebars<'static>,
    config: GenerationConfig,
}

impl PromptBuilder {
    /// Create a builder with the bundled templates
    pub fn new(config: GenerationConfig) -> Result<Self, PromptError> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string("outline", OUTLINE_TEMPLATE)
            .map_err(Box::new)?;
        handlebars
            .register_template_string("lesson", LESSON_TEMPLATE)
            .map_err(Box::new)?;

        Ok(Self { handlebars, config })
    }

    /// Prompt for the structure phase
    pub fn outline(&self, topic: &str) -> Result<String, PromptError> {
        let data = OutlineData {
            topic,
            categories: CourseCategory::ALL
                .iter()
                .map(|c| CategoryData {
                    label: c.as_str(),
                    hint: c.hint(),
                })
                .collect(),
            min_modules: self.config.min_modules,
            max_modules: self.config.max_modules,
            min_lessons: self.config.min_lessons,
            max_lessons: self.config.max_lessons,
            min_title_chars: self.config.min_title_chars,
            min_brief_chars: self.config.min_brief_chars,
        };

        Ok(self.handlebars.render("outline", &data)?)
    }

    /// Prompt for one lesson body
    pub fn lesson(
        &self,
        topic: &str,
        module_title: &str,
        lesson_title: &str,
        brief: &str,
    ) -> Result<String, PromptError> {
        let data = LessonData {
            topic,
            module_title,
            lesson_title,
            brief,
            min_content_chars: self.config.min_content_chars,
        };

        Ok(self.handlebars.render("lesson", &data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(GenerationConfig::default()).unwrap()
    }

    #[test]
    fn test_outline_prompt_embeds_topic_and_limits() {
        let prompt = builder().outline("Docker & <Compose>").unwrap();

        assert!(prompt.contains("\"Docker & <Compose>\""));
        assert!(prompt.contains("Entre 6 y 8 módulos"));
        assert!(prompt.contains("entre 2 y 3 lecciones"));
        assert!(prompt.contains("mínimo 20 caracteres"));
    }

    #[test]
    fn test_outline_prompt_lists_every_category() {
        let prompt = builder().outline("SQL").unwrap();
        for category in CourseCategory::ALL {
            assert!(
                prompt.contains(&format!("- {} (", category.as_str())),
                "missing {category}"
            );
        }
    }

    #[test]
    fn test_lesson_prompt_embeds_context() {
        let prompt = builder()
            .lesson("Testing", "Mocks", "Dobles de prueba", "Cuándo usar stubs y spies")
            .unwrap();

        assert!(prompt.contains("**Módulo**: \"Mocks\""));
        assert!(prompt.contains("**Lección**: \"Dobles de prueba\""));
        assert!(prompt.contains("Cuándo usar stubs y spies"));
        assert!(prompt.contains("# Dobles de prueba\\n"));
        assert!(prompt.contains("| Problema |"));
    }

    #[test]
    fn test_limits_follow_config() {
        let config = GenerationConfig {
            min_modules: 3,
            max_modules: 4,
            ..GenerationConfig::default()
        };
        let prompt = PromptBuilder::new(config).unwrap().outline("Go").unwrap();
        assert!(prompt.contains("Entre 3 y 4 módulos"));
    }
}
