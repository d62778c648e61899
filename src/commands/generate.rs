use anyhow::{Context, Result};
use std::path::PathBuf;

use apuntes::app::AppContext;
use apuntes::config::Config;
use apuntes::storage::MarkdownCourseWriter;

/// Generate one course in the foreground and print its id
pub async fn generate(config: Config, topic: String, output: Option<PathBuf>) -> Result<()> {
    let context = AppContext::from_config(config).context("Failed to initialize")?;

    println!("Generating course: {topic}");
    println!("  LLM: {}", context.client.describe());

    let course = context
        .generate_course(&topic)
        .await
        .context("Course generation failed")?;

    println!();
    println!("Course saved");
    println!("  Id: {}", course.id);
    println!("  Title: {}", course.title);
    println!("  Category: {}", course.category);
    println!("  Modules: {}", course.modules.len());
    println!("  Lessons: {}", course.lesson_count());

    if let Some(dir) = output {
        let writer = MarkdownCourseWriter::new(&dir).context("Failed to prepare output directory")?;
        let path = writer.save(&course).context("Failed to export Markdown")?;
        println!("  Markdown: {}", path.display());
    }

    Ok(())
}
