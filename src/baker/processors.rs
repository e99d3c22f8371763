//! Built-in processors

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::Processor;
use crate::content::{FrontMatter, MarkdownRenderer};

/// Copies files verbatim. Supports every extension at the lowest priority.
pub struct CopyProcessor;

impl Processor for CopyProcessor {
    fn name(&self) -> &str {
        "copy"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn supports_extension(&self, _extension: &str) -> bool {
        true
    }

    fn output_filenames(&self, filename: &str) -> Vec<String> {
        vec![filename.to_string()]
    }

    fn process(&self, input: &Path, output_dir: &Path) -> Result<()> {
        let file_name = input
            .file_name()
            .with_context(|| format!("No file name in {:?}", input))?;
        fs::copy(input, output_dir.join(file_name))
            .with_context(|| format!("Failed to copy {:?}", input))?;
        Ok(())
    }
}

/// Renders markdown files into HTML fragments, dropping their front-matter
pub struct MarkdownProcessor {
    renderer: MarkdownRenderer,
}

impl MarkdownProcessor {
    pub fn new() -> Self {
        Self {
            renderer: MarkdownRenderer::new(),
        }
    }
}

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for MarkdownProcessor {
    fn name(&self) -> &str {
        "markdown"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn supports_extension(&self, extension: &str) -> bool {
        matches!(extension, "md" | "markdown")
    }

    fn output_filenames(&self, filename: &str) -> Vec<String> {
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        vec![format!("{}.html", stem)]
    }

    fn process(&self, input: &Path, output_dir: &Path) -> Result<()> {
        let source = fs::read_to_string(input)?;
        let (_, body) = FrontMatter::parse(&source)
            .with_context(|| format!("Invalid front-matter in {:?}", input))?;
        let (_, full) = MarkdownRenderer::split_abstract(body);
        let html = self.renderer.render(&full);

        let file_name = input
            .file_name()
            .and_then(|s| s.to_str())
            .with_context(|| format!("No file name in {:?}", input))?;
        for output in self.output_filenames(file_name) {
            fs::write(output_dir.join(output), &html)?;
        }
        Ok(())
    }
}
