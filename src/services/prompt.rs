//! Prompt assembly for the summary request.
//!
//! The three summary templates and the instruction frame are plain files
//! under `templates/`. They are compiled in as defaults and can be replaced
//! at startup from a directory, so wording changes need no rebuild.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Inserted between the texts of consecutive documents.
pub const DOCUMENT_SEPARATOR: &str = "\n\n--- NEW DOCUMENT ---\n\n";

pub const EQUITY_PLACEHOLDER: &str = "{{EQUITY_TEMPLATE}}";
pub const MERGER_PLACEHOLDER: &str = "{{MERGER_TEMPLATE}}";
pub const DISTRESSED_PLACEHOLDER: &str = "{{DISTRESSED_TEMPLATE}}";
pub const DOCUMENT_PLACEHOLDER: &str = "{{DOCUMENT_TEXT}}";

const TEMPLATE_FILES: [&str; 4] = ["instructions.md", "equity.md", "merger.md", "distressed.md"];

#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub instructions: String,
    pub equity: String,
    pub merger: String,
    pub distressed: String,
}

impl PromptTemplates {
    /// Templates bundled into the binary.
    pub fn embedded() -> Self {
        Self {
            instructions: include_str!("../../templates/instructions.md").to_string(),
            equity: include_str!("../../templates/equity.md").to_string(),
            merger: include_str!("../../templates/merger.md").to_string(),
            distressed: include_str!("../../templates/distressed.md").to_string(),
        }
    }

    /// Reads `instructions.md`, `equity.md`, `merger.md` and `distressed.md`
    /// from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| -> Result<String> {
            let path = dir.join(name);
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt template {}", path.display()))
        };

        let templates = Self {
            instructions: read(TEMPLATE_FILES[0])?,
            equity: read(TEMPLATE_FILES[1])?,
            merger: read(TEMPLATE_FILES[2])?,
            distressed: read(TEMPLATE_FILES[3])?,
        };
        templates.validate()?;

        info!(dir = %dir.display(), "Loaded prompt templates from directory");
        Ok(templates)
    }

    /// Loads from `dir` when given, otherwise the bundled set.
    pub fn resolve(dir: Option<&Path>) -> Result<Self> {
        match dir {
            Some(dir) => Self::load_dir(dir),
            None => {
                info!("Using bundled prompt templates");
                Ok(Self::embedded())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        for placeholder in [
            EQUITY_PLACEHOLDER,
            MERGER_PLACEHOLDER,
            DISTRESSED_PLACEHOLDER,
            DOCUMENT_PLACEHOLDER,
        ] {
            if !self.instructions.contains(placeholder) {
                anyhow::bail!("instructions template is missing placeholder {}", placeholder);
            }
        }
        for (name, body) in [
            ("equity", &self.equity),
            ("merger", &self.merger),
            ("distressed", &self.distressed),
        ] {
            if body.trim().is_empty() {
                anyhow::bail!("{} template is empty", name);
            }
        }
        Ok(())
    }
}

/// Joins document texts in upload order.
pub fn join_documents<S: AsRef<str>>(texts: &[S]) -> String {
    texts
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

/// The first `max_chars` characters of `text` (characters, not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

pub struct PromptComposer {
    templates: PromptTemplates,
    max_chars: usize,
}

impl PromptComposer {
    pub fn new(templates: PromptTemplates, max_chars: usize) -> Self {
        Self { templates, max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Builds the user message: all three templates plus the combined text,
    /// cut to the character ceiling.
    pub fn compose(&self, combined_text: &str) -> String {
        let document = truncate_chars(combined_text, self.max_chars);

        // Document text goes in last so its contents are never scanned for
        // placeholders.
        self.templates
            .instructions
            .replace(EQUITY_PLACEHOLDER, self.templates.equity.trim_end())
            .replace(MERGER_PLACEHOLDER, self.templates.merger.trim_end())
            .replace(DISTRESSED_PLACEHOLDER, self.templates.distressed.trim_end())
            .replace(DOCUMENT_PLACEHOLDER, document)
    }
}
