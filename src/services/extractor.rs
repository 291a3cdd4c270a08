//! Format dispatch for uploaded documents.
//!
//! Every parser failure, including a panic inside a third-party parser, is
//! turned into an [`ExtractionError`] naming the file. Nothing escapes.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{DocumentKind, UploadedDocument};
use crate::services::{office, pdf_processor};

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unsupported file type: '{filename}'")]
    UnsupportedFileType { filename: String },

    #[error("cannot parse '{filename}': {format} support is not compiled in, rebuild with the `{feature}` feature")]
    MissingDependency {
        filename: String,
        format: &'static str,
        feature: &'static str,
    },

    #[error("error parsing file '{filename}': {message}")]
    Parse { filename: String, message: String },
}

impl ExtractionError {
    pub fn parse(filename: &str, message: impl Into<String>) -> Self {
        ExtractionError::Parse {
            filename: filename.to_string(),
            message: message.into(),
        }
    }
}

/// Extracts plain text from `content`, choosing the parser by the
/// lowercased extension of `filename`.
pub fn extract(content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    let kind = DocumentKind::from_filename(filename).ok_or_else(|| {
        ExtractionError::UnsupportedFileType {
            filename: filename.to_string(),
        }
    })?;

    extract_kind(content, filename, kind)
}

/// Extracts text from an already classified upload.
pub fn extract_document(document: &UploadedDocument) -> Result<String, ExtractionError> {
    extract_kind(&document.content, &document.filename, document.kind)
}

fn extract_kind(content: &[u8], filename: &str, kind: DocumentKind) -> Result<String, ExtractionError> {
    let start = Instant::now();
    debug!(file_name = %filename, kind = %kind, size = content.len(), "Extracting text");

    let result = match kind {
        DocumentKind::Txt => extract_txt(content, filename),
        DocumentKind::Pdf => pdf_processor::extract_text(content, filename),
        DocumentKind::Docx => office::extract_docx(content, filename),
        DocumentKind::Pptx => extract_pptx(content, filename),
    };

    match &result {
        Ok(text) => info!(
            file_name = %filename,
            kind = %kind,
            text_length = text.chars().count(),
            processing_time_ms = start.elapsed().as_millis() as u64,
            "Text extraction completed"
        ),
        Err(e) => warn!(file_name = %filename, kind = %kind, error = %e, "Text extraction failed"),
    }

    result
}

fn extract_txt(content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    String::from_utf8(content.to_vec())
        .map_err(|e| ExtractionError::parse(filename, format!("invalid UTF-8: {}", e)))
}

#[cfg(feature = "pptx")]
fn extract_pptx(content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    office::extract_pptx(content, filename)
}

#[cfg(not(feature = "pptx"))]
fn extract_pptx(_content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    Err(ExtractionError::MissingDependency {
        filename: filename.to_string(),
        format: "PPTX",
        feature: "pptx",
    })
}
