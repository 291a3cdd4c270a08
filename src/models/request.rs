use std::fmt;
use std::path::Path;

use bytes::Bytes;

/// File formats accepted by `/analyze`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Txt,
    Pdf,
    Docx,
    Pptx,
}

impl DocumentKind {
    pub const ALLOWED_EXTENSIONS: [&'static str; 4] = ["pdf", "docx", "pptx", "txt"];

    /// Classifies a filename by its lowercased extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_str()?
            .to_lowercase();

        match extension.as_str() {
            "txt" => Some(DocumentKind::Txt),
            "pdf" => Some(DocumentKind::Pdf),
            "docx" => Some(DocumentKind::Docx),
            "pptx" => Some(DocumentKind::Pptx),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentKind::Txt => "txt",
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Pptx => "pptx",
        };
        f.write_str(name)
    }
}

/// One file from the `files` multipart field. Lives only until its text
/// has been extracted.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub filename: String,
    pub kind: DocumentKind,
    pub size: usize,
    pub content: Bytes,
}

impl UploadedDocument {
    pub fn new(filename: String, kind: DocumentKind, content: Bytes) -> Self {
        Self {
            filename,
            kind,
            size: content.len(),
            content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_lowercased_extension() {
        assert_eq!(DocumentKind::from_filename("plan.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("deck.final.pptx"), Some(DocumentKind::Pptx));
        assert_eq!(DocumentKind::from_filename("memo.Docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::from_filename("notes.txt"), Some(DocumentKind::Txt));
    }

    #[test]
    fn rejects_unknown_or_missing_extensions() {
        assert_eq!(DocumentKind::from_filename("photo.jpg"), None);
        assert_eq!(DocumentKind::from_filename("README"), None);
        assert_eq!(DocumentKind::from_filename(""), None);
    }

    #[test]
    fn size_tracks_content_length() {
        let document = UploadedDocument::new(
            "teaser.txt".to_string(),
            DocumentKind::Txt,
            Bytes::from_static("项目简介".as_bytes()),
        );
        assert_eq!(document.size, "项目简介".len());
    }
}
