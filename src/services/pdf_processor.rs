use std::panic;

use lopdf::Document;

use crate::services::extractor::ExtractionError;

/// Extracts the text of every page, in page order.
///
/// `pdf-extract` is tried first. If it errors or panics the document is
/// reopened with `lopdf` and read page by page; pages without a text layer
/// (scanned images) contribute an empty string rather than an error.
pub fn extract_text(content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    let primary = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(content));

    let primary_error = match primary {
        Ok(Ok(text)) => {
            tracing::debug!(
                file_name = %filename,
                characters = text.chars().count(),
                "pdf-extract succeeded"
            );
            return Ok(text);
        }
        Ok(Err(e)) => e.to_string(),
        Err(payload) => panic_message(payload),
    };

    tracing::warn!(
        file_name = %filename,
        error = %primary_error,
        "pdf-extract failed, falling back to page-by-page extraction"
    );

    extract_pages(content).map_err(|fallback_error| {
        ExtractionError::parse(
            filename,
            format!("{} (fallback: {})", primary_error, fallback_error),
        )
    })
}

fn extract_pages(content: &[u8]) -> Result<String, String> {
    let document = Document::load_mem(content).map_err(|e| e.to_string())?;
    let pages = document.get_pages();
    tracing::debug!(pages = pages.len(), "Reading PDF pages with lopdf");

    let mut text = String::new();
    for page_number in pages.keys() {
        match document.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "Page has no extractable text");
            }
        }
    }

    Ok(text)
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("parser panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("parser panicked: {}", message)
    } else {
        "parser panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    fn single_page_pdf(line: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn extracts_text_layer() {
        let pdf = single_page_pdf("Series A term sheet");
        let text = extract_text(&pdf, "term-sheet.pdf").unwrap();
        assert!(text.contains("Series A term sheet"), "got: {:?}", text);
    }

    #[test]
    fn page_fallback_reads_text_layer() {
        let pdf = single_page_pdf("Restructuring plan");
        let text = extract_pages(&pdf).unwrap();
        assert!(text.contains("Restructuring plan"), "got: {:?}", text);
    }

    #[test]
    fn unreadable_pdf_is_an_error() {
        let err = extract_text(b"definitely not a pdf", "scan.pdf").unwrap_err();
        assert!(matches!(err, ExtractionError::Parse { .. }));
    }
}
