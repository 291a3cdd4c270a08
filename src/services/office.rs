//! Text extraction for Office Open XML documents.
//!
//! `.docx` and `.pptx` files are zip archives of XML parts; the text lives in
//! `w:t` runs (Word) and `a:t` runs inside `p:sp` shapes (PowerPoint).

use std::io::{Cursor, Read};

#[cfg(feature = "pptx")]
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use crate::services::extractor::ExtractionError;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open_archive<'a>(content: &'a [u8], filename: &str) -> Result<Archive<'a>, ExtractionError> {
    ZipArchive::new(Cursor::new(content))
        .map_err(|e| ExtractionError::parse(filename, format!("not a valid Office archive: {}", e)))
}

fn read_part(archive: &mut Archive<'_>, part: &str, filename: &str) -> Result<String, ExtractionError> {
    let mut entry = archive
        .by_name(part)
        .map_err(|e| ExtractionError::parse(filename, format!("missing part {}: {}", part, e)))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::parse(filename, format!("cannot read part {}: {}", part, e)))?;
    Ok(xml)
}

/// Every paragraph of the document body, each followed by a newline.
/// Paragraphs inside tables are included.
pub fn extract_docx(content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    let mut archive = open_archive(content, filename)?;
    let xml = read_part(&mut archive, "word/document.xml", filename)?;

    docx_paragraphs(&xml).map_err(|e| ExtractionError::parse(filename, e))
}

fn docx_paragraphs(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = true,
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                let unescaped = t.unescape().map_err(|e| e.to_string())?;
                text.push_str(&unescaped);
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

/// Text of every shape on every slide, in presentation order. Each shape
/// with a text body contributes its paragraphs joined by newlines, followed
/// by a newline; pictures, tables and other shapes without a text body are
/// skipped.
#[cfg(feature = "pptx")]
pub fn extract_pptx(content: &[u8], filename: &str) -> Result<String, ExtractionError> {
    let mut archive = open_archive(content, filename)?;
    let slides = slide_parts(&mut archive, filename)?;
    tracing::debug!(file_name = %filename, slides = slides.len(), "Reading PPTX slides");

    let mut text = String::new();
    for part in slides {
        let xml = read_part(&mut archive, &part, filename)?;
        let slide_text = slide_shapes(&xml)
            .map_err(|e| ExtractionError::parse(filename, format!("{}: {}", part, e)))?;
        text.push_str(&slide_text);
    }

    Ok(text)
}

/// Slide part names in the order `ppt/presentation.xml` lists them, falling
/// back to the numeric order of `ppt/slides/slideN.xml` when the deck has no
/// usable slide list.
#[cfg(feature = "pptx")]
fn slide_parts(archive: &mut Archive<'_>, filename: &str) -> Result<Vec<String>, ExtractionError> {
    let listed = match (
        read_part(archive, "ppt/presentation.xml", filename),
        read_part(archive, "ppt/_rels/presentation.xml.rels", filename),
    ) {
        (Ok(presentation), Ok(rels)) => listed_slides(&presentation, &rels).unwrap_or_default(),
        _ => Vec::new(),
    };

    let listed: Vec<String> = listed
        .into_iter()
        .filter(|part| archive.index_for_name(part).is_some())
        .collect();
    if !listed.is_empty() {
        return Ok(listed);
    }

    let mut numbered: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    numbered.sort();

    Ok(numbered.into_iter().map(|(_, name)| name).collect())
}

#[cfg(feature = "pptx")]
fn listed_slides(presentation: &str, rels: &str) -> Result<Vec<String>, String> {
    use std::collections::HashMap;

    let mut targets = HashMap::new();
    let mut reader = Reader::from_str(rels);
    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, "Id")?, attribute(&e, "Target")?) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut slides = Vec::new();
    let mut reader = Reader::from_str(presentation);
    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"p:sldId" => {
                let target = attribute(&e, "r:id")?.and_then(|id| targets.get(&id));
                if let Some(target) = target {
                    let part = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("ppt/{}", target),
                    };
                    slides.push(part);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(slides)
}

#[cfg(feature = "pptx")]
#[derive(Default)]
struct ShapeText {
    has_text_body: bool,
    paragraphs: Vec<String>,
}

#[cfg(feature = "pptx")]
fn slide_shapes(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut shape: Option<ShapeText> = None;
    let mut in_run_text = false;

    loop {
        match reader.read_event().map_err(|e| xml_error(&reader, e))? {
            Event::Start(e) => match e.name().as_ref() {
                b"p:sp" => shape = Some(ShapeText::default()),
                b"p:txBody" => {
                    if let Some(current) = shape.as_mut() {
                        current.has_text_body = true;
                    }
                }
                b"a:p" => {
                    if let Some(current) = shape.as_mut() {
                        current.paragraphs.push(String::new());
                    }
                }
                b"a:t" => in_run_text = shape.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"a:p" => {
                    if let Some(current) = shape.as_mut() {
                        current.paragraphs.push(String::new());
                    }
                }
                b"a:br" => {
                    if let Some(paragraph) = shape.as_mut().and_then(|s| s.paragraphs.last_mut()) {
                        paragraph.push('\n');
                    }
                }
                _ => {}
            },
            Event::Text(t) if in_run_text => {
                if let Some(paragraph) = shape.as_mut().and_then(|s| s.paragraphs.last_mut()) {
                    let unescaped = t.unescape().map_err(|e| e.to_string())?;
                    paragraph.push_str(&unescaped);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"a:t" => in_run_text = false,
                b"p:sp" => {
                    if let Some(finished) = shape.take() {
                        if finished.has_text_body {
                            text.push_str(&finished.paragraphs.join("\n"));
                            text.push('\n');
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(feature = "pptx")]
fn attribute(element: &BytesStart<'_>, name: &str) -> Result<Option<String>, String> {
    match element.try_get_attribute(name).map_err(|e| e.to_string())? {
        Some(attr) => attr
            .unescape_value()
            .map(|value| Some(value.into_owned()))
            .map_err(|e| e.to_string()),
        None => Ok(None),
    }
}

fn xml_error(reader: &Reader<&[u8]>, error: quick_xml::Error) -> String {
    format!("malformed XML at byte {}: {}", reader.error_position(), error)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docx_paragraphs_end_with_newlines() {
        let file = fixtures::docx(&["项目概况", "Revenue grew 40% &amp; margins held"]);
        let text = extract_docx(&file, "memo.docx").unwrap();
        assert_eq!(text, "项目概况\nRevenue grew 40% & margins held\n");
    }

    #[test]
    fn docx_keeps_tabs_breaks_and_empty_paragraphs() {
        let xml = "<w:document xmlns:w=\"w\"><w:body>\
                   <w:p><w:r><w:t>A</w:t><w:tab/><w:t>B</w:t><w:br/><w:t>C</w:t></w:r></w:p>\
                   <w:p/>\
                   <w:p><w:pPr><w:jc w:val=\"left\"/></w:pPr><w:r><w:t>D</w:t></w:r></w:p>\
                   </w:body></w:document>";
        assert_eq!(docx_paragraphs(xml).unwrap(), "A\tB\nC\n\nD\n");
    }

    #[test]
    fn docx_without_document_part_is_an_error() {
        let file = fixtures::archive(&[("word/styles.xml", "<w:styles/>")]);
        let err = extract_docx(&file, "empty.docx").unwrap_err();
        assert!(err.to_string().contains("empty.docx"));
    }

    #[cfg(feature = "pptx")]
    #[test]
    fn pptx_collects_shapes_across_slides() {
        let file = fixtures::pptx(&[&["Company overview", "Founded 2019"], &["Use of proceeds"]]);
        let text = extract_pptx(&file, "deck.pptx").unwrap();
        assert_eq!(text, "Company overview\nFounded 2019\nUse of proceeds\n");
    }

    #[cfg(feature = "pptx")]
    #[test]
    fn pptx_skips_shapes_without_text_body() {
        let xml = "<p:sld xmlns:a=\"a\" xmlns:p=\"p\"><p:cSld><p:spTree>\
                   <p:sp><p:nvSpPr/><p:spPr/></p:sp>\
                   <p:pic><p:blipFill/></p:pic>\
                   <p:sp><p:txBody><a:p><a:r><a:t>Line one</a:t></a:r></a:p>\
                   <a:p><a:r><a:t>Line two</a:t></a:r></a:p></p:txBody></p:sp>\
                   </p:spTree></p:cSld></p:sld>";
        assert_eq!(slide_shapes(xml).unwrap(), "Line one\nLine two\n");
    }

    #[cfg(feature = "pptx")]
    #[test]
    fn pptx_follows_presentation_slide_order() {
        let presentation = "<p:presentation xmlns:p=\"p\" xmlns:r=\"r\"><p:sldIdLst>\
                            <p:sldId id=\"256\" r:id=\"rId3\"/><p:sldId id=\"257\" r:id=\"rId2\"/>\
                            </p:sldIdLst></p:presentation>";
        let rels = "<Relationships xmlns=\"rels\">\
                    <Relationship Id=\"rId2\" Type=\"slide\" Target=\"slides/slide1.xml\"/>\
                    <Relationship Id=\"rId3\" Type=\"slide\" Target=\"slides/slide2.xml\"/>\
                    </Relationships>";
        assert_eq!(
            listed_slides(presentation, rels).unwrap(),
            vec!["ppt/slides/slide2.xml".to_string(), "ppt/slides/slide1.xml".to_string()]
        );
    }
}
