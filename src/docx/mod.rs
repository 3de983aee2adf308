pub mod document;
pub mod package;
pub mod xml;

pub use document::{Block, BlockMut, Document, Run};
pub use package::DocxPackage;

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid UTF-8 in markup: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid UTF-8 in markup: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),
    #[error("malformed markup: {0}")]
    Malformed(String),
    #[error("package has no main document part ({0})")]
    MissingPart(String),
    #[error("main document part has no w:body")]
    MissingBody,
}

impl DocxError {
    /// Whether the input itself is damaged, as opposed to an environment failure.
    pub fn is_corrupted(&self) -> bool {
        !matches!(self, DocxError::Io(_))
    }
}

/// Namespace declarations used by the test fixtures.
#[cfg(test)]
pub const TEST_NAMESPACES: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:pic="http://schemas.openxmlformats.org/drawingml/2006/picture" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:mc="http://schemas.openxmlformats.org/markup-compatibility/2006" xmlns:v="urn:schemas-microsoft-com:vml" xmlns:o="urn:schemas-microsoft-com:office:office""#;

/// Paragraph and document builders for tests across the crate.
#[cfg(test)]
pub mod fixtures {
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::{Document, TEST_NAMESPACES};

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#;
    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

    /// Minimal package: content types, relationships, main part and one media entry.
    pub fn write_docx(path: &Path, document_xml: &str) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(RELS.as_bytes()).unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.start_file("word/media/image1.png", options).unwrap();
        zip.write_all(&[0x89, b'P', b'N', b'G']).unwrap();
        zip.finish().unwrap();
    }

    pub fn document_xml(paragraphs: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document {}><w:body>{}<w:sectPr/></w:body></w:document>"#,
            TEST_NAMESPACES,
            paragraphs.concat()
        )
    }

    pub fn document(paragraphs: &[String]) -> Document {
        Document::parse(&document_xml(paragraphs)).unwrap()
    }

    pub fn text_run(text: &str) -> String {
        format!(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#, text)
    }

    pub fn paragraph(runs: &[String]) -> String {
        format!("<w:p><w:pPr><w:jc w:val=\"left\"/></w:pPr>{}</w:p>", runs.concat())
    }

    pub fn text_paragraph(text: &str) -> String {
        paragraph(&[text_run(text)])
    }

    pub fn drawing(id: u32, name: &str, cx: i64, cy: i64) -> String {
        format!(
            r#"<w:drawing><wp:inline distT="0" distB="0"><wp:extent cx="{cx}" cy="{cy}"/><wp:docPr id="{id}" name="{name}"/><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/picture"><pic:pic><pic:blipFill><a:blip r:embed="rId{id}"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing>"#
        )
    }

    pub fn image_run(id: u32, name: &str, cx: i64, cy: i64) -> String {
        format!("<w:r>{}</w:r>", drawing(id, name, cx, cy))
    }

    pub fn image_paragraph(images: &[(&str, i64, i64)]) -> String {
        let runs: Vec<String> = images
            .iter()
            .enumerate()
            .map(|(i, (name, cx, cy))| image_run(i as u32 + 1, name, *cx, *cy))
            .collect();
        paragraph(&runs)
    }

    /// One well-formed title/url/image group.
    pub fn valid_group(n: usize) -> Vec<String> {
        let name = format!("Picture {n}");
        vec![
            text_paragraph(&format!("{n}.Weibo_Daily News：Headline {n}")),
            text_paragraph(&format!("https://www.example.com/news/{n}?ref=feed")),
            image_paragraph(&[(name.as_str(), 5_486_400, 3_048_000)]),
        ]
    }
}
