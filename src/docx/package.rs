use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::xml::XmlDocument;
use super::{DocxError, Document};

const PACKAGE_RELS: &str = "_rels/.rels";
const DEFAULT_MAIN_PART: &str = "word/document.xml";
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// A `.docx` archive on disk. Only the main document part is ever rewritten;
/// every other entry is copied through untouched on save.
#[derive(Debug, Clone)]
pub struct DocxPackage {
    source: PathBuf,
    main_part: String,
}

impl DocxPackage {
    pub fn open(path: &Path) -> Result<(Self, Document), DocxError> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let main_part = resolve_main_part(&mut archive)?;
        let xml = read_entry(&mut archive, &main_part)?;
        let document = Document::parse(&xml)?;
        debug!(
            "Opened {} (main part {}, {} blocks)",
            path.display(),
            main_part,
            document.block_count()
        );
        Ok((
            DocxPackage {
                source: path.to_path_buf(),
                main_part,
            },
            document,
        ))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Write `document` as the main part of a copy of the source package.
    /// Goes through a temp file in `out`'s directory so `out` may equal the
    /// source; the temp file is removed if any step fails.
    pub fn save(&self, document: &Document, out: &Path) -> Result<(), DocxError> {
        let mut archive = ZipArchive::new(File::open(&self.source)?)?;
        let body = document.to_bytes()?;
        let dir = out
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(dir)?;

        let mut writer = ZipWriter::new(tmp.as_file());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for i in 0..archive.len() {
            let entry = archive.by_index_raw(i)?;
            if entry.name() == self.main_part {
                drop(entry);
                writer.start_file(self.main_part.as_str(), options)?;
                writer.write_all(&body)?;
            } else {
                writer.raw_copy_file(entry)?;
            }
        }
        writer.finish()?;

        tmp.persist(out).map_err(|e| e.error)?;
        debug!("Saved {} ({} bytes main part)", out.display(), body.len());
        Ok(())
    }
}

/// Locate the main part through the package relationships, falling back to
/// the conventional name.
fn resolve_main_part(archive: &mut ZipArchive<File>) -> Result<String, DocxError> {
    let rels = match read_entry(archive, PACKAGE_RELS) {
        Ok(xml) => xml,
        Err(DocxError::MissingPart(_)) => return Ok(DEFAULT_MAIN_PART.to_string()),
        Err(e) => return Err(e),
    };
    let rels = XmlDocument::parse(&rels)?;
    let target = rels.root().and_then(|root| {
        root.elements()
            .map(|(_, e)| e)
            .filter(|e| e.name.ends_with("Relationship"))
            .find(|e| e.attr("Type").is_some_and(|t| t.ends_with(OFFICE_DOCUMENT_REL)))
            .and_then(|e| e.attr("Target"))
            .map(|t| t.trim_start_matches('/').to_string())
    });
    Ok(target.unwrap_or_else(|| DEFAULT_MAIN_PART.to_string()))
}

fn read_entry(archive: &mut ZipArchive<File>, name: &str) -> Result<String, DocxError> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        ZipError::FileNotFound => DocxError::MissingPart(name.to_string()),
        other => other.into(),
    })?;
    let mut bytes = Vec::new();
    // a failed read inside the archive means a damaged entry
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| DocxError::Malformed(format!("{name}: {e}")))?;
    let text = String::from_utf8(bytes)?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures::*;

    #[test]
    fn open_edit_save_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        let output = dir.path().join("out.docx");
        write_docx(&input, &document_xml(&[text_paragraph("hello"), text_paragraph("world")]));

        let (package, mut document) = DocxPackage::open(&input).unwrap();
        assert_eq!(document.block_count(), 2);
        {
            let mut block = document.block_mut(1).unwrap();
            let run = block.as_block().runs().remove(0).path;
            block.set_run_text(&run, "there");
        }
        package.save(&document, &output).unwrap();

        let (_, reopened) = DocxPackage::open(&output).unwrap();
        assert_eq!(reopened.block(0).unwrap().text(), "hello");
        assert_eq!(reopened.block(1).unwrap().text(), "there");

        let mut archive = ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let mut media = Vec::new();
        archive
            .by_name("word/media/image1.png")
            .unwrap()
            .read_to_end(&mut media)
            .unwrap();
        assert_eq!(media, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.docx");
        write_docx(&input, &document_xml(&[text_paragraph("hello")]));
        let (package, document) = DocxPackage::open(&input).unwrap();

        // a non-empty directory cannot be replaced by a file
        let output = dir.path().join("taken.docx");
        std::fs::create_dir(&output).unwrap();
        std::fs::write(output.join("keep"), b"x").unwrap();

        assert!(package.save(&document, &output).is_err());
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["in.docx", "taken.docx"]);
        assert!(output.is_dir());
    }

    #[test]
    fn garbage_is_corrupted_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.docx");
        std::fs::write(&input, b"not a zip archive").unwrap();
        let err = DocxPackage::open(&input).unwrap_err();
        assert!(err.is_corrupted());
    }

    #[test]
    fn missing_file_is_not_corruption() {
        let err = DocxPackage::open(Path::new("/nonexistent/nothing.docx")).unwrap_err();
        assert!(!err.is_corrupted());
    }
}
