use crate::error::IngestError;
use crate::extractor::PdfExtractor;
use crate::models::{Document, Upload};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;
use walkdir::WalkDir;

const PDF_MAGIC: &[u8] = b"%PDF-";

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Reads files and folders (recursively, pdf only) into uploads.
pub fn read_uploads(paths: &[PathBuf]) -> Result<Vec<Upload>, IngestError> {
    let mut uploads = Vec::new();

    for path in paths {
        let files = if path.is_dir() {
            discover_pdf_files(path)
        } else {
            vec![path.clone()]
        };

        for file in files {
            let name = file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| IngestError::MissingFileName(file.display().to_string()))?;
            uploads.push(Upload::new(name, fs::read(&file)?));
        }
    }

    Ok(uploads)
}

/// Extracts every page of every upload. Any unreadable upload fails the whole batch.
pub fn ingest_uploads(
    uploads: &[Upload],
    extractor: &dyn PdfExtractor,
) -> Result<Vec<Document>, IngestError> {
    if uploads.is_empty() {
        return Err(IngestError::InvalidArgument(
            "no pdf files were uploaded".to_string(),
        ));
    }

    let mut documents = Vec::new();

    for upload in uploads {
        if !upload.bytes.starts_with(PDF_MAGIC) {
            return Err(IngestError::NotPdf(upload.file_name.clone()));
        }

        let staged = stage_upload(upload)?;
        let pages = extractor
            .extract_pages(staged.path())
            .map_err(|error| match error {
                IngestError::PdfParse(details) => {
                    IngestError::PdfParse(format!("{}: {details}", upload.file_name))
                }
                other => other,
            })?;

        debug!(file = %upload.file_name, pages = pages.len(), "extracted upload");

        documents.extend(pages.into_iter().map(|page| Document {
            source: upload.file_name.clone(),
            page: page.number,
            text: page.text,
        }));
    }

    Ok(documents)
}

/// Each upload gets its own temp file, removed when the handle drops.
fn stage_upload(upload: &Upload) -> Result<NamedTempFile, IngestError> {
    let mut staged = Builder::new()
        .prefix("pdf-chat-upload-")
        .suffix(".pdf")
        .tempfile()?;
    staged.write_all(&upload.bytes)?;
    staged.flush()?;
    Ok(staged)
}
