//! Input resolution: identify the document format and stage it for rendering.
//!
//! A document arrives either as raw bytes (an upload) or as a path. Bytes are
//! written into the run's workspace as `input.<ext>` so pdfium and the
//! converter have a file to open. PDFs given by path are read in place;
//! word-processor files given by path are copied in, so the converter's
//! output name is always `input.pdf`.
//!
//! The format is decided by magic bytes first. The file extension only breaks
//! ties (DOCX vs ODT share the ZIP signature) or, for unknown content, lets a
//! file named `.pdf` through so pdfium can report it as corrupt.

use crate::error::LeaseError;
use crate::workspace::Workspace;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const RTF_MAGIC: &[u8] = b"{\\rtf";
const ODT_MIMETYPE: &[u8] = b"application/vnd.oasis.opendocument.text";

/// Bytes read from a path to decide its format.
const SNIFF_LEN: usize = 512;

/// A document supplied by the caller.
#[derive(Debug, Clone)]
pub enum Document {
    /// Raw bytes with the name they were uploaded under.
    Bytes { name: String, data: Vec<u8> },
    /// A file on disk.
    Path(PathBuf),
}

impl Document {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Document::Bytes {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Document::Path(path.into())
    }

    /// Short name used in logs, errors and observer events.
    pub fn label(&self) -> String {
        match self {
            Document::Bytes { name, .. } => name.clone(),
            Document::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
        }
    }

    fn extension(&self) -> Option<String> {
        let path = match self {
            Document::Bytes { name, .. } => Path::new(name),
            Document::Path(p) => p.as_path(),
        };
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Formats the normaliser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Doc,
    Odt,
    Rtf,
}

impl DocumentFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Odt => "odt",
            DocumentFormat::Rtf => "rtf",
        }
    }

    /// Whether the document must be converted to PDF first.
    pub fn needs_conversion(self) -> bool {
        self != DocumentFormat::Pdf
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            "doc" => Some(DocumentFormat::Doc),
            "odt" => Some(DocumentFormat::Odt),
            "rtf" => Some(DocumentFormat::Rtf),
            _ => None,
        }
    }
}

/// Decide the format of `head` (the first bytes of a document).
pub fn sniff_format(head: &[u8], extension: Option<&str>) -> Option<DocumentFormat> {
    if head.starts_with(PDF_MAGIC) {
        return Some(DocumentFormat::Pdf);
    }
    if head.starts_with(RTF_MAGIC) {
        return Some(DocumentFormat::Rtf);
    }
    if head.starts_with(OLE_MAGIC) {
        return Some(DocumentFormat::Doc);
    }
    if head.starts_with(ZIP_MAGIC) {
        // ODF packages store an uncompressed `mimetype` entry first.
        let odt = extension == Some("odt")
            || head.windows(ODT_MIMETYPE.len()).any(|w| w == ODT_MIMETYPE);
        return Some(if odt {
            DocumentFormat::Odt
        } else {
            DocumentFormat::Docx
        });
    }
    match extension.and_then(DocumentFormat::from_extension) {
        Some(DocumentFormat::Pdf) => Some(DocumentFormat::Pdf),
        _ => None,
    }
}

/// A document ready for conversion or rendering.
#[derive(Debug, Clone)]
pub struct StagedInput {
    pub path: PathBuf,
    pub format: DocumentFormat,
}

/// Identify the format of `document` and make it available as a file.
pub async fn stage_input(
    document: &Document,
    workspace: &Workspace,
) -> Result<StagedInput, LeaseError> {
    let label = document.label();
    let ext = document.extension();

    match document {
        Document::Bytes { data, .. } => {
            if data.is_empty() {
                return Err(LeaseError::EmptyDocument { document: label });
            }
            let format = detect(data, ext.as_deref(), &label)?;
            let path = workspace
                .write_file_async(&format!("input.{}", format.extension()), data)
                .await?;
            debug!("Staged {} as {:?} at {}", label, format, path.display());
            Ok(StagedInput { path, format })
        }
        Document::Path(src) => {
            let head = read_head(src)?;
            if head.is_empty() {
                return Err(LeaseError::EmptyDocument { document: label });
            }
            let format = detect(&head, ext.as_deref(), &label)?;
            if !format.needs_conversion() {
                debug!("Using {} in place", src.display());
                return Ok(StagedInput {
                    path: src.clone(),
                    format,
                });
            }
            let data = tokio::fs::read(src).await.map_err(|e| io_error(src, e))?;
            let path = workspace
                .write_file_async(&format!("input.{}", format.extension()), &data)
                .await?;
            debug!("Copied {} into workspace as {:?}", label, format);
            Ok(StagedInput { path, format })
        }
    }
}

fn detect(head: &[u8], ext: Option<&str>, label: &str) -> Result<DocumentFormat, LeaseError> {
    sniff_format(head, ext).ok_or_else(|| LeaseError::UnsupportedFormat {
        document: label.to_string(),
        detail: format!(
            "expected PDF, DOCX, DOC, ODT or RTF; leading bytes {:02X?}",
            &head[..head.len().min(8)]
        ),
    })
}

/// Read the first bytes of `path`, mapping I/O failures to input errors.
fn read_head(path: &Path) -> Result<Vec<u8>, LeaseError> {
    let file = std::fs::File::open(path).map_err(|e| io_error(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| io_error(path, e))?;
    Ok(head)
}

fn io_error(path: &Path, e: std::io::Error) -> LeaseError {
    match e.kind() {
        std::io::ErrorKind::NotFound => LeaseError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => LeaseError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => LeaseError::CorruptDocument {
            document: path.display().to_string(),
            detail: e.to_string(),
        },
    }
}
