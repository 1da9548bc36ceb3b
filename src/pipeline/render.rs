//! Document normalisation: PDF → page text + one PNG per page, via pdfium.
//!
//! Pages are visited strictly in order. For each page the embedded text is
//! appended to the running buffer (a page without a text layer contributes
//! nothing) and the page is rasterised and stored as `page_<n>.png` in the
//! run's workspace. A document pdfium cannot open is fatal; no partial
//! result is returned.
//!
//! pdfium is blocking and not reentrant, so the work runs on the blocking
//! pool and a process-wide lock serialises renders. Concurrent extractions
//! still overlap their conversion and model calls.

use crate::error::LeaseError;
use crate::pipeline::encode::encode_png;
use crate::workspace::Workspace;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

static RENDER_LOCK: Mutex<()> = Mutex::new(());

/// One rendered page stored in a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed source page number.
    pub page_num: usize,
    pub path: PathBuf,
}

/// Canonical form of a document.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDocument {
    /// Text of all pages in page order. Empty for image-only documents.
    pub text: String,
    /// Page images, ordered and contiguous from page 1.
    pub pages: Vec<PageImage>,
}

impl NormalizedDocument {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Rasterisation settings.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub dpi: u32,
    pub max_pixels: u32,
    pub pdfium_lib_dir: Option<PathBuf>,
}

/// Extract text and page images from `pdf`, storing images in `workspace`.
///
/// A zero-page document yields an empty [`NormalizedDocument`]; deciding
/// that this is insufficient input is up to the caller.
pub async fn normalize_pdf(
    pdf: &Path,
    workspace: &Workspace,
    settings: &RenderSettings,
    document: &str,
) -> Result<NormalizedDocument, LeaseError> {
    let path = pdf.to_path_buf();
    let settings_owned = settings.clone();
    let label = document.to_string();

    let (text, rendered) = tokio::task::spawn_blocking(move || {
        render_blocking(&path, &settings_owned, &label)
    })
    .await
    .map_err(|e| LeaseError::Internal(format!("Render task panicked: {}", e)))??;

    let mut pages = Vec::with_capacity(rendered.len());
    for (idx, png) in rendered.into_iter().enumerate() {
        let page_num = idx + 1;
        let path = workspace
            .write_file_async(&page_file_name(page_num), &png)
            .await?;
        pages.push(PageImage { page_num, path });
    }

    info!(
        "Normalised {}: {} pages, {} chars of text",
        document,
        pages.len(),
        text.chars().count()
    );
    Ok(NormalizedDocument { text, pages })
}

pub fn page_file_name(page_num: usize) -> String {
    format!("page_{page_num}.png")
}

/// Whether pdfium can be bound, checked under the render lock.
pub fn pdfium_available(dir: Option<&Path>) -> Result<(), LeaseError> {
    let _guard = RENDER_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    bind_pdfium(dir).map(drop)
}

/// Bind pdfium from `dir`, or from the working directory then the system
/// library path when no directory is configured.
pub fn bind_pdfium(dir: Option<&Path>) -> Result<Pdfium, LeaseError> {
    let bindings = match dir {
        Some(dir) => {
            let dir = format!("{}/", dir.display());
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| LeaseError::PdfiumBindingFailed(format!("{:?}", e)))?;
    Ok(Pdfium::new(bindings))
}

/// Blocking implementation: returns the text and PNG bytes per page.
fn render_blocking(
    pdf: &Path,
    settings: &RenderSettings,
    document: &str,
) -> Result<(String, Vec<Vec<u8>>), LeaseError> {
    let _guard = RENDER_LOCK.lock().unwrap_or_else(|p| p.into_inner());
    let pdfium = bind_pdfium(settings.pdfium_lib_dir.as_deref())?;

    let doc = pdfium
        .load_pdf_from_file(pdf, None)
        .map_err(|e| LeaseError::CorruptDocument {
            document: document.to_string(),
            detail: format!("{:?}", e),
        })?;

    let pages = doc.pages();
    let total = pages.len() as usize;
    debug!("{}: {} pages", document, total);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(settings.dpi as f32 / 72.0)
        .set_maximum_width(settings.max_pixels as i32)
        .set_maximum_height(settings.max_pixels as i32);

    let mut text = String::new();
    let mut images = Vec::with_capacity(total);

    for (idx, page) in pages.iter().enumerate() {
        let page_num = idx + 1;

        match page.text() {
            Ok(t) => {
                let page_text = t.all();
                if !page_text.is_empty() {
                    text.push_str(&page_text);
                    if !page_text.ends_with('\n') {
                        text.push('\n');
                    }
                }
            }
            Err(e) => warn!("{}: page {} has no readable text: {:?}", document, page_num, e),
        }

        let raster_err = |detail: String| LeaseError::RasterisationFailed {
            document: document.to_string(),
            page: page_num,
            detail,
        };

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| raster_err(format!("{:?}", e)))?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {}/{} → {}x{} px",
            page_num,
            total,
            image.width(),
            image.height()
        );
        let png = encode_png(&image).map_err(|e| raster_err(e.to_string()))?;
        images.push(png);
    }

    Ok((text, images))
}
