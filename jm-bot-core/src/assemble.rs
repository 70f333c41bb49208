//! Image-to-PDF assembly.
//!
//! Every page is one image, decoded with `image`, flattened to RGB and
//! embedded with `printpdf` at 72 dpi so the page is exactly the size of the
//! image in points. The document is written to a temp file next to the
//! target and persisted in one rename, so a failed run never leaves a
//! half-written PDF at the target path.

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, RawImage, RawImageData, RawImageFormat,
    XObjectTransform,
};
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, error, info, warn};

use crate::error::AssembleError;

const PAGE_DPI: f32 = 72.0;
const MM_PER_INCH: f32 = 25.4;

/// The PDF written for one chapter.
#[derive(Debug, Clone)]
pub struct PdfArtifact {
    pub path: PathBuf,
    pub page_count: usize,
    /// Images the PDF was built from, in page order.
    pub pages: Vec<PathBuf>,
    /// Number of images offered; larger than `page_count` when truncated.
    pub source_images: usize,
}

impl PdfArtifact {
    pub fn truncated(&self) -> bool {
        self.source_images > self.page_count
    }
}

/// Replaces characters that are not allowed in file names with `_`.
pub fn sanitize_filename(name: &str) -> String {
    static ILLEGAL: OnceLock<Regex> = OnceLock::new();
    let re = ILLEGAL.get_or_init(|| {
        Regex::new(r#"[\\/:*?"<>|\r\n]+"#).expect("filename pattern is a valid regex")
    });
    re.replace_all(name, "_").trim().to_string()
}

/// `JM_<album_id>_<chapter:02>.pdf`
pub fn pdf_file_name(album_id: &str, chapter: usize) -> String {
    format!("JM_{}_{:02}.pdf", sanitize_filename(album_id), chapter)
}

fn load_page(path: &Path) -> Result<RawImage, AssembleError> {
    let decoded = image::open(path).map_err(|source| {
        error!(path = %path.display(), error = ?source, "Failed to decode image");
        AssembleError::Decode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    debug!(path = %path.display(), width, height, "Decoded page image");
    Ok(RawImage {
        pixels: RawImageData::U8(rgb.into_raw()),
        width: width as usize,
        height: height as usize,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    })
}

fn px_to_mm(px: usize) -> Mm {
    Mm(px as f32 * MM_PER_INCH / PAGE_DPI)
}

/// Concatenates the first `max_pages` (at least one) of `images` into a PDF
/// at `output`.
pub fn images_to_pdf(
    images: &[PathBuf],
    max_pages: usize,
    output: &Path,
) -> Result<PdfArtifact, AssembleError> {
    if images.is_empty() {
        error!(output = %output.display(), "Attempted PDF generation with no images");
        return Err(AssembleError::NoImages);
    }

    // A cap of zero would produce an empty document; keep at least one page.
    let max_pages = max_pages.max(1);
    let selected: Vec<PathBuf> = images.iter().take(max_pages).cloned().collect();
    if selected.len() < images.len() {
        warn!(
            available = images.len(),
            max_pages,
            "Image count exceeds page cap, truncating PDF"
        );
    }

    let title = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut doc = PdfDocument::new(&title);
    let mut pages = Vec::with_capacity(selected.len());
    for path in &selected {
        let raw = load_page(path)?;
        let (width, height) = (px_to_mm(raw.width), px_to_mm(raw.height));
        let image_id = doc.add_image(&raw);
        let ops = vec![Op::UseXobject {
            id: image_id,
            transform: XObjectTransform {
                dpi: Some(PAGE_DPI),
                ..Default::default()
            },
        }];
        pages.push(PdfPage::new(width, height, ops));
    }
    let page_count = pages.len();
    doc.with_pages(pages);

    let mut warnings = Vec::new();
    let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        debug!(count = warnings.len(), "printpdf emitted warnings while saving");
    }

    let dir = output.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| {
        error!(error = ?e, path = %dir.display(), "Failed to create PDF output directory");
        AssembleError::Io(e)
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        error!(error = ?e, "Failed to create temp file for PDF output");
        AssembleError::Io(e)
    })?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(output).map_err(|e| {
        error!(error = ?e.error, path = %output.display(), "Failed to persist PDF");
        AssembleError::Io(e.error)
    })?;

    info!(
        path = %output.display(),
        pages = page_count,
        bytes = bytes.len(),
        "Wrote PDF"
    );
    Ok(PdfArtifact {
        path: output.to_path_buf(),
        page_count,
        pages: selected,
        source_images: images.len(),
    })
}
