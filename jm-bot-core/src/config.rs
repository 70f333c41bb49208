use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Largest PDF produced unless configured otherwise.
pub const DEFAULT_MAX_PDF_PAGES: usize = 300;

/// What to keep on disk once a command is done with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep the chapter image directory after assembly.
    pub keep_images: bool,
    /// Keep the PDF after a successful upload.
    pub keep_pdf: bool,
}

/// Configuration handed to the pipeline for every invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub max_pdf_pages: usize,
    pub retention: RetentionPolicy,
}

impl PipelineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_pdf_pages: DEFAULT_MAX_PDF_PAGES,
            retention: RetentionPolicy::default(),
        }
    }

    /// `<data_dir>/<album_id>/<chapter>/`
    pub fn chapter_dir(&self, album_id: &str, chapter: usize) -> PathBuf {
        chapter_dir(&self.data_dir, album_id, chapter)
    }

    /// `<data_dir>/JM_<album_id>_<chapter:02>.pdf`
    pub fn pdf_path(&self, album_id: &str, chapter: usize) -> PathBuf {
        self.data_dir
            .join(crate::assemble::pdf_file_name(album_id, chapter))
    }

    pub fn trace_loaded(&self) {
        info!(
            data_dir = %self.data_dir.display(),
            max_pdf_pages = self.max_pdf_pages,
            keep_images = self.retention.keep_images,
            keep_pdf = self.retention.keep_pdf,
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}

pub fn chapter_dir(data_dir: &Path, album_id: &str, chapter: usize) -> PathBuf {
    data_dir
        .join(crate::assemble::sanitize_filename(album_id))
        .join(chapter.to_string())
}
