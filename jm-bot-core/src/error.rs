//! Error types for the jm-bot pipeline.
//!
//! One enum per pipeline stage, wrapped by [`PipelineError`]. Every error
//! can render itself as the short text that is replied to the chat via
//! `user_message()`; `Display` carries the detailed, log-oriented form.

use std::path::PathBuf;
use thiserror::Error;

/// Input validation errors for the `/jm` command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Message text is not a `/jm` command at all
    #[error("not a /jm command: {0:?}")]
    NotACommand(String),

    /// Album id contains something other than ASCII digits
    #[error("invalid album id: {0:?}")]
    InvalidAlbumId(String),

    /// Chapter index is not a positive integer
    #[error("invalid chapter index: {0:?}")]
    InvalidChapter(String),
}

impl CommandError {
    pub fn user_message(&self) -> String {
        match self {
            CommandError::NotACommand(_) => crate::command::USAGE.to_string(),
            CommandError::InvalidAlbumId(raw) => {
                format!("Album id must be numeric, got \"{raw}\"")
            }
            CommandError::InvalidChapter(_) => "Chapter must be a positive integer".to_string(),
        }
    }
}

/// Errors raised while talking to the crawler.
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Interpreter or crawler bridge could not be located
    #[error("crawler bridge unavailable: {0}")]
    BridgeUnavailable(String),

    /// Bridge process exited unsuccessfully
    #[error("crawler bridge failed: {0}")]
    Bridge(String),

    /// The content source does not know this album/chapter
    #[error("album not found: {0}")]
    NotFound(String),

    /// Bridge wrote something that is not an album detail document
    #[error("malformed album detail: {0}")]
    MalformedDetail(#[from] serde_json::Error),

    /// Download finished but left no images behind
    #[error("no images found under {}", .0.display())]
    NoImages(PathBuf),

    #[error("crawler I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CrawlError {
    pub fn user_message(&self) -> String {
        match self {
            CrawlError::BridgeUnavailable(_) => "Downloader is not available on this host".to_string(),
            CrawlError::NotFound(id) => format!("Album {id} does not exist"),
            CrawlError::NoImages(_) => "No images were downloaded".to_string(),
            other => format!("Download failed: {other}"),
        }
    }
}

/// Errors raised while assembling the PDF.
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("no images to assemble")]
    NoImages,

    /// An image could not be opened or decoded
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("PDF I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking assembly task panicked or was cancelled
    #[error("PDF task aborted: {0}")]
    Aborted(String),
}

impl AssembleError {
    pub fn user_message(&self) -> String {
        match self {
            AssembleError::NoImages => "No images to put into the PDF".to_string(),
            _ => "PDF generation failed".to_string(),
        }
    }
}

/// Errors raised by the upload service client.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Service refused the connection or is unreachable
    #[error("could not connect to upload service: {0}")]
    Connection(String),

    #[error("upload service timed out: {0}")]
    Timeout(String),

    /// Service answered with a non-2xx status
    #[error("upload service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Service answered 2xx but the body is not the expected JSON
    #[error("malformed response from upload service: {0}")]
    MalformedResponse(String),

    /// Service answered with a JSON failure status
    #[error("upload rejected (retcode {retcode}): {message}")]
    Rejected { retcode: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to read file for upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn user_message(&self) -> String {
        match self {
            UploadError::Connection(_) => "Upload failed: upload service is unreachable".to_string(),
            UploadError::Timeout(_) => "Upload failed: upload service timed out".to_string(),
            UploadError::Status { status, .. } => format!("Upload failed: HTTP {status}"),
            UploadError::MalformedResponse(_) => {
                "Upload failed: unreadable response from upload service".to_string()
            }
            UploadError::Rejected { message, .. } => format!("Upload failed: {message}"),
            UploadError::Transport(_) => "Upload failed: network error".to_string(),
            UploadError::Io(_) => "Upload failed: PDF could not be read".to_string(),
        }
    }
}

/// Errors raised by a chat responder. Never fatal to the pipeline.
#[derive(Error, Debug)]
#[error("failed to send chat message: {0}")]
pub struct ResponderError(pub String);

/// Terminal failure of one `/jm` invocation.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("album {0} has no chapters")]
    EmptyAlbum(String),

    #[error(transparent)]
    Assemble(#[from] AssembleError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl PipelineError {
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::Command(e) => e.user_message(),
            PipelineError::Crawl(e) => e.user_message(),
            PipelineError::EmptyAlbum(_) => "Album has no chapters".to_string(),
            PipelineError::Assemble(e) => e.user_message(),
            PipelineError::Upload(e) => e.user_message(),
        }
    }
}
