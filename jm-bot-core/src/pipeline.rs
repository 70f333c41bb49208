//! High-level pipeline: orchestrates parse → download → assemble → upload for one `/jm` command.
//!
//! Each invocation is a single sequential pass:
//!   - Parses the message into an album request (or replies with usage)
//!   - Looks up the album and picks one chapter via [`select_chapter`]
//!   - Downloads that chapter through a [`Crawler`]
//!   - Assembles the images into a page-capped PDF on the blocking pool
//!   - Delivers the PDF through an [`Uploader`]
//!
//! Progress and every failure are replied to the originating chat through a
//! [`ChatResponder`]. A failed step returns immediately: a download failure
//! never assembles or uploads, an assembly failure never uploads.
//!
//! # Retention
//! The chapter image directory is removed once assembly has been attempted
//! or the download has failed, and the PDF once it has been delivered, unless
//! [`RetentionPolicy`] says to keep them. After an upload failure the PDF stays on disk.
//!
//! [`RetentionPolicy`]: crate::config::RetentionPolicy

use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::assemble::{images_to_pdf, pdf_file_name, PdfArtifact};
use crate::command::{parse_command, ParsedCommand, USAGE};
use crate::config::PipelineConfig;
use crate::contract::{ChatResponder, ChatTarget, Crawler, UploadRequest, Uploader};
use crate::error::{AssembleError, PipelineError};
use crate::selection::select_chapter;

/// What one successful command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    pub album_id: String,
    pub chapter: usize,
    pub pdf_name: String,
    pub page_count: usize,
    pub source_images: usize,
    pub upload_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReport {
    /// `/jm` without arguments; usage text was replied.
    Usage,
    Delivered(DeliveryReport),
}

/// Sends a reply, logging instead of failing when the chat is unreachable.
async fn say(responder: &dyn ChatResponder, target: &ChatTarget, text: &str) {
    debug!(?target, text, "[JM][REPLY]");
    if let Err(e) = responder.send_text(target, text).await {
        warn!(error = ?e, ?target, "[JM][REPLY] Failed to send chat message");
    }
}

/// Replies with the error's chat text and hands it back for the caller.
async fn fail(
    responder: &dyn ChatResponder,
    target: &ChatTarget,
    err: impl Into<PipelineError>,
) -> PipelineError {
    let err = err.into();
    error!(error = %err, "[JM][ERROR] Command failed");
    say(responder, target, &err.user_message()).await;
    err
}

fn remove_dir_best_effort(path: &Path) {
    match std::fs::remove_dir_all(path) {
        Ok(()) => debug!(path = %path.display(), "[JM][CLEANUP] Removed chapter images"),
        Err(e) => warn!(error = ?e, path = %path.display(), "[JM][CLEANUP] Failed to remove chapter images"),
    }
}

fn remove_file_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "[JM][CLEANUP] Removed PDF"),
        Err(e) => warn!(error = ?e, path = %path.display(), "[JM][CLEANUP] Failed to remove PDF"),
    }
}

pub async fn handle_command(
    config: &PipelineConfig,
    crawler: &dyn Crawler,
    uploader: &dyn Uploader,
    responder: &dyn ChatResponder,
    target: &ChatTarget,
    text: &str,
) -> Result<CommandReport, PipelineError> {
    info!(?target, text, "[JM] Handling command");

    let request = match parse_command(text) {
        Ok(ParsedCommand::Usage) => {
            say(responder, target, USAGE).await;
            return Ok(CommandReport::Usage);
        }
        Ok(ParsedCommand::Album(request)) => request,
        Err(e) => return Err(fail(responder, target, e).await),
    };
    let album_id = request.album_id.as_str();

    say(responder, target, &format!("Starting download of JM{album_id}")).await;

    // --- Step 1: Album detail and chapter selection ---
    let detail = match crawler.album_detail(album_id).await {
        Ok(detail) => detail,
        Err(e) => return Err(fail(responder, target, e).await),
    };
    if detail.chapter_count() == 0 {
        return Err(fail(responder, target, PipelineError::EmptyAlbum(album_id.to_string())).await);
    }

    let selection = select_chapter(detail.chapter_count(), request.chapter);
    info!(
        album_id,
        chapters = detail.chapter_count(),
        requested = ?request.chapter,
        selected = selection.index,
        "[JM] Chapter selected"
    );
    if let Some(notice) = &selection.notice {
        say(responder, target, &notice.to_string()).await;
    }
    let Some(chapter) = detail.chapter_ref(selection.index) else {
        return Err(fail(responder, target, PipelineError::EmptyAlbum(album_id.to_string())).await);
    };

    // --- Step 2: Download ---
    let chapter_dir = config.chapter_dir(album_id, chapter.index);
    let images = match crawler.download_chapter(&chapter, &chapter_dir).await {
        Ok(images) => images,
        Err(e) => {
            if !config.retention.keep_images && chapter_dir.exists() {
                remove_dir_best_effort(&chapter_dir);
            }
            return Err(fail(responder, target, e).await);
        }
    };
    info!(album_id, chapter = chapter.index, images = images.len(), "[JM] Download succeeded");
    if !chapter.title.is_empty() {
        say(responder, target, &chapter.title).await;
    }

    // --- Step 3: Assemble ---
    let pdf_path = config.pdf_path(album_id, chapter.index);
    let max_pages = config.max_pdf_pages;
    let assembled = {
        let pdf_path = pdf_path.clone();
        tokio::task::spawn_blocking(move || images_to_pdf(&images, max_pages, &pdf_path))
            .await
            .unwrap_or_else(|e| Err(AssembleError::Aborted(e.to_string())))
    };
    if !config.retention.keep_images {
        remove_dir_best_effort(&chapter_dir);
    }
    let artifact: PdfArtifact = match assembled {
        Ok(artifact) => artifact,
        Err(e) => return Err(fail(responder, target, e).await),
    };
    if artifact.truncated() {
        say(
            responder,
            target,
            &format!(
                "Chapter has {} pages, PDF keeps the first {}",
                artifact.source_images, artifact.page_count
            ),
        )
        .await;
    }

    // --- Step 4: Upload ---
    let pdf_name = pdf_file_name(album_id, chapter.index);
    info!(file = %pdf_name, ?target, "[JM][UPLOAD] Uploading PDF");
    let outcome = match uploader
        .upload_file(UploadRequest {
            path: &artifact.path,
            file_name: &pdf_name,
            target: *target,
        })
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return Err(fail(responder, target, e).await),
    };
    info!(file = %pdf_name, reference = %outcome.reference, "[JM][UPLOAD] Upload succeeded");
    say(responder, target, &format!("Uploaded {pdf_name}")).await;

    if !config.retention.keep_pdf {
        remove_file_best_effort(&artifact.path);
    }

    Ok(CommandReport::Delivered(DeliveryReport {
        album_id: album_id.to_string(),
        chapter: chapter.index,
        pdf_name,
        page_count: artifact.page_count,
        source_images: artifact.source_images,
        upload_reference: outcome.reference,
    }))
}
