#![allow(unused)]

//! # contract: seams of the jm-bot pipeline
//!
//! The pipeline talks to three outside parties: the crawler that fetches
//! album pages, the service that delivers files into a chat, and the chat
//! itself. Each is a narrow async trait here so the pipeline can run against
//! the real implementations or against `mockall` mocks in tests.
//!
//! ## Mocking & Testing
//! - Traits are annotated with `automock`; mocks are exported when the
//!   `test-export-mocks` feature (on by default) is enabled, so dependent
//!   crates can use `MockCrawler`, `MockUploader` and `MockChatResponder`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use mockall::{automock, predicate::*};

use crate::error::{CrawlError, ResponderError, UploadError};

/// Where a command came from, and therefore where replies and uploads go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTarget {
    /// A group chat, by group number
    Group(i64),
    /// A private chat, by user id
    Private(i64),
}

/// A parsed `/jm` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRequest {
    /// Numeric album id, kept as a string as the content source does.
    pub album_id: String,
    /// Requested 1-based chapter, if any.
    pub chapter: Option<u32>,
}

/// One chapter entry of an album, in album order.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ChapterInfo {
    pub photo_id: String,
    #[serde(default)]
    pub title: String,
}

/// Album metadata as reported by the crawler.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct AlbumDetail {
    pub album_id: String,
    #[serde(default, rename = "name")]
    pub title: String,
    #[serde(default)]
    pub chapters: Vec<ChapterInfo>,
}

impl AlbumDetail {
    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Resolves a 1-based chapter index into a downloadable reference.
    pub fn chapter_ref(&self, index: usize) -> Option<ChapterRef> {
        let info = self.chapters.get(index.checked_sub(1)?)?;
        Some(ChapterRef {
            album_id: self.album_id.clone(),
            index,
            photo_id: info.photo_id.clone(),
            title: if info.title.is_empty() {
                self.title.clone()
            } else {
                info.title.clone()
            },
        })
    }
}

/// The single chapter handed to the crawler for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub album_id: String,
    /// 1-based display index, used for directory and file naming.
    pub index: usize,
    pub photo_id: String,
    pub title: String,
}

/// A request to deliver a local file into a chat.
pub struct UploadRequest<'a> {
    /// Local path of the file to deliver.
    pub path: &'a Path,
    /// File name shown in the chat.
    pub file_name: &'a str,
    pub target: ChatTarget,
}

/// Successful delivery, with whatever reference the service handed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub reference: String,
}

/// Trait for fetching album metadata and chapter images.
/// Implemented by the process bridge around the crawler library and by mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Look up the album and its chapter list.
    async fn album_detail(&self, album_id: &str) -> Result<AlbumDetail, CrawlError>;

    /// Download exactly one chapter into `dest`, returning its images sorted
    /// ascending by path.
    async fn download_chapter(
        &self,
        chapter: &ChapterRef,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, CrawlError>;
}

/// Trait for delivering a file into a chat through the upload service.
/// One attempt per call; implementors must not retry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload_file<'a>(&self, req: UploadRequest<'a>) -> Result<UploadOutcome, UploadError>;
}

/// Trait for plain-text replies to the originating chat.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn send_text(&self, target: &ChatTarget, text: &str) -> Result<(), ResponderError>;
}
