use image::{Rgb, RgbImage};
use jm_bot_core::config::{PipelineConfig, RetentionPolicy};
use jm_bot_core::contract::{
    AlbumDetail, ChapterInfo, ChapterRef, ChatTarget, MockChatResponder, MockCrawler,
    MockUploader, UploadOutcome, UploadRequest,
};
use jm_bot_core::error::{AssembleError, CommandError, CrawlError, PipelineError, UploadError};
use jm_bot_core::pipeline::{handle_command, CommandReport};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

const GROUP: ChatTarget = ChatTarget::Group(10001);

fn album(id: &str, chapters: usize) -> AlbumDetail {
    AlbumDetail {
        album_id: id.to_string(),
        title: format!("Album {id}"),
        chapters: (1..=chapters)
            .map(|i| ChapterInfo {
                photo_id: format!("{id}{i}"),
                title: format!("Chapter {i}"),
            })
            .collect(),
    }
}

fn write_pages(dest: &Path, count: usize) -> Vec<PathBuf> {
    std::fs::create_dir_all(dest).unwrap();
    (1..=count)
        .map(|i| {
            let path = dest.join(format!("{i:05}.png"));
            RgbImage::from_pixel(1, 1, Rgb([i as u8, 0, 0]))
                .save(&path)
                .unwrap();
            path
        })
        .collect()
}

fn recording_responder() -> (MockChatResponder, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let mut responder = MockChatResponder::new();
    responder.expect_send_text().returning(move |_, text| {
        sink.lock().unwrap().push(text.to_string());
        Ok(())
    });
    (responder, log)
}

/// Crawler serving `detail`, writing `pages` images for whichever chapter is requested.
fn crawler_with(detail: AlbumDetail, pages: usize, downloaded: Arc<Mutex<Vec<ChapterRef>>>) -> MockCrawler {
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(move |_| Ok(detail.clone()));
    crawler
        .expect_download_chapter()
        .times(1)
        .returning(move |chapter: &ChapterRef, dest: &Path| {
            downloaded.lock().unwrap().push(chapter.clone());
            Ok(write_pages(dest, pages))
        });
    crawler
}

fn accepting_uploader(uploaded: Arc<Mutex<Vec<(String, usize)>>>) -> MockUploader {
    let mut uploader = MockUploader::new();
    uploader
        .expect_upload_file()
        .times(1)
        .returning(move |req: UploadRequest<'_>| {
            assert!(req.path.exists(), "PDF must exist while uploading");
            assert_eq!(req.target, GROUP);
            let size = std::fs::metadata(req.path).unwrap().len() as usize;
            uploaded
                .lock()
                .unwrap()
                .push((req.file_name.to_string(), size));
            Ok(UploadOutcome {
                reference: "file-1".to_string(),
            })
        });
    uploader
}

#[tokio::test]
async fn test_single_chapter_album_becomes_one_pdf() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let downloaded = Arc::new(Mutex::new(Vec::new()));
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let crawler = crawler_with(album("123456", 1), 250, downloaded.clone());
    let uploader = accepting_uploader(uploaded.clone());
    let (responder, replies) = recording_responder();

    let report = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 123456")
        .await
        .expect("Pipeline should succeed");

    let CommandReport::Delivered(report) = report else {
        panic!("Expected a delivery, got {report:?}");
    };
    assert_eq!(report.pdf_name, "JM_123456_01.pdf");
    assert_eq!(report.page_count, 250);
    assert_eq!(report.source_images, 250);
    assert_eq!(report.upload_reference, "file-1");
    assert_eq!(uploaded.lock().unwrap()[0].0, "JM_123456_01.pdf");
    assert_eq!(downloaded.lock().unwrap()[0].index, 1);

    // Default retention removes both the images and the delivered PDF.
    assert!(!data.path().join("123456").join("1").exists());
    assert!(!data.path().join("JM_123456_01.pdf").exists());
    assert!(replies
        .lock()
        .unwrap()
        .iter()
        .any(|r| r.contains("Uploaded JM_123456_01.pdf")));
}

#[tokio::test]
async fn test_requested_chapter_of_multi_chapter_album() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let downloaded = Arc::new(Mutex::new(Vec::new()));
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let crawler = crawler_with(album("123456", 3), 3, downloaded.clone());
    let uploader = accepting_uploader(uploaded.clone());
    let (responder, replies) = recording_responder();

    let report = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 123456 2")
        .await
        .expect("Pipeline should succeed");

    let chapter = downloaded.lock().unwrap()[0].clone();
    assert_eq!(chapter.index, 2);
    assert_eq!(chapter.photo_id, "1234562");
    assert_eq!(uploaded.lock().unwrap()[0].0, "JM_123456_02.pdf");
    assert!(matches!(report, CommandReport::Delivered(r) if r.chapter == 2));
    assert!(replies
        .lock()
        .unwrap()
        .iter()
        .any(|r| r.contains("downloading chapter 2")));
}

#[tokio::test]
async fn test_out_of_range_chapter_falls_back_to_first_with_notice() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let downloaded = Arc::new(Mutex::new(Vec::new()));
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let crawler = crawler_with(album("123456", 3), 2, downloaded.clone());
    let uploader = accepting_uploader(uploaded.clone());
    let (responder, replies) = recording_responder();

    handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 123456 99")
        .await
        .expect("Pipeline should succeed");

    assert_eq!(downloaded.lock().unwrap()[0].index, 1);
    assert_eq!(uploaded.lock().unwrap()[0].0, "JM_123456_01.pdf");
    assert!(replies
        .lock()
        .unwrap()
        .iter()
        .any(|r| r.contains("chapter 99 does not exist")));
}

#[tokio::test]
async fn test_oversized_chapter_index_falls_back_to_first() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let downloaded = Arc::new(Mutex::new(Vec::new()));
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let crawler = crawler_with(album("123456", 3), 1, downloaded.clone());
    let uploader = accepting_uploader(uploaded.clone());
    let (responder, replies) = recording_responder();

    handle_command(
        &config,
        &crawler,
        &uploader,
        &responder,
        &GROUP,
        "/jm 123456 99999999999",
    )
    .await
    .expect("An oversized index is not an input error");

    assert_eq!(downloaded.lock().unwrap()[0].index, 1);
    assert_eq!(uploaded.lock().unwrap()[0].0, "JM_123456_01.pdf");
    let replies = replies.lock().unwrap();
    assert!(replies.iter().any(|r| r.contains("does not exist; downloading chapter 1")));
    assert!(!replies.iter().any(|r| r.contains("positive integer")));
}

#[tokio::test]
async fn test_single_chapter_album_ignores_requested_index() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let downloaded = Arc::new(Mutex::new(Vec::new()));
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let crawler = crawler_with(album("777", 1), 1, downloaded.clone());
    let uploader = accepting_uploader(uploaded.clone());
    let (responder, replies) = recording_responder();

    handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 777 4")
        .await
        .expect("Pipeline should succeed");

    assert_eq!(downloaded.lock().unwrap()[0].index, 1);
    assert_eq!(uploaded.lock().unwrap()[0].0, "JM_777_01.pdf");
    assert!(replies.lock().unwrap().iter().any(|r| r.contains("ignoring chapter 4")));
}

#[tokio::test]
async fn test_page_cap_truncates_and_notifies() {
    let data = tempdir().unwrap();
    let mut config = PipelineConfig::new(data.path());
    config.max_pdf_pages = 5;
    let downloaded = Arc::new(Mutex::new(Vec::new()));
    let uploaded = Arc::new(Mutex::new(Vec::new()));
    let crawler = crawler_with(album("42", 1), 8, downloaded);
    let uploader = accepting_uploader(uploaded);
    let (responder, replies) = recording_responder();

    let report = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 42")
        .await
        .expect("Truncation is not an error");

    let CommandReport::Delivered(report) = report else {
        panic!("Expected a delivery");
    };
    assert_eq!(report.page_count, 5);
    assert_eq!(report.source_images, 8);
    assert!(replies
        .lock()
        .unwrap()
        .iter()
        .any(|r| r.contains("keeps the first 5")));
}

#[tokio::test]
async fn test_download_failure_skips_pdf_and_upload() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(|_| Ok(album("555", 1)));
    crawler
        .expect_download_chapter()
        .returning(|_, _| Err(CrawlError::Bridge("ConnectionError: timed out".into())));
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, replies) = recording_responder();

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 555")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Crawl(CrawlError::Bridge(_))));
    assert!(!data.path().join("JM_555_01.pdf").exists());
    assert!(replies
        .lock()
        .unwrap()
        .last()
        .unwrap()
        .starts_with("Download failed"));
}

#[tokio::test]
async fn test_partial_download_is_cleaned_up() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(|_| Ok(album("556", 1)));
    crawler
        .expect_download_chapter()
        .returning(|_, dest: &Path| {
            write_pages(dest, 2);
            Err(CrawlError::Bridge("ConnectionError: reset mid-chapter".into()))
        });
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, _replies) = recording_responder();

    handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 556")
        .await
        .unwrap_err();

    assert!(!data.path().join("556").join("1").exists());
}

#[tokio::test]
async fn test_partial_download_is_kept_when_retaining_images() {
    let data = tempdir().unwrap();
    let mut config = PipelineConfig::new(data.path());
    config.retention = RetentionPolicy {
        keep_images: true,
        keep_pdf: false,
    };
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(|_| Ok(album("557", 1)));
    crawler
        .expect_download_chapter()
        .returning(|_, dest: &Path| {
            write_pages(dest, 1);
            Err(CrawlError::Bridge("ConnectionError: reset mid-chapter".into()))
        });
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, _replies) = recording_responder();

    handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 557")
        .await
        .unwrap_err();

    assert!(data.path().join("557").join("1").join("00001.png").exists());
}

#[tokio::test]
async fn test_missing_album_is_reported() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(|id| Err(CrawlError::NotFound(id.to_string())));
    crawler.expect_download_chapter().times(0);
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, replies) = recording_responder();

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 404")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Crawl(CrawlError::NotFound(_))));
    assert_eq!(replies.lock().unwrap().last().unwrap(), "Album 404 does not exist");
}

#[tokio::test]
async fn test_assembly_failure_skips_upload() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(|_| Ok(album("666", 1)));
    crawler
        .expect_download_chapter()
        .returning(|_, dest: &Path| {
            std::fs::create_dir_all(dest).unwrap();
            let broken = dest.join("00001.jpg");
            std::fs::write(&broken, b"garbage").unwrap();
            Ok(vec![broken])
        });
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, replies) = recording_responder();

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 666")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Assemble(AssembleError::Decode { .. })));
    assert!(!data.path().join("JM_666_01.pdf").exists());
    assert_eq!(replies.lock().unwrap().last().unwrap(), "PDF generation failed");
}

#[tokio::test]
async fn test_upload_failure_keeps_pdf_on_disk() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let crawler = crawler_with(album("888", 1), 2, Arc::new(Mutex::new(Vec::new())));
    let mut uploader = MockUploader::new();
    uploader
        .expect_upload_file()
        .times(1)
        .returning(|_: UploadRequest<'_>| {
            Err(UploadError::Connection("connection refused".into()))
        });
    let (responder, replies) = recording_responder();

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 888")
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Upload(UploadError::Connection(_))));
    assert!(data.path().join("JM_888_01.pdf").exists());
    assert!(replies
        .lock()
        .unwrap()
        .last()
        .unwrap()
        .contains("unreachable"));
}

#[tokio::test]
async fn test_retention_policy_keeps_artifacts() {
    let data = tempdir().unwrap();
    let mut config = PipelineConfig::new(data.path());
    config.retention = RetentionPolicy {
        keep_images: true,
        keep_pdf: true,
    };
    let crawler = crawler_with(album("999", 1), 2, Arc::new(Mutex::new(Vec::new())));
    let uploader = accepting_uploader(Arc::new(Mutex::new(Vec::new())));
    let (responder, _) = recording_responder();

    handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 999")
        .await
        .expect("Pipeline should succeed");

    assert!(data.path().join("999").join("1").join("00001.png").exists());
    assert!(data.path().join("JM_999_01.pdf").exists());
}

#[tokio::test]
async fn test_invalid_input_never_reaches_crawler() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let mut crawler = MockCrawler::new();
    crawler.expect_album_detail().times(0);
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, replies) = recording_responder();

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm abc")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Command(CommandError::InvalidAlbumId(_))));

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 123 0")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Command(CommandError::InvalidChapter(_))));

    let report = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm")
        .await
        .expect("Usage is not an error");
    assert_eq!(report, CommandReport::Usage);

    let replies = replies.lock().unwrap();
    assert_eq!(replies.len(), 3);
    assert!(replies[0].contains("numeric"));
    assert!(replies[1].contains("positive integer"));
    assert!(replies[2].starts_with("Usage"));
}

#[tokio::test]
async fn test_empty_album_is_terminal() {
    let data = tempdir().unwrap();
    let config = PipelineConfig::new(data.path());
    let mut crawler = MockCrawler::new();
    crawler
        .expect_album_detail()
        .returning(|_| Ok(album("321", 0)));
    crawler.expect_download_chapter().times(0);
    let mut uploader = MockUploader::new();
    uploader.expect_upload_file().times(0);
    let (responder, _) = recording_responder();

    let err = handle_command(&config, &crawler, &uploader, &responder, &GROUP, "/jm 321")
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EmptyAlbum(id) if id == "321"));
}
