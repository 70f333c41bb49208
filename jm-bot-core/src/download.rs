use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, error, info};
use walkdir::WalkDir;

use crate::contract::{AlbumDetail, ChapterRef, Crawler};
use crate::error::CrawlError;

/// Image extensions picked up after a download, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Drives the `jmcomic` library through a short Python program. Album
/// detail is written as JSON to the file named by the fourth argument, since
/// stdout may carry library logging; downloads land in the directory named
/// by the option file.
const BRIDGE: &str = r#"
import json, sys
import jmcomic

jmcomic.disable_jm_log()
op, option_path, target = sys.argv[1], sys.argv[2], sys.argv[3]
option = jmcomic.create_option_by_file(option_path)
if op == "detail":
    album = option.new_jm_client().get_album_detail(target)
    chapters = [{"photo_id": str(p.photo_id), "title": getattr(p, "name", "") or ""} for p in album]
    with open(sys.argv[4], "w", encoding="utf-8") as out:
        json.dump({"album_id": str(album.album_id), "name": album.name, "chapters": chapters}, out, ensure_ascii=False)
elif op == "download":
    jmcomic.download_photo(target, option)
else:
    sys.exit("unknown op: " + op)
"#;

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    pub data_dir: PathBuf,
    /// Interpreter that has `jmcomic` installed; a name on `PATH` or a path.
    pub python_bin: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            python_bin: "python3".to_string(),
        }
    }
}

/// [`Crawler`] backed by the `jmcomic` Python library.
pub struct JmcomicCrawler {
    config: CrawlerConfig,
}

impl JmcomicCrawler {
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }

    fn interpreter(&self) -> Result<PathBuf, CrawlError> {
        which::which(&self.config.python_bin).map_err(|e| {
            error!(python_bin = %self.config.python_bin, error = ?e, "Python interpreter not found");
            CrawlError::BridgeUnavailable(format!("{}: {e}", self.config.python_bin))
        })
    }

    /// Writes a jmcomic option file that downloads straight into `base_dir`.
    /// One temp file per call, so concurrent commands never share options.
    fn write_option_file(&self, base_dir: &Path) -> Result<tempfile::NamedTempFile, CrawlError> {
        std::fs::create_dir_all(&self.config.data_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("option_")
            .suffix(".yml")
            .tempfile_in(&self.config.data_dir)?;
        // A JSON string is a valid YAML double-quoted scalar.
        let base_dir = serde_json::to_string(&base_dir.to_string_lossy())
            .map_err(|e| CrawlError::Io(e.into()))?;
        write!(file, "dir_rule:\n  rule: Bd\n  base_dir: {base_dir}\n")?;
        file.flush()?;
        Ok(file)
    }

    async fn run_bridge(
        &self,
        op: &str,
        option: &Path,
        target: &str,
        result_file: Option<&Path>,
    ) -> Result<(), CrawlError> {
        let python = self.interpreter()?;
        debug!(python = %python.display(), op, target, "Launching crawler bridge");
        let mut command = Command::new(&python);
        command.arg("-c").arg(BRIDGE).arg(op).arg(option).arg(target);
        if let Some(path) = result_file {
            command.arg(path);
        }
        let output = command
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                error!(error = ?e, op, target, "Failed to launch crawler bridge");
                CrawlError::Io(e)
            })?;

        if output.status.success() {
            debug!(
                op,
                stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                "Crawler bridge finished"
            );
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(op, target, status = %output.status, stderr = %stderr, "Crawler bridge exited with error");
        if stderr.contains("MissingAlbumPhotoException") {
            return Err(CrawlError::NotFound(target.to_string()));
        }
        Err(CrawlError::Bridge(stderr_tail(&stderr)))
    }
}

/// Last non-empty line of a traceback, which names the exception.
fn stderr_tail(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no output")
        .to_string()
}

#[async_trait::async_trait]
impl Crawler for JmcomicCrawler {
    async fn album_detail(&self, album_id: &str) -> Result<AlbumDetail, CrawlError> {
        info!(album_id, "[JM][DOWNLOAD] Fetching album detail");
        let option = self.write_option_file(&self.config.data_dir)?;
        let result = tempfile::Builder::new()
            .prefix("detail_")
            .suffix(".json")
            .tempfile_in(&self.config.data_dir)?;
        self.run_bridge("detail", option.path(), album_id, Some(result.path()))
            .await?;
        let raw = tokio::fs::read(result.path()).await?;
        let detail: AlbumDetail = serde_json::from_slice(&raw).map_err(|e| {
            error!(error = ?e, album_id, "Crawler bridge wrote malformed album detail");
            CrawlError::MalformedDetail(e)
        })?;
        info!(
            album_id,
            title = %detail.title,
            chapters = detail.chapter_count(),
            "[JM][DOWNLOAD] Album detail fetched"
        );
        Ok(detail)
    }

    async fn download_chapter(
        &self,
        chapter: &ChapterRef,
        dest: &Path,
    ) -> Result<Vec<PathBuf>, CrawlError> {
        if dest.exists() {
            tokio::fs::remove_dir_all(dest).await.map_err(|e| {
                error!(error = ?e, path = %dest.display(), "Failed to remove existing chapter dir");
                CrawlError::Io(e)
            })?;
            debug!(path = %dest.display(), "Removed existing chapter dir");
        }
        tokio::fs::create_dir_all(dest).await?;

        info!(
            album_id = %chapter.album_id,
            chapter = chapter.index,
            photo_id = %chapter.photo_id,
            path = %dest.display(),
            "[JM][DOWNLOAD] Downloading chapter"
        );
        let option = self.write_option_file(dest)?;
        self.run_bridge("download", option.path(), &chapter.photo_id, None)
            .await?;

        let images = collect_images(dest)?;
        if images.is_empty() {
            error!(path = %dest.display(), "Download produced no images");
            return Err(CrawlError::NoImages(dest.to_path_buf()));
        }
        info!(count = images.len(), path = %dest.display(), "[JM][DOWNLOAD] Chapter downloaded");
        Ok(images)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

/// All images under `dir`, recursively, sorted ascending by path.
pub fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, CrawlError> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| {
            error!(error = ?e, path = %dir.display(), "Failed to walk chapter dir");
            CrawlError::Io(e.into())
        })?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            images.push(entry.into_path());
        }
    }
    images.sort();
    Ok(images)
}
