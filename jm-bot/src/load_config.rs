/// `load_config` module: loads the static YAML config, injects secrets from the environment and
/// resolves defaults into the typed configs used by the pipeline, the crawler and the NapCat client.
///
/// # Accepted YAML
/// Everything lives under a `jm:` section and every key is optional:
///
/// ```yaml
/// jm:
///   jm_data_dir: ""                          # empty: data/ next to the executable
///   napcat_base_url: http://127.0.0.1:3000
///   max_pdf_pages: 300
///   upload_mode: path                           # path | multipart
///   upload_timeout_secs: 60
///   python_bin: python3
///   keep_images: false
///   keep_pdf: false
/// ```
///
/// # Secrets
/// `NAPCAT_ACCESS_TOKEN` is read from the environment (or `.env`) and never from the file.
///
/// # Errors
/// All errors use `anyhow::Error` with context and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use jm_bot_core::config::{PipelineConfig, RetentionPolicy, DEFAULT_MAX_PDF_PAGES};
use jm_bot_core::download::CrawlerConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::upload::{NapcatConfig, UploadMode};

pub const ACCESS_TOKEN_ENV: &str = "NAPCAT_ACCESS_TOKEN";
pub const DEFAULT_NAPCAT_BASE_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub jm: JmSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JmSection {
    pub jm_data_dir: String,
    pub napcat_base_url: String,
    pub max_pdf_pages: usize,
    pub upload_mode: UploadMode,
    pub upload_timeout_secs: u64,
    pub python_bin: String,
    pub keep_images: bool,
    pub keep_pdf: bool,
}

impl Default for JmSection {
    fn default() -> Self {
        Self {
            jm_data_dir: String::new(),
            napcat_base_url: DEFAULT_NAPCAT_BASE_URL.to_string(),
            max_pdf_pages: DEFAULT_MAX_PDF_PAGES,
            upload_mode: UploadMode::Path,
            upload_timeout_secs: 60,
            python_bin: "python3".to_string(),
            keep_images: false,
            keep_pdf: false,
        }
    }
}

/// Fully resolved configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub pipeline: PipelineConfig,
    pub crawler: CrawlerConfig,
    pub napcat: NapcatConfig,
}

/// `data/` next to the running executable, or under the working directory
/// when the executable path is unknown.
pub fn default_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("data")))
        .unwrap_or_else(|| PathBuf::from("data"))
}

/// Loads the config file if one is given; otherwise every default applies.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<BotConfig> {
    let raw = match path {
        Some(path) => read_config_file(path.as_ref())?,
        None => {
            info!("No config file given, using defaults");
            CliConfig::default()
        }
    };
    resolve(raw.jm, std::env::var(ACCESS_TOKEN_ENV).ok())
}

fn read_config_file(path_ref: &Path) -> Result<CliConfig> {
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // An empty file deserializes to unit, not to a mapping.
    if config_content.trim().is_empty() {
        return Ok(CliConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Validates the YAML section and merges in the access token.
pub fn resolve(jm: JmSection, access_token: Option<String>) -> Result<BotConfig> {
    if jm.max_pdf_pages == 0 {
        error!("max_pdf_pages must be at least 1");
        anyhow::bail!("jm.max_pdf_pages must be at least 1");
    }
    if jm.upload_timeout_secs == 0 {
        error!("upload_timeout_secs must be at least 1");
        anyhow::bail!("jm.upload_timeout_secs must be at least 1");
    }
    let base_url = jm.napcat_base_url.trim().trim_end_matches('/').to_string();
    reqwest::Url::parse(&base_url)
        .with_context(|| format!("jm.napcat_base_url is not a valid URL: {base_url:?}"))?;

    let data_dir = match jm.jm_data_dir.trim() {
        "" => default_data_dir(),
        dir => PathBuf::from(dir),
    };
    let access_token = access_token.filter(|t| !t.is_empty());
    if access_token.is_some() {
        info!("{ACCESS_TOKEN_ENV} found in env");
    }

    let pipeline = PipelineConfig {
        data_dir: data_dir.clone(),
        max_pdf_pages: jm.max_pdf_pages,
        retention: RetentionPolicy {
            keep_images: jm.keep_images,
            keep_pdf: jm.keep_pdf,
        },
    };
    pipeline.trace_loaded();

    let config = BotConfig {
        pipeline,
        crawler: CrawlerConfig {
            data_dir,
            python_bin: jm.python_bin,
        },
        napcat: NapcatConfig {
            base_url,
            access_token,
            upload_mode: jm.upload_mode,
            timeout: Duration::from_secs(jm.upload_timeout_secs),
        },
    };
    info!(
        napcat_base_url = %config.napcat.base_url,
        upload_mode = ?config.napcat.upload_mode,
        "Config loaded and merged successfully"
    );
    Ok(config)
}
