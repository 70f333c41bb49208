#![doc = "NapCat integration: delivers PDFs and chat replies through the NapCat (OneBot v11) HTTP action API."]
//
//! # NapCat client
//!
//! [`NapcatClient`] implements both [`Uploader`] and [`ChatResponder`] from
//! `jm-bot-core` against a NapCat instance reachable at `napcat_base_url`.
//!
//! - Uploads go to `upload_group_file` / `upload_private_file`, either as a
//!   local path in a JSON body (NapCat reads the file itself) or as a
//!   multipart form carrying the bytes, depending on [`UploadMode`].
//! - Replies go to `send_group_msg` / `send_private_msg`.
//! - Every call is a single attempt. Transport errors, non-2xx statuses,
//!   unreadable bodies and JSON failure statuses each map to their own
//!   [`UploadError`] variant.

use async_trait::async_trait;
use jm_bot_core::contract::{ChatResponder, ChatTarget, UploadOutcome, UploadRequest, Uploader};
use jm_bot_core::error::{ResponderError, UploadError};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// How the PDF reaches NapCat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    /// JSON body with the absolute local path; NapCat must share the filesystem.
    #[default]
    Path,
    /// Multipart form with the file bytes.
    Multipart,
}

#[derive(Debug, Clone)]
pub struct NapcatConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub upload_mode: UploadMode,
    pub timeout: Duration,
}

/// OneBot action response envelope.
#[derive(Debug, Deserialize)]
struct ActionResponse {
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: String,
    #[serde(default)]
    wording: String,
}

pub struct NapcatClient {
    http: reqwest::Client,
    config: NapcatConfig,
}

impl NapcatClient {
    pub fn new(config: NapcatConfig) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build HTTP client");
                UploadError::Transport(e.to_string())
            })?;
        tracing::info!(
            base_url = %config.base_url,
            access_token_set = config.access_token.is_some(),
            upload_mode = ?config.upload_mode,
            "Initialized NapcatClient"
        );
        Ok(Self { http, config })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), action)
    }

    fn post(&self, action: &str) -> reqwest::RequestBuilder {
        let builder = self.http.post(self.endpoint(action));
        match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn call(&self, action: &str, request: reqwest::RequestBuilder) -> Result<UploadOutcome, UploadError> {
        let response = request.send().await.map_err(|e| {
            tracing::error!(error = ?e, action, "NapCat request failed");
            classify_transport(e)
        })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_transport)?;
        tracing::debug!(action, status, body = %body, "NapCat responded");
        interpret_response(status, &body)
    }
}

fn classify_transport(e: reqwest::Error) -> UploadError {
    if e.is_timeout() {
        UploadError::Timeout(e.to_string())
    } else if e.is_connect() {
        UploadError::Connection(e.to_string())
    } else {
        UploadError::Transport(e.to_string())
    }
}

/// Maps an HTTP status and body from NapCat onto an outcome.
pub fn interpret_response(status: u16, body: &str) -> Result<UploadOutcome, UploadError> {
    if !(200..300).contains(&status) {
        return Err(UploadError::Status {
            status,
            body: body.to_string(),
        });
    }
    let parsed: ActionResponse = serde_json::from_str(body)
        .map_err(|e| UploadError::MalformedResponse(format!("{e}: {body}")))?;
    if parsed.status != "ok" || parsed.retcode != 0 {
        let message = [parsed.wording, parsed.message]
            .into_iter()
            .find(|m| !m.is_empty())
            .unwrap_or(parsed.status);
        return Err(UploadError::Rejected {
            retcode: parsed.retcode,
            message,
        });
    }
    let reference = parsed
        .data
        .get("file_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| (!parsed.message.is_empty()).then(|| parsed.message.clone()))
        .unwrap_or_else(|| body.trim().to_string());
    Ok(UploadOutcome { reference })
}

fn upload_action(target: &ChatTarget) -> (&'static str, &'static str, i64) {
    match *target {
        ChatTarget::Group(id) => ("upload_group_file", "group_id", id),
        ChatTarget::Private(id) => ("upload_private_file", "user_id", id),
    }
}

#[async_trait]
impl Uploader for NapcatClient {
    async fn upload_file<'a>(&self, req: UploadRequest<'a>) -> Result<UploadOutcome, UploadError> {
        let (action, id_field, id) = upload_action(&req.target);
        tracing::info!(
            action,
            target_id = id,
            file = req.file_name,
            mode = ?self.config.upload_mode,
            "Uploading file through NapCat"
        );

        let request = match self.config.upload_mode {
            UploadMode::Path => {
                let absolute = std::fs::canonicalize(req.path).map_err(|e| {
                    tracing::error!(error = ?e, path = %req.path.display(), "PDF path cannot be resolved");
                    UploadError::Io(e)
                })?;
                self.post(action).json(&json!({
                    (id_field): id,
                    "file": absolute.to_string_lossy(),
                    "name": req.file_name,
                }))
            }
            UploadMode::Multipart => {
                let bytes = tokio::fs::read(req.path).await.map_err(|e| {
                    tracing::error!(error = ?e, path = %req.path.display(), "Failed to read PDF for upload");
                    UploadError::Io(e)
                })?;
                let part = Part::bytes(bytes)
                    .file_name(req.file_name.to_string())
                    .mime_str("application/pdf")
                    .map_err(|e| UploadError::Transport(e.to_string()))?;
                let form = Form::new()
                    .text(id_field, id.to_string())
                    .text("name", req.file_name.to_string())
                    .part("file", part);
                self.post(action).multipart(form)
            }
        };

        match self.call(action, request).await {
            Ok(outcome) => {
                tracing::info!(reference = %outcome.reference, "Successfully uploaded file");
                Ok(outcome)
            }
            Err(e) => {
                tracing::error!(error = ?e, file = req.file_name, "NapCat upload failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ChatResponder for NapcatClient {
    async fn send_text(&self, target: &ChatTarget, text: &str) -> Result<(), ResponderError> {
        let (action, body) = match *target {
            ChatTarget::Group(id) => ("send_group_msg", json!({ "group_id": id, "message": text })),
            ChatTarget::Private(id) => ("send_private_msg", json!({ "user_id": id, "message": text })),
        };
        self.call(action, self.post(action).json(&body))
            .await
            .map(|_| ())
            .map_err(|e| ResponderError(e.to_string()))
    }
}
