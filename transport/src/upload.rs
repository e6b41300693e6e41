//! Document upload.

use std::path::Path;

use reqwest::multipart::{Form, Part};

use crate::wire::{ErrorBody, UploadAck};
use crate::{BackendClient, UploadError, read_capped_error_body};

/// Extensions the backend indexes.
pub const ALLOWED_EXTENSIONS: &[&str] = &["txt", "pdf", "md", "doc", "docx"];

const DEFAULT_UPLOAD_FAILURE: &str = "Failed to upload file";

/// Validate the file's extension and return its display name.
///
/// Runs before any IO so a disallowed file never reaches the network.
pub fn check_upload_path(path: &Path) -> Result<String, UploadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let allowed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ALLOWED_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        });

    if allowed {
        Ok(name)
    } else {
        Err(UploadError::UnsupportedType {
            name,
            allowed: ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| format!(".{ext}"))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

impl BackendClient {
    /// Upload one document as a single multipart request.
    pub async fn upload_document(&self, path: &Path) -> Result<UploadAck, UploadError> {
        let name = check_upload_path(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(file = %name, bytes = bytes.len(), "Uploading document");

        let form = Form::new().part("file", Part::bytes(bytes).file_name(name.clone()));
        let response = self
            .http
            .post(self.endpoint("upload"))
            .timeout(self.config.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(UploadError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            let reason = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_reason)
                .unwrap_or_else(|| DEFAULT_UPLOAD_FAILURE.to_string());
            tracing::warn!(file = %name, %status, %reason, "Upload rejected");
            return Err(UploadError::Rejected { status, reason });
        }

        let mut ack = response.json::<UploadAck>().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Upload acknowledged without a JSON body");
            UploadAck::default()
        });
        if ack.filename.is_none() {
            ack.filename = Some(name);
        }
        Ok(ack)
    }
}
