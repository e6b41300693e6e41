//! User-facing wording for failures.

use docchat_transport::{ConnectivityError, UploadError};

/// Content of the error turn when a question cycle fails in transport.
pub const SEND_FAILURE_MESSAGE: &str = "Error: Failed to send message";

pub const BACKEND_UNREACHABLE_NOTICE: &str =
    "Cannot connect to backend server. Please make sure it is running.";

const MAX_DETAIL_CHARS: usize = 200;

#[must_use]
pub fn format_backend_error(message: &str) -> String {
    format!("Error: {message}")
}

/// Banner text for a question that could not reach the backend.
#[must_use]
pub fn connectivity_notice(error: &ConnectivityError) -> String {
    match error {
        ConnectivityError::Status { status, body } => {
            let detail = truncate_with_ellipsis(body.trim(), MAX_DETAIL_CHARS);
            if detail.is_empty() {
                format!("Backend rejected the request ({status}).")
            } else {
                format!("Backend rejected the request ({status}): {detail}")
            }
        }
        ConnectivityError::Request(_)
        | ConnectivityError::Exhausted { .. }
        | ConnectivityError::MalformedHealth(_) => BACKEND_UNREACHABLE_NOTICE.to_string(),
    }
}

#[must_use]
pub fn upload_failure_notice(error: &UploadError) -> String {
    truncate_with_ellipsis(&error.reason(), MAX_DETAIL_CHARS)
}

#[must_use]
pub fn upload_success_turn(file_name: &str) -> String {
    format!("📓 Document uploaded: {file_name}. You can now ask questions about this document.")
}

#[must_use]
pub fn upload_success_notice(file_name: &str) -> String {
    format!("Successfully uploaded and processed: {file_name}")
}

#[must_use]
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}
