//! Application-wide error type.

use thiserror::Error;

/// Application-wide error type.
///
/// Part upload retries are *not* represented here: a part that exhausts its
/// retries flows through the pipeline as a `PartResult { success: false }`
/// value, and only the coordinator converts it into `UploadFailed` once the
/// execution has been aborted.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Auth ──────────────────────────────────────────────────────────────────
    #[error("OAuth login failed: {0}")]
    OAuth(String),

    // ── API ───────────────────────────────────────────────────────────────────
    #[error("Domo API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── CSV ───────────────────────────────────────────────────────────────────
    #[error("CSV chunk error: {0}")]
    CsvChunk(String),

    // ── Execution lifecycle ───────────────────────────────────────────────────
    #[error("Couldn't upload part {part_id} after {attempts} attempts")]
    UploadFailed { part_id: u64, attempts: u32 },

    #[error("Failed to complete ({cause}), AND couldn't abort stream execution: {abort}")]
    AbortFailed {
        cause: Box<AppError>,
        abort: Box<AppError>,
    },

    #[error("Failed to commit stream execution: {0}")]
    CommitFailed(Box<AppError>),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}
