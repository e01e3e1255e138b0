//! Single-part upload with bounded, immediate retries.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{error, info, warn};

use crate::domo::DomoClient;

/// Default number of upload attempts per part.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// One chunk queued for upload, owned exclusively by the worker processing it.
#[derive(Debug, Clone)]
pub struct UploadJob {
    /// Stream the execution belongs to.
    pub stream_id: u64,
    /// Execution the part belongs to.
    pub execution_id: u64,
    /// Sequential part number, starting at 1 in chunk production order.
    pub part_id: u64,
    /// Re-serialized CSV bytes for this part.
    pub chunk: Bytes,
}

/// Outcome of one upload job, produced exactly once per job.
///
/// Failure is communicated through `success`, never through a propagated
/// error, so the pool can keep draining in-flight work before the abort
/// decision is made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartResult {
    /// Part number this result belongs to.
    pub part_id: u64,
    /// Time from the first attempt's start to the final outcome.
    pub elapsed: Duration,
    /// Whether any attempt returned a 2xx.
    pub success: bool,
}

/// Uploads one part, retrying immediately up to `max_retries` attempts.
///
/// Transport errors and non-2xx responses are logged with retry counts and
/// retried; a 2xx stops. When every attempt fails the result carries
/// `success: false`.
pub async fn upload_part(client: &DomoClient, job: UploadJob, max_retries: u32) -> PartResult {
    let start = Instant::now();

    info!(
        "Starting to upload part {} ({} bytes)",
        job.part_id,
        job.chunk.len()
    );

    for attempt in 1..=max_retries {
        match client
            .upload_part(job.stream_id, job.execution_id, job.part_id, job.chunk.clone())
            .await
        {
            Ok(()) => {
                return PartResult {
                    part_id: job.part_id,
                    elapsed: start.elapsed(),
                    success: true,
                };
            }
            Err(err) => {
                warn!(
                    "Error uploading part {} (retry {}/{}): {}",
                    job.part_id, attempt, max_retries, err
                );
            }
        }
    }

    error!(
        "Couldn't upload part {} after {} retries!",
        job.part_id, max_retries
    );

    PartResult {
        part_id: job.part_id,
        elapsed: start.elapsed(),
        success: false,
    }
}
