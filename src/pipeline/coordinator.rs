//! Stream execution lifecycle: create, upload all parts, commit or abort.
//!
//! The coordinator owns one remote execution from creation to a terminal
//! state. After creation succeeds, every code path ends in exactly one commit
//! or one abort call — no execution handle is left dangling by this process.
//! The single exception is a failed commit, which is raised as-is without a
//! follow-up abort (the execution stays active remotely; preserved behavior).

use std::io::Read;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domo::DomoClient;
use crate::error::AppError;
use crate::pipeline::dispatcher::{DispatchOutcome, Dispatcher};
use crate::streaming::ChunkEncoder;

/// Coordinates one import run: create execution, stream chunks through the
/// dispatcher, then commit or abort.
pub struct ExecutionCoordinator {
    client: DomoClient,
    stream_id: u64,
    jobs: usize,
    chunk_bytes: usize,
    max_retries: u32,
}

impl ExecutionCoordinator {
    /// Creates a coordinator for one stream.
    pub fn new(
        client: DomoClient,
        stream_id: u64,
        jobs: usize,
        chunk_bytes: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            client,
            stream_id,
            jobs,
            chunk_bytes,
            max_retries,
        }
    }

    /// Runs the full import pipeline over `input`.
    ///
    /// # Errors
    ///
    /// - `AppError::Api` / `ConnectionFailed` - execution creation failed
    ///   (nothing to clean up: no abort is attempted)
    /// - `AppError::UploadFailed` - a part exhausted its retries and the
    ///   execution was aborted
    /// - `AppError::AbortFailed` - the run failed AND the abort call failed
    /// - `AppError::CommitFailed` - all parts succeeded but the commit failed;
    ///   no abort follows
    pub async fn run<R>(&self, input: R) -> Result<(), AppError>
    where
        R: Read + Send + 'static,
    {
        let started = Instant::now();

        debug!("Creating stream execution");
        let execution = self.client.create_execution(self.stream_id).await?;
        info!("Created stream execution {}", execution.id);

        match self.upload_all(execution.id, input).await {
            Ok(DispatchOutcome::Completed { parts, .. }) => {
                info!("All {} parts completed in {:?}", parts, started.elapsed());
                debug!("Committing stream execution");
                self.client
                    .commit_execution(self.stream_id, execution.id)
                    .await
                    .map_err(|e| AppError::CommitFailed(Box::new(e)))
            }
            Ok(DispatchOutcome::PartFailed { part_id, attempts }) => {
                self.abort(execution.id, AppError::UploadFailed { part_id, attempts })
                    .await
            }
            Err(err) => self.abort(execution.id, err).await,
        }
    }

    /// Streams chunks from `input` through the dispatcher.
    async fn upload_all<R>(
        &self,
        execution_id: u64,
        input: R,
    ) -> Result<DispatchOutcome, AppError>
    where
        R: Read + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.jobs);
        let chunk_bytes = self.chunk_bytes;

        // Chunk production is blocking file I/O; run it off the async runtime.
        let producer = tokio::task::spawn_blocking(move || {
            for chunk in ChunkEncoder::new(input, chunk_bytes) {
                if tx.blocking_send(chunk).is_err() {
                    // Receiver gone: the run is already being torn down.
                    break;
                }
            }
        });

        let dispatcher = Dispatcher::new(
            self.client.clone(),
            self.stream_id,
            self.jobs,
            self.max_retries,
        );
        let outcome = dispatcher.run(execution_id, rx).await;

        // The receiver is dropped by now, so the producer cannot be blocked.
        producer
            .await
            .map_err(|e| AppError::Internal(format!("Chunk producer panicked: {}", e)))?;

        outcome
    }

    /// Aborts the execution, then raises the original failure.
    ///
    /// An abort failure compounds with the original failure; neither is
    /// swallowed.
    async fn abort(&self, execution_id: u64, cause: AppError) -> Result<(), AppError> {
        info!("Cancelling stream execution {}", execution_id);
        match self.client.abort_execution(self.stream_id, execution_id).await {
            Ok(()) => Err(cause),
            Err(abort_err) => Err(AppError::AbortFailed {
                cause: Box::new(cause),
                abort: Box::new(abort_err),
            }),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
