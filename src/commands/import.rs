//! `import` subcommand: upload a CSV file as one stream execution.

use std::fs::File;

use crate::cli::ImportArgs;
use crate::domo::DomoClient;
use crate::error::AppError;
use crate::pipeline::{ExecutionCoordinator, DEFAULT_MAX_RETRIES};

/// Opens the input file and runs the upload pipeline to a terminal state.
pub async fn run(client: DomoClient, args: ImportArgs) -> Result<(), AppError> {
    let file = File::open(&args.filename).map_err(|e| {
        AppError::CsvChunk(format!("Failed to open {}: {}", args.filename.display(), e))
    })?;

    let coordinator = ExecutionCoordinator::new(
        client,
        args.stream_id,
        args.jobs,
        args.size,
        DEFAULT_MAX_RETRIES,
    );
    coordinator.run(file).await
}
