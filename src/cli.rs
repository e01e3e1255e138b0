//! Command-line interface definitions.
//!
//! Arguments land in plain immutable structs that are passed into the command
//! functions; there is no process-wide mutable parser state.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::streaming::DEFAULT_CHUNK_BYTES;

/// Default number of concurrent upload jobs: 2 x available parallelism.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 2
}

/// Upload a CSV file to Domo in parallel chunks.
#[derive(Debug, Parser)]
#[command(name = "domo-stream-uploader", version)]
pub struct Cli {
    /// Domo Client ID
    #[arg(short = 'u', long = "client-id")]
    pub client_id: String,

    /// Domo Client secret
    #[arg(short = 'p', long = "client-secret")]
    pub client_secret: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new API dataset using a previously created dataset as a
    /// template
    Create(CreateArgs),
    /// Import data into a previously created dataset
    Import(ImportArgs),
    /// Cancel all stream executions
    Cancel(CancelArgs),
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Domo dataset ID to clone
    #[arg(short = 'i', long = "dataset-id")]
    pub dataset_id: String,

    /// Append the data to the dataset
    #[arg(long, conflicts_with = "replace")]
    pub append: bool,

    /// Replace all data in the dataset (default)
    #[arg(long)]
    pub replace: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Domo stream ID to upload to
    #[arg(short = 'i', long = "stream-id")]
    pub stream_id: u64,

    /// Allow N upload jobs at once
    #[arg(
        short = 'j',
        long = "jobs",
        default_value_t = default_jobs(),
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub jobs: usize,

    /// Size, in bytes, of each chunk
    #[arg(short = 's', long = "size", default_value_t = DEFAULT_CHUNK_BYTES)]
    pub size: usize,

    /// The CSV file to process and upload
    pub filename: PathBuf,
}

#[derive(Debug, Args)]
pub struct CancelArgs {
    /// Domo stream ID to cancel executions for
    #[arg(short = 'i', long = "stream-id")]
    pub stream_id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_defaults_are_applied() {
        let cli = Cli::try_parse_from([
            "domo-stream-uploader",
            "-u",
            "id",
            "-p",
            "secret",
            "import",
            "-i",
            "42",
            "data.csv",
        ])
        .unwrap();

        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.stream_id, 42);
                assert_eq!(args.jobs, default_jobs());
                assert_eq!(args.size, DEFAULT_CHUNK_BYTES);
                assert_eq!(args.filename, PathBuf::from("data.csv"));
            }
            other => panic!("Expected Import, got: {:?}", other),
        }
    }

    #[test]
    fn import_accepts_jobs_and_size_overrides() {
        let cli = Cli::try_parse_from([
            "domo-stream-uploader",
            "-u",
            "id",
            "-p",
            "secret",
            "import",
            "-i",
            "42",
            "-j",
            "8",
            "-s",
            "1048576",
            "data.csv",
        ])
        .unwrap();

        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.jobs, 8);
                assert_eq!(args.size, 1_048_576);
            }
            other => panic!("Expected Import, got: {:?}", other),
        }
    }

    #[test]
    fn create_append_and_replace_conflict() {
        let result = Cli::try_parse_from([
            "domo-stream-uploader",
            "-u",
            "id",
            "-p",
            "secret",
            "create",
            "-i",
            "ds-1",
            "--append",
            "--replace",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_jobs_is_rejected_at_parse_time() {
        let result = Cli::try_parse_from([
            "domo-stream-uploader",
            "-u",
            "id",
            "-p",
            "secret",
            "import",
            "-i",
            "42",
            "-j",
            "0",
            "data.csv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn client_credentials_are_required() {
        let result =
            Cli::try_parse_from(["domo-stream-uploader", "cancel", "-i", "42"]);
        assert!(result.is_err());
    }
}
