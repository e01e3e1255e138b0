//! Chunked parallel upload pipeline.
//!
//! Leaf to root:
//!
//! - [`uploader`] - uploads one chunk as one part, with bounded retries
//! - [`dispatcher`] - fans chunks out to a bounded pool of upload workers
//! - [`coordinator`] - owns the execution lifecycle: create, upload all
//!   parts, then commit on full success or abort on any failure

pub mod coordinator;
pub mod dispatcher;
pub mod uploader;

pub use coordinator::ExecutionCoordinator;
pub use dispatcher::{DispatchOutcome, Dispatcher, RunningAverage};
pub use uploader::{PartResult, UploadJob, DEFAULT_MAX_RETRIES};
