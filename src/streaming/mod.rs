//! Streaming utilities for processing large files.
//!
//! This module provides record-aware CSV re-chunking that preserves data
//! integrity even when fields contain embedded commas and newlines inside
//! quotes. Chunks are produced lazily as in-memory byte buffers, ready to be
//! shipped to the upload pipeline.

mod csv_chunker;

pub use csv_chunker::{ChunkEncoder, DEFAULT_CHUNK_BYTES};
