//! Upload a CSV file to Domo in parallel chunks.
//!
//! The pipeline re-chunks a record-oriented CSV stream into size-bounded byte
//! buffers, uploads each buffer concurrently as a numbered part of a Domo
//! stream execution, and commits the execution when every part succeeds or
//! aborts it when any part fails.

pub mod cli;
pub mod commands;
pub mod domo;
pub mod error;
pub mod pipeline;
pub mod streaming;
