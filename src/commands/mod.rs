//! CLI subcommand implementations.
//!
//! Each submodule maps one-to-one to a subcommand: `import` drives the upload
//! pipeline, `create` clones a dataset definition into a new stream, and
//! `cancel` aborts every active execution on a stream.

pub mod cancel;
pub mod create;
pub mod import;
