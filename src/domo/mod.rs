//! Domo HTTP client and API interaction layer.
//!
//! This module provides the thin request/response wrappers around the Domo
//! REST API. Key points:
//!
//! - **Single-attempt calls**: retry policy lives in the upload pipeline, not
//!   here.
//! - **Safe logging**: only HTTP method, path, and status codes are logged;
//!   tokens and chunk contents never are.

pub mod auth;
pub mod client;

pub use auth::{fetch_access_token, AuthData};
pub use client::{DomoClient, StreamExecution};

/// Production Domo API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.domo.com";
