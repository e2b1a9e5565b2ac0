//! CrowdTangle `posts/search` integration.
//!
//! - `client`: URL construction, the [`PostSource`] seam and the HTTP-backed
//!   [`CrowdTangleApi`]
//! - `extract`: normalization into [`Post`] / [`Page`] rows
//! - `types`: wire-format models for the response envelope
pub mod client;
pub mod extract;
pub mod types;

pub use client::{CrowdTangleApi, FetchError, FetchedPage, PostSource, SearchRequest};
pub use extract::{PAGE_COLUMNS, POST_COLUMNS, Page, Post};
