//! Shared error type and observability helpers for the linkrank crates.
//!
//! - [`LinkrankError`] and [`Result`]: failures that are allowed to end a run
//! - [`observability`]: centralised `tracing` initialisation
//!
//! Transient API conditions (rate limits, malformed pages) are modelled closer to the
//! fetcher in `linkrank-social` and never surface here; only problems that abort an
//! invocation before or after the search are represented by [`LinkrankError`].
//!
//! ```rust
//! use linkrank_common::LinkrankError;
//!
//! let err = LinkrankError::Config("end date 2024-01-01 precedes start date 2024-02-01".into());
//! assert!(err.to_string().starts_with("Configuration error"));
//! ```

pub mod observability;

/// Fatal errors for a linkrank invocation.
#[derive(thiserror::Error, Debug)]
pub enum LinkrankError {
    /// Configuration or command-line input was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading inputs or writing output files failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Output rows could not be encoded.
    #[error("Output error: {0}")]
    Output(String),
}

impl LinkrankError {
    /// Wrap an I/O failure together with the path that caused it.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenient alias for results that use [`LinkrankError`].
pub type Result<T> = std::result::Result<T, LinkrankError>;
