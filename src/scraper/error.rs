//! Error types for page retrieval and chapter extraction.

use thiserror::Error;

/// A page retrieval failure. The walker recovers these locally by halting the
/// traversal with `FetchFailed`; they are never retried.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A chapter extraction failure.
///
/// `InvalidSelector` is a configuration error surfaced before the walk starts;
/// the missing-element variants are per-page parse failures the walker recovers
/// by halting with `ParseFailed`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No element matched title selector {selector:?}")]
    MissingTitle { selector: String },

    #[error("No text matched content selector {selector:?}")]
    MissingContent { selector: String },
}
