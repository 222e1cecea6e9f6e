//! Error taxonomy for the download pipeline.
//!
//! Session-level failures abort the whole run; everything else is scoped to a
//! single catalog item and lets the batch continue.

use std::path::PathBuf;

/// Errors produced by the session, catalog client, and download pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid credentials")]
    Authentication,

    #[error("the app id was rejected by the catalog service")]
    InvalidAppId,

    #[error("no candidate app secret was accepted by the catalog service")]
    InvalidAppSecret,

    #[error("this account is not eligible to download tracks")]
    Ineligible,

    #[error("{0} is not a valid quality tier (expected 5, 6, 7 or 27)")]
    InvalidQuality(u32),

    #[error("item {0} is not streamable")]
    NonStreamable(String),

    #[error("collection paging stalled at offset {offset}")]
    PaginationStalled { offset: u64 },

    #[error("download ended after {written} of {expected} bytes")]
    Integrity { expected: u64, written: u64 },

    #[error("unexpected response shape: {0}")]
    Response(String),

    #[error("could not read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },

    #[error("http request failed: {0}")]
    Http(#[from] Box<ureq::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("tagging failed: {0}")]
    Tag(#[from] lofty::error::LoftyError),
}

impl Error {
    /// True for failures that invalidate the whole session. The orchestrator
    /// aborts the batch instead of skipping to the next item.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            Error::Authentication
                | Error::InvalidAppId
                | Error::InvalidAppSecret
                | Error::Ineligible
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn test_session_errors_are_fatal() {
        assert!(Error::Authentication.is_session_fatal());
        assert!(Error::InvalidAppSecret.is_session_fatal());
        assert!(Error::Ineligible.is_session_fatal());
    }

    #[test]
    fn test_item_errors_are_not_fatal() {
        assert!(!Error::NonStreamable("123".to_string()).is_session_fatal());
        assert!(!Error::Integrity {
            expected: 10,
            written: 5
        }
        .is_session_fatal());
    }
}
