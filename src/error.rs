use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum QuakeError {
    #[error("malformed query token (expected key=value): {0}")]
    InvalidToken(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("invalid time specifier for {key}: {value}")]
    InvalidTime { key: String, value: String },

    #[error("No events Found!")]
    NoEventsFound,

    #[error("ISC request failed: {0}")]
    IscHttp(String),

    #[error("ISC returned status {status}: {message}")]
    IscStatus { status: u16, message: String },

    #[error("failed to parse ISC response: {0}")]
    IscParse(String),

    #[error("FDSN request failed: {0}")]
    FdsnHttp(String),

    #[error("FDSN returned status {status}: {message}")]
    FdsnStatus { status: u16, message: String },

    #[error("failed to parse FDSN response: {0}")]
    FdsnParse(String),

    #[error("FDSN service returned no events")]
    FdsnNoData,

    #[error("Failed to fetch the data! Try some other parameters")]
    FetchFailed {
        #[source]
        source: Box<QuakeError>,
    },

    #[error("failed to parse catalog file: {0}")]
    CatalogParse(String),

    #[error("missing config file at {0}")]
    MissingConfig(PathBuf),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl QuakeError {
    /// True for the error kinds produced by a malformed query argument.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            QuakeError::InvalidToken(_)
                | QuakeError::InvalidValue { .. }
                | QuakeError::InvalidTime { .. }
        )
    }
}
