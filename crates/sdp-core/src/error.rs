use thiserror::Error;

/// A type alias for handling `Result`s with `Error`
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, extracting or rewriting SDP bodies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Structural SDP parse error with the byte offset it was detected at
    #[error("Error parsing SDP at offset {offset}: {message}")]
    SdpParsing {
        /// Byte offset into the body where parsing stopped
        offset: usize,
        /// Free-form description of the failure
        message: String,
    },

    /// Stream extraction failure (missing addresses, bad payload types, ...)
    #[error("Failed to extract streams from SDP: {0}")]
    StreamExtraction(String),

    /// Rewrite failure (positions moving backwards, missing media pairing, ...)
    #[error("Error rewriting SDP: {0}")]
    SdpRewrite(String),

    /// From-scratch SDP generation failure
    #[error("Failed to create SDP: {0}")]
    SdpCreate(String),

    /// A standalone ICE candidate line could not be parsed
    #[error("Invalid ICE candidate: {0}")]
    InvalidCandidate(String),
}

impl Error {
    pub(crate) fn parsing(offset: usize, message: impl Into<String>) -> Self {
        Error::SdpParsing {
            offset,
            message: message.into(),
        }
    }
}
