use crate::platform::PlatformError;
use crate::processing::ProcessingError;
use thiserror::Error;

/// Errors raised by the attachment gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Declared or actual file size exceeds the platform ceiling
    #[error("File too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge {
        /// Size that was checked
        size: u64,
        /// Inclusive ceiling
        limit: u64,
    },
    /// Attachment MIME type is not the accepted one
    #[error("Unsupported MIME type {actual:?}, expected {expected}")]
    UnsupportedMimeType {
        /// Accepted MIME type
        expected: &'static str,
        /// Declared MIME type, if any
        actual: Option<String>,
    },
    /// Message carries neither an image document nor a photo
    #[error("No image found in message")]
    ImageNotFound,
    /// Downloading a remote attachment failed
    #[error("Transfer of file {file_id} failed: {source}")]
    TransferFailed {
        /// Remote file reference
        file_id: String,
        /// Underlying platform failure
        #[source]
        source: PlatformError,
    },
    /// A step read conversation state that was never written
    #[error("Conversation key {key:?} is missing")]
    MissingConversationKey {
        /// Logical key name
        key: String,
    },
    /// A stored conversation value does not have the requested shape
    #[error("Conversation key {key:?} holds an invalid value: {source}")]
    InvalidConversationValue {
        /// Logical key name
        key: String,
        /// Serde failure
        #[source]
        source: serde_json::Error,
    },
    /// Platform request outside of a download
    #[error(transparent)]
    Platform(#[from] PlatformError),
    /// Local filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Failure reported by the document-processing collaborator
    #[error(transparent)]
    Processing(#[from] ProcessingError),
}

impl GatewayError {
    /// Whether the error came from validating user input
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::FileTooLarge { .. } | Self::UnsupportedMimeType { .. } | Self::ImageNotFound
        )
    }
}
