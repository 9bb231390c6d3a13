//! Size ceilings imposed by the platform.

use super::{Attachment, GatewayError};
use crate::config::{MAX_FILESIZE_DOWNLOAD, MAX_FILESIZE_UPLOAD};
use std::path::Path;
use tracing::debug;

/// Inclusive download and upload ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeValidator {
    /// Largest attachment the bot may download, in bytes
    pub max_download: u64,
    /// Largest artifact the bot may upload, in bytes
    pub max_upload: u64,
}

impl Default for SizeValidator {
    fn default() -> Self {
        Self {
            max_download: MAX_FILESIZE_DOWNLOAD,
            max_upload: MAX_FILESIZE_UPLOAD,
        }
    }
}

impl SizeValidator {
    /// Check the attachment's declared size against the download ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::FileTooLarge`] when the size exceeds the ceiling.
    pub fn check_download_size(&self, attachment: &Attachment) -> Result<(), GatewayError> {
        check(attachment.size, self.max_download)
    }

    /// Check the actual size of a local file against the upload ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::FileTooLarge`] when the file exceeds the ceiling,
    /// or [`GatewayError::Io`] when the file cannot be inspected.
    pub async fn check_upload_size(&self, path: &Path) -> Result<(), GatewayError> {
        let size = tokio::fs::metadata(path).await?.len();
        check(size, self.max_upload)
    }
}

fn check(size: u64, limit: u64) -> Result<(), GatewayError> {
    if size > limit {
        debug!(size, limit, "File exceeds size ceiling");
        return Err(GatewayError::FileTooLarge { size, limit });
    }
    Ok(())
}
