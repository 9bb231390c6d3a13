//! Scoped transfers between the chat platform and local temporary files.
//!
//! Every local path handed out here is a [`TempPath`]: it is deleted when the
//! guard owning it is dropped, whether the surrounding operation finished or
//! bailed out with an error.

use super::{DeliveryChannel, GatewayError, OutputArtifact};
use crate::platform::ChatPlatform;
use futures_util::future::try_join_all;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use teloxide::types::ChatId;
use tracing::{debug, info, warn};

const TEMP_FILE_PREFIX: &str = "pdf-courier-";

/// Source of temporary local paths
#[cfg_attr(test, mockall::automock)]
pub trait TempFileProvider: Send + Sync {
    /// Allocate one temporary path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    fn create_temp_file(&self, suffix: &str) -> io::Result<TempPath>;

    /// Allocate `count` temporary paths in one batch
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be created; paths created so far are removed.
    fn create_temp_files(&self, count: usize, suffix: &str) -> io::Result<Vec<TempPath>> {
        (0..count).map(|_| self.create_temp_file(suffix)).collect()
    }
}

/// [`TempFileProvider`] creating files in a directory (OS temp dir by default)
#[derive(Debug, Clone, Default)]
pub struct TempDirProvider {
    root: Option<PathBuf>,
}

impl TempDirProvider {
    /// Create files under `root` instead of the OS temp dir
    #[must_use]
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }
}

impl TempFileProvider for TempDirProvider {
    fn create_temp_file(&self, suffix: &str) -> io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(suffix);
        let file = match &self.root {
            Some(root) => builder.tempfile_in(root)?,
            None => builder.tempfile()?,
        };
        Ok(file.into_temp_path())
    }
}

/// A downloaded attachment, deleted from disk on drop
#[derive(Debug)]
pub struct DownloadedFile {
    file_id: String,
    path: TempPath,
}

impl DownloadedFile {
    /// Remote file id this path was populated from
    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Local path, valid while `self` is alive
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for DownloadedFile {
    fn as_ref(&self) -> &Path {
        self.path()
    }
}

/// Downloaded attachments in input order, all deleted on drop
#[derive(Debug)]
pub struct DownloadBatch {
    files: Vec<DownloadedFile>,
}

impl DownloadBatch {
    /// Local paths in the order the file ids were given
    #[must_use]
    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(DownloadedFile::path).collect()
    }

    /// Iterate over the downloaded files
    pub fn iter(&self) -> std::slice::Iter<'_, DownloadedFile> {
        self.files.iter()
    }

    /// Number of files in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the batch is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<'a> IntoIterator for &'a DownloadBatch {
    type Item = &'a DownloadedFile;
    type IntoIter = std::slice::Iter<'a, DownloadedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Moves files between the chat platform and local temporary storage
#[derive(Clone)]
pub struct TransferManager {
    platform: Arc<dyn ChatPlatform>,
    temp_files: Arc<dyn TempFileProvider>,
}

impl TransferManager {
    /// Create a transfer manager
    #[must_use]
    pub fn new(platform: Arc<dyn ChatPlatform>, temp_files: Arc<dyn TempFileProvider>) -> Self {
        Self {
            platform,
            temp_files,
        }
    }

    /// Download one attachment into a fresh temporary file.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TransferFailed`] if the download fails, or
    /// [`GatewayError::Io`] if no temporary file could be allocated. The
    /// temporary file is removed in both cases.
    pub async fn download_one(&self, file_id: &str) -> Result<DownloadedFile, GatewayError> {
        let path = self.temp_files.create_temp_file("")?;
        fetch(self.platform.as_ref(), file_id, &path).await?;

        debug!(file_id = %file_id, path = %path.display(), "Attachment downloaded");
        Ok(DownloadedFile {
            file_id: file_id.to_owned(),
            path,
        })
    }

    /// Download several attachments concurrently.
    ///
    /// Paths are bound to file ids in input order. The batch is returned only
    /// once every download has completed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TransferFailed`] for the first download that
    /// fails; every temporary file of the batch is removed.
    pub async fn download_many<S>(&self, file_ids: &[S]) -> Result<DownloadBatch, GatewayError>
    where
        S: AsRef<str> + Sync,
    {
        let paths = self.temp_files.create_temp_files(file_ids.len(), "")?;
        if paths.len() != file_ids.len() {
            return Err(GatewayError::Io(io::Error::other(format!(
                "temp file provider returned {} paths for {} files",
                paths.len(),
                file_ids.len()
            ))));
        }

        try_join_all(
            file_ids
                .iter()
                .zip(&paths)
                .map(|(file_id, path)| fetch(self.platform.as_ref(), file_id.as_ref(), path)),
        )
        .await?;

        info!(count = paths.len(), "Attachment batch downloaded");
        let files = file_ids
            .iter()
            .zip(paths)
            .map(|(file_id, path)| DownloadedFile {
                file_id: file_id.as_ref().to_owned(),
                path,
            })
            .collect();
        Ok(DownloadBatch { files })
    }

    /// Upload an artifact on its delivery channel, consuming it.
    ///
    /// The presence indicator for the channel is shown first. The artifact's
    /// file is removed once this returns, successfully or not.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Platform`] if the upload fails.
    pub async fn upload(
        &self,
        chat_id: ChatId,
        artifact: OutputArtifact,
    ) -> Result<DeliveryChannel, GatewayError> {
        let channel = artifact.channel();

        if let Err(e) = self
            .platform
            .send_chat_action(chat_id, channel.chat_action())
            .await
        {
            // Presence is cosmetic; the upload still goes ahead
            warn!(chat_id = chat_id.0, error = %e, "Failed to send chat action");
        }

        match channel {
            DeliveryChannel::Image => self.platform.send_photo(chat_id, artifact.path()).await?,
            DeliveryChannel::Document => {
                self.platform.send_document(chat_id, artifact.path()).await?;
            }
        }

        debug!(chat_id = chat_id.0, ?channel, "Artifact uploaded");
        Ok(channel)
    }
}

async fn fetch(
    platform: &dyn ChatPlatform,
    file_id: &str,
    path: &Path,
) -> Result<(), GatewayError> {
    platform
        .download_file(file_id, path)
        .await
        .map_err(|source| GatewayError::TransferFailed {
            file_id: file_id.to_owned(),
            source,
        })
}
