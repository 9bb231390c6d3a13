//! Delivery of produced artifacts back to the chat.

use super::{GatewayError, SizeValidator, TransferManager, UpdateContext};
use crate::analytics::{AnalyticsService, EventAction, TaskType};
use crate::platform::{ChatPlatform, MessageOptions};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use teloxide::types::{ChatAction, ChatId};
use tracing::{info, warn};

/// Placeholder shown for files whose name is unknown
pub const FILE_NAME_UNAVAILABLE: &str = "File name unavailable";

/// Extensions delivered on the image channel
static IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Outbound transmission mode for an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// Generic file upload
    Document,
    /// Compressed photo upload
    Image,
}

impl DeliveryChannel {
    /// Channel for a file extension (case-insensitive, without the dot)
    #[must_use]
    pub fn for_extension(extension: Option<&str>) -> Self {
        match extension {
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) => {
                Self::Image
            }
            _ => Self::Document,
        }
    }

    /// Presence indicator shown while uploading on this channel
    #[must_use]
    pub const fn chat_action(self) -> ChatAction {
        match self {
            Self::Document => ChatAction::UploadDocument,
            Self::Image => ChatAction::UploadPhoto,
        }
    }
}

/// A produced file handed to the gateway for delivery.
///
/// The gateway owns the file from then on: it is deleted when the artifact
/// is dropped, after the send completed, failed or was skipped.
#[derive(Debug)]
pub struct OutputArtifact {
    path: TempPath,
}

impl OutputArtifact {
    /// Take ownership of a temporary file
    #[must_use]
    pub const fn new(path: TempPath) -> Self {
        Self { path }
    }

    /// Take ownership of an existing file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is empty, or relative while the current
    /// directory cannot be resolved.
    pub fn from_path(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        TempPath::try_from_path(path).map(Self::new)
    }

    /// Local path of the artifact
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File extension, if any
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|ext| ext.to_str())
    }

    /// Channel this artifact is delivered on
    #[must_use]
    pub fn channel(&self) -> DeliveryChannel {
        DeliveryChannel::for_extension(self.extension())
    }
}

/// Result of [`OutputDispatcher::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Artifact delivered on the given channel
    Sent(DeliveryChannel),
    /// Artifact exceeded the upload ceiling and was dropped without a platform call
    TooLarge {
        /// Actual artifact size
        size: u64,
        /// Upload ceiling
        limit: u64,
    },
}

/// Processed file shown in a file listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameRecord {
    /// Internal identifier
    pub id: String,
    /// Human-readable name, if known
    pub name: Option<String>,
}

impl FileNameRecord {
    /// Record with a known name
    #[must_use]
    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }

    /// Record without a name
    #[must_use]
    pub fn unnamed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// Render a 1-indexed listing of file names, one per line, after `header`.
///
/// # Examples
///
/// ```
/// use pdf_courier::gateway::{format_file_names, FileNameRecord};
///
/// let records = [FileNameRecord::named("a", "a"), FileNameRecord::unnamed("b")];
/// assert_eq!(format_file_names("H", &records), "H1: a\n2: File name unavailable\n");
/// ```
#[must_use]
pub fn format_file_names(header: &str, records: &[FileNameRecord]) -> String {
    let mut text = header.to_string();
    for (i, record) in records.iter().enumerate() {
        let name = record.name.as_deref().unwrap_or(FILE_NAME_UNAVAILABLE);
        // Writing into a String cannot fail
        let _ = writeln!(text, "{}: {name}", i + 1);
    }
    text
}

/// Sends artifacts and listings back to the chat
#[derive(Clone)]
pub struct OutputDispatcher {
    sizes: SizeValidator,
    transfer: TransferManager,
    platform: Arc<dyn ChatPlatform>,
    analytics: Arc<dyn AnalyticsService>,
}

impl OutputDispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        sizes: SizeValidator,
        transfer: TransferManager,
        platform: Arc<dyn ChatPlatform>,
        analytics: Arc<dyn AnalyticsService>,
    ) -> Self {
        Self {
            sizes,
            transfer,
            platform,
            analytics,
        }
    }

    /// Deliver an artifact to the chat that triggered `update`.
    ///
    /// Oversized artifacts are dropped without touching the platform or
    /// emitting telemetry, and reported as [`DeliveryOutcome::TooLarge`].
    /// A successful send emits one `complete` event for `task`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Io`] if the artifact cannot be inspected, or
    /// [`GatewayError::Platform`] if the upload fails.
    pub async fn send(
        &self,
        update: &UpdateContext,
        artifact: OutputArtifact,
        task: TaskType,
    ) -> Result<DeliveryOutcome, GatewayError> {
        match self.sizes.check_upload_size(artifact.path()).await {
            Ok(()) => {}
            Err(GatewayError::FileTooLarge { size, limit }) => {
                warn!(size, limit, task = %task, "Artifact exceeds upload ceiling, not sending");
                return Ok(DeliveryOutcome::TooLarge { size, limit });
            }
            Err(e) => return Err(e),
        }

        let chat_id = update.target_chat();
        let channel = self.transfer.upload(chat_id, artifact).await?;
        self.analytics
            .send_event(update, task, EventAction::Complete)
            .await;

        info!(chat_id = chat_id.0, task = %task, ?channel, "Artifact delivered");
        Ok(DeliveryOutcome::Sent(channel))
    }

    /// Send a numbered listing of file names as one message.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Platform`] if the message cannot be sent.
    pub async fn send_file_names(
        &self,
        chat_id: ChatId,
        header: &str,
        records: &[FileNameRecord],
    ) -> Result<(), GatewayError> {
        let text = format_file_names(header, records);
        self.platform
            .send_message(chat_id, &text, MessageOptions::default())
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::MockAnalyticsService;
    use crate::gateway::{CallbackAck, MessageRef, TempDirProvider};
    use crate::platform::MockChatPlatform;
    use mockall::predicate::eq;
    use teloxide::types::MessageId;

    const CHAT_ID: i64 = 1;

    fn update() -> UpdateContext {
        UpdateContext {
            chat_id: ChatId(CHAT_ID),
            user_id: 2,
            message_id: Some(MessageId(3)),
            callback: None,
        }
    }

    fn dispatcher(
        platform: MockChatPlatform,
        analytics: MockAnalyticsService,
        sizes: SizeValidator,
    ) -> OutputDispatcher {
        let platform: Arc<dyn ChatPlatform> = Arc::new(platform);
        let transfer = TransferManager::new(platform.clone(), Arc::new(TempDirProvider::default()));
        OutputDispatcher::new(sizes, transfer, platform, Arc::new(analytics))
    }

    fn artifact(dir: &tempfile::TempDir, name: &str) -> std::io::Result<OutputArtifact> {
        let path = dir.path().join(name);
        std::fs::write(&path, b"data")?;
        OutputArtifact::from_path(path)
    }

    fn expect_complete_once(analytics: &mut MockAnalyticsService) {
        analytics
            .expect_send_event()
            .withf(|update, task, action| {
                update.chat_id == ChatId(CHAT_ID)
                    && *task == TaskType::MergePdf
                    && *action == EventAction::Complete
            })
            .times(1)
            .return_const(());
    }

    #[test]
    fn test_channel_lookup() {
        assert_eq!(DeliveryChannel::for_extension(Some("png")), DeliveryChannel::Image);
        assert_eq!(DeliveryChannel::for_extension(Some("JPG")), DeliveryChannel::Image);
        assert_eq!(DeliveryChannel::for_extension(Some("jpeg")), DeliveryChannel::Image);
        assert_eq!(DeliveryChannel::for_extension(Some("pdf")), DeliveryChannel::Document);
        assert_eq!(DeliveryChannel::for_extension(Some("gif")), DeliveryChannel::Document);
        assert_eq!(DeliveryChannel::for_extension(None), DeliveryChannel::Document);
    }

    #[test]
    fn test_format_file_names() {
        let records = [FileNameRecord::named("a", "a"), FileNameRecord::unnamed("b")];
        assert_eq!(
            format_file_names("H", &records),
            "H1: a\n2: File name unavailable\n"
        );
        assert_eq!(format_file_names("H", &[]), "H");
    }

    #[tokio::test]
    async fn test_send_file_document() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut platform = MockChatPlatform::new();
        platform
            .expect_send_chat_action()
            .with(eq(ChatId(CHAT_ID)), eq(ChatAction::UploadDocument))
            .times(1)
            .returning(|_, _| Ok(()));
        platform
            .expect_send_document()
            .withf(|chat_id, _| *chat_id == ChatId(CHAT_ID))
            .times(1)
            .returning(|_, _| Ok(()));
        platform.expect_send_photo().never();
        let mut analytics = MockAnalyticsService::new();
        expect_complete_once(&mut analytics);

        let outcome = dispatcher(platform, analytics, SizeValidator::default())
            .send(&update(), artifact(&dir, "file_path.pdf")?, TaskType::MergePdf)
            .await?;

        assert_eq!(outcome, DeliveryOutcome::Sent(DeliveryChannel::Document));
        assert!(!dir.path().join("file_path.pdf").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_send_file_image() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut platform = MockChatPlatform::new();
        platform
            .expect_send_chat_action()
            .with(eq(ChatId(CHAT_ID)), eq(ChatAction::UploadPhoto))
            .times(1)
            .returning(|_, _| Ok(()));
        platform
            .expect_send_photo()
            .times(1)
            .returning(|_, _| Ok(()));
        platform.expect_send_document().never();
        let mut analytics = MockAnalyticsService::new();
        expect_complete_once(&mut analytics);

        let outcome = dispatcher(platform, analytics, SizeValidator::default())
            .send(&update(), artifact(&dir, "file_path.png")?, TaskType::MergePdf)
            .await?;

        assert_eq!(outcome, DeliveryOutcome::Sent(DeliveryChannel::Image));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_file_document_with_query() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let query_chat = ChatId(10);
        let mut platform = MockChatPlatform::new();
        platform
            .expect_send_chat_action()
            .with(eq(query_chat), eq(ChatAction::UploadDocument))
            .times(1)
            .returning(|_, _| Ok(()));
        platform
            .expect_send_document()
            .withf(move |chat_id, _| *chat_id == query_chat)
            .times(1)
            .returning(|_, _| Ok(()));
        let mut analytics = MockAnalyticsService::new();
        expect_complete_once(&mut analytics);

        let mut update = update();
        update.callback = Some(CallbackAck {
            query_id: "query".to_string(),
            message: Some(MessageRef {
                chat_id: query_chat,
                message_id: MessageId(4),
            }),
        });

        dispatcher(platform, analytics, SizeValidator::default())
            .send(&update, artifact(&dir, "file_path.pdf")?, TaskType::MergePdf)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_send_file_too_large() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut platform = MockChatPlatform::new();
        platform.expect_send_chat_action().never();
        platform.expect_send_document().never();
        platform.expect_send_photo().never();
        let mut analytics = MockAnalyticsService::new();
        analytics.expect_send_event().never();

        let sizes = SizeValidator {
            max_download: 3,
            max_upload: 3,
        };
        let outcome = dispatcher(platform, analytics, sizes)
            .send(&update(), artifact(&dir, "file_path.pdf")?, TaskType::MergePdf)
            .await?;

        assert_eq!(outcome, DeliveryOutcome::TooLarge { size: 4, limit: 3 });
        assert!(!dir.path().join("file_path.pdf").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_send_failure_emits_no_telemetry() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut platform = MockChatPlatform::new();
        platform.expect_send_chat_action().returning(|_, _| Ok(()));
        platform.expect_send_document().returning(|_, _| {
            Err(crate::platform::PlatformError::Request("bad gateway".to_string()))
        });
        let mut analytics = MockAnalyticsService::new();
        analytics.expect_send_event().never();

        let result = dispatcher(platform, analytics, SizeValidator::default())
            .send(&update(), artifact(&dir, "file_path.pdf")?, TaskType::MergePdf)
            .await;

        assert!(matches!(result, Err(GatewayError::Platform(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_send_file_names() -> Result<(), GatewayError> {
        let mut platform = MockChatPlatform::new();
        platform
            .expect_send_message()
            .withf(|chat_id, text, options| {
                *chat_id == ChatId(CHAT_ID)
                    && text == "text1: a\n2: File name unavailable\n"
                    && *options == MessageOptions::default()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        dispatcher(platform, MockAnalyticsService::new(), SizeValidator::default())
            .send_file_names(
                ChatId(CHAT_ID),
                "text",
                &[FileNameRecord::named("a", "a"), FileNameRecord::unnamed("b")],
            )
            .await
    }
}
