//! Validation, transfer and delivery of chat attachments.
//!
//! The flow for one update is: [`MessageMedia`] is classified by
//! [`AttachmentClassifier`], downloaded by [`TransferManager`] into scoped
//! temporary files, handed to the document processor, and the resulting
//! [`OutputArtifact`] is delivered by [`OutputDispatcher`]. Data that has to
//! survive between dialogue steps lives in [`ConversationStore`].

/// Attachment model and classification
pub mod attachment;
/// Cancellation and keyboard replies
pub mod control;
/// Per-conversation take-once store
pub mod conversation;
/// Artifact delivery and file listings
pub mod dispatch;
/// Gateway error taxonomy
pub mod error;
/// Platform size ceilings
pub mod size;
/// Scoped downloads and uploads
pub mod transfer;
/// Routing data of the triggering update
pub mod update;

pub use attachment::{Attachment, AttachmentClassifier, AttachmentKind, MessageMedia};
pub use control::{ConversationControl, ConversationEnd};
pub use conversation::ConversationStore;
pub use dispatch::{
    format_file_names, DeliveryChannel, DeliveryOutcome, FileNameRecord, OutputArtifact,
    OutputDispatcher, FILE_NAME_UNAVAILABLE,
};
pub use error::GatewayError;
pub use size::SizeValidator;
pub use transfer::{
    DownloadBatch, DownloadedFile, TempDirProvider, TempFileProvider, TransferManager,
};
pub use update::{CallbackAck, ConversationId, MessageRef, UpdateContext};

use crate::analytics::AnalyticsService;
use crate::platform::ChatPlatform;
use std::sync::Arc;

/// All gateway components, wired to one platform.
///
/// Cloning is cheap; the dispatcher injects one instance into every handler.
#[derive(Clone)]
pub struct Gateway {
    /// Inbound validation
    pub classifier: AttachmentClassifier,
    /// Scoped transfers
    pub transfer: TransferManager,
    /// Cross-step conversation data
    pub store: ConversationStore,
    /// Artifact delivery
    pub dispatcher: OutputDispatcher,
    /// Cancellation and keyboard replies
    pub control: ConversationControl,
}

impl Gateway {
    /// Wire the gateway components together
    #[must_use]
    pub fn new(
        sizes: SizeValidator,
        platform: Arc<dyn ChatPlatform>,
        temp_files: Arc<dyn TempFileProvider>,
        analytics: Arc<dyn AnalyticsService>,
        store: ConversationStore,
    ) -> Self {
        let transfer = TransferManager::new(platform.clone(), temp_files);
        Self {
            classifier: AttachmentClassifier::new(sizes),
            dispatcher: OutputDispatcher::new(sizes, transfer.clone(), platform.clone(), analytics),
            control: ConversationControl::new(platform),
            transfer,
            store,
        }
    }
}
