//! Completion telemetry for bot tasks.

use crate::gateway::UpdateContext;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Task a user asked the bot to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Merge several PDFs into one
    MergePdf,
    /// Protect a PDF with a password
    EncryptPdf,
    /// Remove the password from a PDF
    DecryptPdf,
    /// Convert an image into a PDF
    ImageToPdf,
}

impl TaskType {
    /// Stable snake-case name, also used as the processor's task argument
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MergePdf => "merge_pdf",
            Self::EncryptPdf => "encrypt_pdf",
            Self::DecryptPdf => "decrypt_pdf",
            Self::ImageToPdf => "image_to_pdf",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle point of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Result delivered to the user
    Complete,
}

/// Receiver of task events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsService: Send + Sync {
    /// Record one event. Telemetry never fails the caller.
    async fn send_event(&self, update: &UpdateContext, task: TaskType, action: EventAction);
}

/// Event as recorded by [`TracingAnalytics`]
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsEvent {
    /// Sender
    pub user_id: i64,
    /// Chat the result went to
    pub chat_id: i64,
    /// Task performed
    pub task: TaskType,
    /// Lifecycle point
    pub action: EventAction,
    /// When the event happened
    pub timestamp: chrono::DateTime<Utc>,
}

impl AnalyticsEvent {
    /// Build an event stamped with the current time
    #[must_use]
    pub fn now(update: &UpdateContext, task: TaskType, action: EventAction) -> Self {
        Self {
            user_id: update.user_id,
            chat_id: update.target_chat().0,
            task,
            action,
            timestamp: Utc::now(),
        }
    }
}

/// [`AnalyticsService`] that writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics;

#[async_trait]
impl AnalyticsService for TracingAnalytics {
    async fn send_event(&self, update: &UpdateContext, task: TaskType, action: EventAction) {
        let event = AnalyticsEvent::now(update, task, action);
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "analytics", event = %json, "Task event"),
            Err(e) => info!(target: "analytics", task = %task, error = %e, "Task event"),
        }
    }
}
