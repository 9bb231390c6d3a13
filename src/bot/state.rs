use crate::analytics::TaskType;
use serde::{Deserialize, Serialize};

/// Password-protected PDF operation
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PasswordTask {
    /// Add a password
    Encrypt,
    /// Remove a password
    Decrypt,
}

impl PasswordTask {
    /// Telemetry and processor task for this operation
    #[must_use]
    pub const fn task_type(self) -> TaskType {
        match self {
            Self::Encrypt => TaskType::EncryptPdf,
            Self::Decrypt => TaskType::DecryptPdf,
        }
    }
}

/// Represents the current step of the user dialogue
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum State {
    /// No operation in progress
    #[default]
    Start,
    /// Collecting PDFs to merge until the user presses "Done"
    MergeCollecting,
    /// Waiting for the PDF to encrypt or decrypt
    AwaitingPdf(PasswordTask),
    /// Waiting for the password for the PDF received earlier
    AwaitingPassword(PasswordTask),
    /// Waiting for an image to convert
    AwaitingImage,
}

/// What the dialogue should do after a handler ran
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Keep the current state
    Stay,
    /// Move to another state
    Goto(State),
    /// Leave the dialogue
    Exit,
}

impl From<crate::gateway::ConversationEnd> for Step {
    fn from(_: crate::gateway::ConversationEnd) -> Self {
        Self::Exit
    }
}
