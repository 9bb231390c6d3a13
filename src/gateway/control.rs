//! Conversation flow control shared by every multi-step flow.

use super::{GatewayError, UpdateContext};
use crate::platform::{ChatPlatform, Markup, MessageOptions};
use std::sync::Arc;
use teloxide::types::ParseMode;
use tracing::{info, warn};

/// Text confirming a cancelled operation
pub const CANCEL_TEXT: &str = "Action cancelled";
/// Label of the reply-keyboard back button
pub const BACK_BUTTON: &str = "Back";
/// Label of the reply-keyboard cancel button
pub const CANCEL_BUTTON: &str = "Cancel";

/// Signals that a multi-step conversation has finished.
///
/// Returned by [`ConversationControl::cancel`]; the dialogue layer resets
/// its state when it sees this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct ConversationEnd;

/// Cancellation and keyboard replies for conversation flows
#[derive(Clone)]
pub struct ConversationControl {
    platform: Arc<dyn ChatPlatform>,
}

impl ConversationControl {
    /// Create a controller
    #[must_use]
    pub fn new(platform: Arc<dyn ChatPlatform>) -> Self {
        Self { platform }
    }

    /// Cancel the current operation.
    ///
    /// A button press is acknowledged and the message carrying the button is
    /// replaced by the confirmation. A text command gets the confirmation as
    /// a reply, and any reply keyboard is removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Platform`] if the confirmation cannot be sent.
    pub async fn cancel(&self, update: &UpdateContext) -> Result<ConversationEnd, GatewayError> {
        match &update.callback {
            Some(ack) => {
                self.platform.answer_callback_query(&ack.query_id).await?;
                match ack.message {
                    Some(message) => {
                        self.platform
                            .edit_message_text(message.chat_id, message.message_id, CANCEL_TEXT)
                            .await?;
                    }
                    None => {
                        warn!(
                            user_id = update.user_id,
                            "Cancel button message is inaccessible, replying instead"
                        );
                        self.platform
                            .send_message(
                                update.target_chat(),
                                CANCEL_TEXT,
                                MessageOptions::with_markup(Markup::Remove),
                            )
                            .await?;
                    }
                }
            }
            None => {
                let options = MessageOptions {
                    parse_mode: None,
                    reply_to: update.message_id,
                    markup: Some(Markup::Remove),
                };
                self.platform
                    .send_message(update.chat_id, CANCEL_TEXT, options)
                    .await?;
            }
        }

        info!(chat_id = update.target_chat().0, user_id = update.user_id, "Conversation cancelled");
        Ok(ConversationEnd)
    }

    /// Reply with a one-button "Back" keyboard.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Platform`] if the message cannot be sent.
    pub async fn reply_with_back_markup(
        &self,
        update: &UpdateContext,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), GatewayError> {
        self.reply_with_button(update, text, parse_mode, BACK_BUTTON)
            .await
    }

    /// Reply with a one-button "Cancel" keyboard.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Platform`] if the message cannot be sent.
    pub async fn reply_with_cancel_markup(
        &self,
        update: &UpdateContext,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), GatewayError> {
        self.reply_with_button(update, text, parse_mode, CANCEL_BUTTON)
            .await
    }

    async fn reply_with_button(
        &self,
        update: &UpdateContext,
        text: &str,
        parse_mode: Option<ParseMode>,
        label: &str,
    ) -> Result<(), GatewayError> {
        let options = MessageOptions {
            parse_mode,
            reply_to: update.message_id,
            markup: Some(Markup::Buttons(vec![label.to_string()])),
        };
        self.platform
            .send_message(update.target_chat(), text, options)
            .await?;
        Ok(())
    }
}
