//! Chat platform seam.
//!
//! The gateway talks to the chat platform only through [`ChatPlatform`], so
//! validation and routing can be exercised without a live bot token.
//! [`TelegramPlatform`] is the production implementation over `teloxide`.

use crate::utils::retry_telegram_operation;
use async_trait::async_trait;
use std::path::Path;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQueryId, ChatAction, ChatId, FileId, InlineKeyboardButton, InlineKeyboardMarkup,
    InputFile, KeyboardButton, KeyboardMarkup, KeyboardRemove, MessageId, ParseMode, ReplyMarkup,
};
use thiserror::Error;
use tracing::debug;

/// Errors raised by the chat platform
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The Bot API rejected or failed a request
    #[error("Telegram request failed: {0}")]
    Request(String),
    /// Fetching file contents failed
    #[error("Download failed: {0}")]
    Download(String),
    /// Local I/O while writing a downloaded file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<teloxide::RequestError> for PlatformError {
    fn from(e: teloxide::RequestError) -> Self {
        Self::Request(e.to_string())
    }
}

impl From<teloxide::DownloadError> for PlatformError {
    fn from(e: teloxide::DownloadError) -> Self {
        Self::Download(e.to_string())
    }
}

/// Inline button opening a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkButton {
    /// Button label
    pub text: String,
    /// Target URL
    pub url: url::Url,
}

/// Inline button sending callback data back to the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    /// Button label
    pub text: String,
    /// Callback data delivered on press
    pub data: String,
}

/// Keyboard attached to an outgoing text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// One-row reply keyboard, shown once and resized to fit
    Buttons(Vec<String>),
    /// Remove any reply keyboard currently shown
    Remove,
    /// One-row inline keyboard of URL buttons
    Links(Vec<LinkButton>),
    /// One-row inline keyboard of callback buttons
    Actions(Vec<ActionButton>),
}

/// Formatting options for [`ChatPlatform::send_message`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageOptions {
    /// Parse mode, plain text when `None`
    pub parse_mode: Option<ParseMode>,
    /// Message to reply to
    pub reply_to: Option<MessageId>,
    /// Keyboard to attach
    pub markup: Option<Markup>,
}

impl MessageOptions {
    /// Options with only a keyboard set
    #[must_use]
    pub const fn with_markup(markup: Markup) -> Self {
        Self {
            parse_mode: None,
            reply_to: None,
            markup: Some(markup),
        }
    }
}

/// Interface to the chat platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Materialize a remote file at `destination`
    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<(), PlatformError>;
    /// Show a presence indicator such as "sending document"
    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction)
        -> Result<(), PlatformError>;
    /// Upload a local file on the document channel
    async fn send_document(&self, chat_id: ChatId, path: &Path) -> Result<(), PlatformError>;
    /// Upload a local file on the image channel
    async fn send_photo(&self, chat_id: ChatId, path: &Path) -> Result<(), PlatformError>;
    /// Send a text message
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: MessageOptions,
    ) -> Result<(), PlatformError>;
    /// Acknowledge an inline button press
    async fn answer_callback_query(&self, query_id: &str) -> Result<(), PlatformError>;
    /// Replace the text of an existing message
    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError>;
}

/// [`ChatPlatform`] backed by the Telegram Bot API
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    /// Wrap a `teloxide` bot
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn to_reply_markup(markup: Markup) -> ReplyMarkup {
    match markup {
        Markup::Buttons(labels) => {
            let row = labels.into_iter().map(KeyboardButton::new).collect::<Vec<_>>();
            ReplyMarkup::Keyboard(
                KeyboardMarkup::new(vec![row])
                    .one_time_keyboard()
                    .resize_keyboard(),
            )
        }
        Markup::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
        Markup::Links(links) => {
            let row = links
                .into_iter()
                .map(|link| InlineKeyboardButton::url(link.text, link.url))
                .collect::<Vec<_>>();
            ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(vec![row]))
        }
        Markup::Actions(actions) => {
            let row = actions
                .into_iter()
                .map(|action| InlineKeyboardButton::callback(action.text, action.data))
                .collect::<Vec<_>>();
            ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(vec![row]))
        }
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn download_file(&self, file_id: &str, destination: &Path) -> Result<(), PlatformError> {
        retry_telegram_operation(|| async move {
            let file = self.bot.get_file(FileId(file_id.to_owned())).await?;
            let mut dst = tokio::fs::File::create(destination).await?;
            self.bot.download_file(&file.path, &mut dst).await?;
            Ok::<_, PlatformError>(())
        })
        .await?;

        debug!(file_id = %file_id, path = %destination.display(), "Downloaded file from Telegram");
        Ok(())
    }

    async fn send_chat_action(
        &self,
        chat_id: ChatId,
        action: ChatAction,
    ) -> Result<(), PlatformError> {
        self.bot.send_chat_action(chat_id, action).await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, path: &Path) -> Result<(), PlatformError> {
        retry_telegram_operation(|| async move {
            self.bot
                .send_document(chat_id, InputFile::file(path))
                .await
                .map_err(PlatformError::from)
        })
        .await?;
        Ok(())
    }

    async fn send_photo(&self, chat_id: ChatId, path: &Path) -> Result<(), PlatformError> {
        retry_telegram_operation(|| async move {
            self.bot
                .send_photo(chat_id, InputFile::file(path))
                .await
                .map_err(PlatformError::from)
        })
        .await?;
        Ok(())
    }

    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        options: MessageOptions,
    ) -> Result<(), PlatformError> {
        let mut req = self.bot.send_message(chat_id, text);
        if let Some(pm) = options.parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(reply_to) = options.reply_to {
            req = req.reply_parameters(teloxide::types::ReplyParameters::new(reply_to));
        }
        if let Some(markup) = options.markup {
            req = req.reply_markup(to_reply_markup(markup));
        }
        req.await?;
        Ok(())
    }

    async fn answer_callback_query(&self, query_id: &str) -> Result<(), PlatformError> {
        self.bot
            .answer_callback_query(CallbackQueryId(query_id.to_owned()))
            .await?;
        Ok(())
    }

    async fn edit_message_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.bot.edit_message_text(chat_id, message_id, text).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buttons_become_single_row_keyboard() {
        let markup = to_reply_markup(Markup::Buttons(vec!["Back".to_string()]));

        let ReplyMarkup::Keyboard(keyboard) = markup else {
            panic!("expected reply keyboard");
        };
        assert_eq!(keyboard.keyboard.len(), 1);
        assert_eq!(keyboard.keyboard[0][0].text, "Back");
    }

    #[test]
    fn test_links_become_inline_keyboard() -> Result<(), url::ParseError> {
        let markup = to_reply_markup(Markup::Links(vec![LinkButton {
            text: "Support".to_string(),
            url: "https://example.com/support".parse()?,
        }]));

        let ReplyMarkup::InlineKeyboard(keyboard) = markup else {
            panic!("expected inline keyboard");
        };
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Support");
        Ok(())
    }

    #[test]
    fn test_actions_become_callback_buttons() {
        let markup = to_reply_markup(Markup::Actions(vec![ActionButton {
            text: "Cancel".to_string(),
            data: "cancel".to_string(),
        }]));

        let ReplyMarkup::InlineKeyboard(keyboard) = markup else {
            panic!("expected inline keyboard");
        };
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "Cancel");
    }
}
