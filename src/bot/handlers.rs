use super::state::{PasswordTask, State, Step};
use super::views;
use crate::analytics::TaskType;
use crate::gateway::{
    DeliveryOutcome, FileNameRecord, Gateway, GatewayError, MessageMedia, UpdateContext,
};
use crate::platform::{ChatPlatform, Markup, MessageOptions};
use crate::processing::{DocumentProcessor, ProcessingOptions};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use teloxide::types::ParseMode;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

/// Conversation key holding the PDFs collected for a merge
pub const MERGE_FILES_KEY: &str = "merge_files";
/// Conversation key holding the PDF waiting for a password
pub const PDF_FILE_KEY: &str = "pdf_file";

/// Supported commands for the bot
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Start the bot and show welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show usage
    #[command(description = "Show what I can do.")]
    Help,
    /// Merge PDF files
    #[command(description = "Merge PDF files.")]
    Merge,
    /// Encrypt a PDF file
    #[command(description = "Protect a PDF file with a password.")]
    Encrypt,
    /// Decrypt a PDF file
    #[command(description = "Remove the password from a PDF file.")]
    Decrypt,
    /// Convert an image into a PDF file
    #[command(description = "Convert an image into a PDF file.")]
    Topdf,
    /// Cancel the current operation
    #[command(description = "Cancel the current operation.")]
    Cancel,
}

/// A PDF collected for a merge
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeFile {
    /// Remote file id
    pub file_id: String,
    /// Original file name
    pub file_name: Option<String>,
}

/// Dependencies shared by all handlers
#[derive(Clone)]
pub struct BotContext {
    gateway: Gateway,
    platform: Arc<dyn ChatPlatform>,
    processor: Arc<dyn DocumentProcessor>,
    support_url: Option<url::Url>,
}

impl BotContext {
    /// Create the handler context
    #[must_use]
    pub fn new(
        gateway: Gateway,
        platform: Arc<dyn ChatPlatform>,
        processor: Arc<dyn DocumentProcessor>,
        support_url: Option<url::Url>,
    ) -> Self {
        Self {
            gateway,
            platform,
            processor,
            support_url,
        }
    }

    /// Gateway components
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Run a command.
    ///
    /// # Errors
    ///
    /// Returns an error if a reply cannot be sent.
    pub async fn command(&self, update: &UpdateContext, cmd: Command) -> Result<Step> {
        info!(user_id = update.user_id, command = ?cmd, "Command received");
        match cmd {
            Command::Start => self.start(update).await,
            Command::Help => self.help(update).await,
            Command::Merge => self.begin_merge(update).await,
            Command::Encrypt => self.begin_password_task(update, PasswordTask::Encrypt).await,
            Command::Decrypt => self.begin_password_task(update, PasswordTask::Decrypt).await,
            Command::Topdf => self.begin_image_to_pdf(update).await,
            Command::Cancel => self.cancel(update).await,
        }
    }

    /// Welcome the user and reset any running operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the welcome message cannot be sent.
    pub async fn start(&self, update: &UpdateContext) -> Result<Step> {
        let options = MessageOptions {
            markup: views::support_markup(self.support_url.as_ref()),
            ..MessageOptions::default()
        };
        self.platform
            .send_message(update.target_chat(), views::WELCOME_TEXT, options)
            .await?;
        Ok(Step::Exit)
    }

    /// Show usage.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be sent.
    pub async fn help(&self, update: &UpdateContext) -> Result<Step> {
        let options = MessageOptions {
            parse_mode: Some(ParseMode::Html),
            markup: views::support_markup(self.support_url.as_ref()),
            ..MessageOptions::default()
        };
        self.platform
            .send_message(update.target_chat(), views::HELP_TEXT, options)
            .await?;
        Ok(Step::Stay)
    }

    /// Cancel the current operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the confirmation cannot be sent.
    pub async fn cancel(&self, update: &UpdateContext) -> Result<Step> {
        let end = self.gateway.control.cancel(update).await?;
        Ok(end.into())
    }

    /// Start collecting PDFs to merge.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be sent.
    pub async fn begin_merge(&self, update: &UpdateContext) -> Result<Step> {
        self.gateway
            .store
            .put(update.conversation_id(), MERGE_FILES_KEY, &Vec::<MergeFile>::new())
            .await?;
        let options = MessageOptions {
            parse_mode: Some(ParseMode::Html),
            reply_to: update.message_id,
            markup: Some(views::merge_markup()),
        };
        self.platform
            .send_message(update.target_chat(), views::MERGE_PROMPT, options)
            .await?;
        Ok(Step::Goto(State::MergeCollecting))
    }

    /// Add the PDF carried by a message to the merge.
    ///
    /// # Errors
    ///
    /// Returns an error if the collected list is missing or a reply fails.
    pub async fn merge_add_file(
        &self,
        update: &UpdateContext,
        media: &MessageMedia,
    ) -> Result<Step> {
        let doc = match self.gateway.classifier.classify_as_pdf_document(media) {
            Ok(doc) => doc,
            Err(e) => return self.recover(update, e, Step::Stay).await,
        };

        let conversation = update.conversation_id();
        let mut files: Vec<MergeFile> =
            match self.gateway.store.take(conversation, MERGE_FILES_KEY).await {
                Ok(files) => files,
                Err(e) => return self.recover(update, e, Step::Exit).await,
            };
        files.push(MergeFile {
            file_id: doc.file_id.clone(),
            file_name: doc.file_name.clone(),
        });
        self.gateway.store.put(conversation, MERGE_FILES_KEY, &files).await?;

        let text = views::merge_file_received(doc.file_name.as_deref(), files.len());
        self.reply(update, &text, Some(views::merge_markup())).await?;
        Ok(Step::Stay)
    }

    /// Merge the collected PDFs and send the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the collected list is missing, or an
    /// unexpected transfer, processing or delivery failure occurs.
    pub async fn merge_finish(&self, update: &UpdateContext) -> Result<Step> {
        let conversation = update.conversation_id();
        let files: Vec<MergeFile> =
            match self.gateway.store.take(conversation, MERGE_FILES_KEY).await {
                Ok(files) => files,
                Err(e) => return self.recover(update, e, Step::Exit).await,
            };
        if files.len() < 2 {
            self.gateway.store.put(conversation, MERGE_FILES_KEY, &files).await?;
            self.reply(update, views::MERGE_NEED_MORE, Some(views::merge_markup()))
                .await?;
            return Ok(Step::Stay);
        }

        let file_ids: Vec<&str> = files.iter().map(|f| f.file_id.as_str()).collect();
        if let Err(e) = self.merge_and_send(update, &file_ids).await {
            return self.recover(update, e, Step::Exit).await;
        }

        let records: Vec<FileNameRecord> = files
            .into_iter()
            .map(|f| FileNameRecord {
                id: f.file_id,
                name: f.file_name,
            })
            .collect();
        self.gateway
            .dispatcher
            .send_file_names(update.target_chat(), views::MERGE_FILES_HEADER, &records)
            .await?;
        Ok(Step::Exit)
    }

    async fn merge_and_send(
        &self,
        update: &UpdateContext,
        file_ids: &[&str],
    ) -> Result<(), GatewayError> {
        let batch = self.gateway.transfer.download_many(file_ids).await?;
        let inputs = batch.paths().into_iter().map(Path::to_path_buf).collect();
        self.run_task(update, TaskType::MergePdf, inputs, ProcessingOptions::default())
            .await
    }

    /// Ask for the PDF of an encrypt or decrypt operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be sent.
    pub async fn begin_password_task(
        &self,
        update: &UpdateContext,
        task: PasswordTask,
    ) -> Result<Step> {
        self.gateway
            .control
            .reply_with_cancel_markup(update, views::password_task_prompt(task), None)
            .await?;
        Ok(Step::Goto(State::AwaitingPdf(task)))
    }

    /// Remember the PDF of a password operation and ask for the password.
    ///
    /// # Errors
    ///
    /// Returns an error if the file id cannot be stored or the prompt fails.
    pub async fn password_task_receive_pdf(
        &self,
        update: &UpdateContext,
        media: &MessageMedia,
        task: PasswordTask,
    ) -> Result<Step> {
        let doc = match self.gateway.classifier.classify_as_pdf_document(media) {
            Ok(doc) => doc,
            Err(e) => return self.recover(update, e, Step::Stay).await,
        };

        self.gateway
            .store
            .put(update.conversation_id(), PDF_FILE_KEY, &doc.file_id)
            .await?;
        self.reply(update, views::password_prompt(task), Some(views::cancel_inline_markup()))
            .await?;
        Ok(Step::Goto(State::AwaitingPassword(task)))
    }

    /// Apply the password operation to the stored PDF and send the result.
    ///
    /// # Errors
    ///
    /// Returns an error if no PDF was stored, or an unexpected transfer,
    /// processing or delivery failure occurs.
    pub async fn password_task_receive_password(
        &self,
        update: &UpdateContext,
        task: PasswordTask,
        password: &str,
    ) -> Result<Step> {
        let file_id: String =
            match self.gateway.store.take(update.conversation_id(), PDF_FILE_KEY).await {
                Ok(file_id) => file_id,
                Err(e) => return self.recover(update, e, Step::Exit).await,
            };
        let options = ProcessingOptions {
            password: Some(password.to_owned()),
        };

        if let Err(e) = self.process_one(update, &file_id, task.task_type(), options).await {
            return self.recover(update, e, Step::Exit).await;
        }
        Ok(Step::Exit)
    }

    /// Ask again for the password after a message without text.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be sent.
    pub async fn password_task_reprompt(
        &self,
        update: &UpdateContext,
        task: PasswordTask,
    ) -> Result<Step> {
        self.reply(update, views::password_prompt(task), Some(views::cancel_inline_markup()))
            .await?;
        Ok(Step::Stay)
    }

    /// Ask for the image to convert.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be sent.
    pub async fn begin_image_to_pdf(&self, update: &UpdateContext) -> Result<Step> {
        self.gateway
            .control
            .reply_with_cancel_markup(update, views::IMAGE_PROMPT, None)
            .await?;
        Ok(Step::Goto(State::AwaitingImage))
    }

    /// Convert the image carried by a message and send the PDF.
    ///
    /// # Errors
    ///
    /// Returns an error on an unexpected transfer, processing or delivery failure.
    pub async fn image_to_pdf(&self, update: &UpdateContext, media: &MessageMedia) -> Result<Step> {
        let image = match self.gateway.classifier.classify_as_image(media) {
            Ok(image) => image,
            Err(e) => return self.recover(update, e, Step::Stay).await,
        };

        let file_id = image.file_id.clone();
        if let Err(e) = self
            .process_one(update, &file_id, TaskType::ImageToPdf, ProcessingOptions::default())
            .await
        {
            return self.recover(update, e, Step::Exit).await;
        }
        Ok(Step::Exit)
    }

    async fn process_one(
        &self,
        update: &UpdateContext,
        file_id: &str,
        task: TaskType,
        options: ProcessingOptions,
    ) -> Result<(), GatewayError> {
        let file = self.gateway.transfer.download_one(file_id).await?;
        self.run_task(update, task, vec![file.path().to_path_buf()], options)
            .await
    }

    // Inputs must stay alive until the processor is done with them
    async fn run_task(
        &self,
        update: &UpdateContext,
        task: TaskType,
        inputs: Vec<std::path::PathBuf>,
        options: ProcessingOptions,
    ) -> Result<(), GatewayError> {
        let artifact = self.processor.process(task, inputs, options).await?;
        let outcome = self.gateway.dispatcher.send(update, artifact, task).await?;
        if let DeliveryOutcome::TooLarge { .. } = outcome {
            self.reply(update, views::RESULT_TOO_LARGE, Some(Markup::Remove))
                .await?;
        }
        Ok(())
    }

    async fn reply(
        &self,
        update: &UpdateContext,
        text: &str,
        markup: Option<Markup>,
    ) -> Result<(), GatewayError> {
        let options = MessageOptions {
            parse_mode: None,
            reply_to: update.message_id,
            markup,
        };
        self.platform
            .send_message(update.target_chat(), text, options)
            .await?;
        Ok(())
    }

    /// Turn a failure into a reply.
    ///
    /// Errors the user can act on are answered and `on_user_error` is
    /// returned. Anything else gets a generic reply and is propagated.
    async fn recover(
        &self,
        update: &UpdateContext,
        error: GatewayError,
        on_user_error: Step,
    ) -> Result<Step> {
        if let Some(text) = views::error_text(&error) {
            if error.is_validation() {
                warn!(user_id = update.user_id, error = %error, "Rejected user input");
            } else {
                info!(user_id = update.user_id, error = %error, "Operation refused by processor");
            }
            self.reply(update, &text, None).await?;
            return Ok(on_user_error);
        }

        error!(user_id = update.user_id, error = %error, "Operation failed");
        if let Err(e) = self.reply(update, views::GENERIC_FAILURE, Some(Markup::Remove)).await {
            warn!(error = %e, "Failed to report failure to user");
        }
        Err(error.into())
    }
}
