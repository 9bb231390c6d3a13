use dotenvy::dotenv;
use pdf_courier::analytics::TracingAnalytics;
use pdf_courier::bot::views::{CANCEL_CALLBACK, DONE_BUTTON};
use pdf_courier::bot::{apply_step, BotContext, BotDialogue, Command, PasswordTask, State, Step};
use pdf_courier::config::Settings;
use pdf_courier::gateway::control::CANCEL_BUTTON;
use pdf_courier::gateway::{
    ConversationStore, Gateway, MessageMedia, TempDirProvider, TempFileProvider, UpdateContext,
};
use pdf_courier::platform::{ChatPlatform, TelegramPlatform};
use pdf_courier::processing::CommandProcessor;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting the bot token
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    token_prefixed: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(
                r"(https?://[^/]+/(?:file/)?bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)",
            )?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token_prefixed: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let output = self.token_url.replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self.token_bare.replace_all(&output, "[TELEGRAM_TOKEN]");
        self.token_prefixed
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .into_owned()
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed in full, whatever the redacted length
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting PDF Courier bot...");

    let settings = init_settings();
    let bot = Bot::new(settings.telegram_token.clone());
    let context = init_context(&bot, &settings);

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let handler = setup_handler();

    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![context, InMemStorage::<State>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_context(bot: &Bot, settings: &Settings) -> Arc<BotContext> {
    let platform: Arc<dyn ChatPlatform> = Arc::new(TelegramPlatform::new(bot.clone()));
    let temp_files: Arc<dyn TempFileProvider> = Arc::new(
        settings
            .temp_dir
            .as_ref()
            .map_or_else(TempDirProvider::default, TempDirProvider::in_dir),
    );

    let Some(processor) = settings.processor_command.as_deref().and_then(|cmd| {
        CommandProcessor::from_command_line(
            cmd,
            Duration::from_secs(settings.processor_timeout_secs),
            temp_files.clone(),
        )
    }) else {
        error!("PROCESSOR_COMMAND is not set, nothing can process documents.");
        std::process::exit(1);
    };

    let support_url = settings.support_url.as_deref().and_then(|raw| match raw.parse() {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Ignoring invalid SUPPORT_URL: {}", e);
            None
        }
    });

    let store = ConversationStore::new(
        Duration::from_secs(settings.conversation_ttl_secs),
        pdf_courier::config::CONVERSATION_MAX_ENTRIES,
    );
    info!(
        "Conversation store initialized (ttl: {}s)",
        settings.conversation_ttl_secs
    );

    let gateway = Gateway::new(
        settings.size_validator(),
        platform.clone(),
        temp_files,
        Arc::new(TracingAnalytics),
        store,
    );
    Arc::new(BotContext::new(gateway, platform, Arc::new(processor), support_url))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| q.data.as_deref() == Some(CANCEL_CALLBACK))
                .filter(|q: CallbackQuery| q.message.as_ref().is_none_or(|m| m.chat().is_private()))
                .enter_dialogue::<CallbackQuery, InMemStorage<State>, State>()
                .endpoint(handle_cancel_callback),
        )
        .branch(
            Update::filter_message()
                // Dialogues are keyed by chat, conversation data by chat and user
                .filter(|msg: Message| msg.chat.is_private())
                .enter_dialogue::<Message, InMemStorage<State>, State>()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    dptree::filter(|msg: Message| msg.text() == Some(CANCEL_BUTTON))
                        .endpoint(handle_cancel_text),
                )
                .branch(dptree::case![State::MergeCollecting].endpoint(handle_merge_message))
                .branch(dptree::case![State::AwaitingPdf(task)].endpoint(handle_pdf_message))
                .branch(
                    dptree::case![State::AwaitingPassword(task)].endpoint(handle_password_message),
                )
                .branch(dptree::case![State::AwaitingImage].endpoint(handle_image_message))
                .branch(dptree::case![State::Start].endpoint(handle_idle_message)),
        )
}

/// Apply the handler result to the dialogue, logging instead of failing the update
async fn finish(dialogue: &BotDialogue, result: anyhow::Result<Step>, what: &str) {
    let step = match result {
        Ok(step) => step,
        Err(e) => {
            error!("{} error: {:#}", what, e);
            Step::Exit
        }
    };
    if let Err(e) = apply_step(dialogue, step).await {
        error!("Failed to update dialogue: {}", e);
    }
}

async fn handle_command(
    msg: Message,
    cmd: Command,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    finish(&dialogue, context.command(&update, cmd).await, "Command").await;
    respond(())
}

async fn handle_cancel_text(
    msg: Message,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    finish(&dialogue, context.cancel(&update).await, "Cancel").await;
    respond(())
}

async fn handle_cancel_callback(
    q: CallbackQuery,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_callback_query(&q);
    finish(&dialogue, context.cancel(&update).await, "Cancel callback").await;
    respond(())
}

async fn handle_merge_message(
    msg: Message,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    let result = if msg.text() == Some(DONE_BUTTON) {
        context.merge_finish(&update).await
    } else {
        context
            .merge_add_file(&update, &MessageMedia::from_message(&msg))
            .await
    };
    finish(&dialogue, result, "Merge").await;
    respond(())
}

async fn handle_pdf_message(
    msg: Message,
    task: PasswordTask,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    let media = MessageMedia::from_message(&msg);
    let result = context.password_task_receive_pdf(&update, &media, task).await;
    finish(&dialogue, result, "PDF").await;
    respond(())
}

async fn handle_password_message(
    msg: Message,
    task: PasswordTask,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    let result = match msg.text() {
        Some(password) => {
            context
                .password_task_receive_password(&update, task, password)
                .await
        }
        None => context.password_task_reprompt(&update, task).await,
    };
    finish(&dialogue, result, "Password").await;
    respond(())
}

async fn handle_image_message(
    msg: Message,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    let media = MessageMedia::from_message(&msg);
    finish(&dialogue, context.image_to_pdf(&update, &media).await, "Image").await;
    respond(())
}

async fn handle_idle_message(
    msg: Message,
    context: Arc<BotContext>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let update = UpdateContext::from_message(&msg);
    finish(&dialogue, context.help(&update).await, "Help").await;
    respond(())
}
