/// Command and conversation-step handlers
pub mod handlers;
/// Dialogue state
pub mod state;
/// User-facing texts and keyboards
pub mod views;

pub use handlers::{BotContext, Command};
pub use state::{PasswordTask, State, Step};

use anyhow::{anyhow, Result};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

/// Dialogue handle injected by the dispatcher
pub type BotDialogue = Dialogue<State, InMemStorage<State>>;

/// Apply a handler's [`Step`] to the dialogue.
///
/// # Errors
///
/// Returns an error if the dialogue storage rejects the update.
pub async fn apply_step(dialogue: &BotDialogue, step: Step) -> Result<()> {
    match step {
        Step::Stay => Ok(()),
        Step::Goto(state) => dialogue
            .update(state)
            .await
            .map_err(|e| anyhow!(e.to_string())),
        Step::Exit => dialogue.exit().await.map_err(|e| anyhow!(e.to_string())),
    }
}
