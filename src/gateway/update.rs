//! What the gateway needs to know about the update it is handling.

use teloxide::types::{CallbackQuery, ChatId, Message, MessageId};

/// Identity of a multi-turn interaction: one user in one chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationId {
    /// Chat the interaction happens in
    pub chat_id: i64,
    /// User driving it
    pub user_id: i64,
}

/// Reference to an existing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    /// Chat holding the message
    pub chat_id: ChatId,
    /// Message id within that chat
    pub message_id: MessageId,
}

/// Inline button press that has to be acknowledged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAck {
    /// Callback query id
    pub query_id: String,
    /// Message the pressed button belongs to, when still accessible
    pub message: Option<MessageRef>,
}

/// Triggering update, reduced to routing data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateContext {
    /// The update's own chat
    pub chat_id: ChatId,
    /// Sender, 0 when unknown
    pub user_id: i64,
    /// Triggering message, if the update is a message
    pub message_id: Option<MessageId>,
    /// Present when the update is an inline button press
    pub callback: Option<CallbackAck>,
}

impl UpdateContext {
    /// Context for a plain message
    #[must_use]
    pub fn from_message(msg: &Message) -> Self {
        Self {
            chat_id: msg.chat.id,
            user_id: msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed()),
            message_id: Some(msg.id),
            callback: None,
        }
    }

    /// Context for an inline button press
    #[must_use]
    pub fn from_callback_query(q: &CallbackQuery) -> Self {
        let user_id = q.from.id.0.cast_signed();
        let message = q.message.as_ref().map(|m| MessageRef {
            chat_id: m.chat().id,
            message_id: m.id(),
        });
        Self {
            // Without an accessible message the private chat with the user is the fallback
            chat_id: message.map_or(ChatId(user_id), |m| m.chat_id),
            user_id,
            message_id: None,
            callback: Some(CallbackAck {
                query_id: q.id.to_string(),
                message,
            }),
        }
    }

    /// Chat that replies and artifacts must go to.
    ///
    /// For a button press this is the chat of the message carrying the
    /// button, otherwise the update's own chat.
    #[must_use]
    pub fn target_chat(&self) -> ChatId {
        self.callback
            .as_ref()
            .and_then(|ack| ack.message)
            .map_or(self.chat_id, |m| m.chat_id)
    }

    /// Key of the conversation this update belongs to
    #[must_use]
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId {
            chat_id: self.target_chat().0,
            user_id: self.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_update(chat: i64) -> UpdateContext {
        UpdateContext {
            chat_id: ChatId(chat),
            user_id: 42,
            message_id: Some(MessageId(7)),
            callback: None,
        }
    }

    #[test]
    fn test_target_chat_defaults_to_own_chat() {
        assert_eq!(message_update(5).target_chat(), ChatId(5));
    }

    #[test]
    fn test_target_chat_follows_callback_message() {
        let mut update = message_update(5);
        update.callback = Some(CallbackAck {
            query_id: "q".to_string(),
            message: Some(MessageRef {
                chat_id: ChatId(10),
                message_id: MessageId(3),
            }),
        });

        assert_eq!(update.target_chat(), ChatId(10));
        assert_eq!(update.conversation_id().chat_id, 10);
    }

    #[test]
    fn test_callback_without_message_keeps_own_chat() {
        let mut update = message_update(5);
        update.callback = Some(CallbackAck {
            query_id: "q".to_string(),
            message: None,
        });

        assert_eq!(update.target_chat(), ChatId(5));
    }
}
