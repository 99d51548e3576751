//! Conversation history with a replaceable context message.
//!
//! History is an ordered list of tagged messages. The optional persona
//! message set at construction stays at the head until the conversation is
//! dropped; at most one `Role::Context` message exists at any time.

use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::llm::{ChatMessage, ChatModel, Role};

pub struct Conversation {
    model: Arc<dyn ChatModel>,
    persona: Option<String>,
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new(model: Arc<dyn ChatModel>, persona: Option<String>) -> Self {
        let persona = persona.filter(|p| !p.trim().is_empty());
        let mut conversation = Self {
            model,
            persona,
            history: Vec::new(),
        };
        conversation.reset();
        conversation
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn persona(&self) -> Option<&str> {
        self.persona.as_deref()
    }

    /// Text of the current context message, if any.
    pub fn context(&self) -> Option<&str> {
        self.history
            .iter()
            .find(|m| m.role == Role::Context)
            .map(|m| m.content.as_str())
    }

    /// Drop the previous context message and append `text` as the new one.
    pub fn replace_context(&mut self, text: impl Into<String>) {
        let before = self.history.len();
        self.history.retain(|m| m.role != Role::Context);
        debug!(removed = before - self.history.len(), "replacing context message");
        self.history.push(ChatMessage::context(text));
    }

    /// Send `text` as a user turn and return the assistant reply.
    ///
    /// A failed completion leaves the history as it was before the call.
    pub async fn chat(&mut self, text: &str) -> Result<String> {
        self.history.push(ChatMessage::user(text));
        match self.model.invoke(&self.history).await {
            Ok(reply) => {
                info!(
                    model = %reply.model,
                    total_tokens = reply.usage.total_tokens,
                    "chat turn completed"
                );
                self.history.push(ChatMessage::assistant(reply.content.clone()));
                Ok(reply.content)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }

    /// Back to the initial state: persona only.
    pub fn reset(&mut self) {
        self.history.clear();
        if let Some(persona) = &self.persona {
            self.history.push(ChatMessage::persona(persona.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::llm::{ChatReply, UsageMetadata};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes the last user message and records what it was sent.
    struct EchoModel {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    impl EchoModel {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn invoke(&self, messages: &[ChatMessage]) -> Result<ChatReply> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(Error::Timeout("llm"));
            }
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ChatReply {
                content: format!("echo: {}", last),
                usage: UsageMetadata::default(),
                model: "echo".to_string(),
            })
        }

        fn model(&self) -> &str {
            "echo"
        }
    }

    fn count_context(conversation: &Conversation) -> usize {
        conversation
            .history()
            .iter()
            .filter(|m| m.role == Role::Context)
            .count()
    }

    #[test]
    fn replace_context_keeps_a_single_message() {
        let mut conversation = Conversation::new(EchoModel::new(false), Some("Be kind.".to_string()));
        conversation.replace_context("first");
        conversation.replace_context("second");

        assert_eq!(count_context(&conversation), 1);
        assert_eq!(conversation.context(), Some("second"));
        assert_eq!(conversation.history()[0], ChatMessage::persona("Be kind."));
    }

    #[test]
    fn replace_context_is_idempotent() {
        let mut conversation = Conversation::new(EchoModel::new(false), None);
        conversation.replace_context("same");
        conversation.replace_context("same");
        assert_eq!(conversation.history().len(), 1);
        assert_eq!(conversation.context(), Some("same"));
    }

    #[tokio::test]
    async fn chat_sends_full_history_and_records_reply() {
        let model = EchoModel::new(false);
        let mut conversation = Conversation::new(model.clone(), Some("persona".to_string()));
        conversation.replace_context("ctx");

        let reply = conversation.chat("hello").await.unwrap();
        assert_eq!(reply, "echo: hello");

        let seen = model.seen.lock().unwrap();
        let roles: Vec<Role> = seen[0].iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Persona, Role::Context, Role::User]);

        let history: Vec<Role> = conversation.history().iter().map(|m| m.role).collect();
        assert_eq!(history, vec![Role::Persona, Role::Context, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn context_moves_to_the_latest_position() {
        let mut conversation = Conversation::new(EchoModel::new(false), None);
        conversation.replace_context("morning");
        conversation.chat("hi").await.unwrap();
        conversation.replace_context("noon");

        let history = conversation.history();
        assert_eq!(count_context(&conversation), 1);
        assert_eq!(history.last().unwrap(), &ChatMessage::context("noon"));
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn failed_turn_propagates_and_rolls_back() {
        let mut conversation = Conversation::new(EchoModel::new(true), None);
        conversation.replace_context("ctx");

        let err = conversation.chat("hello").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(conversation.history().len(), 1);
    }

    #[tokio::test]
    async fn reset_keeps_only_the_persona() {
        let mut conversation = Conversation::new(EchoModel::new(false), Some("persona".to_string()));
        conversation.replace_context("ctx");
        conversation.chat("hello").await.unwrap();

        conversation.reset();
        assert_eq!(conversation.history(), &[ChatMessage::persona("persona")]);
        assert!(conversation.context().is_none());

        let mut bare = Conversation::new(EchoModel::new(false), Some("   ".to_string()));
        bare.replace_context("ctx");
        bare.reset();
        assert!(bare.history().is_empty());
    }
}
