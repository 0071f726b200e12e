use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: Role,
    pub content: String,
}

/// Conversation context passed to a [`Generator`](crate::traits::Generator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System prompt sent outside the message list.
    pub system_prompt: String,
    /// Conversation history (oldest first).
    pub history: Vec<ContextEntry>,
    /// The current user message.
    pub current_message: String,
}

impl Context {
    /// A context for one persona answering one question.
    pub fn for_persona(persona: &str, message: &str) -> Self {
        Self {
            system_prompt: persona_prompt(persona),
            history: Vec::new(),
            current_message: message.to_string(),
        }
    }

    pub fn with_history(mut self, history: Vec<ContextEntry>) -> Self {
        self.history = history;
        self
    }

    /// History plus the current message, as `(role, text)` turns.
    pub fn turns(&self) -> Vec<ContextEntry> {
        let mut turns = Vec::with_capacity(self.history.len() + 1);
        turns.extend(self.history.iter().cloned());
        turns.push(ContextEntry {
            role: Role::User,
            content: self.current_message.clone(),
        });
        turns
    }
}

/// System prompt giving the assistant its persona name.
pub fn persona_prompt(persona: &str) -> String {
    let name = match persona.trim() {
        "" => "Assistant",
        name => name,
    };
    format!(
        "You are {name}, a helpful personal assistant. \
         Answer clearly and politely, in the language the user writes in. \
         If asked who you are, say you are {name}, a personal assistant. \
         Do not mention being an AI or a bot unless asked directly."
    )
}
