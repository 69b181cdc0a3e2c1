use serde::{Deserialize, Serialize};

/// A single turn in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

/// Conversation context passed to an AI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// System instruction prepended to every request (persona + domain facts).
    pub system_prompt: String,
    /// Conversation history (oldest first).
    pub history: Vec<ContextEntry>,
    /// The current user message.
    pub current_message: String,
}

impl Context {
    /// Create a context with no history.
    pub fn new(system_prompt: &str, message: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            history: Vec::new(),
            current_message: message.to_string(),
        }
    }

    /// Flatten history and the current message into a labeled transcript.
    ///
    /// The transcript is what providers send as the user-role content: one
    /// `User:`/`Bot:` line per turn, the new user line, and a trailing
    /// `Bot:` cue for the completion.
    pub fn to_transcript(&self) -> String {
        let mut lines = Vec::with_capacity(self.history.len() + 2);

        for entry in &self.history {
            let label = if entry.role == "user" { "User" } else { "Bot" };
            lines.push(format!("{label}: {}", entry.content));
        }

        lines.push(format!("User: {}", self.current_message));
        lines.push("Bot:".to_string());

        lines.join("\n")
    }
}
