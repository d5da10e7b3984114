//! Conversation memory

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::agent::types::Message;
pub use crate::config::MemoryPolicy;

/// One completed human/AI exchange
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// What the user typed
    pub user: String,
    /// The assistant's final reply
    pub reply: String,
    /// When the turn completed
    pub at: DateTime<Utc>,
}

/// Human/AI history replayed to the model on every turn.
///
/// Tool traffic never enters memory; only completed turns are recorded.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    /// Session identifier, renewed by [`ConversationMemory::clear`]
    session_id: Uuid,
    policy: MemoryPolicy,
    turns: Vec<Turn>,
}

impl ConversationMemory {
    /// Create an empty memory with the given policy
    pub fn new(policy: MemoryPolicy) -> Self {
        ConversationMemory {
            session_id: Uuid::new_v4(),
            policy,
            turns: Vec::new(),
        }
    }

    /// Record a completed turn, evicting the oldest ones beyond the window
    pub fn record_turn(&mut self, user: impl Into<String>, reply: impl Into<String>) {
        self.turns.push(Turn {
            user: user.into(),
            reply: reply.into(),
            at: Utc::now(),
        });

        if let MemoryPolicy::SlidingWindow { turns } = self.policy {
            let excess = self.turns.len().saturating_sub(turns);
            self.turns.drain(..excess);
        }
    }

    /// Remembered history as alternating user/assistant messages
    pub fn messages(&self) -> Vec<Message> {
        self.turns
            .iter()
            .flat_map(|turn| [Message::user(&turn.user), Message::assistant(&turn.reply)])
            .collect()
    }

    /// Remembered turns, oldest first
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Forget everything and start a new session
    pub fn clear(&mut self) {
        self.turns.clear();
        self.session_id = Uuid::new_v4();
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn policy(&self) -> MemoryPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new(MemoryPolicy::default())
    }
}
