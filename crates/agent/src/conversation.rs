//! Conversation history
//!
//! The permanent record of the conversation. Turns work on a private
//! snapshot and fold their result back with [`ConversationState::commit_from`];
//! only complete turns and greetings ever commit.
//!
//! Committing work is serialized by the turn lock: take it, snapshot, stream,
//! commit, release. Partial turns only read a snapshot and never lock.

use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};

use robot_chat_core::{Message, Role};

use crate::AgentError;

pub struct ConversationState {
    history: RwLock<Vec<Message>>,
    turn_lock: Mutex<()>,
}

impl ConversationState {
    /// Start a conversation with its system message
    pub fn new(system: Message) -> Self {
        debug_assert_eq!(system.role, Role::System);
        Self {
            history: RwLock::new(vec![system]),
            turn_lock: Mutex::new(()),
        }
    }

    /// Append one message to the permanent history
    pub fn append(&self, message: Message) {
        self.history.write().push(message);
    }

    /// Independent copy of the current history
    pub fn snapshot(&self) -> Vec<Message> {
        self.history.read().clone()
    }

    /// Replace the history with `snapshot`.
    ///
    /// The snapshot must keep the system message and extend the current
    /// history; anything else means it was taken before another commit.
    pub fn commit_from(&self, snapshot: Vec<Message>) -> Result<(), AgentError> {
        if snapshot.first().map(|m| m.role) != Some(Role::System) {
            return Err(AgentError::Conversation(
                "history must start with the system message".to_string(),
            ));
        }

        let mut history = self.history.write();
        if snapshot.len() < history.len() || snapshot[..history.len()] != history[..] {
            return Err(AgentError::Conversation(
                "snapshot does not extend the current history".to_string(),
            ));
        }

        tracing::debug!(
            added = snapshot.len() - history.len(),
            total = snapshot.len(),
            "Committing conversation turn"
        );
        *history = snapshot;
        Ok(())
    }

    /// Wait for exclusive right to commit
    pub async fn lock_turn(&self) -> MutexGuard<'_, ()> {
        self.turn_lock.lock().await
    }

    pub fn len(&self) -> usize {
        self.history.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.read().is_empty()
    }
}
