//! Per-session conversation history.
//!
//! Each session keeps only its most recent messages, and the number of
//! sessions is capped: once full, the session appended to least recently is
//! dropped to make room.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::llm::ChatMessage;
use crate::types::SessionId;

struct Session {
    messages: Vec<ChatMessage>,
    last_used: u64,
}

#[derive(Default)]
struct Sessions {
    by_id: HashMap<SessionId, Session>,
    clock: u64,
}

pub struct ConversationMemory {
    sessions: RwLock<Sessions>,
    max_messages: usize,
    max_sessions: usize,
}

impl ConversationMemory {
    /// `max_messages` is raised to at least one user/assistant pair and
    /// `max_sessions` to at least one.
    pub fn new(max_messages: usize, max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(Sessions::default()),
            max_messages: max_messages.max(2),
            max_sessions: max_sessions.max(1),
        }
    }

    /// Messages recorded for `session`, oldest first.
    pub async fn history(&self, session: &SessionId) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .await
            .by_id
            .get(session)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Record one user turn and the answer given to it.
    pub async fn append(&self, session: &SessionId, input: &str, answer: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.clock += 1;
        let now = sessions.clock;

        let entry = sessions
            .by_id
            .entry(session.clone())
            .or_insert_with(|| Session {
                messages: Vec::new(),
                last_used: now,
            });
        entry.last_used = now;
        entry.messages.push(ChatMessage::user(input));
        entry.messages.push(ChatMessage::assistant(answer));

        // Drop whole turns from the front so history never starts mid-turn.
        let excess = entry.messages.len().saturating_sub(self.max_messages);
        if excess > 0 {
            let drop = (excess + excess % 2).min(entry.messages.len());
            entry.messages.drain(..drop);
        }

        while sessions.by_id.len() > self.max_sessions {
            let oldest = sessions
                .by_id
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    debug!(session = %id, "Evicting idle conversation session");
                    sessions.by_id.remove(&id);
                }
                None => break,
            }
        }
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.read().await.by_id.len()
    }
}
