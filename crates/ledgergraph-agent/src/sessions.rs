//! Chat session and message management over the shared state bundle.

use std::sync::Arc;

use chrono::Utc;
use ledgergraph::ids;
use ledgergraph::models::{ChatMessage, ChatRole, ChatSession};
use ledgergraph::{AppState, Error, Result};
use serde_json::Value;

#[derive(Clone)]
pub struct SessionManager {
    state: Arc<AppState>,
}

impl SessionManager {
    #[must_use]
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn create_session(&self, name: impl Into<String>) -> ChatSession {
        let session = ChatSession::new(ids::session_id(), name);
        self.state
            .chat_sessions
            .write()
            .insert(session.id.clone(), session.clone());
        tracing::info!(session_id = %session.id, "chat session created");
        session
    }

    #[must_use]
    pub fn list_sessions(&self) -> Vec<ChatSession> {
        let mut sessions: Vec<_> = self.state.chat_sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub fn get_session(&self, session_id: &str) -> Result<ChatSession> {
        self.state
            .chat_sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("chat session {session_id}")))
    }

    pub fn rename_session(&self, session_id: &str, name: impl Into<String>) -> Result<ChatSession> {
        let mut sessions = self.state.chat_sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::not_found(format!("chat session {session_id}")))?;
        session.name = name.into();
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        let removed = self.state.chat_sessions.write().remove(session_id);
        if removed.is_none() {
            return Err(Error::not_found(format!("chat session {session_id}")));
        }
        self.state.chat_messages.write().remove(session_id);
        tracing::info!(session_id, "chat session deleted");
        Ok(())
    }

    /// Attach a document to a session. Idempotent.
    pub fn attach_document(&self, session_id: &str, document_id: &str) -> Result<ChatSession> {
        let mut sessions = self.state.chat_sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::not_found(format!("chat session {session_id}")))?;
        if !session.document_ids.iter().any(|id| id == document_id) {
            session.document_ids.push(document_id.to_string());
            session.updated_at = Utc::now();
        }
        Ok(session.clone())
    }

    pub fn detach_document(&self, session_id: &str, document_id: &str) -> Result<ChatSession> {
        let mut sessions = self.state.chat_sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::not_found(format!("chat session {session_id}")))?;
        session.document_ids.retain(|id| id != document_id);
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    /// Append a message, maintaining the session's counters. The message
    /// must reference an existing session.
    pub fn append_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: impl Into<String>,
        graph_data: Option<Value>,
    ) -> Result<ChatMessage> {
        {
            let mut sessions = self.state.chat_sessions.write();
            let session = sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::not_found(format!("chat session {session_id}")))?;
            session.message_count += 1;
            session.updated_at = Utc::now();
        }
        let mut message = ChatMessage::new(ids::message_id(), session_id, role, content);
        message.graph_data = graph_data;
        self.state
            .chat_messages
            .write()
            .entry(session_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    /// Messages in creation order.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        self.get_session(session_id)?;
        let mut messages = self
            .state
            .chat_messages
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(AppState::new()))
    }

    #[test]
    fn session_lifecycle() {
        let manager = manager();
        let session = manager.create_session("Q4 review");
        assert_eq!(session.message_count, 0);

        manager.attach_document(&session.id, "doc_1").unwrap();
        manager.attach_document(&session.id, "doc_1").unwrap();
        let session = manager.get_session(&session.id).unwrap();
        assert_eq!(session.document_ids, vec!["doc_1".to_string()]);

        manager.detach_document(&session.id, "doc_1").unwrap();
        assert!(manager.get_session(&session.id).unwrap().document_ids.is_empty());

        manager.delete_session(&session.id).unwrap();
        assert!(manager.get_session(&session.id).is_err());
    }

    #[test]
    fn messages_require_a_session_and_stay_ordered() {
        let manager = manager();
        assert!(manager
            .append_message("session_ghost", ChatRole::User, "hi", None)
            .is_err());

        let session = manager.create_session("chat");
        manager
            .append_message(&session.id, ChatRole::User, "first", None)
            .unwrap();
        manager
            .append_message(&session.id, ChatRole::Assistant, "second", None)
            .unwrap();

        let messages = manager.list_messages(&session.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
        assert_eq!(messages[1].content, "second");
        assert_eq!(manager.get_session(&session.id).unwrap().message_count, 2);
    }
}
