//! Conversation State
//!
//! The request-scoped unit threaded through the orchestration rounds.
//!
//! Merge semantics are part of the contract:
//!
//! | field | update | semantics |
//! |---|---|---|
//! | `messages` | [`ConversationState::append`] | concatenate, never replace |
//! | `pending_tool_calls` | [`ConversationState::replace_pending_tool_calls`] | last write wins |
//! | `final_answer` | [`ConversationState::set_final_answer`] | replaced by non-empty text, otherwise kept |

use std::collections::HashSet;

use crate::message::{Message, Role, new_message_id};
use crate::tool::ToolCall;

/// Append-only conversation log plus the current round's tool calls
#[derive(Clone, Debug)]
pub struct ConversationState {
    messages: Vec<Message>,
    pending_tool_calls: Vec<ToolCall>,
    final_answer: Option<String>,
    ids: HashSet<String>,
}

impl ConversationState {
    /// Seed a fresh state from caller-supplied history and the new user turn.
    ///
    /// History entries before the first user message are skipped so the
    /// conversation always opens with a user turn.
    pub fn seed(history: Vec<Message>, user_message: impl Into<String>) -> Self {
        let mut state = Self {
            messages: Vec::with_capacity(history.len() + 1),
            pending_tool_calls: Vec::new(),
            final_answer: None,
            ids: HashSet::new(),
        };

        let skipped = history
            .iter()
            .take_while(|m| m.role != Role::User)
            .count();
        if skipped > 0 {
            tracing::warn!(skipped, "Dropping history entries preceding the first user message");
        }

        state.append(history.into_iter().skip(skipped));
        state.append([Message::user(user_message)]);
        state
    }

    /// Append messages in order.
    ///
    /// Incoming messages are normalized before they enter the log: a
    /// duplicate id is replaced with a fresh one and a timestamp earlier than
    /// the last entry is raised to it. Nothing already in the log changes.
    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        for mut message in messages {
            if !self.ids.insert(message.id.clone()) {
                let fresh = new_message_id();
                tracing::debug!(duplicate = %message.id, fresh = %fresh, "Reassigning duplicate message id");
                message.id = fresh;
                self.ids.insert(message.id.clone());
            }

            if let Some(last) = self.messages.last() {
                if message.timestamp < last.timestamp {
                    message.timestamp = last.timestamp;
                }
            }

            self.messages.push(message);
        }
    }

    /// Replace the pending calls wholesale
    pub fn replace_pending_tool_calls(&mut self, calls: Vec<ToolCall>) {
        self.pending_tool_calls = calls;
    }

    /// Take the pending calls, leaving the set empty
    pub fn take_pending_tool_calls(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.pending_tool_calls)
    }

    /// Record a final answer. Blank text leaves the previous answer in place.
    pub fn set_final_answer(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text.trim().is_empty() {
            return false;
        }
        self.final_answer = Some(text);
        true
    }

    /// Read-only view for the model client
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        &self.pending_tool_calls
    }

    pub fn final_answer(&self) -> Option<&str> {
        self.final_answer.as_deref()
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Consume the state, keeping the transcript
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}
