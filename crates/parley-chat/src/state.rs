//! Session-local chat state.

use parley_core::conversation::ConversationSummary;
use serde::Serialize;
use uuid::Uuid;

use crate::timeline::{ChatMessage, Timeline};

/// Selection state of the message pane.
///
/// `None -> Loading -> Ready` on selection, `Ready -> Ready` on pushed
/// messages, `* -> None` on deselection. A failed load ends in `Ready` with
/// whatever messages arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "conversation_id", rename_all = "snake_case")]
pub enum ActiveConversation {
  #[default]
  None,
  Loading(Uuid),
  Ready(Uuid),
}

impl ActiveConversation {
  pub fn id(&self) -> Option<Uuid> {
    match self {
      ActiveConversation::None => None,
      ActiveConversation::Loading(id) | ActiveConversation::Ready(id) => Some(*id),
    }
  }

  pub fn is(&self, conversation_id: Uuid) -> bool { self.id() == Some(conversation_id) }
}

#[derive(Debug, Default)]
pub(crate) struct ChatState {
  pub conversations: Vec<ConversationSummary>,
  pub active:        ActiveConversation,
  pub messages:      Timeline,
  pub unread:        u64,
}

impl ChatState {
  pub fn summary(&self, conversation_id: Uuid) -> Option<&ConversationSummary> {
    self
      .conversations
      .iter()
      .find(|s| s.conversation.id == conversation_id)
  }
}

/// A point-in-time copy of the session state, for views.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSnapshot {
  pub conversations: Vec<ConversationSummary>,
  pub active:        ActiveConversation,
  pub messages:      Vec<ChatMessage>,
  pub unread:        u64,
}

impl From<&ChatState> for ChatSnapshot {
  fn from(state: &ChatState) -> Self {
    Self {
      conversations: state.conversations.clone(),
      active:        state.active,
      messages:      state.messages.to_vec(),
      unread:        state.unread,
    }
  }
}
