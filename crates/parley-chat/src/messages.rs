//! Message store: selecting a conversation, loading its history and sending
//! into it.

use std::{
  collections::{BTreeSet, HashMap},
  sync::atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Duration, Utc};
use parley_core::{
  backend::ChatBackend,
  message::{MessageKind, NewMessage},
  profile::Profile,
};
use uuid::Uuid;

use crate::{ActiveConversation, ChatError, ChatMessage, ChatSession, Result};

/// A message about to be sent from the compose box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
  pub body:           String,
  pub kind:           MessageKind,
  pub attachment_url: Option<String>,
}

impl Outgoing {
  pub fn text(body: impl Into<String>) -> Self {
    Self { body: body.into(), kind: MessageKind::Text, attachment_url: None }
  }
}

/// Holds the compose box's in-flight flag; clears it on drop.
struct SendGuard<'a>(&'a AtomicBool);

impl<'a> SendGuard<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self(flag))
  }
}

impl Drop for SendGuard<'_> {
  fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

/// The next `updated_at` for a conversation: now, but never earlier than the
/// new message and always strictly after the previous value.
fn next_updated_at(previous: DateTime<Utc>, message_at: DateTime<Utc>) -> DateTime<Utc> {
  Utc::now()
    .max(message_at)
    .max(previous + Duration::milliseconds(1))
}

impl<B> ChatSession<B>
where
  B: ChatBackend + 'static,
{
  /// Make `conversation_id` the active conversation: subscribe to its new
  /// messages, load its history and mark it read.
  ///
  /// Returns the loaded messages. Pushed messages that arrive during the load
  /// are merged, not overwritten.
  pub async fn select_conversation(&self, conversation_id: Uuid) -> Result<Vec<ChatMessage>> {
    self.ensure_visible(conversation_id).await?;

    {
      let mut state = self.shared.state.write().await;
      if !state.active.is(conversation_id) {
        state.messages.clear();
      }
      state.active = ActiveConversation::Loading(conversation_id);
    }

    // Subscribe before fetching so nothing falls between the two.
    let loaded = match self.listen_for_messages(conversation_id).await {
      Ok(()) => self.fetch_messages(conversation_id).await,
      Err(err) => Err(err),
    };

    let snapshot = {
      let mut state = self.shared.state.write().await;
      if !state.active.is(conversation_id) {
        tracing::debug!(%conversation_id, "discarding load for a conversation no longer active");
        return loaded;
      }
      state.active = ActiveConversation::Ready(conversation_id);

      match loaded {
        Ok(entries) => {
          state.messages.extend(entries);
          state.messages.to_vec()
        }
        Err(err) => {
          tracing::warn!(%conversation_id, error = %err, "failed to load messages");
          return Err(err);
        }
      }
    };

    tracing::debug!(%conversation_id, count = snapshot.len(), "conversation ready");
    self.mark_conversation_read(conversation_id).await?;
    Ok(snapshot)
  }

  /// Clear the active conversation and release its message subscription.
  pub async fn deselect(&self) {
    let mut state = self.shared.state.write().await;
    state.active = ActiveConversation::None;
    state.messages.clear();
    self.listener().stop_messages();
  }

  /// Fetch a conversation's history with senders attached, without making
  /// it active.
  pub async fn load_messages(&self, conversation_id: Uuid) -> Result<Vec<ChatMessage>> {
    self.ensure_visible(conversation_id).await?;
    self.fetch_messages(conversation_id).await.inspect_err(|err| {
      tracing::warn!(%conversation_id, error = %err, "failed to load messages");
    })
  }

  /// Messages of the active conversation, ascending by creation time.
  pub async fn messages(&self) -> Vec<ChatMessage> {
    self.shared.state.read().await.messages.to_vec()
  }

  /// Send a text message to the active conversation.
  pub async fn send_message(&self, text: &str) -> Result<ChatMessage> {
    self.send(Outgoing::text(text)).await
  }

  /// Send to the active conversation.
  ///
  /// Rejects blank text, a missing active conversation and a send while
  /// another is in flight, all without side effects. On success the message
  /// is in local state and the conversation's `updated_at` has advanced.
  pub async fn send(&self, outgoing: Outgoing) -> Result<ChatMessage> {
    let body = outgoing.body.trim();
    if body.is_empty() {
      return Err(ChatError::Validation("message text is empty"));
    }

    let conversation_id = self
      .active()
      .await
      .id()
      .ok_or(ChatError::NoActiveConversation)?;

    let _guard = SendGuard::acquire(&self.shared.sending).ok_or(ChatError::SendInFlight)?;

    let previous = self.last_updated(conversation_id).await?;
    let backend = &self.shared.backend;

    let message = backend
      .insert_message(NewMessage {
        conversation_id,
        sender_id: self.shared.user_id,
        body: body.to_owned(),
        kind: outgoing.kind,
        attachment_url: outgoing.attachment_url,
      })
      .await
      .map_err(|err| {
        tracing::warn!(%conversation_id, error = %err, "failed to send message");
        ChatError::backend(err)
      })?;

    let entry = ChatMessage {
      sender: self.cached_profile(conversation_id, self.shared.user_id).await,
      message,
    };

    {
      let mut state = self.shared.state.write().await;
      if state.active.is(conversation_id) {
        state.messages.upsert(entry.clone());
      }
    }

    let updated = backend
      .touch_conversation(
        conversation_id,
        next_updated_at(previous, entry.message.created_at),
      )
      .await
      .map_err(|err| {
        tracing::warn!(%conversation_id, error = %err, "failed to advance conversation timestamp");
        ChatError::backend(err)
      })?;
    self.apply_conversation(updated).await;

    tracing::debug!(%conversation_id, message_id = %entry.message.id, "message sent");
    Ok(entry)
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  /// Fail with `ConversationNotFound` unless the session user takes part in
  /// the conversation.
  pub(crate) async fn ensure_visible(&self, conversation_id: Uuid) -> Result<()> {
    if self.shared.state.read().await.summary(conversation_id).is_some() {
      return Ok(());
    }

    let conversation = self
      .shared
      .backend
      .get_conversation(conversation_id)
      .await
      .map_err(ChatError::backend)?;

    match conversation {
      Some(c) if c.involves(self.shared.user_id) => Ok(()),
      _ => Err(ChatError::ConversationNotFound(conversation_id)),
    }
  }

  async fn last_updated(&self, conversation_id: Uuid) -> Result<DateTime<Utc>> {
    if let Some(summary) = self.shared.state.read().await.summary(conversation_id) {
      return Ok(summary.conversation.updated_at);
    }

    self
      .shared
      .backend
      .get_conversation(conversation_id)
      .await
      .map_err(ChatError::backend)?
      .map(|c| c.updated_at)
      .ok_or(ChatError::ConversationNotFound(conversation_id))
  }

  /// A participant profile from the directory, without a backend call.
  pub(crate) async fn cached_profile(
    &self,
    conversation_id: Uuid,
    profile_id: Uuid,
  ) -> Option<Profile> {
    self
      .shared
      .state
      .read()
      .await
      .summary(conversation_id)
      .and_then(|s| s.participant(profile_id))
      .cloned()
  }

  /// Fetch a conversation's history with one batched sender lookup.
  async fn fetch_messages(&self, conversation_id: Uuid) -> Result<Vec<ChatMessage>> {
    let backend = &self.shared.backend;

    let messages = backend
      .list_messages(conversation_id)
      .await
      .map_err(ChatError::backend)?;

    let sender_ids: Vec<Uuid> = messages
      .iter()
      .map(|m| m.sender_id)
      .collect::<BTreeSet<_>>()
      .into_iter()
      .collect();

    let senders: HashMap<_, _> = backend
      .get_profiles(&sender_ids)
      .await
      .map_err(ChatError::backend)?
      .into_iter()
      .map(|p| (p.id, p))
      .collect();

    Ok(
      messages
        .into_iter()
        .map(|message| ChatMessage {
          sender: senders.get(&message.sender_id).cloned(),
          message,
        })
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn send_guard_is_exclusive_until_dropped() {
    let flag = AtomicBool::new(false);
    let first = SendGuard::acquire(&flag);
    assert!(first.is_some());
    assert!(SendGuard::acquire(&flag).is_none());
    drop(first);
    assert!(SendGuard::acquire(&flag).is_some());
  }

  #[test]
  fn next_updated_at_is_strictly_later() {
    let future = Utc::now() + Duration::hours(1);
    assert!(next_updated_at(future, future) > future);

    let past = Utc::now() - Duration::hours(1);
    let message_at = Utc::now() + Duration::seconds(30);
    assert!(next_updated_at(past, message_at) >= message_at);
  }
}
