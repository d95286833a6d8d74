//! Realtime listener: keeps session state current from push subscriptions.
//!
//! Two channels at most: conversation updates (any conversation, for the
//! whole session) and new messages in the active conversation, which is
//! re-established whenever the active conversation changes.

use std::sync::Arc;

use parley_core::{
  backend::ChatBackend,
  message::Message,
  realtime::{ChangeEvent, ChangeFilter, Record, Subscription},
};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{ChatError, ChatMessage, ChatSession, Result};

/// Pump tasks of the live subscriptions. Aborting a pump drops its
/// subscription, which releases the channel.
#[derive(Default)]
pub(crate) struct Listener {
  conversations: Option<JoinHandle<()>>,
  messages:      Option<(Uuid, JoinHandle<()>)>,
}

impl Listener {
  pub fn message_channel(&self) -> Option<Uuid> { self.messages.as_ref().map(|(id, _)| *id) }

  pub fn stop_messages(&mut self) {
    if let Some((_, pump)) = self.messages.take() {
      pump.abort();
    }
  }

  pub fn stop_all(&mut self) {
    if let Some(pump) = self.conversations.take() {
      pump.abort();
    }
    self.stop_messages();
  }
}

impl Drop for Listener {
  fn drop(&mut self) { self.stop_all(); }
}

impl<B> ChatSession<B>
where
  B: ChatBackend + 'static,
{
  pub(crate) async fn listen_for_conversation_updates(&self) -> Result<()> {
    let subscription = self
      .shared
      .backend
      .subscribe(ChangeFilter::conversation_updates())
      .await
      .map_err(ChatError::backend)?;

    let pump = self.spawn_pump(subscription);
    if let Some(old) = self.listener().conversations.replace(pump) {
      old.abort();
    }
    Ok(())
  }

  /// Point the message channel at `conversation_id`, releasing the channel
  /// of the previously active conversation.
  pub(crate) async fn listen_for_messages(&self, conversation_id: Uuid) -> Result<()> {
    {
      let mut listener = self.listener();
      if listener.message_channel() == Some(conversation_id) {
        return Ok(());
      }
      listener.stop_messages();
    }

    let subscription = self
      .shared
      .backend
      .subscribe(ChangeFilter::messages_in(conversation_id))
      .await
      .map_err(|err| {
        tracing::warn!(%conversation_id, error = %err, "failed to subscribe to messages");
        ChatError::backend(err)
      })?;

    // A later selection may have taken over while subscribing. Check and
    // install under the state lock so the two cannot interleave.
    let state = self.shared.state.read().await;
    if !state.active.is(conversation_id) {
      tracing::debug!(%conversation_id, "dropping message channel for a conversation no longer active");
      return Ok(());
    }

    let pump = self.spawn_pump(subscription);
    let mut listener = self.listener();
    listener.stop_messages();
    listener.messages = Some((conversation_id, pump));
    drop(listener);
    drop(state);

    tracing::debug!(%conversation_id, "message channel open");
    Ok(())
  }

  /// Drive a subscription until it closes or the session goes away.
  ///
  /// The pump holds only a weak reference so that dropping the last session
  /// handle tears everything down.
  fn spawn_pump(&self, mut subscription: Subscription) -> JoinHandle<()> {
    let shared = Arc::downgrade(&self.shared);

    tokio::spawn(async move {
      while let Some(event) = subscription.recv().await {
        let Some(shared) = shared.upgrade() else {
          break;
        };
        ChatSession { shared }.apply_change(event).await;
      }
      tracing::debug!(filter = ?subscription.filter(), "subscription closed");
    })
  }

  /// Reconcile local state with one pushed change.
  ///
  /// Failures are logged; there is no caller to return them to.
  pub async fn apply_change(&self, event: ChangeEvent) {
    match event.record {
      Record::Message(message) => self.apply_pushed_message(message).await,
      Record::Conversation(conversation) => {
        tracing::debug!(conversation_id = %conversation.id, kind = %event.kind, "conversation changed");
        // Failure is already logged and leaves an empty directory.
        let _ = self.refresh_conversations().await;
      }
    }
    self.shared.changes.send_modify(|generation| *generation += 1);
  }

  async fn apply_pushed_message(&self, message: Message) {
    let conversation_id = message.conversation_id;
    if !self.active().await.is(conversation_id) {
      return;
    }

    let sender = match self.cached_profile(conversation_id, message.sender_id).await {
      Some(profile) => Some(profile),
      None => match self.shared.backend.get_profiles(&[message.sender_id]).await {
        Ok(profiles) => profiles.into_iter().next(),
        Err(err) => {
          tracing::warn!(sender_id = %message.sender_id, error = %err, "failed to load sender");
          None
        }
      },
    };

    let inserted = {
      let mut state = self.shared.state.write().await;
      state.active.is(conversation_id) && state.messages.upsert(ChatMessage { message, sender })
    };

    if inserted {
      // Failure is already logged; the count stays at its last value.
      let _ = self.refresh_unread().await;
    }
  }
}
