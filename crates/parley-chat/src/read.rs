//! Read tracking.

use parley_core::{backend::ChatBackend, message::ReadReceipt};
use uuid::Uuid;

use crate::{ChatError, ChatSession, Result};

impl<B> ChatSession<B>
where
  B: ChatBackend + 'static,
{
  /// Record a read receipt from the session user for every message in the
  /// conversation sent by someone else, then refresh the unread count.
  ///
  /// Fails with `ConversationNotFound` unless the user takes part in it.
  ///
  /// Receipts that already exist are left alone, so repeating the call is
  /// harmless. Returns how many receipts were newly recorded.
  pub async fn mark_conversation_read(&self, conversation_id: Uuid) -> Result<usize> {
    self.ensure_visible(conversation_id).await?;
    let reader_id = self.shared.user_id;

    let receipts: Vec<ReadReceipt> = self
      .shared
      .backend
      .list_messages(conversation_id)
      .await
      .map_err(ChatError::backend)?
      .iter()
      .filter(|m| m.sender_id != reader_id)
      .map(|m| ReadReceipt::new(m.id, reader_id))
      .collect();

    let recorded = if receipts.is_empty() {
      0
    } else {
      self
        .shared
        .backend
        .upsert_read_receipts(receipts)
        .await
        .map_err(|err| {
          tracing::warn!(%conversation_id, error = %err, "failed to record read receipts");
          ChatError::backend(err)
        })?
    };

    tracing::debug!(%conversation_id, recorded, "marked conversation read");
    self.refresh_unread().await?;
    Ok(recorded)
  }

  /// Re-read the unread count from the backend aggregate.
  pub async fn refresh_unread(&self) -> Result<u64> {
    let count = self
      .shared
      .backend
      .unread_count(self.shared.user_id)
      .await
      .map_err(|err| {
        tracing::warn!(error = %err, "failed to load unread count");
        ChatError::backend(err)
      })?;

    self.shared.state.write().await.unread = count;
    Ok(count)
  }

  /// The unread count as last loaded.
  pub async fn unread_count(&self) -> u64 { self.shared.state.read().await.unread }
}
