//! Conversation directory: the user's conversations joined with their
//! assessment and participant records.

use std::collections::{BTreeSet, HashMap};

use parley_core::{
  backend::ChatBackend,
  conversation::{Conversation, ConversationSummary},
};
use uuid::Uuid;

use crate::{ChatError, ChatSession, Result};

/// Load and join the directory for `user_id`.
///
/// Related records are fetched in one batched call per collection, keyed by
/// the distinct referenced ids. Records the backend does not return are left
/// as `None`; any failed call fails the whole listing.
pub(crate) async fn load<B: ChatBackend>(
  backend: &B,
  user_id: Uuid,
) -> Result<Vec<ConversationSummary>> {
  let conversations = backend
    .list_conversations(user_id)
    .await
    .map_err(ChatError::backend)?;

  let profile_ids = distinct(conversations.iter().flat_map(Conversation::participant_ids));
  let assessment_ids = distinct(conversations.iter().map(|c| c.assessment_id));

  let profiles: HashMap<_, _> = backend
    .get_profiles(&profile_ids)
    .await
    .map_err(ChatError::backend)?
    .into_iter()
    .map(|p| (p.id, p))
    .collect();

  let assessments: HashMap<_, _> = backend
    .get_assessments(&assessment_ids)
    .await
    .map_err(ChatError::backend)?
    .into_iter()
    .map(|a| (a.id, a))
    .collect();

  let mut summaries: Vec<ConversationSummary> = conversations
    .into_iter()
    .map(|conversation| ConversationSummary {
      assessment: assessments.get(&conversation.assessment_id).cloned(),
      customer:   profiles.get(&conversation.customer_id).cloned(),
      assessor:   conversation
        .assessor_id
        .and_then(|id| profiles.get(&id).cloned()),
      conversation,
    })
    .collect();

  sort_recent_first(&mut summaries);
  Ok(summaries)
}

/// Most-recently-updated first; stable for equal timestamps.
pub(crate) fn sort_recent_first(summaries: &mut [ConversationSummary]) {
  summaries.sort_by(|a, b| b.conversation.updated_at.cmp(&a.conversation.updated_at));
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
  ids.collect::<BTreeSet<_>>().into_iter().collect()
}

impl<B> ChatSession<B>
where
  B: ChatBackend + 'static,
{
  /// Reload the directory from the backend.
  ///
  /// On failure the local directory is emptied and the error returned.
  pub async fn refresh_conversations(&self) -> Result<Vec<ConversationSummary>> {
    let shared = &self.shared;

    match load(&*shared.backend, shared.user_id).await {
      Ok(summaries) => {
        tracing::debug!(count = summaries.len(), "loaded conversation directory");
        shared.state.write().await.conversations = summaries.clone();
        Ok(summaries)
      }
      Err(err) => {
        tracing::warn!(error = %err, "failed to load conversation directory");
        shared.state.write().await.conversations.clear();
        Err(err)
      }
    }
  }

  /// The directory as last loaded, most-recently-updated first.
  pub async fn conversations(&self) -> Vec<ConversationSummary> {
    self.shared.state.read().await.conversations.clone()
  }

  /// Directory entries matching `query` (see [`ConversationSummary::matches`]).
  pub async fn search(&self, query: &str) -> Vec<ConversationSummary> {
    self
      .shared
      .state
      .read()
      .await
      .conversations
      .iter()
      .filter(|s| s.matches(query))
      .cloned()
      .collect()
  }

  pub async fn conversation(&self, conversation_id: Uuid) -> Option<ConversationSummary> {
    self.shared.state.read().await.summary(conversation_id).cloned()
  }

  /// Replace a directory entry's conversation record with a newer one and
  /// restore the ordering. Unknown conversations are ignored; the next
  /// reload picks them up.
  pub(crate) async fn apply_conversation(&self, conversation: Conversation) {
    let mut state = self.shared.state.write().await;
    if let Some(entry) = state
      .conversations
      .iter_mut()
      .find(|s| s.conversation.id == conversation.id)
    {
      entry.conversation = conversation;
      sort_recent_first(&mut state.conversations);
    }
  }
}
