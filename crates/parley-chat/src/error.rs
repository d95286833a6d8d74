//! Error type for `parley-chat`.

use thiserror::Error;
use uuid::Uuid;

/// Why a chat operation did not complete.
#[derive(Debug, Error)]
pub enum ChatError {
  /// The backend could not be reached or rejected the request.
  #[error("backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The conversation does not exist or does not involve the session user.
  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),

  #[error("invalid input: {0}")]
  Validation(&'static str),

  #[error("a message is already being sent")]
  SendInFlight,

  #[error("no conversation is active")]
  NoActiveConversation,
}

impl ChatError {
  pub(crate) fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Backend(Box::new(err))
  }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;
