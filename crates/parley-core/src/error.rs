//! Error types for `parley-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),

  #[error("assessment {0} already has a conversation")]
  DuplicateConversation(Uuid),

  #[error("unknown message kind: {0:?}")]
  UnknownMessageKind(String),

  #[error("unknown profile role: {0:?}")]
  UnknownRole(String),

  #[error("unknown assessment status: {0:?}")]
  UnknownAssessmentStatus(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
