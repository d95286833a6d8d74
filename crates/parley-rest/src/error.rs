//! Error types for `parley-rest`.

use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Core(#[from] parley_core::Error),

  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{path} returned {status}: {body}")]
  Status {
    path:   String,
    status: StatusCode,
    body:   String,
  },

  #[error("websocket error: {0}")]
  WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

  #[error("invalid service url: {0}")]
  Url(#[from] url::ParseError),

  #[error("unsupported url scheme: {0:?}")]
  UnsupportedScheme(String),

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unexpected payload: {0}")]
  UnexpectedPayload(String),

  #[error("conversation not found: {0}")]
  ConversationNotFound(Uuid),
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
  fn from(err: tokio_tungstenite::tungstenite::Error) -> Self { Self::WebSocket(Box::new(err)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
