//! Messages and read receipts.
//!
//! Messages are immutable once created and ordered by `created_at` within a
//! conversation. Read receipts are keyed by `(message_id, reader_id)`; writing
//! the same pair twice is a no-op, never an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// What a message carries. Only `Text` is produced by the chat service today;
/// the other kinds are carried through storage untouched.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
  #[default]
  Text,
  Image,
  File,
}

impl MessageKind {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownMessageKind(s.to_owned()))
  }
}

/// A persisted message (the `messages` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub id:              Uuid,
  pub conversation_id: Uuid,
  pub sender_id:       Uuid,
  #[serde(rename = "content")]
  pub body:            String,
  #[serde(rename = "message_type", default)]
  pub kind:            MessageKind,
  #[serde(default)]
  pub attachment_url:  Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input for [`ChatBackend::insert_message`](crate::backend::ChatBackend::insert_message).
/// The id and `created_at` are assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
  pub conversation_id: Uuid,
  pub sender_id:       Uuid,
  #[serde(rename = "content")]
  pub body:            String,
  #[serde(rename = "message_type")]
  pub kind:            MessageKind,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub attachment_url:  Option<String>,
}

impl NewMessage {
  /// A plain text message with no attachment.
  pub fn text(
    conversation_id: Uuid,
    sender_id: Uuid,
    body: impl Into<String>,
  ) -> Self {
    Self {
      conversation_id,
      sender_id,
      body: body.into(),
      kind: MessageKind::Text,
      attachment_url: None,
    }
  }
}

/// Marks that `reader_id` has seen `message_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
  pub message_id: Uuid,
  #[serde(rename = "user_id")]
  pub reader_id:  Uuid,
  pub read_at:    DateTime<Utc>,
}

impl ReadReceipt {
  pub fn new(message_id: Uuid, reader_id: Uuid) -> Self {
    Self { message_id, reader_id, read_at: Utc::now() }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kind_parses_lowercase_names() {
    assert_eq!(MessageKind::parse("text").unwrap(), MessageKind::Text);
    assert_eq!(MessageKind::parse("image").unwrap(), MessageKind::Image);
    assert_eq!(MessageKind::File.as_ref(), "file");
  }

  #[test]
  fn unknown_kind_is_an_error() {
    let err = MessageKind::parse("video").unwrap_err();
    assert!(matches!(err, Error::UnknownMessageKind(k) if k == "video"));
  }

  #[test]
  fn message_uses_hosted_column_names() {
    let msg = NewMessage::text(Uuid::new_v4(), Uuid::new_v4(), "Hello");
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["content"], "Hello");
    assert_eq!(json["message_type"], "text");
    assert!(json.get("attachment_url").is_none());
  }

  #[test]
  fn message_kind_defaults_to_text_when_absent() {
    let json = serde_json::json!({
      "id": Uuid::new_v4(),
      "conversation_id": Uuid::new_v4(),
      "sender_id": Uuid::new_v4(),
      "content": "hi",
      "created_at": "2024-05-01T10:00:00Z",
    });
    let msg: Message = serde_json::from_value(json).unwrap();
    assert_eq!(msg.kind, MessageKind::Text);
    assert_eq!(msg.attachment_url, None);
  }
}
