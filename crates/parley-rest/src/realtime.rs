//! Realtime channel client: Phoenix-protocol frames over a websocket.
//!
//! Each [`Subscription`] owns one socket joined to one channel. The pump
//! task sends a heartbeat every 25 seconds, decodes `postgres_changes`
//! frames into [`ChangeEvent`]s and ends when the socket closes or the
//! subscription is dropped.

use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

use parley_core::{
  conversation::Conversation,
  message::Message,
  realtime::{ChangeEvent, ChangeFilter, ChangeKind, Record, Subscription, Table},
};

use crate::{config::RestConfig, Error, Result};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);

const PROTOCOL_VERSION: &str = "1.0.0";

// ─── Frames ──────────────────────────────────────────────────────────────────

/// One Phoenix channel message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
  pub topic:     String,
  pub event:     String,
  pub payload:   Value,
  #[serde(rename = "ref", default)]
  pub reference: Option<String>,
}

impl Frame {
  fn new(topic: impl Into<String>, event: &str, payload: Value, reference: u64) -> Self {
    Self {
      topic: topic.into(),
      event: event.to_owned(),
      payload,
      reference: Some(reference.to_string()),
    }
  }

  fn to_ws(&self) -> Result<WsMessage> { Ok(WsMessage::Text(serde_json::to_string(self)?)) }
}

/// The channel topic for a filter, e.g. `realtime:messages:<conversation>`.
pub fn topic(filter: &ChangeFilter) -> String {
  match filter.row {
    Some(row) => format!("realtime:{}:{}", filter.table, row.to_postgrest()),
    None => format!("realtime:{}", filter.table),
  }
}

pub fn join_frame(topic: &str, filter: &ChangeFilter, access_token: &str, reference: u64) -> Frame {
  let mut change = json!({
    "event":  filter.kind.to_string(),
    "schema": "public",
    "table":  filter.table.to_string(),
  });
  if let Some(row) = filter.row {
    change["filter"] = Value::String(row.to_postgrest());
  }

  Frame::new(
    topic,
    "phx_join",
    json!({
      "config": {
        "broadcast": { "self": false },
        "presence": { "key": "" },
        "postgres_changes": [change],
      },
      "access_token": access_token,
    }),
    reference,
  )
}

pub fn heartbeat_frame(reference: u64) -> Frame {
  Frame::new("phoenix", "heartbeat", json!({}), reference)
}

pub fn leave_frame(topic: &str, reference: u64) -> Frame {
  Frame::new(topic, "phx_leave", json!({}), reference)
}

/// The websocket endpoint for the project at `base`.
pub fn socket_url(base: &str, api_key: &str) -> Result<Url> {
  let mut url = Url::parse(base)?;
  let scheme = match url.scheme() {
    "https" | "wss" => "wss",
    "http" | "ws" => "ws",
    other => return Err(Error::UnsupportedScheme(other.to_owned())),
  };
  url
    .set_scheme(scheme)
    .map_err(|()| Error::UnsupportedScheme(scheme.to_owned()))?;

  let path = format!("{}/realtime/v1/websocket", url.path().trim_end_matches('/'));
  url.set_path(&path);
  url
    .query_pairs_mut()
    .clear()
    .append_pair("apikey", api_key)
    .append_pair("vsn", PROTOCOL_VERSION);
  Ok(url)
}

// ─── Decoding ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChangePayload {
  data: ChangeData,
}

#[derive(Deserialize)]
struct ChangeData {
  #[serde(rename = "type")]
  kind:   ChangeKind,
  table:  Table,
  record: Value,
}

/// Decode a `postgres_changes` frame into a change event that `filter`
/// accepts.
///
/// Other frames (replies, presence, system messages) and changes the filter
/// rejects yield `Ok(None)`.
pub fn decode_change(frame: &Frame, filter: &ChangeFilter) -> Result<Option<ChangeEvent>> {
  if frame.event != "postgres_changes" {
    return Ok(None);
  }

  let ChangePayload { data } = serde_json::from_value(frame.payload.clone())?;
  let record = match data.table {
    Table::Conversations => Record::Conversation(serde_json::from_value::<Conversation>(data.record)?),
    Table::Messages => Record::Message(serde_json::from_value::<Message>(data.record)?),
  };

  let event = ChangeEvent { kind: data.kind, record };
  Ok(filter.matches(&event).then_some(event))
}

/// Whether a `phx_reply` reports a failed join.
fn join_error(frame: &Frame) -> Option<&Value> {
  (frame.event == "phx_reply" && frame.payload.get("status") == Some(&json!("error")))
    .then(|| frame.payload.get("response").unwrap_or(&Value::Null))
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// Connect, join the channel for `filter` and start pumping events.
pub async fn subscribe(config: &RestConfig, filter: ChangeFilter) -> Result<Subscription> {
  let url = socket_url(config.base(), &config.api_key)?;
  let (socket, _) = connect_async(url.as_str()).await?;
  let (mut sink, mut stream) = socket.split();

  let topic = topic(&filter);
  sink
    .send(join_frame(&topic, &filter, config.bearer(), 1).to_ws()?)
    .await?;
  tracing::debug!(%topic, "joined realtime channel");

  let (tx, rx) = mpsc::unbounded_channel();
  let pump = tokio::spawn(async move {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut reference = 2u64;

    loop {
      tokio::select! {
        _ = heartbeat.tick() => {
          let frame = heartbeat_frame(reference);
          reference += 1;
          let sent = match frame.to_ws() {
            Ok(msg) => sink.send(msg).await.map_err(Error::from),
            Err(err) => Err(err),
          };
          if let Err(err) = sent {
            tracing::warn!(%topic, error = %err, "realtime heartbeat failed");
            break;
          }
        }
        incoming = stream.next() => match incoming {
          Some(Ok(WsMessage::Text(text))) => {
            let frame: Frame = match serde_json::from_str(&text) {
              Ok(frame) => frame,
              Err(err) => {
                tracing::warn!(%topic, error = %err, "undecodable realtime frame");
                continue;
              }
            };
            if let Some(reason) = join_error(&frame) {
              tracing::warn!(%topic, %reason, "realtime join rejected");
              break;
            }
            match decode_change(&frame, &filter) {
              Ok(Some(event)) => {
                if tx.send(event).is_err() {
                  if let Ok(msg) = leave_frame(&topic, reference).to_ws() {
                    let _ = sink.send(msg).await;
                  }
                  break;
                }
              }
              Ok(None) => {}
              Err(err) => tracing::warn!(%topic, error = %err, "undecodable change payload"),
            }
          }
          Some(Ok(WsMessage::Close(_))) | None => break,
          Some(Ok(_)) => {}
          Some(Err(err)) => {
            tracing::warn!(%topic, error = %err, "realtime socket error");
            break;
          }
        },
      }
    }

    tracing::debug!(%topic, "realtime channel closed");
  });

  Ok(Subscription::new(filter, rx, pump))
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use uuid::Uuid;

  use super::*;

  fn message_json(conversation_id: Uuid) -> Value {
    json!({
      "id": Uuid::new_v4(),
      "conversation_id": conversation_id,
      "sender_id": Uuid::new_v4(),
      "content": "Hello",
      "message_type": "text",
      "attachment_url": null,
      "created_at": "2026-03-01T12:00:00.123456+00:00",
    })
  }

  fn change_frame(kind: &str, table: &str, record: Value) -> Frame {
    Frame {
      topic:     "realtime:messages".into(),
      event:     "postgres_changes".into(),
      payload:   json!({
        "ids": [1],
        "data": {
          "schema": "public",
          "table": table,
          "type": kind,
          "commit_timestamp": Utc::now(),
          "record": record,
          "columns": [],
          "errors": null,
        },
      }),
      reference: None,
    }
  }

  #[test]
  fn socket_url_switches_scheme_and_adds_params() {
    let url = socket_url("https://project.example.co/", "anon").unwrap();
    assert_eq!(
      url.as_str(),
      "wss://project.example.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
    );

    let local = socket_url("http://localhost:54321", "k").unwrap();
    assert_eq!(local.scheme(), "ws");
    assert_eq!(local.port(), Some(54321));

    assert!(matches!(
      socket_url("ftp://example.com", "k"),
      Err(Error::UnsupportedScheme(s)) if s == "ftp"
    ));
  }

  #[test]
  fn join_frame_carries_filter_and_token() {
    let conversation_id = Uuid::new_v4();
    let filter = ChangeFilter::messages_in(conversation_id);
    let topic = topic(&filter);
    let frame = join_frame(&topic, &filter, "token", 1);

    assert_eq!(frame.event, "phx_join");
    assert_eq!(frame.reference.as_deref(), Some("1"));
    assert_eq!(frame.payload["access_token"], "token");

    let change = &frame.payload["config"]["postgres_changes"][0];
    assert_eq!(change["event"], "INSERT");
    assert_eq!(change["schema"], "public");
    assert_eq!(change["table"], "messages");
    assert_eq!(
      change["filter"],
      format!("conversation_id=eq.{conversation_id}")
    );
  }

  #[test]
  fn unfiltered_join_has_no_row_filter() {
    let filter = ChangeFilter::conversation_updates();
    let frame = join_frame(&topic(&filter), &filter, "t", 1);
    let change = &frame.payload["config"]["postgres_changes"][0];

    assert_eq!(frame.topic, "realtime:conversations");
    assert_eq!(change["event"], "UPDATE");
    assert!(change.get("filter").is_none());
  }

  #[test]
  fn heartbeat_serializes_on_phoenix_topic() {
    let text = serde_json::to_string(&heartbeat_frame(7)).unwrap();
    let value: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
      value,
      json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": "7" })
    );
  }

  #[test]
  fn decodes_message_insert() {
    let conversation_id = Uuid::new_v4();
    let filter = ChangeFilter::messages_in(conversation_id);
    let frame = change_frame("INSERT", "messages", message_json(conversation_id));

    let event = decode_change(&frame, &filter).unwrap().expect("accepted");
    assert_eq!(event.kind, ChangeKind::Insert);
    match event.record {
      Record::Message(m) => {
        assert_eq!(m.conversation_id, conversation_id);
        assert_eq!(m.body, "Hello");
      }
      other => panic!("unexpected record {other:?}"),
    }
  }

  #[test]
  fn drops_changes_the_filter_rejects() {
    let filter = ChangeFilter::messages_in(Uuid::new_v4());
    let frame = change_frame("INSERT", "messages", message_json(Uuid::new_v4()));
    assert!(decode_change(&frame, &filter).unwrap().is_none());
  }

  #[test]
  fn ignores_non_change_frames() {
    let filter = ChangeFilter::conversation_updates();
    let reply = Frame {
      topic:     "realtime:conversations".into(),
      event:     "phx_reply".into(),
      payload:   json!({ "status": "ok", "response": {} }),
      reference: Some("1".into()),
    };
    assert!(decode_change(&reply, &filter).unwrap().is_none());
    assert!(join_error(&reply).is_none());
  }

  #[test]
  fn detects_rejected_join() {
    let reply = Frame {
      topic:     "realtime:conversations".into(),
      event:     "phx_reply".into(),
      payload:   json!({ "status": "error", "response": { "reason": "unauthorized" } }),
      reference: Some("1".into()),
    };
    assert_eq!(join_error(&reply), Some(&json!({ "reason": "unauthorized" })));
  }

  #[test]
  fn malformed_record_is_an_error() {
    let filter = ChangeFilter::conversation_updates();
    let frame = change_frame("UPDATE", "conversations", json!({ "id": "nope" }));
    assert!(matches!(decode_change(&frame, &filter), Err(Error::Json(_))));
  }
}
