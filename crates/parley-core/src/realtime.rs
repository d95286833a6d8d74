//! Push-subscription types shared by backends and the chat service.
//!
//! A [`ChangeFilter`] names a table, an event kind and an optional row
//! filter. Backends turn it into a [`Subscription`], a stream of
//! [`ChangeEvent`]s that ends when the source closes. Dropping the
//! subscription releases it.
//!
//! Delivery is best-effort: nothing is acknowledged or replayed.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tokio::{
  sync::{broadcast, mpsc},
  task::JoinHandle,
};
use uuid::Uuid;

use crate::{conversation::Conversation, message::Message};

// ─── Filters ─────────────────────────────────────────────────────────────────

/// The record collections that emit change notifications.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
  Conversations,
  Messages,
}

/// Row-level change kinds.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChangeKind {
  Insert,
  Update,
}

/// Restricts a subscription to a subset of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
  ConversationId(Uuid),
}

impl RowFilter {
  /// PostgREST-style filter expression, e.g. `conversation_id=eq.<uuid>`.
  pub fn to_postgrest(&self) -> String {
    match self {
      RowFilter::ConversationId(id) => format!("conversation_id=eq.{id}"),
    }
  }

  fn matches(&self, record: &Record) -> bool {
    match (self, record) {
      (RowFilter::ConversationId(id), Record::Message(m)) => m.conversation_id == *id,
      (RowFilter::ConversationId(id), Record::Conversation(c)) => c.id == *id,
    }
  }
}

/// What a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
  pub table: Table,
  pub kind:  ChangeKind,
  pub row:   Option<RowFilter>,
}

impl ChangeFilter {
  /// New messages in one conversation.
  pub fn messages_in(conversation_id: Uuid) -> Self {
    Self {
      table: Table::Messages,
      kind:  ChangeKind::Insert,
      row:   Some(RowFilter::ConversationId(conversation_id)),
    }
  }

  /// Updates to any conversation.
  pub fn conversation_updates() -> Self {
    Self { table: Table::Conversations, kind: ChangeKind::Update, row: None }
  }

  pub fn matches(&self, event: &ChangeEvent) -> bool {
    event.kind == self.kind
      && event.record.table() == self.table
      && self.row.is_none_or(|row| row.matches(&event.record))
  }
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// The new state of a changed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
  Conversation(Conversation),
  Message(Message),
}

impl Record {
  pub fn table(&self) -> Table {
    match self {
      Record::Conversation(_) => Table::Conversations,
      Record::Message(_) => Table::Messages,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
  pub kind:   ChangeKind,
  pub record: Record,
}

impl ChangeEvent {
  pub fn inserted(record: Record) -> Self {
    Self { kind: ChangeKind::Insert, record }
  }

  pub fn updated(record: Record) -> Self {
    Self { kind: ChangeKind::Update, record }
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// A live push subscription.
///
/// Events arrive through an unbounded channel fed by a backend-owned pump
/// task. Dropping the subscription aborts that task, which is how the
/// backend learns to release the channel.
pub struct Subscription {
  filter: ChangeFilter,
  rx:     mpsc::UnboundedReceiver<ChangeEvent>,
  pump:   JoinHandle<()>,
}

impl Subscription {
  pub fn new(
    filter: ChangeFilter,
    rx: mpsc::UnboundedReceiver<ChangeEvent>,
    pump: JoinHandle<()>,
  ) -> Self {
    Self { filter, rx, pump }
  }

  pub fn filter(&self) -> &ChangeFilter { &self.filter }

  /// Wait for the next event. Returns `None` once the source has closed.
  pub async fn recv(&mut self) -> Option<ChangeEvent> { self.rx.recv().await }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.pump.abort(); }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("filter", &self.filter)
      .finish_non_exhaustive()
  }
}

// ─── In-process feed ─────────────────────────────────────────────────────────

/// An in-process change feed for backends that observe their own writes.
///
/// Cloning is cheap; all clones publish to the same set of subscribers.
#[derive(Clone)]
pub struct ChangeFeed {
  tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  /// Publish an event to every current subscriber. Events published while
  /// nobody listens are dropped.
  pub fn publish(&self, event: ChangeEvent) { let _ = self.tx.send(event); }

  /// Open a subscription that forwards matching events.
  ///
  /// Must be called from within a tokio runtime.
  pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
    let mut source = self.tx.subscribe();
    let (tx, rx) = mpsc::unbounded_channel();

    let pump = tokio::spawn(async move {
      loop {
        match source.recv().await {
          Ok(event) => {
            if filter.matches(&event) && tx.send(event).is_err() {
              break;
            }
          }
          // A lagging subscriber skips what it missed.
          Err(broadcast::error::RecvError::Lagged(_)) => continue,
          Err(broadcast::error::RecvError::Closed) => break,
        }
      }
    });

    Subscription::new(filter, rx, pump)
  }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

impl Default for ChangeFeed {
  fn default() -> Self { Self::new(256) }
}
