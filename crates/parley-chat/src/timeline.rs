//! The in-memory message list of the active conversation.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parley_core::{message::Message, profile::Profile};
use serde::Serialize;
use uuid::Uuid;

/// A message joined with its sender's profile, when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
  pub message: Message,
  pub sender:  Option<Profile>,
}

impl ChatMessage {
  pub fn is_from(&self, user_id: Uuid) -> bool { self.message.sender_id == user_id }

  /// Sender display name, falling back to the sender id.
  pub fn sender_name(&self) -> String {
    match &self.sender {
      Some(p) => p.display_name.clone(),
      None => self.message.sender_id.to_string(),
    }
  }
}

/// Messages keyed by id, iterated in `(created_at, id)` order.
///
/// Each persisted message appears at most once no matter how often, or in
/// which order, it arrives from loads and pushes.
#[derive(Debug, Clone, Default)]
pub struct Timeline {
  entries: BTreeMap<(DateTime<Utc>, Uuid), ChatMessage>,
  index:   HashMap<Uuid, DateTime<Utc>>,
}

impl Timeline {
  /// Insert a message unless its id is already present. Returns whether it
  /// was new. A known message only gains a sender profile it was missing.
  pub fn upsert(&mut self, entry: ChatMessage) -> bool {
    let id = entry.message.id;

    if let Some(at) = self.index.get(&id) {
      if let Some(existing) = self.entries.get_mut(&(*at, id))
        && existing.sender.is_none()
      {
        existing.sender = entry.sender;
      }
      return false;
    }

    let at = entry.message.created_at;
    self.index.insert(id, at);
    self.entries.insert((at, id), entry);
    true
  }

  /// Upsert every entry; returns how many were new.
  pub fn extend(&mut self, entries: impl IntoIterator<Item = ChatMessage>) -> usize {
    entries
      .into_iter()
      .map(|e| self.upsert(e))
      .filter(|&new| new)
      .count()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.index.clear();
  }

  pub fn contains(&self, id: Uuid) -> bool { self.index.contains_key(&id) }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> { self.entries.values() }

  pub fn last(&self) -> Option<&ChatMessage> { self.entries.values().next_back() }

  pub fn to_vec(&self) -> Vec<ChatMessage> { self.iter().cloned().collect() }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use parley_core::message::MessageKind;

  use super::*;

  fn entry(at: DateTime<Utc>) -> ChatMessage {
    ChatMessage {
      message: Message {
        id: Uuid::new_v4(),
        conversation_id: Uuid::nil(),
        sender_id: Uuid::nil(),
        body: "x".into(),
        kind: MessageKind::Text,
        attachment_url: None,
        created_at: at,
      },
      sender:  None,
    }
  }

  #[test]
  fn orders_by_creation_time_regardless_of_arrival() {
    let t0 = Utc::now();
    let late = entry(t0 + Duration::seconds(2));
    let early = entry(t0);
    let middle = entry(t0 + Duration::seconds(1));

    let mut timeline = Timeline::default();
    timeline.upsert(late.clone());
    timeline.upsert(early.clone());
    timeline.upsert(middle.clone());

    assert_eq!(timeline.to_vec(), vec![early, middle, late.clone()]);
    assert_eq!(timeline.last(), Some(&late));
  }

  #[test]
  fn duplicate_ids_are_ignored() {
    let e = entry(Utc::now());
    let mut timeline = Timeline::default();
    assert!(timeline.upsert(e.clone()));
    assert!(!timeline.upsert(e.clone()));
    assert_eq!(timeline.extend([e.clone(), e]), 0);
    assert_eq!(timeline.len(), 1);
  }

  #[test]
  fn duplicate_fills_missing_sender() {
    let bare = entry(Utc::now());
    let mut enriched = bare.clone();
    enriched.sender = Some(Profile {
      id:           Uuid::nil(),
      display_name: "Priya".into(),
      email:        "priya@example.com".into(),
      phone:        None,
      role:         parley_core::profile::Role::Assessor,
    });

    let mut timeline = Timeline::default();
    timeline.upsert(bare);
    timeline.upsert(enriched.clone());
    assert_eq!(timeline.to_vec(), vec![enriched]);
    assert_eq!(timeline.iter().next().unwrap().sender_name(), "Priya");
  }

  #[test]
  fn clear_forgets_ids() {
    let e = entry(Utc::now());
    let mut timeline = Timeline::default();
    timeline.upsert(e.clone());
    timeline.clear();
    assert!(timeline.is_empty());
    assert!(!timeline.contains(e.message.id));
    assert!(timeline.upsert(e));
  }
}
