//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use chrono::Utc;
use parley_core::{
  assessment::{AssessmentStatus, AssessmentSummary},
  backend::ChatBackend,
  conversation::{Conversation, NewConversation},
  message::{MessageKind, NewMessage, ReadReceipt},
  profile::{Profile, Role},
  realtime::{ChangeFilter, ChangeKind, Record},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn profile(s: &SqliteStore, name: &str, role: Role) -> Profile {
  s.add_profile(Profile {
    id: Uuid::new_v4(),
    display_name: name.into(),
    email: format!("{}@example.com", name.to_lowercase()),
    phone: None,
    role,
  })
  .await
  .unwrap()
}

async fn assessment(s: &SqliteStore, title: &str) -> AssessmentSummary {
  s.add_assessment(AssessmentSummary {
    id:           Uuid::new_v4(),
    title:        title.into(),
    registration: None,
    status:       AssessmentStatus::Matched,
  })
  .await
  .unwrap()
}

/// A customer, an assessor and a conversation between them.
async fn thread(s: &SqliteStore) -> (Profile, Profile, Conversation) {
  let customer = profile(s, "Alice", Role::Customer).await;
  let assessor = profile(s, "Bob", Role::Assessor).await;
  let subject = assessment(s, "2019 VW Golf").await;
  let conversation = s
    .open_conversation(NewConversation {
      customer_id:   customer.id,
      assessor_id:   Some(assessor.id),
      assessment_id: subject.id,
    })
    .await
    .unwrap();
  (customer, assessor, conversation)
}

// ─── Conversations ───────────────────────────────────────────────────────────

#[tokio::test]
async fn open_conversation_is_one_per_assessment() {
  let s = store().await;
  let customer = profile(&s, "Alice", Role::Customer).await;
  let subject = assessment(&s, "2019 VW Golf").await;
  let input = NewConversation {
    customer_id:   customer.id,
    assessor_id:   None,
    assessment_id: subject.id,
  };

  let first = s.open_conversation(input.clone()).await.unwrap();
  let second = s.open_conversation(input).await.unwrap();
  assert_eq!(first.id, second.id);
  assert_eq!(first.assessor_id, None);
  assert_eq!(s.list_conversations(customer.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_conversations_only_includes_participants() {
  let s = store().await;
  let (customer, assessor, conversation) = thread(&s).await;
  let outsider = profile(&s, "Carol", Role::Customer).await;

  assert_eq!(s.list_conversations(customer.id).await.unwrap()[0].id, conversation.id);
  assert_eq!(s.list_conversations(assessor.id).await.unwrap()[0].id, conversation.id);
  assert!(s.list_conversations(outsider.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_conversations_most_recent_first() {
  let s = store().await;
  let customer = profile(&s, "Alice", Role::Customer).await;

  let mut ids = Vec::new();
  for title in ["first", "second", "third"] {
    let subject = assessment(&s, title).await;
    let c = s
      .open_conversation(NewConversation {
        customer_id:   customer.id,
        assessor_id:   None,
        assessment_id: subject.id,
      })
      .await
      .unwrap();
    ids.push(c.id);
  }

  // Bump the oldest to the top.
  s.touch_conversation(ids[0], Utc::now() + chrono::Duration::seconds(5))
    .await
    .unwrap();

  let listed = s.list_conversations(customer.id).await.unwrap();
  assert_eq!(listed[0].id, ids[0]);
  assert!(listed.windows(2).all(|w| w[0].updated_at >= w[1].updated_at));
}

#[tokio::test]
async fn assign_assessor_fills_the_slot() {
  let s = store().await;
  let customer = profile(&s, "Alice", Role::Customer).await;
  let assessor = profile(&s, "Bob", Role::Assessor).await;
  let subject = assessment(&s, "2019 VW Golf").await;
  let c = s
    .open_conversation(NewConversation {
      customer_id:   customer.id,
      assessor_id:   None,
      assessment_id: subject.id,
    })
    .await
    .unwrap();

  let updated = s.assign_assessor(c.id, assessor.id).await.unwrap();
  assert_eq!(updated.assessor_id, Some(assessor.id));
  assert_eq!(s.list_conversations(assessor.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn touch_missing_conversation_is_not_found() {
  let s = store().await;
  let missing = Uuid::new_v4();
  let err = s.touch_conversation(missing, Utc::now()).await.unwrap_err();
  assert!(matches!(err, Error::ConversationNotFound(id) if id == missing));
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn messages_roundtrip_in_ascending_order() {
  let s = store().await;
  let (customer, assessor, c) = thread(&s).await;

  let a = s
    .insert_message(NewMessage::text(c.id, customer.id, "Hello"))
    .await
    .unwrap();
  tokio::time::sleep(Duration::from_millis(2)).await;
  let b = s
    .insert_message(NewMessage::text(c.id, assessor.id, "Hi, when suits?"))
    .await
    .unwrap();
  tokio::time::sleep(Duration::from_millis(2)).await;
  let mut photo = NewMessage::text(c.id, customer.id, "the dent");
  photo.kind = MessageKind::Image;
  photo.attachment_url = Some("assessments/dent.jpg".into());
  let p = s.insert_message(photo).await.unwrap();

  let listed = s.list_messages(c.id).await.unwrap();
  assert_eq!(listed, vec![a, b, p]);
  assert!(listed.windows(2).all(|w| w[0].created_at <= w[1].created_at));
  assert_eq!(listed[2].kind, MessageKind::Image);
}

#[tokio::test]
async fn insert_into_missing_conversation_fails() {
  let s = store().await;
  let sender = profile(&s, "Alice", Role::Customer).await;
  let err = s
    .insert_message(NewMessage::text(Uuid::new_v4(), sender.id, "lost"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ConversationNotFound(_)));
}

// ─── Read tracking ───────────────────────────────────────────────────────────

#[tokio::test]
async fn receipts_are_idempotent() {
  let s = store().await;
  let (customer, assessor, c) = thread(&s).await;
  let m = s
    .insert_message(NewMessage::text(c.id, customer.id, "Hello"))
    .await
    .unwrap();

  let receipts = vec![ReadReceipt::new(m.id, assessor.id)];
  assert_eq!(s.upsert_read_receipts(receipts.clone()).await.unwrap(), 1);
  assert_eq!(s.upsert_read_receipts(receipts).await.unwrap(), 0);
  assert_eq!(s.upsert_read_receipts(Vec::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn unread_count_excludes_own_and_read_messages() {
  let s = store().await;
  let (customer, assessor, c) = thread(&s).await;

  let m1 = s
    .insert_message(NewMessage::text(c.id, customer.id, "one"))
    .await
    .unwrap();
  s.insert_message(NewMessage::text(c.id, customer.id, "two"))
    .await
    .unwrap();
  s.insert_message(NewMessage::text(c.id, assessor.id, "reply"))
    .await
    .unwrap();

  assert_eq!(s.unread_count(assessor.id).await.unwrap(), 2);
  assert_eq!(s.unread_count(customer.id).await.unwrap(), 1);

  s.upsert_read_receipts(vec![ReadReceipt::new(m1.id, assessor.id)])
    .await
    .unwrap();
  assert_eq!(s.unread_count(assessor.id).await.unwrap(), 1);

  let outsider = profile(&s, "Carol", Role::Customer).await;
  assert_eq!(s.unread_count(outsider.id).await.unwrap(), 0);
}

// ─── Lookups ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batched_lookups_skip_unknown_ids() {
  let s = store().await;
  let (customer, assessor, c) = thread(&s).await;

  let mut profiles = s
    .get_profiles(&[customer.id, assessor.id, Uuid::new_v4()])
    .await
    .unwrap();
  profiles.sort_by_key(|p| p.display_name.clone());
  assert_eq!(profiles, vec![customer, assessor]);

  let assessments = s
    .get_assessments(&[c.assessment_id, Uuid::new_v4()])
    .await
    .unwrap();
  assert_eq!(assessments.len(), 1);
  assert_eq!(assessments[0].title, "2019 VW Golf");

  assert!(s.get_profiles(&[]).await.unwrap().is_empty());
}

// ─── Realtime ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn subscription_sees_inserts_for_its_conversation() {
  let s = store().await;
  let (customer, _, c) = thread(&s).await;
  let mut sub = s.subscribe(ChangeFilter::messages_in(c.id)).await.unwrap();

  let sent = s
    .insert_message(NewMessage::text(c.id, customer.id, "ping"))
    .await
    .unwrap();

  let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
    .await
    .expect("event within timeout")
    .expect("open subscription");
  assert_eq!(event.kind, ChangeKind::Insert);
  assert_eq!(event.record, Record::Message(sent));
}

#[tokio::test]
async fn subscription_sees_conversation_updates() {
  let s = store().await;
  let (_, _, c) = thread(&s).await;
  let mut sub = s
    .subscribe(ChangeFilter::conversation_updates())
    .await
    .unwrap();

  let touched = s
    .touch_conversation(c.id, Utc::now() + chrono::Duration::seconds(1))
    .await
    .unwrap();

  let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
    .await
    .expect("event within timeout")
    .expect("open subscription");
  assert_eq!(event.record, Record::Conversation(touched));
}
