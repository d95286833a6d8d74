//! The `ChatBackend` trait — everything the chat service asks of the hosted
//! data service.
//!
//! Implemented by `parley-store-sqlite` (local reference backend) and
//! `parley-rest` (hosted REST + realtime service). The chat service depends
//! on this abstraction only.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  assessment::AssessmentSummary,
  conversation::{Conversation, NewConversation},
  message::{Message, NewMessage, ReadReceipt},
  profile::Profile,
  realtime::{ChangeFilter, Subscription},
};

/// Abstraction over the structured-data and push-notification service.
///
/// Every call is a single request/response against the service; batching
/// and joining happen in the caller. The service is the sole arbiter of
/// concurrent writes.
///
/// All methods return `Send` futures so session tasks can be spawned on a
/// multi-threaded runtime.
pub trait ChatBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Conversations ─────────────────────────────────────────────────────

  /// Conversations where `user_id` is the customer or the assessor,
  /// most-recently-updated first.
  fn list_conversations(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + '_;

  /// Retrieve a conversation by id. Returns `None` if not found.
  fn get_conversation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Conversation>, Self::Error>> + Send + '_;

  /// Return the conversation for `input.assessment_id`, creating it if it
  /// does not exist yet. At most one conversation exists per assessment.
  fn open_conversation(
    &self,
    input: NewConversation,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  /// Fill the assessor slot of a conversation.
  fn assign_assessor(
    &self,
    conversation_id: Uuid,
    assessor_id: Uuid,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  /// Set `updated_at` of a conversation and return the updated record.
  fn touch_conversation(
    &self,
    conversation_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// All messages of a conversation, ascending by `created_at`.
  fn list_messages(
    &self,
    conversation_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Persist a message. The id and `created_at` are assigned by the backend.
  fn insert_message(
    &self,
    input: NewMessage,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  // ── Read tracking ─────────────────────────────────────────────────────

  /// Record read receipts, ignoring pairs that already exist. Returns how
  /// many receipts were newly recorded.
  fn upsert_read_receipts(
    &self,
    receipts: Vec<ReadReceipt>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// The service-side aggregate: messages in conversations involving
  /// `user_id`, sent by someone else, without a receipt from `user_id`.
  fn unread_count(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Batched lookups ───────────────────────────────────────────────────

  /// Fetch the profiles with the given ids in one call. Unknown ids are
  /// omitted from the result.
  fn get_profiles<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Profile>, Self::Error>> + Send + 'a;

  /// Fetch the assessment summaries with the given ids in one call.
  fn get_assessments<'a>(
    &'a self,
    ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<AssessmentSummary>, Self::Error>> + Send + 'a;

  // ── Realtime ──────────────────────────────────────────────────────────

  /// Open a push subscription for `filter`.
  fn subscribe(
    &self,
    filter: ChangeFilter,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;
}
