//! [`RestBackend`] — [`ChatBackend`] over the hosted REST query contract.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use parley_core::{
  assessment::AssessmentSummary,
  backend::ChatBackend,
  conversation::{Conversation, NewConversation},
  message::{Message, NewMessage, ReadReceipt},
  profile::Profile,
  realtime::{ChangeFilter, Subscription},
};

use crate::{
  config::RestConfig,
  query::{self, ASSESSMENT_COLUMNS, PROFILE_COLUMNS},
  realtime, Error, Result,
};

const RETURN_REPRESENTATION: &str = "return=representation";
const IGNORE_DUPLICATES: &str = "resolution=ignore-duplicates,return=representation";

/// Async client for the hosted data service.
///
/// Cheap to clone — the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct RestBackend {
  client: Client,
  config: RestConfig,
}

impl RestBackend {
  pub fn new(config: RestConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &RestConfig { &self.config }

  fn url(&self, path: &str) -> String { format!("{}/rest/v1/{}", self.config.base(), path) }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    req
      .header("apikey", &self.config.api_key)
      .bearer_auth(self.config.bearer())
  }

  fn get(&self, table: &str) -> RequestBuilder { self.auth(self.client.get(self.url(table))) }

  fn post(&self, path: &str) -> RequestBuilder { self.auth(self.client.post(self.url(path))) }

  fn patch(&self, table: &str) -> RequestBuilder { self.auth(self.client.patch(self.url(table))) }

  /// Send a request and decode a successful JSON response body.
  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    let resp = req.send().await?;
    let status = resp.status();

    if !status.is_success() {
      let path = resp.url().path().to_owned();
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Status { path, status, body });
    }
    Ok(resp.json().await?)
  }

  /// Fetch at most one conversation matching `column = value`.
  async fn conversation_where(&self, column: &str, value: Uuid) -> Result<Option<Conversation>> {
    let rows: Vec<Conversation> = self
      .send(
        self
          .get("conversations")
          .query(&[("select", "*".to_owned()), (column, query::eq(value))])
          .query(&[("limit", "1")]),
      )
      .await?;
    Ok(rows.into_iter().next())
  }

  /// `PATCH` one conversation and return the updated row.
  async fn update_conversation(
    &self,
    conversation_id: Uuid,
    body: serde_json::Value,
  ) -> Result<Conversation> {
    let rows: Vec<Conversation> = self
      .send(
        self
          .patch("conversations")
          .query(&[("id", query::eq(conversation_id))])
          .header("Prefer", RETURN_REPRESENTATION)
          .json(&body),
      )
      .await?;

    rows
      .into_iter()
      .next()
      .ok_or(Error::ConversationNotFound(conversation_id))
  }
}

// ─── ChatBackend impl ────────────────────────────────────────────────────────

impl ChatBackend for RestBackend {
  type Error = Error;

  // ── Conversations ─────────────────────────────────────────────────────────

  /// `GET /conversations?or=(customer_id.eq.U,assessor_id.eq.U)&order=updated_at.desc`
  async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
    self
      .send(self.get("conversations").query(&[
        ("select", "*".to_owned()),
        ("or", query::either_participant(user_id)),
        ("order", query::descending("updated_at")),
      ]))
      .await
  }

  async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
    self.conversation_where("id", id).await
  }

  async fn open_conversation(&self, input: NewConversation) -> Result<Conversation> {
    if let Some(existing) = self.conversation_where("assessment_id", input.assessment_id).await? {
      return Ok(existing);
    }

    let created = self
      .send::<Vec<Conversation>>(
        self
          .post("conversations")
          .header("Prefer", RETURN_REPRESENTATION)
          .json(&input),
      )
      .await;

    match created {
      Ok(rows) => rows.into_iter().next().ok_or_else(|| {
        Error::UnexpectedPayload("conversation insert returned no rows".into())
      }),
      // Someone else opened it between the lookup and the insert.
      Err(Error::Status { status, .. }) if status == StatusCode::CONFLICT => self
        .conversation_where("assessment_id", input.assessment_id)
        .await?
        .ok_or(Error::Core(parley_core::Error::DuplicateConversation(
          input.assessment_id,
        ))),
      Err(err) => Err(err),
    }
  }

  async fn assign_assessor(&self, conversation_id: Uuid, assessor_id: Uuid) -> Result<Conversation> {
    self
      .update_conversation(conversation_id, json!({ "assessor_id": assessor_id }))
      .await
  }

  async fn touch_conversation(
    &self,
    conversation_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Conversation> {
    self
      .update_conversation(conversation_id, json!({ "updated_at": at }))
      .await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  /// `GET /messages?conversation_id=eq.C&order=created_at.asc`
  async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
    self
      .send(self.get("messages").query(&[
        ("select", "*".to_owned()),
        ("conversation_id", query::eq(conversation_id)),
        ("order", query::ascending("created_at")),
      ]))
      .await
  }

  async fn insert_message(&self, input: NewMessage) -> Result<Message> {
    let rows: Vec<Message> = self
      .send(
        self
          .post("messages")
          .header("Prefer", RETURN_REPRESENTATION)
          .json(&input),
      )
      .await?;

    rows
      .into_iter()
      .next()
      .ok_or_else(|| Error::UnexpectedPayload("message insert returned no rows".into()))
  }

  // ── Read tracking ─────────────────────────────────────────────────────────

  /// Upsert with `ignore-duplicates`: only newly inserted rows come back.
  async fn upsert_read_receipts(&self, receipts: Vec<ReadReceipt>) -> Result<usize> {
    if receipts.is_empty() {
      return Ok(0);
    }

    let inserted: Vec<ReadReceipt> = self
      .send(
        self
          .post("read_receipts")
          .query(&[("on_conflict", "message_id,user_id")])
          .header("Prefer", IGNORE_DUPLICATES)
          .json(&receipts),
      )
      .await?;
    Ok(inserted.len())
  }

  /// `POST /rpc/get_unread_count`
  async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
    let count: i64 = self
      .send(
        self
          .post("rpc/get_unread_count")
          .json(&json!({ "user_id": user_id })),
      )
      .await?;

    u64::try_from(count)
      .map_err(|_| Error::UnexpectedPayload(format!("negative unread count {count}")))
  }

  // ── Batched lookups ───────────────────────────────────────────────────────

  async fn get_profiles<'a>(&'a self, ids: &'a [Uuid]) -> Result<Vec<Profile>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    self
      .send(self.get("profiles").query(&[
        ("select", PROFILE_COLUMNS.to_owned()),
        ("id", query::in_list(ids)),
      ]))
      .await
  }

  async fn get_assessments<'a>(&'a self, ids: &'a [Uuid]) -> Result<Vec<AssessmentSummary>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    self
      .send(self.get("assessments").query(&[
        ("select", ASSESSMENT_COLUMNS.to_owned()),
        ("id", query::in_list(ids)),
      ]))
      .await
  }

  // ── Realtime ──────────────────────────────────────────────────────────────

  async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
    realtime::subscribe(&self.config, filter).await
  }
}
