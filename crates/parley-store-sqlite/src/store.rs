//! [`SqliteStore`] — the SQLite implementation of [`ChatBackend`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use parley_core::{
  assessment::AssessmentSummary,
  backend::ChatBackend,
  conversation::{Conversation, NewConversation},
  message::{Message, NewMessage, ReadReceipt},
  profile::Profile,
  realtime::{ChangeEvent, ChangeFeed, ChangeFilter, Record, Subscription},
};

use crate::{
  encode::{
    CONVERSATION_COLUMNS, MESSAGE_COLUMNS, RawAssessment, RawConversation, RawMessage,
    RawProfile, encode_dt, encode_uuid, now, placeholders,
  },
  schema::{SCHEMA, UNREAD_COUNT},
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parley backend stored in a single SQLite file.
///
/// Cloning is cheap — the inner connection and change feed are
/// reference-counted, and all clones share them.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  feed: ChangeFeed,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, feed: ChangeFeed::default() };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, feed: ChangeFeed::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// The feed this store publishes its own writes on.
  pub fn feed(&self) -> &ChangeFeed { &self.feed }

  // ── Records owned by other services ──────────────────────────────────────
  //
  // Profiles and assessments are written by the auth and assessment
  // services in production; these exist to seed local stores and tests.

  /// Insert or replace a profile.
  pub async fn add_profile(&self, profile: Profile) -> Result<Profile> {
    let id_str = encode_uuid(profile.id);
    let name   = profile.display_name.clone();
    let email  = profile.email.clone();
    let phone  = profile.phone.clone();
    let role   = profile.role.as_ref().to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO profiles (id, full_name, email, phone, role)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, email, phone, role],
        )?;
        Ok(())
      })
      .await?;

    Ok(profile)
  }

  /// Insert or replace an assessment summary.
  pub async fn add_assessment(
    &self,
    assessment: AssessmentSummary,
  ) -> Result<AssessmentSummary> {
    let id_str       = encode_uuid(assessment.id);
    let title        = assessment.title.clone();
    let registration = assessment.registration.clone();
    let status       = assessment.status.as_ref().to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO assessments (id, title, registration, status)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, title, registration, status],
        )?;
        Ok(())
      })
      .await?;

    Ok(assessment)
  }

  /// Fetch one conversation by an arbitrary unique column.
  async fn conversation_where(
    &self,
    column: &'static str,
    value: Uuid,
  ) -> Result<Option<Conversation>> {
    let value_str = encode_uuid(value);

    let raw: Option<RawConversation> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE {column} = ?1"),
            rusqlite::params![value_str],
            RawConversation::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawConversation::into_conversation).transpose()
  }

  /// Run a single-row `UPDATE` on a conversation, then read back and publish
  /// the updated record.
  async fn update_conversation(
    &self,
    conversation_id: Uuid,
    sql: &'static str,
    value: String,
  ) -> Result<Conversation> {
    let id_str = encode_uuid(conversation_id);

    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![id_str, value])?))
      .await?;

    if changed == 0 {
      return Err(Error::ConversationNotFound(conversation_id));
    }

    let conversation = self
      .conversation_where("id", conversation_id)
      .await?
      .ok_or(Error::ConversationNotFound(conversation_id))?;

    self
      .feed
      .publish(ChangeEvent::updated(Record::Conversation(conversation.clone())));
    Ok(conversation)
  }
}

// ─── ChatBackend impl ────────────────────────────────────────────────────────

impl ChatBackend for SqliteStore {
  type Error = Error;

  // ── Conversations ─────────────────────────────────────────────────────────

  async fn list_conversations(&self, user_id: Uuid) -> Result<Vec<Conversation>> {
    let user_str = encode_uuid(user_id);

    let raws: Vec<RawConversation> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {CONVERSATION_COLUMNS} FROM conversations
           WHERE customer_id = ?1 OR assessor_id = ?1
           ORDER BY updated_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![user_str], RawConversation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawConversation::into_conversation).collect()
  }

  async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
    self.conversation_where("id", id).await
  }

  async fn open_conversation(&self, input: NewConversation) -> Result<Conversation> {
    if let Some(existing) = self.conversation_where("assessment_id", input.assessment_id).await? {
      return Ok(existing);
    }

    let created = now();
    let conversation = Conversation {
      id:            Uuid::new_v4(),
      customer_id:   input.customer_id,
      assessor_id:   input.assessor_id,
      assessment_id: input.assessment_id,
      created_at:    created,
      updated_at:    created,
    };

    let id_str         = encode_uuid(conversation.id);
    let customer_str   = encode_uuid(conversation.customer_id);
    let assessor_str   = conversation.assessor_id.map(encode_uuid);
    let assessment_str = encode_uuid(conversation.assessment_id);
    let at_str         = encode_dt(created);

    // A concurrent opener may have won the race; the UNIQUE constraint on
    // assessment_id makes this insert a no-op in that case.
    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO conversations
             (id, customer_id, assessor_id, assessment_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)
           ON CONFLICT (assessment_id) DO NOTHING",
          rusqlite::params![id_str, customer_str, assessor_str, assessment_str, at_str],
        )?)
      })
      .await?;

    if inserted == 0 {
      return self
        .conversation_where("assessment_id", input.assessment_id)
        .await?
        .ok_or(Error::Core(parley_core::Error::DuplicateConversation(
          input.assessment_id,
        )));
    }

    tracing::debug!(
      conversation_id = %conversation.id,
      assessment_id = %conversation.assessment_id,
      "opened conversation"
    );
    self
      .feed
      .publish(ChangeEvent::inserted(Record::Conversation(conversation.clone())));
    Ok(conversation)
  }

  async fn assign_assessor(
    &self,
    conversation_id: Uuid,
    assessor_id: Uuid,
  ) -> Result<Conversation> {
    self
      .update_conversation(
        conversation_id,
        "UPDATE conversations SET assessor_id = ?2 WHERE id = ?1",
        encode_uuid(assessor_id),
      )
      .await
  }

  async fn touch_conversation(
    &self,
    conversation_id: Uuid,
    at: DateTime<Utc>,
  ) -> Result<Conversation> {
    self
      .update_conversation(
        conversation_id,
        "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
        encode_dt(at.trunc_subsecs(6)),
      )
      .await
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
    let id_str = encode_uuid(conversation_id);

    let raws: Vec<RawMessage> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {MESSAGE_COLUMNS} FROM messages
           WHERE conversation_id = ?1
           ORDER BY created_at ASC, id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawMessage::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn insert_message(&self, input: NewMessage) -> Result<Message> {
    if self.conversation_where("id", input.conversation_id).await?.is_none() {
      return Err(Error::ConversationNotFound(input.conversation_id));
    }

    let message = Message {
      id:              Uuid::new_v4(),
      conversation_id: input.conversation_id,
      sender_id:       input.sender_id,
      body:            input.body,
      kind:            input.kind,
      attachment_url:  input.attachment_url,
      created_at:      now(),
    };

    let id_str           = encode_uuid(message.id);
    let conversation_str = encode_uuid(message.conversation_id);
    let sender_str       = encode_uuid(message.sender_id);
    let content          = message.body.clone();
    let kind_str         = message.kind.as_ref().to_owned();
    let attachment       = message.attachment_url.clone();
    let at_str           = encode_dt(message.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (
             id, conversation_id, sender_id, content,
             message_type, attachment_url, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id_str,
            conversation_str,
            sender_str,
            content,
            kind_str,
            attachment,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    self
      .feed
      .publish(ChangeEvent::inserted(Record::Message(message.clone())));
    Ok(message)
  }

  // ── Read tracking ─────────────────────────────────────────────────────────

  async fn upsert_read_receipts(&self, receipts: Vec<ReadReceipt>) -> Result<usize> {
    if receipts.is_empty() {
      return Ok(0);
    }

    let rows: Vec<(String, String, String)> = receipts
      .iter()
      .map(|r| {
        (encode_uuid(r.message_id), encode_uuid(r.reader_id), encode_dt(r.read_at))
      })
      .collect();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO read_receipts (message_id, user_id, read_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (message_id, user_id) DO NOTHING",
          )?;
          for (message_id, user_id, read_at) in &rows {
            inserted += stmt.execute(rusqlite::params![message_id, user_id, read_at])?;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }

  async fn unread_count(&self, user_id: Uuid) -> Result<u64> {
    let user_str = encode_uuid(user_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(UNREAD_COUNT, rusqlite::params![user_str], |r| r.get(0))?)
      })
      .await?;

    Ok(count.max(0) as u64)
  }

  // ── Batched lookups ───────────────────────────────────────────────────────

  async fn get_profiles<'a>(&'a self, ids: &'a [Uuid]) -> Result<Vec<Profile>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawProfile> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT id, full_name, email, phone, role FROM profiles WHERE id IN ({})",
          placeholders(id_strs.len())
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), RawProfile::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProfile::into_profile).collect()
  }

  async fn get_assessments<'a>(&'a self, ids: &'a [Uuid]) -> Result<Vec<AssessmentSummary>> {
    if ids.is_empty() {
      return Ok(Vec::new());
    }
    let id_strs: Vec<String> = ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawAssessment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT id, title, registration, status FROM assessments WHERE id IN ({})",
          placeholders(id_strs.len())
        ))?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(id_strs.iter()), RawAssessment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAssessment::into_assessment).collect()
  }

  // ── Realtime ──────────────────────────────────────────────────────────────

  async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
    Ok(self.feed.subscribe(filter))
  }
}
