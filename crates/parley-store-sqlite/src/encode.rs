//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision so that text ordering matches time ordering. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored by their wire names.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use parley_core::{
  assessment::{AssessmentStatus, AssessmentSummary},
  conversation::Conversation,
  message::{Message, MessageKind},
  profile::{Profile, Role},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at storage precision. Records built from it compare
/// equal to what is read back.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CONVERSATION_COLUMNS: &str =
  "id, customer_id, assessor_id, assessment_id, created_at, updated_at";

/// Raw strings read directly from a `conversations` row.
pub struct RawConversation {
  pub id:            String,
  pub customer_id:   String,
  pub assessor_id:   Option<String>,
  pub assessment_id: String,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawConversation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      customer_id:   row.get(1)?,
      assessor_id:   row.get(2)?,
      assessment_id: row.get(3)?,
      created_at:    row.get(4)?,
      updated_at:    row.get(5)?,
    })
  }

  pub fn into_conversation(self) -> Result<Conversation> {
    Ok(Conversation {
      id:            decode_uuid(&self.id)?,
      customer_id:   decode_uuid(&self.customer_id)?,
      assessor_id:   self.assessor_id.as_deref().map(decode_uuid).transpose()?,
      assessment_id: decode_uuid(&self.assessment_id)?,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

pub const MESSAGE_COLUMNS: &str =
  "id, conversation_id, sender_id, content, message_type, attachment_url, created_at";

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub id:              String,
  pub conversation_id: String,
  pub sender_id:       String,
  pub content:         String,
  pub message_type:    String,
  pub attachment_url:  Option<String>,
  pub created_at:      String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      conversation_id: row.get(1)?,
      sender_id:       row.get(2)?,
      content:         row.get(3)?,
      message_type:    row.get(4)?,
      attachment_url:  row.get(5)?,
      created_at:      row.get(6)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      id:              decode_uuid(&self.id)?,
      conversation_id: decode_uuid(&self.conversation_id)?,
      sender_id:       decode_uuid(&self.sender_id)?,
      body:            self.content,
      kind:            MessageKind::parse(&self.message_type)?,
      attachment_url:  self.attachment_url,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `profiles` row.
pub struct RawProfile {
  pub id:        String,
  pub full_name: String,
  pub email:     String,
  pub phone:     Option<String>,
  pub role:      String,
}

impl RawProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:        row.get(0)?,
      full_name: row.get(1)?,
      email:     row.get(2)?,
      phone:     row.get(3)?,
      role:      row.get(4)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      id:           decode_uuid(&self.id)?,
      display_name: self.full_name,
      email:        self.email,
      phone:        self.phone,
      role:         Role::parse(&self.role)?,
    })
  }
}

/// Raw strings read directly from an `assessments` row.
pub struct RawAssessment {
  pub id:           String,
  pub title:        String,
  pub registration: Option<String>,
  pub status:       String,
}

impl RawAssessment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:           row.get(0)?,
      title:        row.get(1)?,
      registration: row.get(2)?,
      status:       row.get(3)?,
    })
  }

  pub fn into_assessment(self) -> Result<AssessmentSummary> {
    Ok(AssessmentSummary {
      id:           decode_uuid(&self.id)?,
      title:        self.title,
      registration: self.registration,
      status:       AssessmentStatus::parse(&self.status)?,
    })
  }
}

/// `?1, ?2, …, ?n` for an `IN (…)` list.
pub fn placeholders(n: usize) -> String {
  (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}
