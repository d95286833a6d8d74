//! Conversations — one thread per assessment, between its customer and the
//! assessor matched to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{assessment::AssessmentSummary, profile::Profile};

/// A conversation record as stored by the backend.
///
/// Exactly one conversation exists per `assessment_id`; the backend enforces
/// it. `assessor_id` stays empty until an assessor is matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
  pub id:            Uuid,
  pub customer_id:   Uuid,
  #[serde(default)]
  pub assessor_id:   Option<Uuid>,
  pub assessment_id: Uuid,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl Conversation {
  /// Whether `user_id` is the customer or the assessor of this conversation.
  pub fn involves(&self, user_id: Uuid) -> bool {
    self.customer_id == user_id || self.assessor_id == Some(user_id)
  }

  /// The other participant, from `user_id`'s point of view.
  pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
    if self.customer_id == user_id {
      self.assessor_id
    } else {
      Some(self.customer_id)
    }
  }

  /// Customer id followed by the assessor id, if assigned.
  pub fn participant_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
    std::iter::once(self.customer_id).chain(self.assessor_id)
  }
}

/// Input for opening the conversation of an assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
  pub customer_id:   Uuid,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assessor_id:   Option<Uuid>,
  pub assessment_id: Uuid,
}

// ─── Directory entry ─────────────────────────────────────────────────────────

/// A conversation joined with the records it references.
///
/// Any of the related records may be missing if the backend did not return
/// it; views fall back to ids in that case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
  pub conversation: Conversation,
  pub assessment:   Option<AssessmentSummary>,
  pub customer:     Option<Profile>,
  pub assessor:     Option<Profile>,
}

impl ConversationSummary {
  /// Display title: the assessment title, or a short id when unknown.
  pub fn title(&self) -> String {
    match &self.assessment {
      Some(a) => a.title.clone(),
      None => {
        let id = self.conversation.assessment_id.simple().to_string();
        format!("Assessment {}", &id[..8])
      }
    }
  }

  /// The profile of whichever participant `user_id` is not.
  pub fn counterpart(&self, user_id: Uuid) -> Option<&Profile> {
    if self.conversation.customer_id == user_id {
      self.assessor.as_ref()
    } else {
      self.customer.as_ref()
    }
  }

  /// Look up a participant profile by id.
  pub fn participant(&self, id: Uuid) -> Option<&Profile> {
    [self.customer.as_ref(), self.assessor.as_ref()]
      .into_iter()
      .flatten()
      .find(|p| p.id == id)
  }

  /// Case-insensitive substring search over the title, the vehicle
  /// registration and both participants' names and emails. An empty query
  /// matches everything.
  pub fn matches(&self, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
      return true;
    }

    if self.title().to_lowercase().contains(&needle) {
      return true;
    }
    if let Some(reg) = self.assessment.as_ref().and_then(|a| a.registration.as_ref())
      && reg.to_lowercase().contains(&needle)
    {
      return true;
    }
    [self.customer.as_ref(), self.assessor.as_ref()]
      .into_iter()
      .flatten()
      .any(|p| p.matches(&needle))
  }
}
