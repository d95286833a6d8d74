//! Assessment summaries — the subject a conversation is about.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Where an assessment request is in its lifecycle.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssessmentStatus {
  #[default]
  Pending,
  Matched,
  InProgress,
  Completed,
  Cancelled,
}

impl AssessmentStatus {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse()
      .map_err(|_| Error::UnknownAssessmentStatus(s.to_owned()))
  }
}

/// The slice of an assessment record the chat views need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
  pub id:           Uuid,
  pub title:        String,
  /// Vehicle registration plate, when the customer supplied one.
  #[serde(default)]
  pub registration: Option<String>,
  #[serde(default)]
  pub status:       AssessmentStatus,
}
