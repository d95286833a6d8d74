//! Participant profiles.
//!
//! Profiles belong to the hosted auth/profile service. This crate only reads
//! them, by id, to put a name and contact details next to conversations and
//! messages.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// The marketplace role a profile acts in.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  Customer,
  Assessor,
  Admin,
}

impl Role {
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownRole(s.to_owned()))
  }
}

/// A denormalised participant record (the `profiles` collection).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:           Uuid,
  #[serde(rename = "full_name")]
  pub display_name: String,
  pub email:        String,
  #[serde(default)]
  pub phone:        Option<String>,
  pub role:         Role,
}

impl Profile {
  /// Case-insensitive substring match over name and email.
  ///
  /// `needle` must already be lowercased.
  pub fn matches(&self, needle: &str) -> bool {
    self.display_name.to_lowercase().contains(needle)
      || self.email.to_lowercase().contains(needle)
  }
}
