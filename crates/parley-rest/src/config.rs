//! Connection settings for the hosted service.

use serde::Deserialize;

fn default_timeout_secs() -> u64 { 30 }

/// Where the hosted service lives and how to authenticate against it.
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
  /// Project base URL, e.g. `https://abc.example.co`.
  pub url:          String,
  /// The public (anon) API key, sent as `apikey` on every request.
  pub api_key:      String,
  /// The logged-in user's access token. Falls back to the API key.
  #[serde(default)]
  pub access_token: Option<String>,
  /// Per-request timeout for REST calls.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl RestConfig {
  pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      url:          url.into(),
      api_key:      api_key.into(),
      access_token: None,
      timeout_secs: default_timeout_secs(),
    }
  }

  pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
    self.access_token = Some(token.into());
    self
  }

  /// The bearer token for `Authorization` and channel joins.
  pub fn bearer(&self) -> &str { self.access_token.as_deref().unwrap_or(&self.api_key) }

  pub(crate) fn base(&self) -> &str { self.url.trim_end_matches('/') }
}
