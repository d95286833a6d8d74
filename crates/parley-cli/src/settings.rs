//! Client configuration: an optional TOML file layered under `PARLEY_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use parley_rest::RestConfig;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_STORE_PATH: &str = "~/.local/share/parley/parley.db";

/// Which backend the session talks to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
  /// A local SQLite file.
  Sqlite { path: PathBuf },
  /// The hosted REST + realtime service.
  Rest(RestConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  pub backend: BackendConfig,
  /// The logged-in user; `--user` takes precedence.
  #[serde(default)]
  pub user_id: Option<Uuid>,
}

impl ClientConfig {
  /// Read `path` (if it exists), then apply the environment on top, e.g.
  /// `PARLEY_BACKEND__KIND=rest`, `PARLEY_BACKEND__URL=...`, `PARLEY_USER_ID=...`.
  pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
    let mut builder = config::Config::builder()
      .set_default("backend.kind", "sqlite")?
      .set_default("backend.path", DEFAULT_STORE_PATH)?;

    if let Some(path) = path {
      builder = builder.add_source(config::File::from(path).required(false));
    }

    let settings = builder
      .add_source(
        config::Environment::with_prefix("PARLEY")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read configuration")?;

    settings
      .try_deserialize()
      .context("failed to deserialise client configuration")
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
