//! Scraper configuration: an optional TOML file layered with `ECC__*`
//! environment variables (`ECC__SLACK__TOKEN`, `ECC__BLOB_DIR`, ...).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::slack::SlackConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
  #[serde(default = "default_warehouse_path")]
  pub warehouse_path:    PathBuf,
  /// Root of the raw-payload bucket.
  #[serde(default = "default_blob_dir")]
  pub blob_dir:          PathBuf,
  #[serde(default = "default_http_timeout_secs")]
  pub http_timeout_secs: u64,
  #[serde(default)]
  pub slack:             Option<SlackConfig>,
}

fn default_warehouse_path() -> PathBuf { PathBuf::from("~/.local/share/ecc/warehouse.db") }
fn default_blob_dir() -> PathBuf { PathBuf::from("~/.local/share/ecc/blobs") }
fn default_http_timeout_secs() -> u64 { 120 }

impl ScraperConfig {
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("ECC").separator("__"))
      .build()?
      .try_deserialize()
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

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ScraperConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.http_timeout_secs, 120);
    assert!(cfg.blob_dir.ends_with("blobs"));
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
      file,
      "blob_dir = \"/srv/blobs\"\nhttp_timeout_secs = 30\n\n[slack]\ntoken = \"xoxb-1\"\nchannel = \"#ev\""
    )
    .unwrap();

    let cfg = ScraperConfig::load(file.path()).unwrap();
    assert_eq!(cfg.blob_dir, PathBuf::from("/srv/blobs"));
    assert_eq!(cfg.http_timeout_secs, 30);
    assert_eq!(cfg.slack.unwrap().channel, "#ev");
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
