//! Runtime configuration: defaults, then the TOML file, then `ROLLCALL_*`
//! environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:                    String,
  pub port:                    u16,
  pub store_path:              PathBuf,
  /// Minimum cosine similarity accepted as an identification.
  pub similarity_threshold:    f32,
  /// Endpoint that turns an image into an embedding.
  pub recognizer_url:          String,
  pub recognizer_timeout_secs: u64,
}

/// Every key except `recognizer_url`, which has no sensible default.
fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
  Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "rollcall.db")?
    .set_default("similarity_threshold", 0.50)?
    .set_default("recognizer_timeout_secs", 10)
}

impl ServerConfig {
  /// Read the file at `path` (if present) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = defaults()?
      .add_source(File::from(path).required(false))
      .add_source(Environment::with_prefix("ROLLCALL"))
      .build()
      .context("failed to read config file")?;
    Self::from_settings(settings)
  }

  fn from_settings(settings: Config) -> anyhow::Result<Self> {
    let cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    anyhow::ensure!(
      (0.0..=1.0).contains(&cfg.similarity_threshold),
      "similarity_threshold must lie in [0, 1], got {}",
      cfg.similarity_threshold
    );
    anyhow::ensure!(
      cfg.recognizer_timeout_secs > 0,
      "recognizer_timeout_secs must be positive"
    );
    Ok(cfg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use config::FileFormat;

  fn parse(toml: &str) -> anyhow::Result<ServerConfig> {
    let settings = defaults()?
      .add_source(File::from_str(toml, FileFormat::Toml))
      .build()?;
    ServerConfig::from_settings(settings)
  }

  #[test]
  fn defaults_fill_everything_but_the_recognizer() {
    let cfg = parse(r#"recognizer_url = "http://127.0.0.1:9000/embed""#).unwrap();
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.store_path, PathBuf::from("rollcall.db"));
    assert_eq!(cfg.similarity_threshold, 0.5);
    assert_eq!(cfg.recognizer_timeout_secs, 10);
  }

  #[test]
  fn recognizer_url_is_required() {
    assert!(parse("port = 9090").is_err());
  }

  #[test]
  fn threshold_out_of_range_is_rejected() {
    let err = parse(
      r#"
        recognizer_url = "http://127.0.0.1:9000/embed"
        similarity_threshold = 1.5
      "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("similarity_threshold"));
  }
}
