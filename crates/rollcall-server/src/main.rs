//! Rollcall server binary.
//!
//! Reads `rollcall.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, connects the face recognizer client, and serves
//! the JSON API under `/api`.
//!
//! Every key can be overridden from the environment, e.g.
//! `ROLLCALL_RECOGNIZER_URL=http://127.0.0.1:9000/embed`.

mod recognizer;
mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use axum::Router;
use clap::Parser;
use rollcall_api::AppState;
use rollcall_core::matcher::Threshold;
use rollcall_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::{recognizer::RemoteRecognizer, settings::ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Rollcall face-verified attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "rollcall.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let recognizer = RemoteRecognizer::new(
    server_cfg.recognizer_url.clone(),
    Duration::from_secs(server_cfg.recognizer_timeout_secs),
  )?;

  let state = AppState {
    store:      Arc::new(store),
    recognizer: Arc::new(recognizer),
    threshold:  Threshold(server_cfg.similarity_threshold),
  };

  let app = Router::new()
    .nest("/api", rollcall_api::api_router(state))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    recognizer = %server_cfg.recognizer_url,
    threshold = server_cfg.similarity_threshold,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
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
  use super::*;

  #[test]
  fn tilde_is_expanded_only_at_the_start() {
    let home = std::env::var("HOME").unwrap();
    assert_eq!(
      expand_tilde(Path::new("~/rollcall.db")),
      PathBuf::from(home).join("rollcall.db")
    );
    assert_eq!(expand_tilde(Path::new("/var/lib/x~/db")), PathBuf::from("/var/lib/x~/db"));
  }
}
