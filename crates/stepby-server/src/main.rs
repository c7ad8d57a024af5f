//! stepby server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `STEPBY_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP. Year summaries are cached in Redis when `redis_url` is
//! set and in process otherwise.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use stepby_api::AppState;
use stepby_core::{
  cache::{CacheStore, MemoryCache},
  calendar::Calendar,
};
use stepby_server::{ServerConfig, redis_cache::RedisCache, reminders::Reminders};
use stepby_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "stepby habit tracker server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("STEPBY").prefix_separator("_").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let calendar = Calendar::from_name(&server_cfg.timezone)
    .context("invalid timezone in configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  if server_cfg.notifications.enabled {
    Reminders::new(Arc::clone(&store), calendar, server_cfg.notifications.clone())
      .context("invalid notification settings")?
      .spawn();
  }

  match &server_cfg.redis_url {
    Some(url) => {
      let cache = RedisCache::open(url).context("invalid redis_url")?;
      serve(&server_cfg, store, Arc::new(cache), calendar).await
    }
    None => {
      tracing::warn!("no redis_url configured, caching summaries in process");
      serve(&server_cfg, store, Arc::new(MemoryCache::new()), calendar).await
    }
  }
}

async fn serve<C: CacheStore + 'static>(
  cfg: &ServerConfig,
  store: Arc<SqliteStore>,
  cache: Arc<C>,
  calendar: Calendar,
) -> anyhow::Result<()> {
  let state = AppState::new(store, cache, calendar).with_strategy(cfg.summary_strategy);
  let app = stepby_api::api_router(state)
    .layer(CorsLayer::permissive())
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", cfg.host, cfg.port);
  tracing::info!(timezone = %calendar.timezone(), "Listening on http://{address}");
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
