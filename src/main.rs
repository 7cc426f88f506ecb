use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use precache::config::Config;
use precache::controller::{CacheController, Intercept};
use precache::net::{Fetch, HttpFetcher};
use precache::request::AssetRequest;
use precache::store::{SqliteStore, StoreBackend};

#[derive(Parser, Debug)]
#[command(name = "precache")]
#[command(about = "Offline-first static asset cache with versioned invalidation")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/precache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Populate the current store from the configured asset list
  Install,
  /// Delete every store superseded by the current cache name
  Activate,
  /// Resolve a path through the cache, fetching and caching on miss
  Get {
    /// Root-relative path, e.g. /static/app.css
    path: String,
  },
  /// List stores and their entry counts
  Status,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let storage = match &config.data_dir {
    Some(dir) => SqliteStore::open(&dir.join("cache.db"))?,
    None => SqliteStore::open_default()?,
  };

  match args.command {
    Command::Install => {
      let fetcher = HttpFetcher::new(config.fetch_timeout())?;
      let mut controller = CacheController::new(config, storage, fetcher);
      controller.initialize().await?;
    }
    Command::Activate => {
      let fetcher = HttpFetcher::new(config.fetch_timeout())?;
      let mut controller = CacheController::new(config, storage, fetcher);
      controller.activate().await?;
    }
    Command::Get { path } => {
      let fetcher = HttpFetcher::new(config.fetch_timeout())?;
      let request = AssetRequest::get(config.asset_url(&path)?);
      let controller = CacheController::new(config, storage, fetcher.clone());

      match controller.intercept(&request).await? {
        Intercept::Bypass => {
          // Excluded from caching; do what the host would do and go straight
          // to the network
          eprintln!("bypass: {}", request.url);
          let fetched = fetcher.fetch(&request.method, &request.url).await?;
          eprintln!("status: {}", fetched.status);
          std::io::stdout().write_all(&fetched.body)?;
        }
        Intercept::Hit(response) => {
          eprintln!("hit: {} (cached {})", response.url, response.fetched_at);
          std::io::stdout().write_all(&response.body)?;
        }
        Intercept::Network(response) => {
          eprintln!("network: {} (status {})", response.url, response.status);
          std::io::stdout().write_all(&response.body)?;
        }
        Intercept::Fallback(response) => {
          eprintln!("fallback: serving {} instead", response.url);
          std::io::stdout().write_all(&response.body)?;
        }
      }
    }
    Command::Status => {
      for name in storage.list_stores()? {
        let count = storage.entry_count(&name)?;
        let marker = if name == config.cache_name { "*" } else { " " };
        println!("{} {} ({} entries)", marker, name, count);
      }
    }
  }

  Ok(())
}
