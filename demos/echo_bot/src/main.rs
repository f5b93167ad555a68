//! Echo Bot Example
//!
//! A small bot showing the main pieces of skein: a compiled-in plugin unit,
//! hooks declared in `plugins/*.toml` that reload while the bot runs, and a
//! JSON-file store behind the `Db` extractor.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config demos/echo_bot/skein.toml
//! ```

mod plugins;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use skein::prelude::*;
use skein::runtime::ConfigLoader;
use skein_storage::{JsonFileStore, StorageConfig};
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "skein demo bot")]
struct Cli {
    /// Configuration file. Searched in the usual places when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...).
    #[arg(short, long, env = "SKEIN_PROFILE")]
    profile: Option<String>,

    /// JSON store file. Overrides `plugins.settings.storage.path`.
    #[arg(long)]
    store: Option<PathBuf>,
}

impl Cli {
    fn loader(&self) -> ConfigLoader {
        let mut loader = ConfigLoader::new().with_current_dir().with_user_config_dir();
        if let Some(path) = &self.config {
            loader = loader.file(path);
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile(profile);
        }
        loader
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.loader().load()?;

    let storage: StorageConfig = config
        .plugins
        .settings
        .get("storage")
        .map(|value| serde_json::from_value(value.clone()))
        .transpose()?
        .unwrap_or_default();
    let store_path = cli.store.unwrap_or(storage.path);

    let runtime = SkeinRuntime::builder()
        .config(config)
        .plugin(plugins::DEMO)
        .catalog(plugins::catalog())
        .store(JsonFileStore::open(&store_path).await?)
        .build()?;

    info!(store = %store_path.display(), "Demo bot starting");
    runtime.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["echo-bot", "-c", "bot.toml", "--store", "data.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
        assert_eq!(cli.store, Some(PathBuf::from("data.json")));
    }
}
