use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use product_details::cache::CollectionCache;
use product_details::catalog::Catalog;
use product_details::config::Settings;
use product_details::logging;
use product_details::storage::{FileStore, Storage, TableStore};
use product_details::update::{HttpSource, Updater};
use product_details::version::{ReleaseList, SortOrder, Version};

#[derive(Parser)]
#[command(name = "product-details")]
#[command(version, about = "Mirror and query Mozilla product details")]
struct Cli {
    /// Settings file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download product details into the configured storage
    Update {
        /// Download even if nothing changed since the last update
        #[arg(long)]
        force: bool,
    },
    /// Print a document, e.g. `firefox_versions` or `regions/de`
    Get { key: String },
    /// Print region names for a locale, with fallback
    Regions { locale: String },
    /// Print a release list from a `version -> date` document
    Releases {
        key: String,
        /// Leave out versions lower than this one
        #[arg(long, default_value = "0.0")]
        hide_below: String,
        /// Oldest release first
        #[arg(long)]
        ascending: bool,
        /// Only keep releases of this channel
        #[arg(long, value_enum)]
        only: Option<Channel>,
    },
    /// Print the time of the last successful update
    LastUpdate,
    /// Copy the JSON file tree into the database
    Seed,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Channel {
    Release,
    Beta,
    Nightly,
}

impl Channel {
    fn matches(self, version: &Version) -> bool {
        match self {
            Channel::Release => version.is_release(),
            Channel::Beta => version.is_beta(),
            Channel::Nightly => version.is_nightly(),
        }
    }
}

fn collection_cache(settings: &Settings) -> Arc<CollectionCache> {
    let timeout = if settings.cache.enabled {
        settings.cache.timeout()
    } else {
        Duration::ZERO
    };
    Arc::new(CollectionCache::new(timeout))
}

fn open_catalog(settings: &Settings) -> anyhow::Result<Catalog<Storage>> {
    let storage = Storage::open(&settings.storage).context("Failed to open storage")?;
    Ok(Catalog::with_cache(storage, collection_cache(settings))
        .with_marker_check_interval(settings.cache.marker_check_interval()))
}

async fn update(settings: &Settings, force: bool) -> anyhow::Result<()> {
    let source = HttpSource::new(&settings.source_url)?;
    let storage = Storage::open(&settings.storage).context("Failed to open storage")?;

    let root_path = source.root_path().to_string();
    let summary = Updater::new(source, storage)
        .with_root_path(&root_path)
        .run(force)
        .await;

    for (collection, update) in &summary.collections {
        if update.skipped {
            println!("{}: up to date", collection);
        } else {
            println!(
                "{}: {} updated, {} failed",
                collection,
                update.updated.len(),
                update.failed.len()
            );
        }
    }

    if !summary.is_success() {
        bail!("Product details update had errors");
    }
    Ok(())
}

fn seed(settings: &Settings) -> anyhow::Result<()> {
    let files = FileStore::new(settings.storage.json_dir());
    let db_path = settings.storage.db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let table = TableStore::open(&db_path)?;

    info!("Seeding {:?} from {:?}", db_path, files.json_dir());
    let rows = table.import_from(&files)?;
    println!("Imported {} rows into {}", rows, db_path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let _guard = logging::init(&settings.log);

    match cli.command {
        Command::Update { force } => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(update(&settings, force)),
        Command::Get { key } => {
            let details = open_catalog(&settings)?.get(&key);
            if details.is_missing() {
                bail!("Product details file {}.json not available", key);
            }
            println!("{}", details.to_pretty_json());
            Ok(())
        }
        Command::Regions { locale } => {
            let regions = open_catalog(&settings)?.regions(&locale)?;
            println!("{}", regions.to_pretty_json());
            Ok(())
        }
        Command::Releases {
            key,
            hide_below,
            ascending,
            only,
        } => {
            let order = if ascending {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };
            let mut list = ReleaseList::new().hide_below(&hide_below).order(order);
            if let Some(channel) = only {
                list = list.filter(move |version| channel.matches(version));
            }

            for release in open_catalog(&settings)?.release_list(&key, &list) {
                println!("{}", release);
            }
            Ok(())
        }
        Command::LastUpdate => {
            match open_catalog(&settings)?.last_update() {
                Some(timestamp) => println!("{}", timestamp),
                None => println!("never"),
            }
            Ok(())
        }
        Command::Seed => seed(&settings),
    }
}
