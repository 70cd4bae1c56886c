use std::{io::Write, path::PathBuf, time::Duration};

use activitystreams::{
    fetch_collection, Activity, Fetch, FetchOptions, HttpFetcher, OrderedCollection,
    OrderedCollectionPage, PagesReverse,
};
use clap::{Parser, Subcommand};
use config::{builder::DefaultState, ConfigBuilder, File};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_COLLECTION_URL: &str =
    "https://iiif.bodleian.ox.ac.uk/iiif/activity/all-changes";

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    ActivityStreams(#[from] activitystreams::Error),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJSON(#[from] serde_json::Error),
}

pub type Result<T> = miette::Result<T, Error>;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Extra configuration file, read after the default locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Print activities from the newest page back to the oldest
    Activities {
        /// Collection to walk instead of the configured one
        url: Option<Url>,
        /// Stop after this many activities
        #[arg(short, long)]
        limit: Option<usize>,
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Print one line per page from the newest back to the oldest
    Pages {
        url: Option<Url>,
        #[arg(long)]
        max_pages: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Print the collection descriptor
    Collection { url: Option<Url> },
}

impl Commands {
    pub fn url(&self) -> Option<&Url> {
        match self {
            Commands::Activities { url, .. }
            | Commands::Pages { url, .. }
            | Commands::Collection { url } => url.as_ref(),
        }
    }

    pub fn max_pages(&self) -> Option<usize> {
        match self {
            Commands::Activities { max_pages, .. } | Commands::Pages { max_pages, .. } => {
                *max_pages
            }
            Commands::Collection { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub collection_url: Url,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_pages: Option<usize>,
}

impl Config {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(ConfigBuilder::<DefaultState>::default()
        .set_default("collection_url", DEFAULT_COLLECTION_URL)?
        .set_default("timeout_secs", 30)?
        .set_default(
            "user_agent",
            concat!("changefeed/", env!("CARGO_PKG_VERSION")),
        )?)
}

/// Configuration built from the defaults alone, without files or environment.
pub fn default_config() -> Result<Config> {
    Ok(with_defaults()?.build()?.try_deserialize()?)
}

pub fn read_config(args: &Args) -> Result<Config> {
    let mut builder = with_defaults()?
        .add_source(File::with_name("changefeed").required(false))
        .add_source(File::with_name("/etc/changefeed/changefeed").required(false));

    if let Some(path) = &args.config {
        builder = builder.add_source(File::with_name(&path.to_string_lossy()));
    }

    let cfg = builder
        .add_source(config::Environment::with_prefix("CHANGEFEED"))
        .set_override_option("collection_url", args.command.url().map(Url::to_string))?
        .set_override_option("max_pages", args.command.max_pages().map(|n| n as i64))?
        .build()?;
    Ok(cfg.try_deserialize()?)
}

pub fn write_activity<W: Write>(out: &mut W, activity: &Activity, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, activity)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}: {}", activity.kind, activity.object)?;
    }
    Ok(())
}

pub fn write_page<W: Write>(out: &mut W, page: &OrderedCollectionPage, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, page)?;
        writeln!(out)?;
    } else {
        writeln!(
            out,
            "{}\t{}\t{} activities",
            page.id,
            page.start_index,
            page.ordered_items.len()
        )?;
    }
    Ok(())
}

fn walker<'a, F: Fetch + ?Sized>(
    fetcher: &'a F,
    collection: &OrderedCollection,
    max_pages: Option<usize>,
) -> PagesReverse<'a, F> {
    let pages = PagesReverse::new(fetcher, collection);
    match max_pages {
        Some(max_pages) => pages.with_max_pages(max_pages),
        None => pages,
    }
}

/// Runs `command` against the configured collection, writing results to
/// `out` as they arrive. Anything written before a failure stays written.
pub async fn execute<F: Fetch + ?Sized, W: Write>(
    fetcher: &F,
    config: &Config,
    command: &Commands,
    out: &mut W,
) -> Result<()> {
    let collection = fetch_collection(fetcher, config.collection_url.as_str()).await?;
    info!(
        id = %collection.id,
        total_items = ?collection.total_items,
        "walking collection"
    );

    match command {
        Commands::Collection { .. } => {
            serde_json::to_writer_pretty(&mut *out, &collection)?;
            writeln!(out)?;
        }
        Commands::Pages { json, .. } => {
            let mut pages = walker(fetcher, &collection, config.max_pages);
            while let Some(page) = pages.next_page().await {
                write_page(out, &page?, *json)?;
            }
            debug!(pages = pages.pages_fetched(), "done");
        }
        Commands::Activities { limit, json, .. } => {
            let mut activities = walker(fetcher, &collection, config.max_pages).activities();
            let mut written = 0;
            while limit.map_or(true, |limit| written < limit) {
                let Some(activity) = activities.next_activity().await else {
                    break;
                };
                write_activity(out, &activity?, *json)?;
                written += 1;
            }
            debug!(
                activities = written,
                pages = activities.pages_fetched(),
                "done"
            );
        }
    }
    Ok(())
}

pub async fn run(args: Args, config: Config) -> Result<()> {
    let fetcher = HttpFetcher::new(&config.fetch_options())?;
    let mut out = std::io::stdout();
    execute(&fetcher, &config, &args.command, &mut out).await
}
