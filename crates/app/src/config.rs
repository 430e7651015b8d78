use std::{env, time::Duration};

use anyhow::{bail, Context, Result};
use nearlens_indexer::DriverOptions;
use nearlens_source::Backend;

const MAINNET_FEED: &str = "https://mainnet.neardata.xyz";
const TESTNET_FEED: &str = "https://testnet.neardata.xyz";
const MAINNET_BUCKET: &str = "near-lake-data-mainnet";
const TESTNET_BUCKET: &str = "near-lake-data-testnet";

pub struct Config {
    pub database_url: String,
    pub backend: Backend,
    pub driver: DriverOptions,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let network = var_or("NETWORK", "mainnet");
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is required")?;

        let backend = match var_or("BLOCK_SOURCE", "feed").as_str() {
            "feed" => Backend::Feed {
                endpoint: var_or("FEED_URL", default_feed(&network)?),
            },
            "lake" => Backend::Lake {
                endpoint: env::var("LAKE_URL")
                    .context("LAKE_URL is required for the lake source")?,
                bucket: var_or("LAKE_BUCKET", default_bucket(&network)?),
            },
            other => bail!("unsupported BLOCK_SOURCE: {other}"),
        };

        let driver = DriverOptions {
            indexer_key: var_or("INDEXER_KEY", "events"),
            start_height: parsed_var("START_BLOCK_HEIGHT", 0)?,
            end_height: match env::var("END_BLOCK_HEIGHT") {
                Ok(raw) => Some(raw.parse().context("END_BLOCK_HEIGHT must be a height")?),
                Err(_) => None,
            },
            safety_delta: parsed_var("SAFETY_DELTA", 100)?,
        };

        Ok(Self {
            database_url,
            backend,
            driver,
            cache_ttl: Duration::from_secs(parsed_var("CACHE_TTL_SECS", 600)?),
            cache_capacity: parsed_var("CACHE_CAPACITY", 500_000)?,
        })
    }
}

fn var_or(key: &str, default: impl Into<String>) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}

fn parsed_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} must be numeric")),
        Err(_) => Ok(default),
    }
}

fn default_feed(network: &str) -> Result<String> {
    match network {
        "mainnet" => Ok(MAINNET_FEED.to_string()),
        "testnet" => Ok(TESTNET_FEED.to_string()),
        other => bail!("unsupported NETWORK: {other}"),
    }
}

fn default_bucket(network: &str) -> Result<String> {
    match network {
        "mainnet" => Ok(MAINNET_BUCKET.to_string()),
        "testnet" => Ok(TESTNET_BUCKET.to_string()),
        other => bail!("unsupported NETWORK: {other}"),
    }
}
