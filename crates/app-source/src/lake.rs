use std::time::Duration;

use futures_util::future::try_join_all;
use nearlens_core::{Block, BlockMessage, Shard};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::{canonicalize_keys, retry, Error, Result};

/// Poll interval while the next height has not been produced yet. The
/// gateway answers 404 until a block is finalized and a JSON `null` body for
/// heights the chain skipped.
const NOT_PRODUCED_THROTTLE: Duration = Duration::from_millis(700);

pub(crate) struct LakeSource {
    client: Client,
    endpoint: String,
    bucket: String,
}

pub(crate) fn block_key(height: u64) -> String {
    format!("{height:012}/block.json")
}

pub(crate) fn shard_key(height: u64, shard_id: u64) -> String {
    format!("{height:012}/shard_{shard_id}.json")
}

enum Fetched {
    Body(serde_json::Value),
    NotFound,
}

impl LakeSource {
    pub(crate) fn new(client: Client, endpoint: String, bucket: String) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Self {
            client,
            endpoint,
            bucket,
        }
    }

    /// Fetch one height. `Ok(None)` means the chain skipped this height;
    /// waiting for an unproduced tip block happens inside.
    pub(crate) async fn fetch_block(&self, height: u64) -> Result<Option<BlockMessage>> {
        let block = loop {
            match self.fetch_json(&block_key(height)).await? {
                Fetched::Body(serde_json::Value::Null) => {
                    debug!(height, "height skipped by the chain");
                    return Ok(None);
                }
                Fetched::Body(mut value) => {
                    canonicalize_keys(&mut value);
                    break serde_json::from_value::<Block>(value)?;
                }
                Fetched::NotFound => tokio::time::sleep(NOT_PRODUCED_THROTTLE).await,
            }
        };

        let shard_count = block.chunks.len() as u64;
        let shards = try_join_all((0..shard_count).map(|shard_id| self.fetch_shard(height, shard_id)))
            .await?;

        Ok(Some(BlockMessage { block, shards }))
    }

    async fn fetch_shard(&self, height: u64, shard_id: u64) -> Result<Shard> {
        match self.fetch_json(&shard_key(height, shard_id)).await? {
            Fetched::Body(mut value) => {
                canonicalize_keys(&mut value);
                Ok(serde_json::from_value(value)?)
            }
            // block.json is only written after its shard files; a missing
            // shard at this point is corrupt layout, not a young tip.
            Fetched::NotFound => Err(Error::SourceUnavailable {
                attempts: 1,
                reason: format!("shard object missing for height {height} shard {shard_id}"),
            }),
        }
    }

    async fn fetch_json(&self, key: &str) -> Result<Fetched> {
        let url = format!("{}/{}/{}", self.endpoint, self.bucket, key);
        let client = &self.client;
        retry::with_backoff(key, || fetch_once(client, &url)).await
    }
}

async fn fetch_once(client: &Client, url: &str) -> std::result::Result<Fetched, reqwest::Error> {
    let response = client.get(url).send().await?;
    if response.status() == StatusCode::NOT_FOUND {
        return Ok(Fetched::NotFound);
    }
    let body = response.error_for_status()?.json().await?;
    Ok(Fetched::Body(body))
}
