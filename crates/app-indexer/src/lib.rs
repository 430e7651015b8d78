mod cache;
mod causality;
mod error;
mod legacy;
mod nep141;
mod normalize;
mod progress;
mod registry;

pub use cache::CausalityCache;
pub use error::Error;
pub use registry::{EventDraft, Matcher, Registry};

use nearlens_core::BlockMessage;
use nearlens_db::Database;
use nearlens_source::{streamer, Backend, SourceConfig};
use rayon::prelude::*;
use tokio::sync::watch;
use tracing::{error, info};

use crate::progress::Progress;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug)]
pub struct DriverOptions {
    /// Checkpoint key; exactly one live writer per key is assumed.
    pub indexer_key: String,
    pub start_height: u64,
    pub end_height: Option<u64>,
    /// Blocks re-processed after a restart to cover the persist-then-crash
    /// window and short tip reorgs; idempotent upserts make this safe.
    pub safety_delta: u64,
}

/// Height to resume from: the checkpoint minus the safety delta, never
/// before the configured start.
pub fn resume_height(checkpoint: Option<u64>, start_height: u64, safety_delta: u64) -> u64 {
    match checkpoint {
        Some(synced) => synced.saturating_sub(safety_delta).max(start_height),
        None => start_height,
    }
}

/// Run the pipeline until the source ends, `stop` flips, or a fatal error.
///
/// Blocks are processed strictly in order; each one is decoded, normalized,
/// persisted, and checkpointed before the next is pulled, so ingestion is
/// throttled to database throughput. The stop flag is honored only at block
/// boundaries; a checkpoint always reflects a fully processed block.
pub async fn start_indexing(
    backend: Backend,
    db: Database,
    cache: CausalityCache,
    options: DriverOptions,
    mut stop: watch::Receiver<bool>,
) -> Result<()> {
    let registry = Registry::mainnet();

    let checkpoint = db.checkpoint(&options.indexer_key).await?;
    let start_height = resume_height(checkpoint, options.start_height, options.safety_delta);
    info!(
        indexer = %options.indexer_key,
        checkpoint,
        start_height,
        "resuming stream"
    );

    let (producer, mut blocks) = streamer(SourceConfig {
        backend,
        start_height,
        end_height: options.end_height,
    });

    let mut progress = Progress::new(options.end_height);
    let mut cache_misses: u64 = 0;

    loop {
        if *stop.borrow() {
            info!("stop requested, halting at block boundary");
            producer.abort();
            return Ok(());
        }

        let msg = tokio::select! {
            msg = blocks.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
            _ = stop.changed() => continue,
        };

        let height = msg.block.header.height;
        if let Err(err) = process_block(&registry, &db, &cache, &options, &msg, &mut cache_misses).await
        {
            error!(height, hash = %msg.block.header.hash, error = %err, "fatal block failure");
            producer.abort();
            return Err(err);
        }
        progress.tick(height, cache_misses);
    }

    drop(blocks);
    producer.await??;
    Ok(())
}

async fn process_block(
    registry: &Registry,
    db: &Database,
    cache: &CausalityCache,
    options: &DriverOptions,
    msg: &BlockMessage,
    cache_misses: &mut u64,
) -> Result<()> {
    causality::warm(cache, msg);

    // Sibling shards decode concurrently; order is preserved by collection,
    // and the normalizer's composite key depends only on it.
    let per_shard: Vec<(u64, Vec<EventDraft>)> = msg
        .shards
        .par_iter()
        .map(|shard| {
            let drafts = shard
                .receipt_execution_outcomes
                .iter()
                .flat_map(|outcome| registry.decode_outcome(outcome))
                .collect();
            (shard.shard_id, drafts)
        })
        .collect();

    let mut events = normalize::normalize(&msg.block.header, per_shard, |receipt_id| {
        cache.get(receipt_id)
    })?;

    // One bounded retry pass for attributions racing the cache warm-up;
    // exhaustion leaves the hash null and is only counted.
    for event in events.iter_mut() {
        if event.transaction_hash.is_none() {
            event.transaction_hash = cache.get_retry(&event.receipt_id).await;
            if event.transaction_hash.is_none() {
                *cache_misses += 1;
            }
        }
    }

    db.insert_events(&events).await?;
    db.advance_checkpoint(&options.indexer_key, msg.block.header.height)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_uses_configured_start() {
        assert_eq!(resume_height(None, 9_820_210, 100), 9_820_210);
    }

    #[test]
    fn restart_rolls_back_by_safety_delta() {
        // Checkpoint at 110, delta 5: re-process from 105.
        assert_eq!(resume_height(Some(110), 100, 5), 105);
    }

    #[test]
    fn rollback_never_precedes_start() {
        assert_eq!(resume_height(Some(102), 100, 50), 100);
    }

    #[test]
    fn zero_delta_reprocesses_checkpoint_block_only() {
        assert_eq!(resume_height(Some(110), 100, 0), 110);
    }
}
