use nearlens_core::{event_index, BlockHeader, CanonicalEvent, ORDINALS_PER_SHARD};

use crate::{registry::EventDraft, Error};

/// Assign every draft its composite index from (shard, block timestamp,
/// ordinal-within-shard) and resolve its transaction attribution.
///
/// Shards are walked in shard-id order and drafts in their in-shard decode
/// order, so the same block always yields the same index sequence no matter
/// how decoding was scheduled. `resolve` is the causality lookup; a miss
/// leaves the hash null and never blocks persistence.
pub(crate) fn normalize(
    header: &BlockHeader,
    mut per_shard: Vec<(u64, Vec<EventDraft>)>,
    resolve: impl Fn(&str) -> Option<String>,
) -> Result<Vec<CanonicalEvent>, Error> {
    per_shard.sort_by_key(|(shard_id, _)| *shard_id);

    let mut events = vec![];
    for (shard_id, drafts) in per_shard {
        if drafts.len() as u64 > ORDINALS_PER_SHARD {
            return Err(Error::Malformed {
                height: header.height,
                reason: format!("shard {shard_id} emitted {} deltas", drafts.len()),
            });
        }
        for (ordinal, draft) in drafts.into_iter().enumerate() {
            let transaction_hash = resolve(&draft.receipt_id);
            events.push(CanonicalEvent {
                event_index: event_index(header.timestamp_nanosec, shard_id, ordinal as u64),
                block_height: header.height,
                block_timestamp: header.timestamp_nanosec,
                shard_id,
                receipt_id: draft.receipt_id,
                transaction_hash,
                contract_account_id: draft.contract_account_id,
                affected_account_id: draft.affected_account_id,
                involved_account_id: draft.involved_account_id,
                delta_amount: draft.delta_amount,
                cause: draft.cause,
                standard: draft.standard,
                memo: draft.memo,
            });
        }
    }
    Ok(events)
}
