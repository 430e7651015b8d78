use itertools::Itertools;
use nearlens_core::{BlockMessage, ReceiptEnum};

use crate::cache::CausalityCache;

/// Propagation passes per block. Receipts and outcomes are not causally
/// sorted within a block, so a single sweep can look up a parent that a
/// later iteration would have written; a few passes settle every in-block
/// chain.
const WARM_PASSES: usize = 3;

/// Seed and propagate transaction attribution for one block.
///
/// Every transaction maps its conversion receipt to its own hash; every
/// already-attributed action receipt forwards the hash to the data ids it
/// will output and the input data ids it joins on; every attributed
/// execution outcome forwards it to the receipts it spawned. Data receipts
/// resolve through their `dataId`.
pub fn warm(cache: &CausalityCache, msg: &BlockMessage) {
    for shard in &msg.shards {
        let Some(chunk) = &shard.chunk else { continue };
        for tx in &chunk.transactions {
            if let Some(conversion_receipt_id) = tx.conversion_receipt_id() {
                cache.set(conversion_receipt_id, &tx.transaction.hash);
            }
        }
    }

    // Outcome -> spawned-receipt edges, block-wide, deduplicated: the same
    // outcome can surface both under its shard and attached to a receipt.
    let mut outcome_edges: Vec<(&str, &str)> = msg
        .shards
        .iter()
        .flat_map(|shard| {
            shard.receipt_execution_outcomes.iter().flat_map(|outcome| {
                outcome
                    .execution_outcome
                    .outcome
                    .receipt_ids
                    .iter()
                    .map(|receipt_id| {
                        (
                            outcome.execution_outcome.id.as_str(),
                            receipt_id.as_str(),
                        )
                    })
            })
        })
        .unique()
        .collect();

    for _ in 0..WARM_PASSES {
        let mut changed = false;

        for shard in &msg.shards {
            let Some(chunk) = &shard.chunk else { continue };
            for receipt in &chunk.receipts {
                match &receipt.receipt {
                    ReceiptEnum::Action(action) => {
                        let Some(tx_hash) = cache.get(&receipt.receipt_id) else {
                            continue;
                        };
                        for receiver in &action.output_data_receivers {
                            if cache.get(&receiver.data_id).is_none() {
                                cache.set(&receiver.data_id, &tx_hash);
                                changed = true;
                            }
                        }
                        for input_data_id in &action.input_data_ids {
                            if cache.get(input_data_id).is_none() {
                                cache.set(input_data_id, &tx_hash);
                                changed = true;
                            }
                        }
                    }
                    ReceiptEnum::Data(data) => {
                        if cache.get(&receipt.receipt_id).is_none() {
                            if let Some(tx_hash) = cache.get(&data.data_id) {
                                cache.set(&receipt.receipt_id, &tx_hash);
                                changed = true;
                            }
                        }
                    }
                }
            }
        }

        outcome_edges.retain(|(executed_id, produced_id)| {
            if let Some(tx_hash) = cache.get(executed_id) {
                cache.set(produced_id, &tx_hash);
                changed = true;
                false
            } else {
                true
            }
        });

        if !changed || outcome_edges.is_empty() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fixture(json: serde_json::Value) -> BlockMessage {
        serde_json::from_value(json).unwrap()
    }

    fn outcome(id: &str, receipt_ids: Vec<&str>) -> serde_json::Value {
        serde_json::json!({
            "executionOutcome": {
                "id": id,
                "outcome": {
                    "executorId": "token.near",
                    "gasBurnt": 1,
                    "tokensBurnt": "0",
                    "logs": [],
                    "receiptIds": receipt_ids,
                    "status": {"SuccessValue": ""}
                }
            },
            "receipt": null
        })
    }

    /// Transaction T converts into R1; R1's outcome spawns the
    /// cross-contract receipt R2 (which will output data D1) and the
    /// callback receipt R3 joining on D1. Every hop must resolve back to
    /// T's hash in one warm() call, regardless of in-block ordering.
    #[test]
    fn multi_hop_promise_chain_resolves_to_origin() {
        let msg = fixture(serde_json::json!({
            "block": {
                "author": "v.near",
                "header": {
                    "height": 50,
                    "hash": "H",
                    "prevHash": "P",
                    "timestampNanosec": "1700000000000000000"
                },
                "chunks": []
            },
            "shards": [{
                "shardId": 0,
                "chunk": {
                    "author": "v.near",
                    "header": {"chunkHash": "C", "shardId": 0},
                    "receipts": [
                        {
                            "receiptId": "R2",
                            "predecessorId": "token.near",
                            "receiverId": "dex.near",
                            "receipt": {"Action": {
                                "actions": [],
                                "inputDataIds": [],
                                "outputDataReceivers": [{"dataId": "D1", "receiverId": "token.near"}]
                            }}
                        },
                        {
                            "receiptId": "R3",
                            "predecessorId": "token.near",
                            "receiverId": "token.near",
                            "receipt": {"Action": {
                                "actions": [],
                                "inputDataIds": ["D1"],
                                "outputDataReceivers": []
                            }}
                        }
                    ],
                    "transactions": [{
                        "transaction": {
                            "hash": "TX",
                            "signerId": "bob.near",
                            "receiverId": "token.near"
                        },
                        "outcome": outcome("TX", vec!["R1"])
                    }]
                },
                "receiptExecutionOutcomes": [
                    outcome("R1", vec!["R2", "R3"]),
                    outcome("R2", vec![]),
                    outcome("R3", vec![])
                ]
            }]
        }));

        let cache = CausalityCache::new(Duration::from_secs(60), 1024);
        warm(&cache, &msg);

        assert_eq!(cache.get("R1"), Some("TX".to_string()));
        assert_eq!(cache.get("R2"), Some("TX".to_string()));
        assert_eq!(cache.get("R3"), Some("TX".to_string()));
        assert_eq!(cache.get("D1"), Some("TX".to_string()));
    }

    /// R2 arrives as a data receipt in a later block than the block that
    /// scheduled D1; the cache carries the mapping across blocks.
    #[test]
    fn attribution_survives_across_blocks() {
        let cache = CausalityCache::new(Duration::from_secs(60), 1024);
        cache.set("D7", "TX7");

        let msg = fixture(serde_json::json!({
            "block": {
                "author": "v.near",
                "header": {
                    "height": 51,
                    "hash": "H2",
                    "prevHash": "H",
                    "timestampNanosec": "1700000001000000000"
                },
                "chunks": []
            },
            "shards": [{
                "shardId": 0,
                "chunk": {
                    "author": "v.near",
                    "header": {"chunkHash": "C2", "shardId": 0},
                    "receipts": [{
                        "receiptId": "R7",
                        "predecessorId": "token.near",
                        "receiverId": "alice.near",
                        "receipt": {"Data": {"dataId": "D7", "data": null}}
                    }],
                    "transactions": []
                },
                "receiptExecutionOutcomes": []
            }]
        }));

        warm(&cache, &msg);
        assert_eq!(cache.get("R7"), Some("TX7".to_string()));
    }

    #[test]
    fn unattributed_receipts_stay_misses() {
        let cache = CausalityCache::new(Duration::from_secs(60), 1024);
        let msg = fixture(serde_json::json!({
            "block": {
                "author": "v.near",
                "header": {
                    "height": 52,
                    "hash": "H3",
                    "prevHash": "H2",
                    "timestampNanosec": "1700000002000000000"
                },
                "chunks": []
            },
            "shards": [{
                "shardId": 0,
                "chunk": null,
                "receiptExecutionOutcomes": [outcome("ORPHAN", vec!["CHILD"])]
            }]
        }));

        warm(&cache, &msg);
        assert_eq!(cache.get("ORPHAN"), None);
        assert_eq!(cache.get("CHILD"), None);
    }
}
