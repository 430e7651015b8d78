use nearlens_core::EventCause;
use serde::Deserialize;
use tracing::trace;

use crate::legacy::{parse_amount, Entry};

const EVENT_LOG_PREFIX: &str = "EVENT_JSON:";

#[derive(Deserialize)]
struct EventLog {
    standard: String,
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct OwnerAmount {
    owner_id: String,
    amount: String,
    memo: Option<String>,
}

#[derive(Deserialize)]
struct TransferData {
    old_owner_id: String,
    new_owner_id: String,
    amount: String,
    memo: Option<String>,
}

/// Scan an outcome's logs for NEP-141 structured events. Returns the
/// fungible-token entries found, plus whether any well-formed `EVENT_JSON:`
/// log was present at all (of any standard), which is the signal that
/// suppresses legacy decoding.
pub(crate) fn extract(logs: &[String]) -> (bool, Vec<Entry>) {
    let mut saw_event_log = false;
    let mut entries = vec![];

    for log in logs {
        let Some(raw) = log.strip_prefix(EVENT_LOG_PREFIX) else {
            continue;
        };
        let Ok(event_log) = serde_json::from_str::<EventLog>(raw) else {
            trace!(log, "unparseable event log");
            continue;
        };
        saw_event_log = true;
        if event_log.standard != "nep141" {
            continue;
        }

        let items = match event_log.data {
            serde_json::Value::Array(items) => items,
            _ => continue,
        };

        match event_log.event.as_str() {
            "ft_mint" => {
                for item in items {
                    let Ok(data) = serde_json::from_value::<OwnerAmount>(item) else {
                        continue;
                    };
                    if let Some(amount) = parse_amount(&data.amount) {
                        entries.push(Entry {
                            affected: data.owner_id,
                            involved: None,
                            delta: amount,
                            cause: EventCause::Mint,
                            memo: data.memo,
                        });
                    }
                }
            }
            "ft_burn" => {
                for item in items {
                    let Ok(data) = serde_json::from_value::<OwnerAmount>(item) else {
                        continue;
                    };
                    if let Some(amount) = parse_amount(&data.amount) {
                        entries.push(Entry {
                            affected: data.owner_id,
                            involved: None,
                            delta: -amount,
                            cause: EventCause::Burn,
                            memo: data.memo,
                        });
                    }
                }
            }
            "ft_transfer" => {
                for item in items {
                    let Ok(data) = serde_json::from_value::<TransferData>(item) else {
                        continue;
                    };
                    if let Some(amount) = parse_amount(&data.amount) {
                        entries.push(Entry {
                            affected: data.old_owner_id.clone(),
                            involved: Some(data.new_owner_id.clone()),
                            delta: -amount.clone(),
                            cause: EventCause::TransferOut,
                            memo: data.memo.clone(),
                        });
                        entries.push(Entry {
                            affected: data.new_owner_id,
                            involved: Some(data.old_owner_id),
                            delta: amount,
                            cause: EventCause::TransferIn,
                            memo: data.memo,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    (saw_event_log, entries)
}

#[cfg(test)]
mod tests {
    use num_bigint::BigInt;

    use super::*;

    fn event_log(standard: &str, event: &str, data: serde_json::Value) -> String {
        format!(
            "EVENT_JSON:{}",
            serde_json::json!({
                "standard": standard,
                "version": "1.0.0",
                "event": event,
                "data": data
            })
        )
    }

    #[test]
    fn mint_and_burn_events_decode() {
        let logs = vec![
            event_log(
                "nep141",
                "ft_mint",
                serde_json::json!([{"owner_id": "alice.near", "amount": "100"}]),
            ),
            event_log(
                "nep141",
                "ft_burn",
                serde_json::json!([{"owner_id": "bob.near", "amount": "30", "memo": "exit"}]),
            ),
        ];
        let (saw, entries) = extract(&logs);

        assert!(saw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].cause, EventCause::Mint);
        assert_eq!(entries[0].delta, BigInt::from(100));
        assert_eq!(entries[1].cause, EventCause::Burn);
        assert_eq!(entries[1].delta, BigInt::from(-30));
        assert_eq!(entries[1].memo.as_deref(), Some("exit"));
    }

    #[test]
    fn transfer_event_emits_pair_per_item() {
        let logs = vec![event_log(
            "nep141",
            "ft_transfer",
            serde_json::json!([
                {"old_owner_id": "a.near", "new_owner_id": "b.near", "amount": "5"},
                {"old_owner_id": "c.near", "new_owner_id": "d.near", "amount": "7"}
            ]),
        )];
        let (_, entries) = extract(&logs);

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].affected, "a.near");
        assert_eq!(entries[0].delta, BigInt::from(-5));
        assert_eq!(entries[3].affected, "d.near");
        assert_eq!(entries[3].delta, BigInt::from(7));
    }

    #[test]
    fn foreign_standards_suppress_legacy_but_emit_nothing() {
        let logs = vec![event_log(
            "nep171",
            "nft_mint",
            serde_json::json!([{"owner_id": "a.near", "token_ids": ["1"]}]),
        )];
        let (saw, entries) = extract(&logs);

        assert!(saw);
        assert!(entries.is_empty());
    }

    #[test]
    fn plain_logs_are_ignored() {
        let logs = vec![
            "Transfer 5 from a.near to b.near".to_string(),
            "EVENT_JSON:{not json".to_string(),
        ];
        let (saw, entries) = extract(&logs);

        assert!(!saw);
        assert!(entries.is_empty());
    }
}
