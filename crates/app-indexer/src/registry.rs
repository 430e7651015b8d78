use nearlens_core::{
    EventCause, EventStandard, ExecutionOutcomeWithReceipt, ReceiptEnum,
};
use num_bigint::BigInt;

use crate::{legacy, nep141};

/// A decoded delta waiting for the normalizer to assign its index.
#[derive(Clone, Debug)]
pub struct EventDraft {
    pub receipt_id: String,
    pub contract_account_id: String,
    pub affected_account_id: String,
    pub involved_account_id: Option<String>,
    pub delta_amount: BigInt,
    pub cause: EventCause,
    pub standard: EventStandard,
    pub memo: Option<String>,
}

#[derive(Clone, Copy, Debug)]
pub enum Matcher {
    Exact(&'static str),
    Suffix(&'static str),
}

impl Matcher {
    fn matches(&self, account_id: &str) -> bool {
        match self {
            Matcher::Exact(exact) => account_id == *exact,
            Matcher::Suffix(suffix) => account_id.ends_with(suffix),
        }
    }
}

/// Static dispatch table from receiver account id to the legacy decoder for
/// that contract family. Resolved once at startup; first match wins.
pub struct Registry {
    entries: Vec<(Matcher, legacy::Decoder)>,
}

impl Registry {
    pub fn mainnet() -> Self {
        Self {
            entries: vec![
                (Matcher::Exact("wrap.near"), legacy::wrap_near as legacy::Decoder),
                (Matcher::Suffix(".tkn.near"), legacy::tkn_factory),
                (Matcher::Suffix(".factory.bridge.near"), legacy::bridge_token),
                (Matcher::Exact("token.v2.ref-finance.near"), legacy::ref_finance),
            ],
        }
    }

    fn decoder_for(&self, account_id: &str) -> Option<legacy::Decoder> {
        self.entries
            .iter()
            .find(|(matcher, _)| matcher.matches(account_id))
            .map(|(_, decoder)| *decoder)
    }

    /// Decode one execution outcome into event drafts.
    ///
    /// Failed outcomes and bare outcomes without their receipt yield
    /// nothing. Structured NEP-141 event logs win over legacy decoding; the
    /// legacy table only runs when the contract emitted no event log at all.
    pub fn decode_outcome(&self, outcome: &ExecutionOutcomeWithReceipt) -> Vec<EventDraft> {
        let Some(receipt) = &outcome.receipt else {
            return vec![];
        };
        let view = &outcome.execution_outcome.outcome;
        if !view.status.is_success() {
            return vec![];
        }

        let contract = view.executor_id.as_str();
        let receipt_id = outcome.execution_outcome.id.as_str();

        let (saw_event_log, entries) = nep141::extract(&view.logs);
        if saw_event_log {
            return drafts(receipt_id, contract, EventStandard::Nep141, entries);
        }

        let Some(decoder) = self.decoder_for(&receipt.receiver_id) else {
            return vec![];
        };
        let ReceiptEnum::Action(action_receipt) = &receipt.receipt else {
            return vec![];
        };

        let entries = action_receipt
            .actions
            .iter()
            .filter_map(|action| action.as_function_call())
            .flat_map(|call| decoder(call, &receipt.predecessor_id, &view.logs))
            .collect();
        drafts(receipt_id, contract, EventStandard::Legacy, entries)
    }
}

fn drafts(
    receipt_id: &str,
    contract: &str,
    standard: EventStandard,
    entries: Vec<legacy::Entry>,
) -> Vec<EventDraft> {
    entries
        .into_iter()
        .map(|entry| EventDraft {
            receipt_id: receipt_id.to_string(),
            contract_account_id: contract.to_string(),
            affected_account_id: entry.affected,
            involved_account_id: entry.involved,
            delta_amount: entry.delta,
            cause: entry.cause,
            standard,
            memo: entry.memo,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use base64::{engine::general_purpose, Engine as _};

    use super::*;

    fn outcome_fixture(
        receiver_id: &str,
        method: &str,
        args: serde_json::Value,
        logs: Vec<String>,
        success: bool,
    ) -> ExecutionOutcomeWithReceipt {
        let status = if success {
            serde_json::json!({"SuccessValue": ""})
        } else {
            serde_json::json!({"Failure": {"error": "boom"}})
        };
        serde_json::from_value(serde_json::json!({
            "executionOutcome": {
                "id": "RECEIPT",
                "outcome": {
                    "executorId": receiver_id,
                    "gasBurnt": 1,
                    "tokensBurnt": "0",
                    "logs": logs,
                    "receiptIds": [],
                    "status": status
                }
            },
            "receipt": {
                "receiptId": "RECEIPT",
                "predecessorId": "bob.near",
                "receiverId": receiver_id,
                "receipt": {"Action": {
                    "actions": [{"FunctionCall": {
                        "methodName": method,
                        "args": general_purpose::STANDARD.encode(args.to_string()),
                        "deposit": "0",
                        "gas": 1
                    }}],
                    "inputDataIds": [],
                    "outputDataReceivers": []
                }}
            }
        }))
        .unwrap()
    }

    #[test]
    fn wrap_near_deposit_scenario() {
        let registry = Registry::mainnet();
        let outcome = outcome_fixture(
            "wrap.near",
            "near_deposit",
            serde_json::json!({}),
            vec!["Deposit 5000000000000000000000000 NEAR to alice.near".to_string()],
            true,
        );

        let drafts = registry.decode_outcome(&outcome);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].cause, EventCause::Mint);
        assert_eq!(drafts[0].standard, EventStandard::Legacy);
        assert_eq!(drafts[0].affected_account_id, "alice.near");
        assert_eq!(drafts[0].delta_amount.to_string(), "5000000000000000000000000");
        assert_eq!(drafts[0].contract_account_id, "wrap.near");
    }

    #[test]
    fn ft_transfer_scenario_shares_receipt() {
        let registry = Registry::mainnet();
        let outcome = outcome_fixture(
            "usdt.tkn.near",
            "ft_transfer",
            serde_json::json!({"receiver_id": "carol.near", "amount": "1000"}),
            vec![],
            true,
        );

        let drafts = registry.decode_outcome(&outcome);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].receipt_id, drafts[1].receipt_id);
        assert_eq!(drafts[0].cause, EventCause::TransferOut);
        assert_eq!(drafts[0].affected_account_id, "bob.near");
        assert_eq!(drafts[0].delta_amount, BigInt::from(-1000));
        assert_eq!(drafts[1].cause, EventCause::TransferIn);
        assert_eq!(drafts[1].affected_account_id, "carol.near");
        assert_eq!(drafts[1].delta_amount, BigInt::from(1000));
    }

    #[test]
    fn structured_events_win_over_legacy() {
        let registry = Registry::mainnet();
        let outcome = outcome_fixture(
            "wrap.near",
            "ft_transfer",
            serde_json::json!({"receiver_id": "carol.near", "amount": "1000"}),
            vec![format!(
                "EVENT_JSON:{}",
                serde_json::json!({
                    "standard": "nep141",
                    "version": "1.0.0",
                    "event": "ft_transfer",
                    "data": [{"old_owner_id": "bob.near", "new_owner_id": "carol.near", "amount": "1000"}]
                })
            )],
            true,
        );

        let drafts = registry.decode_outcome(&outcome);
        assert_eq!(drafts.len(), 2);
        assert!(drafts.iter().all(|d| d.standard == EventStandard::Nep141));
    }

    #[test]
    fn failed_outcomes_and_unwatched_contracts_yield_nothing() {
        let registry = Registry::mainnet();

        let failed = outcome_fixture(
            "wrap.near",
            "ft_transfer",
            serde_json::json!({"receiver_id": "carol.near", "amount": "1000"}),
            vec![],
            false,
        );
        assert!(registry.decode_outcome(&failed).is_empty());

        let unwatched = outcome_fixture(
            "some-random-app.near",
            "ft_transfer",
            serde_json::json!({"receiver_id": "carol.near", "amount": "1000"}),
            vec![],
            true,
        );
        assert!(registry.decode_outcome(&unwatched).is_empty());
    }

    #[test]
    fn suffix_matching_covers_factory_tokens() {
        let registry = Registry::mainnet();
        assert!(registry.decoder_for("usdt.tkn.near").is_some());
        assert!(registry.decoder_for("aaaaaa.factory.bridge.near").is_some());
        assert!(registry.decoder_for("wrap.near").is_some());
        assert!(registry.decoder_for("tkn.near-imposter.near").is_none());
        assert!(registry.decoder_for("unrelated.near").is_none());
    }
}
