use base64::{engine::general_purpose, Engine as _};
use nearlens_core::{EventCause, FunctionCallAction};
use num_bigint::BigInt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// A contract-scoped delta before normalization attaches block coordinates.
#[derive(Clone, Debug)]
pub(crate) struct Entry {
    pub affected: String,
    pub involved: Option<String>,
    pub delta: BigInt,
    pub cause: EventCause,
    pub memo: Option<String>,
}

/// One legacy contract family: inspects the triggering call and the
/// outcome's logs, emits zero or more entries. Unknown methods emit nothing.
pub(crate) type Decoder = fn(&FunctionCallAction, &str, &[String]) -> Vec<Entry>;

// Log shapes of contracts predating the structured event standard.
static WRAP_NEAR_DEPOSIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Deposit (\d+) NEAR to ([\S]+)").unwrap());
static ACCOUNT_BURN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Account @([\S]+) burned (\d+)").unwrap());
static REFUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Refund (\d+) from ([\S]+) to ([\S]+)").unwrap());

#[derive(Deserialize)]
struct FtTransferArgs {
    receiver_id: String,
    amount: String,
    memo: Option<String>,
}

#[derive(Deserialize)]
struct AmountArgs {
    amount: String,
}

#[derive(Deserialize)]
struct MintArgs {
    account_id: String,
    amount: String,
}

#[derive(Deserialize)]
struct NewArgs {
    owner_id: String,
    total_supply: String,
}

/// wrap.near: deposits carry the minted amount only in a log line, the
/// other methods decode from call arguments.
pub(crate) fn wrap_near(call: &FunctionCallAction, predecessor: &str, logs: &[String]) -> Vec<Entry> {
    match call.method_name.as_str() {
        "near_deposit" => logs
            .iter()
            .filter_map(|log| {
                let captures = WRAP_NEAR_DEPOSIT.captures(log)?;
                let amount = parse_amount(&captures[1])?;
                Some(Entry {
                    affected: captures[2].to_string(),
                    involved: None,
                    delta: amount,
                    cause: EventCause::Mint,
                    memo: None,
                })
            })
            .collect(),
        "near_withdraw" => burn_from_args(call, predecessor),
        _ => ft_methods(call, predecessor, logs),
    }
}

/// tkn.near factory tokens: `new` mints the initial supply to the owner.
pub(crate) fn tkn_factory(call: &FunctionCallAction, predecessor: &str, logs: &[String]) -> Vec<Entry> {
    match call.method_name.as_str() {
        "new" => {
            let Some(args) = decode_args::<NewArgs>(&call.args) else {
                return vec![];
            };
            let Some(amount) = parse_amount(&args.total_supply) else {
                return vec![];
            };
            vec![Entry {
                affected: args.owner_id,
                involved: None,
                delta: amount,
                cause: EventCause::Mint,
                memo: None,
            }]
        }
        _ => ft_methods(call, predecessor, logs),
    }
}

/// Rainbow-bridge factory tokens: custodian-driven mint, withdraw burns
/// from the caller before the tokens unlock on the other chain.
pub(crate) fn bridge_token(call: &FunctionCallAction, predecessor: &str, logs: &[String]) -> Vec<Entry> {
    match call.method_name.as_str() {
        "mint" => mint_from_args(call),
        "withdraw" => burn_from_args(call, predecessor),
        _ => ft_methods(call, predecessor, logs),
    }
}

pub(crate) fn ref_finance(call: &FunctionCallAction, predecessor: &str, logs: &[String]) -> Vec<Entry> {
    match call.method_name.as_str() {
        "mint" => mint_from_args(call),
        "burn" => burn_from_args(call, predecessor),
        _ => ft_methods(call, predecessor, logs),
    }
}

/// The NEP-141 method surface shared by every legacy family. The transfer
/// methods decode structured arguments; `ft_resolve_transfer` is a promise
/// callback whose refund delta exists only in logs.
fn ft_methods(call: &FunctionCallAction, predecessor: &str, logs: &[String]) -> Vec<Entry> {
    match call.method_name.as_str() {
        "ft_transfer" | "ft_transfer_call" => {
            let Some(args) = decode_args::<FtTransferArgs>(&call.args) else {
                return vec![];
            };
            let Some(amount) = parse_amount(&args.amount) else {
                return vec![];
            };
            vec![
                Entry {
                    affected: predecessor.to_string(),
                    involved: Some(args.receiver_id.clone()),
                    delta: -amount.clone(),
                    cause: EventCause::TransferOut,
                    memo: args.memo.clone(),
                },
                Entry {
                    affected: args.receiver_id,
                    involved: Some(predecessor.to_string()),
                    delta: amount,
                    cause: EventCause::TransferIn,
                    memo: args.memo,
                },
            ]
        }
        "ft_resolve_transfer" => resolve_transfer(logs),
        _ => vec![],
    }
}

/// Log-only decode path: the unused-amount refund a transfer-call resolves
/// with, independent of the triggering action's arguments.
pub(crate) fn resolve_transfer(logs: &[String]) -> Vec<Entry> {
    let mut entries = vec![];

    for log in logs {
        if let Some(captures) = ACCOUNT_BURN.captures(log) {
            if let Some(amount) = parse_amount(&captures[2]) {
                entries.push(Entry {
                    affected: captures[1].to_string(),
                    involved: None,
                    delta: -amount,
                    cause: EventCause::Burn,
                    memo: None,
                });
            }
        }

        if let Some(captures) = REFUND.captures(log) {
            let (amount, from, to) = (&captures[1], &captures[2], &captures[3]);
            if let Some(amount) = parse_amount(amount) {
                entries.push(Entry {
                    affected: from.to_string(),
                    involved: Some(to.to_string()),
                    delta: -amount.clone(),
                    cause: EventCause::TransferOut,
                    memo: None,
                });
                entries.push(Entry {
                    affected: to.to_string(),
                    involved: Some(from.to_string()),
                    delta: amount,
                    cause: EventCause::TransferIn,
                    memo: None,
                });
            }
        }
    }

    entries
}

fn mint_from_args(call: &FunctionCallAction) -> Vec<Entry> {
    let Some(args) = decode_args::<MintArgs>(&call.args) else {
        return vec![];
    };
    let Some(amount) = parse_amount(&args.amount) else {
        return vec![];
    };
    vec![Entry {
        affected: args.account_id,
        involved: None,
        delta: amount,
        cause: EventCause::Mint,
        memo: None,
    }]
}

fn burn_from_args(call: &FunctionCallAction, predecessor: &str) -> Vec<Entry> {
    let Some(args) = decode_args::<AmountArgs>(&call.args) else {
        return vec![];
    };
    let Some(amount) = parse_amount(&args.amount) else {
        return vec![];
    };
    vec![Entry {
        affected: predecessor.to_string(),
        involved: None,
        delta: -amount,
        cause: EventCause::Burn,
        memo: None,
    }]
}

pub(crate) fn decode_args<T: DeserializeOwned>(args: &str) -> Option<T> {
    let decoded = general_purpose::STANDARD.decode(args).ok()?;
    serde_json::from_slice(&decoded).ok()
}

/// Exact unsigned yocto-scale amount; zero and unparseable amounts yield
/// nothing (matching the legacy contracts' own no-op semantics).
pub(crate) fn parse_amount(raw: &str) -> Option<BigInt> {
    let amount: BigInt = raw.parse().ok()?;
    if amount == BigInt::from(0) {
        return None;
    }
    Some(amount)
}
