use serde::{Deserialize, Serialize};

/// One fully assembled block as delivered by a block source: the header plus
/// every shard's chunk and execution outcomes. Field names follow the
/// camelCase wire format of the streaming feed; the object-store backend
/// canonicalizes its snake_case payloads into the same shape before
/// deserializing.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BlockMessage {
    pub block: Block,
    pub shards: Vec<Shard>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Block {
    pub author: String,
    pub header: BlockHeader,
    #[serde(default)]
    pub chunks: Vec<ChunkHeader>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    #[serde(with = "u64_string")]
    pub timestamp_nanosec: u64,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub total_supply: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkHeader {
    pub chunk_hash: String,
    pub shard_id: u64,
    #[serde(default)]
    pub gas_limit: u64,
    #[serde(default)]
    pub gas_used: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shard {
    pub shard_id: u64,
    pub chunk: Option<Chunk>,
    #[serde(default)]
    pub receipt_execution_outcomes: Vec<ExecutionOutcomeWithReceipt>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Chunk {
    pub author: String,
    pub header: ChunkHeader,
    #[serde(default)]
    pub receipts: Vec<ReceiptView>,
    #[serde(default)]
    pub transactions: Vec<TransactionWithOutcome>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub receipt_id: String,
    pub predecessor_id: String,
    pub receiver_id: String,
    pub receipt: ReceiptEnum,
}

impl ReceiptView {
    /// The id the causality cache is keyed on: the `dataId` for data
    /// receipts, the `receiptId` otherwise.
    pub fn receipt_or_data_id(&self) -> &str {
        match &self.receipt {
            ReceiptEnum::Data(data) => &data.data_id,
            ReceiptEnum::Action(_) => &self.receipt_id,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ReceiptEnum {
    Action(ActionReceipt),
    Data(DataReceipt),
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionReceipt {
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub gas_price: String,
    #[serde(default)]
    pub input_data_ids: Vec<String>,
    #[serde(default)]
    pub output_data_receivers: Vec<DataReceiver>,
    #[serde(default)]
    pub signer_id: String,
    #[serde(default)]
    pub signer_public_key: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataReceipt {
    pub data_id: String,
    pub data: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataReceiver {
    pub data_id: String,
    pub receiver_id: String,
}

/// A single receipt action. `CreateAccount` arrives as a bare string on the
/// wire, every other kind as a single-key object; serde's external tagging
/// covers both.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Action {
    CreateAccount,
    DeployContract(DeployContractAction),
    FunctionCall(FunctionCallAction),
    Transfer(TransferAction),
    Stake(StakeAction),
    AddKey(serde_json::Value),
    DeleteKey(serde_json::Value),
    DeleteAccount(DeleteAccountAction),
    Delegate(DelegateAction),
}

impl Action {
    pub fn as_function_call(&self) -> Option<&FunctionCallAction> {
        match self {
            Action::FunctionCall(call) => Some(call),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallAction {
    pub method_name: String,
    /// base64-encoded, usually JSON-shaped call arguments.
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub deposit: String,
    #[serde(default)]
    pub gas: u64,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeployContractAction {
    #[serde(default)]
    pub code: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TransferAction {
    pub deposit: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeAction {
    pub stake: String,
    pub public_key: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountAction {
    pub beneficiary_id: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateAction {
    pub delegate_action: serde_json::Value,
    #[serde(default)]
    pub signature: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionWithOutcome {
    pub transaction: Transaction,
    pub outcome: ExecutionOutcomeWithReceipt,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub signer_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl TransactionWithOutcome {
    /// The receipt this transaction converts into, `receiptIds[0]` of its
    /// outcome. Absent only on malformed input.
    pub fn conversion_receipt_id(&self) -> Option<&str> {
        self.outcome
            .execution_outcome
            .outcome
            .receipt_ids
            .first()
            .map(String::as_str)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcomeWithReceipt {
    pub execution_outcome: ExecutionOutcome,
    pub receipt: Option<ReceiptView>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub id: String,
    pub outcome: ExecutionOutcomeView,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcomeView {
    pub executor_id: String,
    #[serde(default)]
    pub gas_burnt: u64,
    #[serde(default)]
    pub tokens_burnt: String,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub receipt_ids: Vec<String>,
    pub status: ExecutionStatus,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum ExecutionStatus {
    Unknown,
    Failure(serde_json::Value),
    SuccessValue(String),
    SuccessReceiptId(String),
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::SuccessValue(_) | ExecutionStatus::SuccessReceiptId(_)
        )
    }
}

/// The feed serializes u64-range numerics (`timestampNanosec`) as strings to
/// stay safe for JavaScript consumers; accept both forms.
mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(value),
            Raw::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}
