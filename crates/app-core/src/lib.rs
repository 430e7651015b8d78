mod block;
mod event;

pub use block::{
    Action, ActionReceipt, Block, BlockHeader, BlockMessage, Chunk, ChunkHeader, DataReceipt,
    DataReceiver, DelegateAction, DeleteAccountAction, DeployContractAction, ExecutionOutcome,
    ExecutionOutcomeView, ExecutionOutcomeWithReceipt, ExecutionStatus, FunctionCallAction,
    ReceiptEnum, ReceiptView, Shard, StakeAction, Transaction, TransactionWithOutcome,
    TransferAction,
};
pub use event::{event_index, CanonicalEvent, EventCause, EventStandard, ORDINALS_PER_SHARD};
