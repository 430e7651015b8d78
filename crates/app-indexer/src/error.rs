use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("[Db] {:?}", _0)]
    Db(#[from] nearlens_db::Error),
    #[error("[Source] {:?}", _0)]
    Source(#[from] nearlens_source::Error),
    #[error("[Join] {:?}", _0)]
    Join(#[from] tokio::task::JoinError),
    #[error("malformed block {height}: {reason}")]
    Malformed { height: u64, reason: String },
}
