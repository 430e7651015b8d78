use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("[Sqlx] {:?}", _0)]
    Sqlx(#[from] sqlx::Error),
    #[error("[Numeric] {:?}", _0)]
    Numeric(#[from] bigdecimal::ParseBigDecimalError),
}
