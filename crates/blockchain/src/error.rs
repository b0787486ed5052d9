use strand_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid genesis block: {0}")]
    InvalidGenesis(&'static str),
    #[error("account chain shorter than requested height")]
    HeightOutOfRange,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
