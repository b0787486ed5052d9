use strand_common::BlockHash;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block {0} already stored")]
    BlockExists(BlockHash),
    #[error("block {0} not found")]
    BlockNotFound(BlockHash),
}
