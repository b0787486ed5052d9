//! Chain semantics over the raw store: the ledger read surface and the
//! block processor that drives all ledger writes.

pub mod block_processor;
pub mod error;
pub mod ledger;

pub use block_processor::{BlockProcessor, BlockResult, BlockSource, BlockStatus};
pub use error::ChainError;
pub use ledger::Ledger;
