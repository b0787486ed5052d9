//! Core types shared across the strand workspace.

pub mod block;
pub mod types;
pub mod utils;

pub use block::Block;
pub use types::{Account, Amount, BlockHash, HashOrAccount, Signature, WorkNonce};
