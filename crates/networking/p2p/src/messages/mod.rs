//! Bootstrap wire messages.
//!
//! Two message kinds cover the whole pull protocol: `asc_pull_req` asks a
//! peer for blocks, account info or frontiers, and `asc_pull_ack` answers
//! with the matching payload. The responder must mirror the request id so
//! the requester can pair the reply with its in-flight bookkeeping.

pub mod codec;

pub use codec::DecodeError;

use strand_common::{Account, Block, BlockHash, HashOrAccount};

/// Correlates a pull request with its acknowledgement.
pub type PullId = u64;

pub fn generate_pull_id() -> PullId {
    rand::random()
}

/// Most blocks a single pull may request or return.
pub const MAX_PULL_BLOCKS: u8 = 128;

/// Most frontiers a single pull may request or return.
pub const MAX_PULL_FRONTIERS: u16 = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    AscPullReq(AscPullReq),
    AscPullAck(AscPullAck),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AscPullReq {
    pub id: PullId,
    pub payload: ReqPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReqPayload {
    /// Pull a run of blocks. `start` is either a block hash (continue past
    /// that block) or an account (start from the open block); the responder
    /// resolves the ambiguity against its ledger.
    Blocks { start: HashOrAccount, count: u8 },
    /// Ask which account owns the block `target` and where that account
    /// stands.
    AccountInfo { target: HashOrAccount },
    /// Sample account frontiers starting at `start`.
    Frontiers { start: Account, count: u16 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AscPullAck {
    pub id: PullId,
    pub payload: AckPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AckPayload {
    Blocks(BlocksPayload),
    AccountInfo(AccountInfoPayload),
    Frontiers(FrontiersPayload),
    /// The responder had nothing to say for the request.
    Empty,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlocksPayload {
    /// Oldest first; each block is the predecessor of the next.
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountInfoPayload {
    pub account: Account,
    pub account_open: BlockHash,
    pub account_head: BlockHash,
    pub block_count: u64,
    pub confirmation_height: u64,
    pub confirmation_frontier: BlockHash,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontiersPayload {
    /// Strictly increasing by account.
    pub frontiers: Vec<(Account, BlockHash)>,
}
