//! Serving side of the pull protocol: answers `asc_pull_req` from the
//! local ledger. Stateless; one request in, one acknowledgement out, with
//! the request id mirrored so the remote can pair it.

use crate::messages::{
    AccountInfoPayload, AckPayload, AscPullAck, AscPullReq, BlocksPayload, FrontiersPayload,
    ReqPayload, MAX_PULL_BLOCKS, MAX_PULL_FRONTIERS,
};
use strand_blockchain::Ledger;
use strand_common::{Account, Block, BlockHash, HashOrAccount};
use tracing::trace;

#[derive(Clone)]
pub struct BootstrapServer {
    ledger: Ledger,
}

impl BootstrapServer {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn respond(&self, request: &AscPullReq) -> AscPullAck {
        let payload = match &request.payload {
            ReqPayload::Blocks { start, count } => self.blocks(start, *count),
            ReqPayload::AccountInfo { target } => self.account_info(target),
            ReqPayload::Frontiers { start, count } => self.frontiers(*start, *count),
        };
        trace!(id = request.id, "Serving pull request");
        AscPullAck {
            id: request.id,
            payload,
        }
    }

    /// A run of blocks starting at `start`: from that block itself when
    /// `start` is a known hash, from the open block when it is a known
    /// account, empty otherwise.
    fn blocks(&self, start: &HashOrAccount, count: u8) -> AckPayload {
        let count = count.min(MAX_PULL_BLOCKS) as usize;
        let origin = if self.ledger.block_exists(&start.as_block_hash()) {
            Some(start.as_block_hash())
        } else {
            self.ledger
                .account_info(&start.as_account())
                .map(|info| info.open_block)
        };
        let blocks = match origin {
            Some(origin) => self.collect_chain(origin, count),
            None => Vec::new(),
        };
        AckPayload::Blocks(BlocksPayload { blocks })
    }

    fn collect_chain(&self, origin: BlockHash, count: usize) -> Vec<Block> {
        let mut blocks = Vec::with_capacity(count.min(16));
        let mut cursor = Some(origin);
        while let Some(hash) = cursor {
            if blocks.len() >= count {
                break;
            }
            let Some(block) = self.ledger.block(&hash) else {
                break;
            };
            blocks.push(block);
            cursor = self.ledger.successor(&hash);
        }
        blocks
    }

    fn account_info(&self, target: &HashOrAccount) -> AckPayload {
        let Some(account) = self.ledger.block_account(&target.as_block_hash()) else {
            return AckPayload::Empty;
        };
        let Some(info) = self.ledger.account_info(&account) else {
            return AckPayload::Empty;
        };
        AckPayload::AccountInfo(AccountInfoPayload {
            account,
            account_open: info.open_block,
            account_head: info.head,
            block_count: info.block_count,
            confirmation_height: info.confirmed_height,
            confirmation_frontier: info.confirmed_frontier,
        })
    }

    fn frontiers(&self, start: Account, count: u16) -> AckPayload {
        let count = count.min(MAX_PULL_FRONTIERS) as usize;
        AckPayload::Frontiers(FrontiersPayload {
            frontiers: self.ledger.store().frontiers_from(start, count),
        })
    }
}
