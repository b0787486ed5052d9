//! Read surface over the store, shared by the block processor, the
//! bootstrap service and the pull responder.

use crate::error::ChainError;
use strand_common::{Account, Block, BlockHash};
use strand_storage::{AccountInfo, Store};

#[derive(Clone)]
pub struct Ledger {
    store: Store,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn block_exists(&self, hash: &BlockHash) -> bool {
        self.store.contains_block(hash)
    }

    /// Whether the block exists below its account's confirmation height.
    pub fn confirmed_block_exists(&self, hash: &BlockHash) -> bool {
        let Some(height) = self.store.block_height(hash) else {
            return false;
        };
        let Some(block) = self.store.block(hash) else {
            return false;
        };
        self.store
            .account_info(&block.account)
            .map(|info| height <= info.confirmed_height)
            .unwrap_or(false)
    }

    pub fn block(&self, hash: &BlockHash) -> Option<Block> {
        self.store.block(hash)
    }

    pub fn successor(&self, hash: &BlockHash) -> Option<BlockHash> {
        self.store.successor(hash)
    }

    pub fn account_info(&self, account: &Account) -> Option<AccountInfo> {
        self.store.account_info(account)
    }

    /// The account that owns `hash`, if the block is known.
    pub fn block_account(&self, hash: &BlockHash) -> Option<Account> {
        self.store.block(hash).map(|block| block.account)
    }

    pub fn account_count(&self) -> u64 {
        self.store.account_count()
    }

    pub fn block_count(&self) -> u64 {
        self.store.block_count()
    }

    /// Installs the genesis open block directly, bypassing the processor.
    /// The genesis block is its own confirmed frontier.
    pub fn insert_genesis(&self, genesis: &Block) -> Result<(), ChainError> {
        if !genesis.is_open() {
            return Err(ChainError::InvalidGenesis("previous must be zero"));
        }
        if genesis.account.is_zero() {
            return Err(ChainError::InvalidGenesis("account must be set"));
        }
        let hash = genesis.hash();
        self.store.insert_block(genesis, 1)?;
        self.store.put_account_info(
            genesis.account,
            AccountInfo {
                head: hash,
                open_block: hash,
                block_count: 1,
                confirmed_height: 1,
                confirmed_frontier: hash,
            },
        );
        Ok(())
    }

    /// Raises an account's confirmation height, resolving the frontier by
    /// walking successors from the open block.
    pub fn confirm_up_to(&self, account: &Account, height: u64) -> Result<(), ChainError> {
        let mut info = self
            .store
            .account_info(account)
            .ok_or(ChainError::HeightOutOfRange)?;
        if height > info.block_count {
            return Err(ChainError::HeightOutOfRange);
        }
        let mut frontier = info.open_block;
        for _ in 1..height {
            frontier = self
                .store
                .successor(&frontier)
                .ok_or(ChainError::HeightOutOfRange)?;
        }
        info.confirmed_height = height;
        info.confirmed_frontier = frontier;
        self.store.put_account_info(*account, info);
        Ok(())
    }
}
