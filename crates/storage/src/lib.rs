//! In-memory ledger store.
//!
//! One synchronized set of tables: blocks with their sideband, account
//! infos, and pending (receivable) entries. The store is deliberately dumb;
//! chain semantics live in `strand-blockchain`. Methods take `&self` and the
//! store is cheap to clone and share.

pub mod error;

pub use error::StoreError;

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use strand_common::{Account, Amount, Block, BlockHash};

/// Everything the ledger tracks about one account chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountInfo {
    pub head: BlockHash,
    pub open_block: BlockHash,
    pub block_count: u64,
    pub confirmed_height: u64,
    pub confirmed_frontier: BlockHash,
}

/// Metadata stored next to every block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockSideband {
    /// 1-based position in the account chain.
    pub height: u64,
    pub successor: Option<BlockHash>,
}

#[derive(Clone, Debug)]
struct BlockEntry {
    block: Block,
    sideband: BlockSideband,
}

/// Key of a receivable entry: the destination account and the send block
/// that funds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingKey {
    pub receiver: Account,
    pub send_hash: BlockHash,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingInfo {
    pub source: Account,
    pub amount: Amount,
}

#[derive(Default)]
struct StoreInner {
    blocks: FxHashMap<BlockHash, BlockEntry>,
    accounts: BTreeMap<Account, AccountInfo>,
    pending: BTreeMap<PendingKey, PendingInfo>,
}

#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<StoreInner>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.inner.read().expect("store lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().expect("store lock poisoned")
    }

    // Blocks

    pub fn contains_block(&self, hash: &BlockHash) -> bool {
        self.read().blocks.contains_key(hash)
    }

    pub fn block(&self, hash: &BlockHash) -> Option<Block> {
        self.read().blocks.get(hash).map(|entry| entry.block.clone())
    }

    pub fn block_height(&self, hash: &BlockHash) -> Option<u64> {
        self.read().blocks.get(hash).map(|entry| entry.sideband.height)
    }

    pub fn successor(&self, hash: &BlockHash) -> Option<BlockHash> {
        self.read().blocks.get(hash)?.sideband.successor
    }

    pub fn insert_block(&self, block: &Block, height: u64) -> Result<(), StoreError> {
        let hash = block.hash();
        let mut inner = self.write();
        if inner.blocks.contains_key(&hash) {
            return Err(StoreError::BlockExists(hash));
        }
        inner.blocks.insert(
            hash,
            BlockEntry {
                block: block.clone(),
                sideband: BlockSideband {
                    height,
                    successor: None,
                },
            },
        );
        Ok(())
    }

    pub fn set_successor(&self, hash: &BlockHash, successor: BlockHash) -> Result<(), StoreError> {
        let mut inner = self.write();
        let entry = inner
            .blocks
            .get_mut(hash)
            .ok_or(StoreError::BlockNotFound(*hash))?;
        entry.sideband.successor = Some(successor);
        Ok(())
    }

    pub fn block_count(&self) -> u64 {
        self.read().blocks.len() as u64
    }

    // Accounts

    pub fn account_info(&self, account: &Account) -> Option<AccountInfo> {
        self.read().accounts.get(account).cloned()
    }

    pub fn put_account_info(&self, account: Account, info: AccountInfo) {
        self.write().accounts.insert(account, info);
    }

    pub fn account_count(&self) -> u64 {
        self.read().accounts.len() as u64
    }

    /// Accounts in lexical order starting at `start` (inclusive), at most
    /// `max` of them.
    pub fn accounts_from(&self, start: Account, max: usize) -> Vec<Account> {
        self.read()
            .accounts
            .range(start..)
            .take(max)
            .map(|(account, _)| *account)
            .collect()
    }

    /// Account frontiers in lexical order starting at `start` (inclusive).
    pub fn frontiers_from(&self, start: Account, max: usize) -> Vec<(Account, BlockHash)> {
        self.read()
            .accounts
            .range(start..)
            .take(max)
            .map(|(account, info)| (*account, info.head))
            .collect()
    }

    // Pending

    pub fn pending_info(&self, key: &PendingKey) -> Option<PendingInfo> {
        self.read().pending.get(key).copied()
    }

    pub fn put_pending(&self, key: PendingKey, info: PendingInfo) {
        self.write().pending.insert(key, info);
    }

    pub fn remove_pending(&self, key: &PendingKey) -> Option<PendingInfo> {
        self.write().pending.remove(key)
    }

    pub fn pending_count(&self) -> u64 {
        self.read().pending.len() as u64
    }

    /// Distinct receiver accounts with pending entries, in lexical order
    /// starting at `start` (inclusive), at most `max` of them.
    pub fn pending_receivers_from(&self, start: Account, max: usize) -> Vec<Account> {
        let inner = self.read();
        let mut receivers = Vec::with_capacity(max);
        let mut cursor = PendingKey {
            receiver: start,
            send_hash: BlockHash::ZERO,
        };
        loop {
            let Some((key, _)) = inner.pending.range(cursor..).next() else {
                break;
            };
            receivers.push(key.receiver);
            if receivers.len() >= max {
                break;
            }
            let Some(next_receiver) = key.receiver.checked_increment() else {
                break;
            };
            cursor = PendingKey {
                receiver: next_receiver,
                send_hash: BlockHash::ZERO,
            };
        }
        receivers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_common::{HashOrAccount, Signature};

    fn block_for(account: Account, previous: BlockHash) -> Block {
        Block {
            account,
            previous,
            representative: account,
            balance: Amount::raw(100),
            link: HashOrAccount::ZERO,
            signature: Signature::default(),
            work: 0,
        }
    }

    #[test]
    fn insert_block_rejects_duplicates() {
        let store = Store::new();
        let block = block_for(Account::from_low_u64_be(1), BlockHash::ZERO);
        store.insert_block(&block, 1).unwrap();
        assert!(matches!(
            store.insert_block(&block, 1),
            Err(StoreError::BlockExists(_))
        ));
        assert_eq!(store.block_count(), 1);
    }

    #[test]
    fn successor_tracking() {
        let store = Store::new();
        let first = block_for(Account::from_low_u64_be(1), BlockHash::ZERO);
        let second = block_for(Account::from_low_u64_be(1), first.hash());
        store.insert_block(&first, 1).unwrap();
        store.insert_block(&second, 2).unwrap();
        store.set_successor(&first.hash(), second.hash()).unwrap();
        assert_eq!(store.successor(&first.hash()), Some(second.hash()));
        assert_eq!(store.successor(&second.hash()), None);
        assert_eq!(store.block_height(&second.hash()), Some(2));
    }

    #[test]
    fn accounts_from_is_ordered_and_bounded() {
        let store = Store::new();
        for n in [5u64, 1, 9, 3] {
            store.put_account_info(Account::from_low_u64_be(n), AccountInfo::default());
        }
        let accounts = store.accounts_from(Account::from_low_u64_be(2), 2);
        assert_eq!(
            accounts,
            vec![Account::from_low_u64_be(3), Account::from_low_u64_be(5)]
        );
    }

    #[test]
    fn pending_receivers_deduplicate_per_account() {
        let store = Store::new();
        let receiver = Account::from_low_u64_be(7);
        for n in 0..3u64 {
            store.put_pending(
                PendingKey {
                    receiver,
                    send_hash: BlockHash::from_low_u64_be(n),
                },
                PendingInfo {
                    source: Account::from_low_u64_be(1),
                    amount: Amount::raw(1),
                },
            );
        }
        store.put_pending(
            PendingKey {
                receiver: Account::from_low_u64_be(9),
                send_hash: BlockHash::from_low_u64_be(1),
            },
            PendingInfo {
                source: Account::from_low_u64_be(1),
                amount: Amount::raw(1),
            },
        );
        let receivers = store.pending_receivers_from(Account::ZERO, 10);
        assert_eq!(
            receivers,
            vec![receiver, Account::from_low_u64_be(9)]
        );
    }
}
