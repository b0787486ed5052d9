//! The block processor: sole writer of the ledger.
//!
//! Blocks from any origin are enqueued and resolved on a dedicated thread
//! to exactly one [`BlockStatus`]. `Progress` applies the block (head and
//! sideband update, pending bookkeeping); every other status leaves the
//! ledger untouched. Batch observers see every result in processing order.

use crate::ledger::Ledger;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{Builder, JoinHandle};
use strand_common::{Account, Amount, Block, BlockHash};
use strand_storage::{PendingInfo, PendingKey};
use tracing::{debug, error, trace};

/// Largest number of blocks resolved per batch before observers run.
const BATCH_MAX: usize = 256;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockStatus {
    /// A new block, applied to the ledger.
    Progress,
    /// The predecessor is not known yet.
    GapPrevious,
    /// The receive's source block is not known yet.
    GapSource,
    /// Already present in the ledger.
    Old,
    /// The predecessor already has a different successor.
    Fork,
    /// The source block exists but there is nothing receivable from it.
    Unreceivable,
    /// Malformed or inconsistent with the account state.
    Invalid,
}

/// Where a block entered the node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockSource {
    Live,
    Bootstrap,
    Local,
}

#[derive(Clone)]
pub struct BlockResult {
    pub status: BlockStatus,
    pub block: Arc<Block>,
    pub source: BlockSource,
}

type BatchObserver = Box<dyn Fn(&[BlockResult]) + Send + Sync>;

#[derive(Default)]
struct Queue {
    entries: VecDeque<(Arc<Block>, BlockSource)>,
    stopped: bool,
}

pub struct BlockProcessor {
    ledger: Ledger,
    queue: Mutex<Queue>,
    condition: Condvar,
    observers: Mutex<Vec<BatchObserver>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl BlockProcessor {
    pub fn new(ledger: Ledger) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            ledger,
            queue: Mutex::new(Queue::default()),
            condition: Condvar::new(),
            observers: Mutex::new(Vec::new()),
            thread: Mutex::new(None),
            weak_self: weak_self.clone(),
        })
    }

    /// Registers an observer for processed batches. Observers run on the
    /// processing thread, serialized, after each batch is applied.
    pub fn on_batch_processed(&self, observer: BatchObserver) {
        self.observers
            .lock()
            .expect("observers lock poisoned")
            .push(observer);
    }

    pub fn add(&self, block: Block, source: BlockSource) {
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        if queue.stopped {
            return;
        }
        queue.entries.push_back((Arc::new(block), source));
        drop(queue);
        self.condition.notify_all();
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().expect("queue lock poisoned").entries.len()
    }

    pub fn start(&self) {
        let processor = self.weak_self.upgrade().expect("processor already dropped");
        let handle = Builder::new()
            .name("Block processing".into())
            .spawn(move || processor.run())
            .expect("failed to spawn block processor thread");
        *self.thread.lock().expect("thread handle lock poisoned") = Some(handle);
    }

    pub fn stop(&self) {
        {
            let mut queue = self.queue.lock().expect("queue lock poisoned");
            queue.stopped = true;
        }
        self.condition.notify_all();
        let handle = self
            .thread
            .lock()
            .expect("thread handle lock poisoned")
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Resolves and (on `Progress`) applies a single block on the calling
    /// thread, without observer notification. Used for locally originated
    /// blocks and by tests.
    pub fn process_blocking(&self, block: &Block) -> BlockStatus {
        let status = self.resolve_and_apply(block);
        trace!(status = ?status, hash = %block.hash(), "Processed block");
        status
    }

    fn run(&self) {
        loop {
            let batch = {
                let mut queue = self.queue.lock().expect("queue lock poisoned");
                while queue.entries.is_empty() && !queue.stopped {
                    queue = self
                        .condition
                        .wait(queue)
                        .expect("queue lock poisoned");
                }
                if queue.stopped {
                    return;
                }
                let take = queue.entries.len().min(BATCH_MAX);
                queue.entries.drain(..take).collect::<Vec<_>>()
            };

            let results: Vec<BlockResult> = batch
                .into_iter()
                .map(|(block, source)| {
                    let status = self.resolve_and_apply(&block);
                    trace!(status = ?status, hash = %block.hash(), ?source, "Processed block");
                    BlockResult {
                        status,
                        block,
                        source,
                    }
                })
                .collect();

            let observers = self.observers.lock().expect("observers lock poisoned");
            for observer in observers.iter() {
                observer(&results);
            }
        }
    }

    fn resolve_and_apply(&self, block: &Block) -> BlockStatus {
        let hash = block.hash();
        if self.ledger.block_exists(&hash) {
            return BlockStatus::Old;
        }
        if block.account.is_zero() {
            return BlockStatus::Invalid;
        }
        if block.is_open() {
            self.resolve_open(block, hash)
        } else {
            self.resolve_successor(block, hash)
        }
    }

    fn resolve_open(&self, block: &Block, hash: BlockHash) -> BlockStatus {
        if self.ledger.account_info(&block.account).is_some() {
            // Second open block for the account
            return BlockStatus::Fork;
        }
        let source = block.link_as_source();
        if source.is_zero() {
            return BlockStatus::Invalid;
        }
        if !self.ledger.block_exists(&source) {
            return BlockStatus::GapSource;
        }
        let key = PendingKey {
            receiver: block.account,
            send_hash: source,
        };
        let Some(pending) = self.ledger.store().pending_info(&key) else {
            return BlockStatus::Unreceivable;
        };
        if block.balance != pending.amount {
            return BlockStatus::Invalid;
        }
        self.apply(block, hash, 1, None, Some(key), None)
    }

    fn resolve_successor(&self, block: &Block, hash: BlockHash) -> BlockStatus {
        let Some(previous) = self.ledger.block(&block.previous) else {
            return BlockStatus::GapPrevious;
        };
        if previous.account != block.account {
            return BlockStatus::Invalid;
        }
        if self.ledger.successor(&block.previous).is_some() {
            // The predecessor already continues elsewhere
            return BlockStatus::Fork;
        }
        let height = self
            .ledger
            .store()
            .block_height(&block.previous)
            .unwrap_or(0)
            + 1;
        if block.balance < previous.balance {
            // Send
            let destination = block.link_as_destination();
            if destination.is_zero() {
                return BlockStatus::Invalid;
            }
            let amount = previous
                .balance
                .checked_sub(block.balance)
                .unwrap_or(Amount::ZERO);
            let pending = (
                PendingKey {
                    receiver: destination,
                    send_hash: hash,
                },
                PendingInfo {
                    source: block.account,
                    amount,
                },
            );
            self.apply(block, hash, height, Some(block.previous), None, Some(pending))
        } else if block.balance > previous.balance {
            // Receive
            let source = block.link_as_source();
            if source.is_zero() {
                return BlockStatus::Invalid;
            }
            if !self.ledger.block_exists(&source) {
                return BlockStatus::GapSource;
            }
            let key = PendingKey {
                receiver: block.account,
                send_hash: source,
            };
            let Some(pending) = self.ledger.store().pending_info(&key) else {
                return BlockStatus::Unreceivable;
            };
            let expected = previous.balance.checked_add(pending.amount);
            if expected != Some(block.balance) {
                return BlockStatus::Invalid;
            }
            self.apply(block, hash, height, Some(block.previous), Some(key), None)
        } else {
            // Representative change carries no link
            if !block.link.is_zero() {
                return BlockStatus::Invalid;
            }
            self.apply(block, hash, height, Some(block.previous), None, None)
        }
    }

    fn apply(
        &self,
        block: &Block,
        hash: BlockHash,
        height: u64,
        previous: Option<BlockHash>,
        consumed_pending: Option<PendingKey>,
        created_pending: Option<(PendingKey, PendingInfo)>,
    ) -> BlockStatus {
        let store = self.ledger.store();
        if let Err(err) = self.insert(block, hash, height, previous) {
            error!(%err, hash = %hash, "Ledger write failed, block dropped");
            return BlockStatus::Invalid;
        }
        if let Some(key) = consumed_pending {
            store.remove_pending(&key);
        }
        if let Some((key, info)) = created_pending {
            store.put_pending(key, info);
        }
        debug!(hash = %hash, account = %block.account, height, "Block applied");
        BlockStatus::Progress
    }

    fn insert(
        &self,
        block: &Block,
        hash: BlockHash,
        height: u64,
        previous: Option<BlockHash>,
    ) -> Result<(), strand_storage::StoreError> {
        let store = self.ledger.store();
        store.insert_block(block, height)?;
        if let Some(previous) = previous {
            store.set_successor(&previous, hash)?;
        }
        let mut info = self
            .ledger
            .account_info(&block.account)
            .unwrap_or_default();
        if info.open_block.is_zero() {
            info.open_block = hash;
        }
        info.head = hash;
        info.block_count = height;
        store.put_account_info(block.account, info);
        Ok(())
    }
}

/// Builds an unprocessed genesis open block for `account` holding the whole
/// supply. Install it with [`Ledger::insert_genesis`].
pub fn genesis_block(account: Account) -> Block {
    let mut block = Block {
        account,
        previous: BlockHash::ZERO,
        representative: account,
        balance: Amount::MAX,
        link: strand_common::HashOrAccount::ZERO,
        signature: strand_common::Signature::default(),
        work: 0,
    };
    block.fill_signature();
    block
}
