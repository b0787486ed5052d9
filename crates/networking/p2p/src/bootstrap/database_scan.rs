//! Round-robin crawl over accounts the ledger already knows.
//!
//! Two chunked cursors, one over the account table and one over distinct
//! pending receivers, interleaved so neither table starves the other. Each
//! cursor wraps at the end of its table, bumping a generation counter; a
//! short cooldown between passes keeps a small ledger from re-requesting
//! itself in a tight loop.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use strand_blockchain::Ledger;
use strand_common::Account;

const BATCH_SIZE: usize = 256;

/// Minimum delay before a cursor starts another full pass.
const PASS_COOLDOWN: Duration = Duration::from_secs(1);

pub struct DatabaseScan {
    ledger: Ledger,
    accounts: Cursor,
    pending: Cursor,
    queue: VecDeque<Account>,
}

struct Cursor {
    next: Account,
    /// Completed full passes.
    completed: u64,
    last_pass: Option<Instant>,
}

impl Cursor {
    fn new() -> Self {
        Self {
            next: Account::ZERO,
            completed: 0,
            last_pass: None,
        }
    }

    fn cooling_down(&self, now: Instant) -> bool {
        self.last_pass
            .map(|finished| finished + PASS_COOLDOWN > now)
            .unwrap_or(false)
    }

    fn advance(&mut self, batch: &[Account], requested: usize, now: Instant) {
        match batch.last() {
            Some(last) if batch.len() == requested => match last.checked_increment() {
                Some(next) => self.next = next,
                None => self.wrap(now),
            },
            // Short batch: the table is exhausted
            _ => self.wrap(now),
        }
    }

    fn wrap(&mut self, now: Instant) {
        self.next = Account::ZERO;
        self.completed += 1;
        self.last_pass = Some(now);
    }
}

impl DatabaseScan {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            accounts: Cursor::new(),
            pending: Cursor::new(),
            queue: VecDeque::new(),
        }
    }

    /// Next account the filter accepts, or `None` when both tables are
    /// exhausted or cooling down.
    pub fn next(&mut self, filter: impl Fn(&Account) -> bool) -> Option<Account> {
        if self.queue.is_empty() {
            self.fill();
        }
        while let Some(account) = self.queue.pop_front() {
            if filter(&account) {
                return Some(account);
            }
        }
        None
    }

    /// Whether both tables have been crawled at least once. Throttling only
    /// kicks in after the first full pass.
    pub fn warmed_up(&self) -> bool {
        self.accounts.completed > 0 && self.pending.completed > 0
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    fn fill(&mut self) {
        let now = Instant::now();
        if !self.accounts.cooling_down(now) {
            let batch = self.ledger.store().accounts_from(self.accounts.next, BATCH_SIZE);
            self.accounts.advance(&batch, BATCH_SIZE, now);
            self.queue.extend(batch);
        }
        if !self.pending.cooling_down(now) {
            let batch = self
                .ledger
                .store()
                .pending_receivers_from(self.pending.next, BATCH_SIZE);
            self.pending.advance(&batch, BATCH_SIZE, now);
            self.queue.extend(batch);
        }
    }
}
