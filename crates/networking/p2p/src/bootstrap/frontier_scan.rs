//! Frontier sampling across the whole account space.
//!
//! A fixed set of heads partitions the 256-bit account space into equal
//! ranges. Each head cycles idle → requested → responded: `next` hands out
//! the position of the least-recently-asked idle head, `process` feeds the
//! response back. Once a head has accumulated enough responses it advances
//! past the highest account it saw; heads that keep coming back empty snap
//! back to their range start after a bounded number of retries.

use super::config::FrontierScanConfig;
use std::collections::BTreeSet;
use std::time::Instant;
use strand_common::{Account, BlockHash};
use tracing::trace;

pub struct FrontierScan {
    config: FrontierScanConfig,
    heads: Vec<FrontierHead>,
}

struct FrontierHead {
    /// Inclusive lower bound of the range.
    start: Account,
    /// Exclusive upper bound; `None` for the last head.
    end: Option<Account>,
    /// Where the next request starts.
    next: Account,
    /// Accounts observed since the last advance.
    candidates: BTreeSet<Account>,
    /// Responses processed since the last advance.
    responses: usize,
    /// Consecutive advances that found no candidates.
    retries: u32,
    /// Last hand-out, for cooldown and least-recently-asked ordering.
    requested: Option<Instant>,
}

impl FrontierScan {
    pub fn new(config: FrontierScanConfig) -> Self {
        let parallelism = config.head_parallelism.max(1);
        let heads = (0..parallelism)
            .map(|index| {
                let start = Account::range_start(index, parallelism);
                let end = (index + 1 < parallelism)
                    .then(|| Account::range_start(index + 1, parallelism));
                FrontierHead {
                    start,
                    end,
                    next: start,
                    candidates: BTreeSet::new(),
                    responses: 0,
                    retries: 0,
                    requested: None,
                }
            })
            .collect();
        Self { config, heads }
    }

    /// Start account for the next frontier request: the least-recently
    /// asked head outside its cooldown. `None` while every head cools down.
    pub fn next(&mut self, now: Instant) -> Option<Account> {
        let cooldown = self.config.cooldown;
        let head = self
            .heads
            .iter_mut()
            .filter(|head| {
                head.requested
                    .map(|at| at + cooldown <= now)
                    .unwrap_or(true)
            })
            .min_by_key(|head| head.requested)?;
        head.requested = Some(now);
        Some(head.next)
    }

    /// Feeds a response for the request that started at `start`. Returns
    /// whether the owning head advanced.
    pub fn process(&mut self, start: Account, frontiers: &[(Account, BlockHash)]) -> bool {
        let Some(head) = self
            .heads
            .iter_mut()
            .rev()
            .find(|head| head.start <= start)
        else {
            return false;
        };
        head.responses += 1;
        for (account, _) in frontiers {
            let in_range = *account >= head.start
                && head.end.map(|end| *account < end).unwrap_or(true);
            if in_range {
                head.candidates.insert(*account);
            }
        }
        while head.candidates.len() > self.config.candidates {
            head.candidates.pop_last();
        }
        if head.responses < self.config.consideration_count {
            return false;
        }
        Self::advance(head, self.config.max_retries);
        true
    }

    fn advance(head: &mut FrontierHead, max_retries: u32) {
        match head.candidates.last() {
            Some(last) => {
                head.retries = 0;
                head.next = match last.checked_increment() {
                    Some(next) if head.end.map(|end| next < end).unwrap_or(true) => next,
                    _ => head.start,
                };
            }
            None => {
                head.retries += 1;
                if head.retries >= max_retries {
                    head.retries = 0;
                    head.next = head.start;
                }
            }
        }
        trace!(start = %head.start, next = %head.next, "Frontier head advanced");
        head.candidates.clear();
        head.responses = 0;
    }

    pub fn head_count(&self) -> usize {
        self.heads.len()
    }

    pub fn candidate_count(&self) -> usize {
        self.heads.iter().map(|head| head.candidates.len()).sum()
    }
}
