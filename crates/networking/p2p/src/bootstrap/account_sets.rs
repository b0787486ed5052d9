//! Accounts the bootstrap wants to pull, and accounts it cannot.
//!
//! An account is in at most one of two sets. The priority set orders
//! pullable accounts by a bounded floating-point priority; the blocking set
//! parks accounts stalled on a missing dependency block until that
//! dependency lands or is resolved to its owning account.
//!
//! Both sets keep an `IndexMap` primary (lookup + O(1) random slot access
//! for sampling) and a `BTreeSet` rank index keyed by (priority bits,
//! last-touched sequence) for lowest-first eviction. Priorities are always
//! positive, so the IEEE bit pattern orders them correctly.

use super::config::AccountSetsConfig;
use indexmap::IndexMap;
use rand::Rng;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::time::Instant;
use strand_common::{Account, BlockHash};
use tracing::trace;

#[derive(Clone, Copy, Debug)]
pub struct PriorityEntry {
    pub priority: f64,
    pub fails: u32,
    /// Last hand-out; pulls within the cooldown are ineligible.
    pub timestamp: Option<Instant>,
    seq: u64,
}

#[derive(Clone, Copy, Debug)]
struct BlockingEntry {
    entry: PriorityEntry,
    dependency: BlockHash,
    /// Filled in once an `account_info` response names the owner.
    dependency_account: Option<Account>,
}

/// Outcome of a weighted priority pick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorityResult {
    pub account: Account,
    pub priority: f64,
    pub fails: u32,
}

type RankKey = (u64, u64, Account);

pub struct AccountSets {
    config: AccountSetsConfig,
    priorities: IndexMap<Account, PriorityEntry>,
    priorities_by_rank: BTreeSet<RankKey>,
    blocking: IndexMap<Account, BlockingEntry>,
    blocking_by_rank: BTreeSet<RankKey>,
    blocking_by_dependency: FxHashMap<BlockHash, Vec<Account>>,
    seq: u64,
}

fn rank_key(account: &Account, entry: &PriorityEntry) -> RankKey {
    (entry.priority.to_bits(), entry.seq, *account)
}

impl AccountSets {
    pub fn new(config: AccountSetsConfig) -> Self {
        Self {
            config,
            priorities: IndexMap::new(),
            priorities_by_rank: BTreeSet::new(),
            blocking: IndexMap::new(),
            blocking_by_rank: BTreeSet::new(),
            blocking_by_dependency: FxHashMap::default(),
            seq: 0,
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Bumps an account up, inserting it at the initial priority if absent.
    /// Blocked accounts are left alone.
    pub fn priority_up(&mut self, account: &Account) {
        if account.is_zero() || self.blocking.contains_key(account) {
            return;
        }
        match self.priorities.get_mut(account) {
            Some(entry) => {
                let old_key = rank_key(account, entry);
                entry.priority =
                    (entry.priority * self.config.priority_increase).min(self.config.priority_max);
                entry.fails = 0;
                let new_key = rank_key(account, entry);
                self.priorities_by_rank.remove(&old_key);
                self.priorities_by_rank.insert(new_key);
            }
            None => {
                let entry = PriorityEntry {
                    priority: self.config.priority_initial,
                    fails: 0,
                    timestamp: None,
                    seq: self.next_seq(),
                };
                self.insert_priority(*account, entry);
            }
        }
    }

    /// Decays an account after a fruitless or invalid response; erases it
    /// once it fails too often or decays below the cutoff.
    pub fn priority_down(&mut self, account: &Account) {
        let Some(entry) = self.priorities.get_mut(account) else {
            return;
        };
        let old_key = rank_key(account, entry);
        entry.fails += 1;
        entry.priority *= self.config.priority_decrease;
        if entry.fails >= self.config.max_fails || entry.priority < self.config.priority_cutoff {
            self.priorities_by_rank.remove(&old_key);
            self.priorities.swap_remove(account);
            trace!(account = %account, "Priority erased");
        } else {
            let new_key = rank_key(account, entry);
            self.priorities_by_rank.remove(&old_key);
            self.priorities_by_rank.insert(new_key);
        }
    }

    /// Force-inserts an account at `priority`; no-op if already tracked.
    /// Returns whether it was inserted.
    pub fn priority_set(&mut self, account: &Account, priority: f64) -> bool {
        if account.is_zero()
            || self.priorities.contains_key(account)
            || self.blocking.contains_key(account)
        {
            return false;
        }
        let entry = PriorityEntry {
            priority,
            fails: 0,
            timestamp: None,
            seq: self.next_seq(),
        };
        self.insert_priority(*account, entry);
        true
    }

    /// Parks an account until `dependency` shows up. The current priority
    /// entry is preserved for the eventual unblock.
    pub fn block(&mut self, account: &Account, dependency: BlockHash) {
        if account.is_zero() || self.blocking.contains_key(account) {
            // Already blocked entries keep their first dependency
            return;
        }
        let entry = match self.priorities.swap_remove(account) {
            Some(entry) => {
                self.priorities_by_rank.remove(&rank_key(account, &entry));
                entry
            }
            None => PriorityEntry {
                priority: self.config.priority_initial,
                fails: 0,
                timestamp: None,
                seq: self.next_seq(),
            },
        };
        if self.blocking.len() >= self.config.blocking_max {
            let victim = self.blocking_by_rank.iter().next().copied();
            if let Some((_, _, victim)) = victim {
                self.remove_blocking(&victim);
            }
        }
        self.blocking_by_rank.insert(rank_key(account, &entry));
        self.blocking_by_dependency
            .entry(dependency)
            .or_default()
            .push(*account);
        self.blocking.insert(
            *account,
            BlockingEntry {
                entry,
                dependency,
                dependency_account: None,
            },
        );
        trace!(account = %account, dependency = %dependency, "Account blocked");
    }

    /// Moves an account back into the priority set. With `hash` given, only
    /// if it matches the remembered dependency. Returns whether anything
    /// was unblocked.
    pub fn unblock(&mut self, account: &Account, hash: Option<BlockHash>) -> bool {
        let Some(blocked) = self.blocking.get(account) else {
            return false;
        };
        if let Some(hash) = hash {
            if blocked.dependency != hash {
                return false;
            }
        }
        let blocked = self
            .remove_blocking(account)
            .expect("blocking entry vanished");
        self.insert_priority(*account, blocked.entry);
        trace!(account = %account, "Account unblocked");
        true
    }

    /// Records the owner of a dependency block on every entry stalled on
    /// it. Returns how many entries were updated.
    pub fn dependency_update(
        &mut self,
        dependency: &BlockHash,
        dependency_account: Account,
    ) -> usize {
        let Some(accounts) = self.blocking_by_dependency.get(dependency) else {
            return 0;
        };
        let mut updated = 0;
        for account in accounts.clone() {
            if let Some(blocked) = self.blocking.get_mut(&account) {
                if blocked.dependency_account != Some(dependency_account) {
                    blocked.dependency_account = Some(dependency_account);
                    updated += 1;
                }
            }
        }
        updated
    }

    /// Weighted-random pick over accounts outside their cooldown that the
    /// filter accepts. Samples a bounded number of uniformly random
    /// entries and keeps the strongest, which is monotone in priority.
    pub fn next_priority(
        &mut self,
        now: Instant,
        filter: impl Fn(&Account) -> bool,
    ) -> Option<PriorityResult> {
        if self.priorities.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let mut best: Option<(Account, f64, u32)> = None;
        for _ in 0..self.config.consideration_count.max(1) {
            let index = rng.gen_range(0..self.priorities.len());
            let (account, entry) = self.priorities.get_index(index).expect("index in range");
            let eligible = entry
                .timestamp
                .map(|timestamp| timestamp + self.config.cooldown <= now)
                .unwrap_or(true);
            if !eligible || !filter(account) {
                continue;
            }
            match best {
                Some((_, priority, _)) if priority >= entry.priority => {}
                _ => best = Some((*account, entry.priority, entry.fails)),
            }
        }
        let (account, priority, fails) = best?;
        let seq = self.next_seq();
        let entry = self.priorities.get_mut(&account).expect("account present");
        let old_key = rank_key(&account, entry);
        entry.timestamp = Some(now);
        entry.seq = seq;
        let new_key = rank_key(&account, entry);
        self.priorities_by_rank.remove(&old_key);
        self.priorities_by_rank.insert(new_key);
        Some(PriorityResult {
            account,
            priority,
            fails,
        })
    }

    /// Weighted-random pick of a dependency hash from the blocking set.
    pub fn next_blocking(&self, filter: impl Fn(&BlockHash) -> bool) -> Option<BlockHash> {
        if self.blocking.is_empty() {
            return None;
        }
        let mut rng = rand::thread_rng();
        let mut best: Option<(BlockHash, f64)> = None;
        for _ in 0..self.config.consideration_count.max(1) {
            let index = rng.gen_range(0..self.blocking.len());
            let (_, blocked) = self.blocking.get_index(index).expect("index in range");
            if !filter(&blocked.dependency) {
                continue;
            }
            match best {
                Some((_, priority)) if priority >= blocked.entry.priority => {}
                _ => best = Some((blocked.dependency, blocked.entry.priority)),
            }
        }
        best.map(|(dependency, _)| dependency)
    }

    /// Every blocking entry, for the periodic dependency sweep.
    pub fn blocking_snapshot(&self) -> Vec<(Account, BlockHash, Option<Account>)> {
        self.blocking
            .iter()
            .map(|(account, blocked)| (*account, blocked.dependency, blocked.dependency_account))
            .collect()
    }

    pub fn blocked(&self, account: &Account) -> bool {
        self.blocking.contains_key(account)
    }

    pub fn prioritized(&self, account: &Account) -> bool {
        self.priorities.contains_key(account)
    }

    pub fn priority_of(&self, account: &Account) -> Option<f64> {
        self.priorities.get(account).map(|entry| entry.priority)
    }

    pub fn priority_len(&self) -> usize {
        self.priorities.len()
    }

    pub fn blocking_len(&self) -> usize {
        self.blocking.len()
    }

    fn insert_priority(&mut self, account: Account, entry: PriorityEntry) {
        debug_assert!(!self.blocking.contains_key(&account));
        if self.priorities.len() >= self.config.priorities_max {
            let victim = self.priorities_by_rank.iter().next().copied();
            if let Some((_, _, victim)) = victim {
                if let Some(evicted) = self.priorities.swap_remove(&victim) {
                    self.priorities_by_rank.remove(&rank_key(&victim, &evicted));
                    trace!(account = %victim, "Priority evicted");
                }
            }
        }
        self.priorities_by_rank.insert(rank_key(&account, &entry));
        self.priorities.insert(account, entry);
    }

    fn remove_blocking(&mut self, account: &Account) -> Option<BlockingEntry> {
        let blocked = self.blocking.swap_remove(account)?;
        self.blocking_by_rank
            .remove(&rank_key(account, &blocked.entry));
        if let Some(accounts) = self.blocking_by_dependency.get_mut(&blocked.dependency) {
            accounts.retain(|candidate| candidate != account);
            if accounts.is_empty() {
                self.blocking_by_dependency.remove(&blocked.dependency);
            }
        }
        Some(blocked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> AccountSetsConfig {
        AccountSetsConfig {
            // A sample this large visits every slot, making picks
            // deterministic enough to assert on
            consideration_count: 64,
            cooldown: Duration::from_millis(0),
            ..AccountSetsConfig::default()
        }
    }

    fn account(n: u64) -> Account {
        Account::from_low_u64_be(n)
    }

    #[test]
    fn priority_up_inserts_then_multiplies() {
        let mut sets = AccountSets::new(config());
        sets.priority_up(&account(1));
        assert_eq!(sets.priority_of(&account(1)), Some(2.0));
        sets.priority_up(&account(1));
        assert_eq!(sets.priority_of(&account(1)), Some(4.0));
    }

    #[test]
    fn priority_saturates_at_max() {
        let mut sets = AccountSets::new(config());
        for _ in 0..20 {
            sets.priority_up(&account(1));
        }
        assert_eq!(sets.priority_of(&account(1)), Some(32.0));
    }

    #[test]
    fn up_then_down_returns_to_start() {
        let mut sets = AccountSets::new(config());
        sets.priority_up(&account(1));
        sets.priority_up(&account(1));
        sets.priority_down(&account(1));
        let priority = sets.priority_of(&account(1)).unwrap();
        assert!((priority - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decay_below_cutoff_erases() {
        let mut sets = AccountSets::new(config());
        sets.priority_up(&account(1));
        sets.priority_down(&account(1));
        assert!(sets.prioritized(&account(1)));
        sets.priority_down(&account(1));
        // 2.0 * 0.5 * 0.5 = 0.5 < cutoff
        assert!(!sets.prioritized(&account(1)));
    }

    #[test]
    fn max_fails_erases_regardless_of_priority() {
        let mut sets = AccountSets::new(AccountSetsConfig {
            priority_decrease: 1.0,
            ..config()
        });
        sets.priority_up(&account(1));
        for _ in 0..2 {
            sets.priority_down(&account(1));
            assert!(sets.prioritized(&account(1)));
        }
        sets.priority_down(&account(1));
        assert!(!sets.prioritized(&account(1)));
    }

    #[test]
    fn block_moves_between_sets_and_unblock_restores_priority() {
        let mut sets = AccountSets::new(config());
        sets.priority_up(&account(1));
        sets.priority_up(&account(1));
        let dependency = BlockHash::from_low_u64_be(9);
        sets.block(&account(1), dependency);
        assert!(sets.blocked(&account(1)));
        assert!(!sets.prioritized(&account(1)));

        // Wrong hash refuses to unblock
        assert!(!sets.unblock(&account(1), Some(BlockHash::from_low_u64_be(8))));
        assert!(sets.unblock(&account(1), Some(dependency)));
        assert_eq!(sets.priority_of(&account(1)), Some(4.0));
    }

    #[test]
    fn priority_up_leaves_blocked_accounts_alone() {
        let mut sets = AccountSets::new(config());
        sets.block(&account(1), BlockHash::from_low_u64_be(9));
        sets.priority_up(&account(1));
        assert!(sets.blocked(&account(1)));
        assert!(!sets.prioritized(&account(1)));
    }

    #[test]
    fn insertion_evicts_lowest_priority_when_full() {
        let mut sets = AccountSets::new(AccountSetsConfig {
            priorities_max: 2,
            ..config()
        });
        sets.priority_up(&account(1));
        sets.priority_up(&account(2));
        sets.priority_up(&account(2)); // strongest
        sets.priority_up(&account(3));
        assert_eq!(sets.priority_len(), 2);
        assert!(!sets.prioritized(&account(1)));
        assert!(sets.prioritized(&account(2)));
        assert!(sets.prioritized(&account(3)));
    }

    #[test]
    fn next_priority_respects_cooldown_and_filter() {
        let mut sets = AccountSets::new(AccountSetsConfig {
            cooldown: Duration::from_secs(60),
            ..config()
        });
        sets.priority_up(&account(1));
        sets.priority_up(&account(2));
        let now = Instant::now();
        let first = sets.next_priority(now, |candidate| *candidate != account(2));
        assert_eq!(first.map(|result| result.account), Some(account(1)));
        // Account 1 is cooling down, account 2 is filtered out
        assert_eq!(sets.next_priority(now, |candidate| *candidate != account(2)), None);
    }

    #[test]
    fn next_priority_prefers_higher_priority() {
        let mut sets = AccountSets::new(config());
        sets.priority_up(&account(1));
        sets.priority_up(&account(2));
        sets.priority_up(&account(2));
        let result = sets.next_priority(Instant::now(), |_| true).unwrap();
        assert_eq!(result.account, account(2));
        assert_eq!(result.priority, 4.0);
    }

    #[test]
    fn next_blocking_yields_dependency_hash() {
        let mut sets = AccountSets::new(config());
        let dependency = BlockHash::from_low_u64_be(9);
        sets.block(&account(1), dependency);
        assert_eq!(sets.next_blocking(|_| true), Some(dependency));
        assert_eq!(sets.next_blocking(|hash| *hash != dependency), None);
    }

    #[test]
    fn dependency_update_marks_all_waiters() {
        let mut sets = AccountSets::new(config());
        let dependency = BlockHash::from_low_u64_be(9);
        sets.block(&account(1), dependency);
        sets.block(&account(2), dependency);
        assert_eq!(sets.dependency_update(&dependency, account(7)), 2);
        // Second update with the same owner changes nothing
        assert_eq!(sets.dependency_update(&dependency, account(7)), 0);
        let snapshot = sets.blocking_snapshot();
        assert!(snapshot
            .iter()
            .all(|(_, _, owner)| *owner == Some(account(7))));
    }
}
