//! In-flight pull registry.
//!
//! Every sent pull is recorded as a tag until its response arrives or its
//! deadline passes. Lookups are needed by id (pairing responses), by
//! account and by hash (duplicate-suppression filters), and in insertion
//! order (expiry). Deadlines are created monotonically, so the oldest tag
//! expires first and `expire` only ever inspects the queue head.

use crate::messages::PullId;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::time::Instant;
use strand_common::{Account, BlockHash, HashOrAccount};

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum QueryType {
    BlocksByHash,
    BlocksByAccount,
    AccountInfoByHash,
    Frontiers,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum QuerySource {
    Priority,
    Database,
    Dependencies,
    Frontiers,
}

impl QuerySource {
    fn index(self) -> usize {
        match self {
            QuerySource::Priority => 0,
            QuerySource::Database => 1,
            QuerySource::Dependencies => 2,
            QuerySource::Frontiers => 3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AsyncTag {
    pub id: PullId,
    pub query_type: QueryType,
    pub source: QuerySource,
    pub start: HashOrAccount,
    /// Denormalized for by-account lookups; zero when not applicable.
    pub account: Account,
    /// Denormalized for by-hash lookups; zero when not applicable.
    pub hash: BlockHash,
    pub count: usize,
    pub cutoff: Instant,
    pub timestamp: Instant,
}

#[derive(Default)]
pub struct TagTable {
    by_id: FxHashMap<PullId, AsyncTag>,
    by_account: FxHashMap<Account, Vec<PullId>>,
    by_hash: FxHashMap<BlockHash, Vec<PullId>>,
    /// Insertion order; erased ids are skipped lazily.
    order: VecDeque<PullId>,
    per_source: [usize; 4],
}

impl TagTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tag. `false` (and no insertion) on an id collision.
    pub fn insert(&mut self, tag: AsyncTag) -> bool {
        if self.by_id.contains_key(&tag.id) {
            return false;
        }
        if !tag.account.is_zero() {
            self.by_account.entry(tag.account).or_default().push(tag.id);
        }
        if !tag.hash.is_zero() {
            self.by_hash.entry(tag.hash).or_default().push(tag.id);
        }
        self.order.push_back(tag.id);
        self.per_source[tag.source.index()] += 1;
        self.by_id.insert(tag.id, tag);
        true
    }

    pub fn erase_by_id(&mut self, id: PullId) -> Option<AsyncTag> {
        let tag = self.by_id.remove(&id)?;
        if !tag.account.is_zero() {
            if let Some(ids) = self.by_account.get_mut(&tag.account) {
                ids.retain(|candidate| *candidate != id);
                if ids.is_empty() {
                    self.by_account.remove(&tag.account);
                }
            }
        }
        if !tag.hash.is_zero() {
            if let Some(ids) = self.by_hash.get_mut(&tag.hash) {
                ids.retain(|candidate| *candidate != id);
                if ids.is_empty() {
                    self.by_hash.remove(&tag.hash);
                }
            }
        }
        self.per_source[tag.source.index()] -= 1;
        Some(tag)
    }

    pub fn count_by_account(&self, account: &Account, source: QuerySource) -> usize {
        self.by_account
            .get(account)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        self.by_id
                            .get(id)
                            .map(|tag| tag.source == source)
                            .unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn count_by_hash(&self, hash: &BlockHash, source: QuerySource) -> usize {
        self.by_hash
            .get(hash)
            .map(|ids| {
                ids.iter()
                    .filter(|id| {
                        self.by_id
                            .get(id)
                            .map(|tag| tag.source == source)
                            .unwrap_or(false)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn count_by_source(&self, source: QuerySource) -> usize {
        self.per_source[source.index()]
    }

    /// Evicts every tag whose deadline has passed, oldest first.
    pub fn expire(&mut self, now: Instant) -> Vec<AsyncTag> {
        let mut expired = Vec::new();
        while let Some(id) = self.order.front().copied() {
            let Some(tag) = self.by_id.get(&id) else {
                // Erased earlier by a response
                self.order.pop_front();
                continue;
            };
            if tag.cutoff > now {
                break;
            }
            self.order.pop_front();
            if let Some(tag) = self.erase_by_id(id) {
                expired.push(tag);
            }
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tag(id: PullId, account: u64, cutoff: Instant) -> AsyncTag {
        AsyncTag {
            id,
            query_type: QueryType::BlocksByAccount,
            source: QuerySource::Priority,
            start: HashOrAccount::from_low_u64_be(account),
            account: Account::from_low_u64_be(account),
            hash: BlockHash::ZERO,
            count: 8,
            cutoff,
            timestamp: Instant::now(),
        }
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut tags = TagTable::new();
        let cutoff = Instant::now();
        assert!(tags.insert(tag(1, 10, cutoff)));
        assert!(!tags.insert(tag(1, 11, cutoff)));
        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags.count_by_account(&Account::from_low_u64_be(10), QuerySource::Priority),
            1
        );
    }

    #[test]
    fn counts_distinguish_sources() {
        let mut tags = TagTable::new();
        let cutoff = Instant::now();
        let mut database = tag(2, 10, cutoff);
        database.source = QuerySource::Database;
        tags.insert(tag(1, 10, cutoff));
        tags.insert(database);
        let account = Account::from_low_u64_be(10);
        assert_eq!(tags.count_by_account(&account, QuerySource::Priority), 1);
        assert_eq!(tags.count_by_account(&account, QuerySource::Database), 1);
        assert_eq!(tags.count_by_source(QuerySource::Database), 1);
    }

    #[test]
    fn expire_evicts_oldest_first_and_skips_erased() {
        let mut tags = TagTable::new();
        let base = Instant::now();
        tags.insert(tag(1, 10, base));
        tags.insert(tag(2, 11, base + Duration::from_secs(5)));
        tags.insert(tag(3, 12, base + Duration::from_secs(60)));
        // A response erased the first tag already
        assert!(tags.erase_by_id(1).is_some());
        let expired = tags.expire(base + Duration::from_secs(10));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, 2);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.count_by_source(QuerySource::Priority), 1);
    }

    #[test]
    fn erase_clears_indices() {
        let mut tags = TagTable::new();
        let mut with_hash = tag(1, 10, Instant::now());
        with_hash.hash = BlockHash::from_low_u64_be(99);
        tags.insert(with_hash);
        tags.erase_by_id(1);
        assert_eq!(
            tags.count_by_hash(&BlockHash::from_low_u64_be(99), QuerySource::Priority),
            0
        );
        assert!(tags.is_empty());
    }
}
