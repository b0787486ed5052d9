//! The account-chain bootstrap service.
//!
//! Four producer threads (priorities, database, dependencies, frontiers)
//! select work, pick a peer and send tagged pulls; a cleanup thread expires
//! deadlines and keeps the ancillary state in sync; a small worker pool
//! verifies responses and feeds the block processor. All shared state sits
//! behind one mutex + condvar; peer scoring locks itself. Channel sends,
//! block-processor enqueues and ledger writes always happen with the
//! service mutex released.

use super::account_sets::{AccountSets, PriorityResult};
use super::config::BootstrapConfig;
use super::database_scan::DatabaseScan;
use super::frontier_scan::FrontierScan;
use super::peer_scoring::PeerScoring;
use super::rate_limiter::RateLimiter;
use super::tags::{AsyncTag, QuerySource, QueryType, TagTable};
use super::throttle::Throttle;
use crate::channel::{Channel, Network, TrafficType};
use crate::messages::{
    generate_pull_id, AccountInfoPayload, AckPayload, AscPullAck, AscPullReq, BlocksPayload,
    FrontiersPayload, Message, ReqPayload, MAX_PULL_FRONTIERS,
};
use crate::metrics::{bump, bump_by, BootstrapMetrics, MetricsSnapshot};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, Weak};
use std::thread::{Builder, JoinHandle};
use std::time::{Duration, Instant};
use strand_blockchain::{BlockProcessor, BlockResult, BlockSource, BlockStatus, Ledger};
use strand_common::{Account, BlockHash, HashOrAccount};
use strand_concurrency::WorkerPool;
use tracing::{debug, info, warn};

/// Incremental backoff bounds for every wait.
const WAIT_INITIAL: Duration = Duration::from_millis(1);
const WAIT_MAX: Duration = Duration::from_secs(1);

/// Cleanup cadence.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Fixed pull size for the low-yield database source.
const DATABASE_PULL_COUNT: usize = 8;

/// Smallest pull a priority account gets regardless of its priority.
const MIN_PULL_COUNT: usize = 2;

/// Floor for the computed throttle window.
const THROTTLE_SIZE_MIN: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VerifyResult {
    Ok,
    NothingNew,
    Invalid,
}

/// Sizes of every internal container, for health introspection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContainerInfo {
    pub tags: usize,
    pub priorities: usize,
    pub blocking: usize,
    pub scores: usize,
    pub database_queue: usize,
    pub frontier_heads: usize,
    pub frontier_candidates: usize,
}

struct ServiceState {
    accounts: AccountSets,
    database_scan: DatabaseScan,
    frontiers: FrontierScan,
    throttle: Throttle,
    tags: TagTable,
    next_dependency_sync: Instant,
    stopped: bool,
}

pub struct BootstrapService {
    config: BootstrapConfig,
    ledger: Ledger,
    block_processor: Arc<BlockProcessor>,
    network: Network,
    metrics: BootstrapMetrics,
    state: Mutex<ServiceState>,
    condition: Condvar,
    scoring: Mutex<PeerScoring>,
    limiter: RateLimiter,
    database_limiter: RateLimiter,
    frontiers_limiter: RateLimiter,
    workers: Mutex<Option<WorkerPool>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    weak_self: Weak<Self>,
}

impl BootstrapService {
    pub fn new(
        config: BootstrapConfig,
        ledger: Ledger,
        block_processor: Arc<BlockProcessor>,
        network: Network,
    ) -> Arc<Self> {
        let state = ServiceState {
            accounts: AccountSets::new(config.account_sets.clone()),
            database_scan: DatabaseScan::new(ledger.clone()),
            frontiers: FrontierScan::new(config.frontier_scan.clone()),
            throttle: Throttle::new(THROTTLE_SIZE_MIN),
            tags: TagTable::new(),
            next_dependency_sync: Instant::now() + config.sync_dependencies_interval,
            stopped: false,
        };
        let service = Arc::new_cyclic(|weak_self| Self {
            scoring: Mutex::new(PeerScoring::new(config.channel_limit)),
            limiter: RateLimiter::new(config.rate_limit),
            database_limiter: RateLimiter::new(config.database_rate_limit),
            frontiers_limiter: RateLimiter::new(config.frontier_rate_limit),
            config,
            ledger,
            block_processor: Arc::clone(&block_processor),
            network,
            metrics: BootstrapMetrics::default(),
            state: Mutex::new(state),
            condition: Condvar::new(),
            workers: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
            weak_self: weak_self.clone(),
        });
        // The callback holds only a weak reference so the processor can
        // never keep a stopped service alive
        let weak = Arc::downgrade(&service);
        block_processor.on_batch_processed(Box::new(move |results| {
            if let Some(service) = weak.upgrade() {
                service.inspect_batch(results);
            }
        }));
        service
    }

    pub fn start(&self) {
        if !self.config.enable {
            info!("Bootstrap service disabled by config");
            return;
        }
        let mut threads = self.threads.lock().expect("threads lock poisoned");
        assert!(threads.is_empty(), "bootstrap service already started");
        *self.workers.lock().expect("workers lock poisoned") = Some(WorkerPool::new(
            "Bootstrap worker",
            self.config.response_workers.max(1),
        ));
        let mut spawn = |name: &str, run: fn(&BootstrapService)| {
            let service = self.weak_self.upgrade().expect("service already dropped");
            let handle = Builder::new()
                .name(name.to_string())
                .spawn(move || run(&service))
                .expect("failed to spawn bootstrap thread");
            threads.push(handle);
        };
        spawn("Bootstrap priorities", Self::run_priorities);
        if self.config.enable_database_scan {
            spawn("Bootstrap database", Self::run_database);
        }
        if self.config.enable_dependency_walker {
            spawn("Bootstrap dependencies", Self::run_dependencies);
        }
        if self.config.enable_frontier_scan {
            spawn("Bootstrap frontiers", Self::run_frontiers);
        }
        spawn("Bootstrap cleanup", Self::run_cleanup);
        info!("Bootstrap service started");
    }

    /// Idempotent; wakes every waiter, joins all service threads and
    /// drains the response workers.
    pub fn stop(&self) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.condition.notify_all();
        let threads = std::mem::take(&mut *self.threads.lock().expect("threads lock poisoned"));
        for handle in threads {
            let _ = handle.join();
        }
        // Dropping the pool drains queued response handlers
        self.workers.lock().expect("workers lock poisoned").take();
        info!("Bootstrap service stopped");
    }

    // Introspection

    pub fn priority_size(&self) -> usize {
        self.lock_state().accounts.priority_len()
    }

    pub fn blocked_size(&self) -> usize {
        self.lock_state().accounts.blocking_len()
    }

    pub fn score_size(&self) -> usize {
        self.scoring.lock().expect("scoring lock poisoned").len()
    }

    pub fn prioritized(&self, account: &Account) -> bool {
        self.lock_state().accounts.prioritized(account)
    }

    pub fn blocked(&self, account: &Account) -> bool {
        self.lock_state().accounts.blocked(account)
    }

    pub fn priority_of(&self, account: &Account) -> Option<f64> {
        self.lock_state().accounts.priority_of(account)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn container_info(&self) -> ContainerInfo {
        let state = self.lock_state();
        ContainerInfo {
            tags: state.tags.len(),
            priorities: state.accounts.priority_len(),
            blocking: state.accounts.blocking_len(),
            scores: self.scoring.lock().expect("scoring lock poisoned").len(),
            database_queue: state.database_scan.queue_len(),
            frontier_heads: state.frontiers.head_count(),
            frontier_candidates: state.frontiers.candidate_count(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().expect("state lock poisoned")
    }

    fn stopped(&self) -> bool {
        self.lock_state().stopped
    }

    // Waiting

    /// Blocks until the predicate yields a value or the service stops,
    /// releasing the mutex while parked and backing off incrementally.
    fn wait_with<T>(
        &self,
        initial: Duration,
        mut predicate: impl FnMut(&mut ServiceState) -> Option<T>,
    ) -> Option<T> {
        let mut state = self.lock_state();
        let mut interval = initial;
        loop {
            if state.stopped {
                return None;
            }
            if let Some(value) = predicate(&mut state) {
                return Some(value);
            }
            let (next, _) = self
                .condition
                .wait_timeout(state, interval)
                .expect("state lock poisoned");
            state = next;
            interval = (interval * 2).min(WAIT_MAX);
        }
    }

    fn wait<T>(&self, predicate: impl FnMut(&mut ServiceState) -> Option<T>) -> Option<T> {
        self.wait_with(WAIT_INITIAL, predicate)
    }

    /// Parks until the block processor queue is below the high-water mark.
    /// `false` means the service is stopping.
    fn wait_block_processor(&self) -> bool {
        let threshold = self.config.block_processor_threshold;
        self.wait(|_| (self.block_processor.queue_size() < threshold).then_some(()))
            .is_some()
    }

    fn wait_limiter(&self, limiter: &RateLimiter) -> bool {
        self.wait(|_| limiter.should_pass(1).then_some(())).is_some()
    }

    /// Parks until a channel with spare capacity exists.
    fn wait_channel(&self) -> Option<Arc<dyn Channel>> {
        self.wait(|_| {
            self.scoring
                .lock()
                .expect("scoring lock poisoned")
                .pick_channel()
        })
    }

    fn wait_priority(&self) -> Option<PriorityResult> {
        self.wait(|state| {
            let now = Instant::now();
            let ServiceState { accounts, tags, .. } = state;
            accounts.next_priority(now, |account| {
                tags.count_by_account(account, QuerySource::Priority) == 0
            })
        })
    }

    fn wait_database(&self) -> Option<Account> {
        self.wait_with(self.config.throttle_wait, |state| {
            if state.database_scan.warmed_up() && state.throttle.throttled() {
                return None;
            }
            let ServiceState {
                database_scan, tags, ..
            } = state;
            database_scan.next(|account| {
                tags.count_by_account(account, QuerySource::Database) == 0
            })
        })
    }

    fn wait_blocking(&self) -> Option<BlockHash> {
        self.wait(|state| {
            let ServiceState { accounts, tags, .. } = state;
            accounts.next_blocking(|hash| {
                tags.count_by_hash(hash, QuerySource::Dependencies) == 0
            })
        })
    }

    fn wait_frontier(&self) -> Option<Account> {
        let max_pending = self.config.frontier_scan.max_pending;
        self.wait(|state| {
            if state.tags.count_by_source(QuerySource::Frontiers) >= max_pending {
                return None;
            }
            state.frontiers.next(Instant::now())
        })
    }

    // Producer threads

    fn run_priorities(&self) {
        while !self.stopped() {
            self.run_one_priority();
        }
    }

    fn run_one_priority(&self) {
        if !self.wait_block_processor() || !self.wait_limiter(&self.limiter) {
            return;
        }
        let Some(channel) = self.wait_channel() else {
            return;
        };
        let Some(next) = self.wait_priority() else {
            return;
        };
        // Higher-priority accounts are more likely to be far behind, so
        // they get proportionally larger pulls
        let count = (next.priority as usize)
            .clamp(MIN_PULL_COUNT, self.config.max_pull_count as usize);
        bump(&self.metrics.priority_requests);
        self.request_blocks(next.account, count, channel, QuerySource::Priority);
    }

    fn run_database(&self) {
        while !self.stopped() {
            self.run_one_database();
        }
    }

    fn run_one_database(&self) {
        if !self.wait_block_processor() || !self.wait_limiter(&self.database_limiter) {
            return;
        }
        let Some(channel) = self.wait_channel() else {
            return;
        };
        let Some(account) = self.wait_database() else {
            return;
        };
        bump(&self.metrics.database_requests);
        self.request_blocks(account, DATABASE_PULL_COUNT, channel, QuerySource::Database);
    }

    fn run_dependencies(&self) {
        while !self.stopped() {
            self.run_one_dependency();
        }
    }

    fn run_one_dependency(&self) {
        if !self.wait_block_processor() || !self.wait_limiter(&self.limiter) {
            return;
        }
        let Some(channel) = self.wait_channel() else {
            return;
        };
        let Some(dependency) = self.wait_blocking() else {
            return;
        };
        bump(&self.metrics.dependency_requests);
        self.request_account_info(dependency, channel, QuerySource::Dependencies);
    }

    fn run_frontiers(&self) {
        while !self.stopped() {
            self.run_one_frontier();
        }
    }

    fn run_one_frontier(&self) {
        if !self.wait_block_processor() || !self.wait_limiter(&self.frontiers_limiter) {
            return;
        }
        let Some(channel) = self.wait_channel() else {
            return;
        };
        let Some(start) = self.wait_frontier() else {
            return;
        };
        bump(&self.metrics.frontier_requests);
        self.request_frontiers(start, channel, QuerySource::Frontiers);
    }

    // Request assembly

    fn request_blocks(
        &self,
        account: Account,
        count: usize,
        channel: Arc<dyn Channel>,
        source: QuerySource,
    ) {
        // Pull from the head when the account is already known locally
        let now = Instant::now();
        let (query_type, start, hash) = match self.ledger.account_info(&account) {
            Some(info) => (
                QueryType::BlocksByHash,
                HashOrAccount::from(info.head),
                info.head,
            ),
            None => (
                QueryType::BlocksByAccount,
                HashOrAccount::from(account),
                BlockHash::ZERO,
            ),
        };
        let tag = AsyncTag {
            id: generate_pull_id(),
            query_type,
            source,
            start,
            account,
            hash,
            count,
            cutoff: now + self.config.request_timeout,
            timestamp: now,
        };
        self.send(channel, tag);
    }

    fn request_account_info(
        &self,
        dependency: BlockHash,
        channel: Arc<dyn Channel>,
        source: QuerySource,
    ) {
        let now = Instant::now();
        let tag = AsyncTag {
            id: generate_pull_id(),
            query_type: QueryType::AccountInfoByHash,
            source,
            start: HashOrAccount::from(dependency),
            account: Account::ZERO,
            hash: dependency,
            count: 0,
            cutoff: now + self.config.request_timeout,
            timestamp: now,
        };
        self.send(channel, tag);
    }

    fn request_frontiers(&self, start: Account, channel: Arc<dyn Channel>, source: QuerySource) {
        let now = Instant::now();
        let tag = AsyncTag {
            id: generate_pull_id(),
            query_type: QueryType::Frontiers,
            source,
            start: HashOrAccount::from(start),
            account: Account::ZERO,
            hash: BlockHash::ZERO,
            count: MAX_PULL_FRONTIERS as usize,
            cutoff: now + self.config.request_timeout,
            timestamp: now,
        };
        self.send(channel, tag);
    }

    fn send(&self, channel: Arc<dyn Channel>, tag: AsyncTag) -> bool {
        let payload = match tag.query_type {
            QueryType::BlocksByHash | QueryType::BlocksByAccount => ReqPayload::Blocks {
                start: tag.start,
                count: tag.count as u8,
            },
            QueryType::AccountInfoByHash => ReqPayload::AccountInfo { target: tag.start },
            QueryType::Frontiers => ReqPayload::Frontiers {
                start: tag.start.as_account(),
                count: tag.count as u16,
            },
        };
        let request = AscPullReq {
            id: tag.id,
            payload,
        };
        let id = tag.id;
        {
            let mut state = self.lock_state();
            if !state.tags.insert(tag) {
                // Losing one pull to an id collision is harmless; the next
                // tick re-selects
                debug!(id, "Pull id collision, request dropped");
                return false;
            }
        }
        self.condition.notify_all();
        let sent = channel.send(
            &Message::AscPullReq(request),
            TrafficType::BootstrapRequests,
        );
        if !sent {
            bump(&self.metrics.send_failures);
            let mut state = self.lock_state();
            state.tags.erase_by_id(id);
            drop(state);
            self.condition.notify_all();
            debug!(id, "Pull request not sent, channel refused");
        }
        sent
    }

    // Response handling

    /// Entry point for `asc_pull_ack` messages from the network. Pairs the
    /// acknowledgement with its tag and hands the payload to the worker
    /// pool; unknown or repeated ids are dropped.
    pub fn process(&self, message: AscPullAck, channel: &Arc<dyn Channel>) {
        let tag = {
            let mut state = self.lock_state();
            state.tags.erase_by_id(message.id)
        };
        let Some(tag) = tag else {
            bump(&self.metrics.untracked_responses);
            debug!(id = message.id, "Response without a matching tag");
            return;
        };
        self.condition.notify_all();
        self.scoring
            .lock()
            .expect("scoring lock poisoned")
            .received(channel);
        bump(&self.metrics.responses);
        let workers = self.workers.lock().expect("workers lock poisoned");
        if let Some(workers) = workers.as_ref() {
            let Some(service) = self.weak_self.upgrade() else {
                return;
            };
            workers.execute(move || service.process_response(tag, message.payload));
        }
    }

    fn process_response(&self, tag: AsyncTag, payload: AckPayload) {
        match (tag.query_type, payload) {
            (QueryType::BlocksByHash | QueryType::BlocksByAccount, AckPayload::Blocks(blocks)) => {
                self.process_blocks(blocks, &tag);
            }
            (QueryType::AccountInfoByHash, AckPayload::AccountInfo(info)) => {
                self.process_account_info(info, &tag);
            }
            (QueryType::Frontiers, AckPayload::Frontiers(frontiers)) => {
                self.process_frontiers(frontiers, &tag);
            }
            (_, AckPayload::Empty) => {
                bump(&self.metrics.empty_responses);
            }
            (query_type, _) => {
                bump(&self.metrics.invalid_responses);
                debug!(?query_type, "Mismatched response payload");
            }
        }
    }

    fn process_blocks(&self, payload: BlocksPayload, tag: &AsyncTag) {
        match verify_blocks(&payload, tag) {
            VerifyResult::Ok => {
                bump_by(&self.metrics.blocks_received, payload.blocks.len() as u64);
                {
                    let mut state = self.lock_state();
                    state.throttle.add(true);
                }
                // Enqueue with every lock released; the processor applies
                // chain order
                for block in payload.blocks {
                    self.block_processor.add(block, BlockSource::Bootstrap);
                }
            }
            VerifyResult::NothingNew => {
                let mut state = self.lock_state();
                state.throttle.add(false);
                state.accounts.priority_down(&tag.account);
            }
            VerifyResult::Invalid => {
                bump(&self.metrics.invalid_responses);
                warn!(account = %tag.account, "Invalid blocks response");
                let mut state = self.lock_state();
                state.throttle.add(false);
                state.accounts.priority_down(&tag.account);
            }
        }
        self.condition.notify_all();
    }

    fn process_account_info(&self, payload: AccountInfoPayload, tag: &AsyncTag) {
        if payload.account.is_zero() {
            bump(&self.metrics.invalid_responses);
            return;
        }
        // The responder's account wins even if it contradicts a local
        // guess; a blocks pull for it is queued through the priority set
        let initial = self.config.account_sets.priority_initial;
        {
            let mut state = self.lock_state();
            state.accounts.dependency_update(&tag.hash, payload.account);
            state.accounts.priority_set(&payload.account, initial);
        }
        self.condition.notify_all();
    }

    fn process_frontiers(&self, payload: FrontiersPayload, tag: &AsyncTag) {
        let start = tag.start.as_account();
        if verify_frontiers(&payload, tag) == VerifyResult::Invalid {
            bump(&self.metrics.invalid_responses);
            let mut state = self.lock_state();
            state.frontiers.process(start, &[]);
            return;
        }
        bump_by(
            &self.metrics.frontiers_received,
            payload.frontiers.len() as u64,
        );
        // An account is outdated when we do not hold its advertised
        // frontier block
        let outdated: Vec<Account> = payload
            .frontiers
            .iter()
            .filter(|(_, frontier)| !self.ledger.block_exists(frontier))
            .map(|(account, _)| *account)
            .collect();
        let initial = self.config.account_sets.priority_initial;
        {
            let mut state = self.lock_state();
            state.frontiers.process(start, &payload.frontiers);
            for account in outdated {
                state.accounts.priority_set(&account, initial);
            }
        }
        self.condition.notify_all();
    }

    // Inspection of processed blocks

    fn inspect_batch(&self, results: &[BlockResult]) {
        let mut state = self.lock_state();
        for result in results {
            self.inspect(&mut state, result);
        }
        drop(state);
        self.condition.notify_all();
    }

    fn inspect(&self, state: &mut ServiceState, result: &BlockResult) {
        let block = &result.block;
        let account = block.account;
        match result.status {
            BlockStatus::Progress => {
                let hash = block.hash();
                // Any progress frees the account and bumps it
                state.accounts.unblock(&account, None);
                state.accounts.priority_up(&account);
                // A processed send may be the dependency some other
                // account is stalled on
                if let Some(previous) = self.ledger.block(&block.previous) {
                    if block.balance < previous.balance {
                        let destination = block.link_as_destination();
                        state.accounts.unblock(&destination, Some(hash));
                        state.accounts.priority_up(&destination);
                    }
                }
            }
            BlockStatus::GapSource => {
                state.accounts.block(&account, block.link_as_source());
            }
            BlockStatus::GapPrevious => {
                state.accounts.block(&account, block.previous);
            }
            BlockStatus::Old | BlockStatus::Fork => {
                state.accounts.priority_down(&account);
            }
            BlockStatus::Unreceivable | BlockStatus::Invalid => {}
        }
    }

    // Cleanup

    fn run_cleanup(&self) {
        loop {
            {
                // Sleep out the full interval; the condition fires on every
                // tag movement and only `stopped` should cut the nap short
                let mut state = self.lock_state();
                let deadline = Instant::now() + CLEANUP_INTERVAL;
                while !state.stopped {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    let (next, _) = self
                        .condition
                        .wait_timeout(state, remaining)
                        .expect("state lock poisoned");
                    state = next;
                }
                if state.stopped {
                    return;
                }
            }
            self.cleanup_and_sync();
        }
    }

    fn cleanup_and_sync(&self) {
        {
            let mut scoring = self.scoring.lock().expect("scoring lock poisoned");
            scoring.sync(self.network.shuffled_channels());
            scoring.timeout();
        }
        let throttle_size = self.compute_throttle_size();
        let now = Instant::now();
        let sync_due = {
            let mut state = self.lock_state();
            state.throttle.resize(throttle_size);
            let expired = state.tags.expire(now);
            for tag in &expired {
                bump(&self.metrics.timeouts);
                debug!(id = tag.id, account = %tag.account, "Pull timed out");
                state.accounts.priority_down(&tag.account);
            }
            if state.next_dependency_sync <= now {
                state.next_dependency_sync = now + self.config.sync_dependencies_interval;
                true
            } else {
                false
            }
        };
        if sync_due {
            self.sync_dependencies();
        }
        self.condition.notify_all();
    }

    /// Re-promotes blocking entries whose dependency has shown up in the
    /// ledger meanwhile, and queues the known owners of the ones that have
    /// not.
    fn sync_dependencies(&self) {
        bump(&self.metrics.dependency_syncs);
        let blocking = self.lock_state().accounts.blocking_snapshot();
        let mut unblock = Vec::new();
        let mut promote = Vec::new();
        for (account, dependency, dependency_account) in blocking {
            if self.ledger.block_exists(&dependency) {
                unblock.push((account, dependency));
            } else if let Some(owner) = dependency_account {
                promote.push(owner);
            }
        }
        if unblock.is_empty() && promote.is_empty() {
            return;
        }
        debug!(
            unblocked = unblock.len(),
            promoted = promote.len(),
            "Synced blocked accounts against ledger"
        );
        let initial = self.config.account_sets.priority_initial;
        let mut state = self.lock_state();
        for (account, dependency) in unblock {
            state.accounts.unblock(&account, Some(dependency));
        }
        for account in promote {
            state.accounts.priority_set(&account, initial);
        }
    }

    /// Larger ledgers sample more outcomes before throttling the database
    /// source.
    fn compute_throttle_size(&self) -> usize {
        let scaled =
            (self.config.throttle_coefficient * (self.ledger.block_count() as f64).sqrt()) as usize;
        scaled.max(THROTTLE_SIZE_MIN)
    }
}

impl Drop for BootstrapService {
    fn drop(&mut self) {
        debug_assert!(
            self.threads.lock().map(|threads| threads.is_empty()).unwrap_or(true),
            "bootstrap service dropped while running"
        );
    }
}

/// Chain continuity checks for a blocks response. Individual block
/// validity stays with the block processor.
fn verify_blocks(payload: &BlocksPayload, tag: &AsyncTag) -> VerifyResult {
    let blocks = &payload.blocks;
    if blocks.is_empty() {
        return VerifyResult::NothingNew;
    }
    if blocks.len() > tag.count {
        return VerifyResult::Invalid;
    }
    let first = &blocks[0];
    match tag.query_type {
        QueryType::BlocksByHash => {
            let start = tag.start.as_block_hash();
            // The run may begin with the start block itself or with its
            // successor
            if first.hash() != start && first.previous != start {
                return VerifyResult::Invalid;
            }
            if blocks.len() == 1 && first.hash() == start {
                return VerifyResult::NothingNew;
            }
        }
        QueryType::BlocksByAccount => {
            if first.account != tag.start.as_account() || !first.is_open() {
                return VerifyResult::Invalid;
            }
        }
        _ => return VerifyResult::Invalid,
    }
    for pair in blocks.windows(2) {
        if pair[1].previous != pair[0].hash() {
            return VerifyResult::Invalid;
        }
    }
    VerifyResult::Ok
}

/// Frontiers must be strictly increasing and start at or after the
/// requested position.
fn verify_frontiers(payload: &FrontiersPayload, tag: &AsyncTag) -> VerifyResult {
    let frontiers = &payload.frontiers;
    if frontiers.is_empty() {
        return VerifyResult::NothingNew;
    }
    if frontiers[0].0 < tag.start.as_account() {
        return VerifyResult::Invalid;
    }
    for pair in frontiers.windows(2) {
        if pair[1].0 <= pair[0].0 {
            return VerifyResult::Invalid;
        }
    }
    VerifyResult::Ok
}
