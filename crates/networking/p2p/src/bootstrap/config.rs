//! Bootstrap tuning knobs. Defaults are sized for a public network; tests
//! shrink intervals aggressively.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub enable: bool,
    pub enable_database_scan: bool,
    pub enable_dependency_walker: bool,
    pub enable_frontier_scan: bool,
    /// Maximum outstanding pulls per channel.
    pub channel_limit: usize,
    /// Requests per second across all sources.
    pub rate_limit: usize,
    /// Requests per second for the database source. Kept well below
    /// `rate_limit` so cold scans never starve the priority path.
    pub database_rate_limit: usize,
    /// Requests per second for frontier sampling.
    pub frontier_rate_limit: usize,
    /// Largest `count` a single blocks pull may carry.
    pub max_pull_count: u8,
    /// Absolute deadline for an in-flight pull.
    pub request_timeout: Duration,
    /// Suppression window for the database source while responses stay
    /// fruitless.
    pub throttle_wait: Duration,
    /// Multiplier over √(ledger block count) when sizing the throttle
    /// window.
    pub throttle_coefficient: f64,
    /// Block processor queue length above which no request is sent.
    pub block_processor_threshold: usize,
    /// Worker threads handling responses.
    pub response_workers: usize,
    pub sync_dependencies_interval: Duration,
    pub account_sets: AccountSetsConfig,
    pub frontier_scan: FrontierScanConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enable: true,
            enable_database_scan: true,
            enable_dependency_walker: true,
            enable_frontier_scan: true,
            channel_limit: 16,
            rate_limit: 500,
            database_rate_limit: 256,
            frontier_rate_limit: 8,
            max_pull_count: crate::messages::MAX_PULL_BLOCKS,
            request_timeout: Duration::from_secs(15),
            throttle_wait: Duration::from_millis(100),
            throttle_coefficient: 8.0,
            block_processor_threshold: 1000,
            response_workers: 2,
            sync_dependencies_interval: Duration::from_secs(60),
            account_sets: AccountSetsConfig::default(),
            frontier_scan: FrontierScanConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountSetsConfig {
    /// Random candidates examined per weighted pick.
    pub consideration_count: usize,
    pub priorities_max: usize,
    pub blocking_max: usize,
    /// Minimum delay between two pulls of the same account.
    pub cooldown: Duration,
    pub priority_initial: f64,
    pub priority_increase: f64,
    pub priority_decrease: f64,
    pub priority_max: f64,
    pub priority_cutoff: f64,
    /// Consecutive fruitless responses before an account is dropped.
    pub max_fails: u32,
}

impl Default for AccountSetsConfig {
    fn default() -> Self {
        Self {
            consideration_count: 4,
            priorities_max: 256 * 1024,
            blocking_max: 256 * 1024,
            cooldown: Duration::from_secs(3),
            priority_initial: 2.0,
            priority_increase: 2.0,
            priority_decrease: 0.5,
            priority_max: 32.0,
            priority_cutoff: 1.0,
            max_fails: 3,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrontierScanConfig {
    /// Parallel cursors over the account space.
    pub head_parallelism: u64,
    /// Responses a head accumulates before advancing.
    pub consideration_count: usize,
    /// Candidate frontiers a head retains between advances.
    pub candidates: usize,
    /// Minimum delay between two requests against the same head.
    pub cooldown: Duration,
    /// Outstanding frontier pulls across all heads.
    pub max_pending: usize,
    /// Fruitless rounds before a head snaps back to its range start.
    pub max_retries: u32,
}

impl Default for FrontierScanConfig {
    fn default() -> Self {
        Self {
            head_parallelism: 128,
            consideration_count: 4,
            candidates: 1000,
            cooldown: Duration::from_secs(5),
            max_pending: 16,
            max_retries: 30,
        }
    }
}
