//! Account-chain bootstrap.
//!
//! Drives a node from an arbitrary state to parity with the network:
//! selects accounts worth pulling, picks peers with spare capacity, tracks
//! every in-flight pull against a deadline, verifies responses and feeds
//! the block processor while respecting its backpressure. See
//! [`BootstrapService`] for the orchestration and [`BootstrapServer`] for
//! the serving side.

pub mod account_sets;
pub mod config;
pub mod database_scan;
pub mod frontier_scan;
pub mod peer_scoring;
pub mod rate_limiter;
pub mod server;
pub mod service;
pub mod tags;
pub mod throttle;

pub use account_sets::AccountSets;
pub use config::{AccountSetsConfig, BootstrapConfig, FrontierScanConfig};
pub use server::BootstrapServer;
pub use service::{BootstrapService, ContainerInfo, VerifyResult};
pub use tags::{AsyncTag, QuerySource, QueryType};
