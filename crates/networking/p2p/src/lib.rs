//! Peer-to-peer surface of the strand node.
//!
//! This crate carries the wire message definitions, the channel capability
//! the transport provides, and the account-chain bootstrap subsystem: the
//! client-side service that pulls missing chains from the network and the
//! responder that serves those pulls from the local ledger.

pub mod bootstrap;
pub mod channel;
pub mod messages;
pub mod metrics;

pub use bootstrap::{BootstrapConfig, BootstrapServer, BootstrapService};
pub use channel::{Channel, Network, TrafficType};
pub use messages::Message;
