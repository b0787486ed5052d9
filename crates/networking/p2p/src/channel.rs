//! The capability surface the transport layer hands to protocol
//! components, and the live-channel roster they pick peers from.

use crate::messages::Message;
use rand::seq::SliceRandom;
use std::sync::{Arc, RwLock};

/// Traffic classes with independent congestion accounting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TrafficType {
    Generic,
    /// Outgoing bootstrap pulls.
    BootstrapRequests,
    /// Replies served to remote bootstrappers.
    BootstrapResponses,
}

/// One live connection to a peer.
///
/// `send` is best-effort: `false` means the message was not handed to the
/// socket (closed or congested) and the caller should not expect a reply.
pub trait Channel: Send + Sync {
    fn send(&self, message: &Message, traffic: TrafficType) -> bool;
    fn is_alive(&self) -> bool;
    fn congested(&self, traffic: TrafficType) -> bool;
}

/// Current set of live channels, as maintained by the transport.
#[derive(Clone, Default)]
pub struct Network {
    channels: Arc<RwLock<Vec<Arc<dyn Channel>>>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, channel: Arc<dyn Channel>) {
        self.channels
            .write()
            .expect("network lock poisoned")
            .push(channel);
    }

    /// Drops channels the transport has torn down.
    pub fn prune_dead(&self) {
        self.channels
            .write()
            .expect("network lock poisoned")
            .retain(|channel| channel.is_alive());
    }

    /// Live channels in random order. Shuffling up front keeps selection
    /// fair between channels that otherwise compare equal.
    pub fn shuffled_channels(&self) -> Vec<Arc<dyn Channel>> {
        let mut channels: Vec<_> = self
            .channels
            .read()
            .expect("network lock poisoned")
            .iter()
            .filter(|channel| channel.is_alive())
            .cloned()
            .collect();
        channels.shuffle(&mut rand::thread_rng());
        channels
    }

    pub fn len(&self) -> usize {
        self.channels.read().expect("network lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
