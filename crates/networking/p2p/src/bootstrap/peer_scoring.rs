//! Tracking and scoring peers with respect to bootstrapping.
//!
//! Each channel carries a count of outstanding pulls; selection prefers the
//! least-loaded channel and refuses any at the per-channel cap. Scores hold
//! only weak channel references so a dead connection can never be kept
//! alive by its bookkeeping. Lost responses are forgiven by decaying every
//! count once per cleanup pass.

use crate::channel::{Channel, TrafficType};
use indexmap::IndexMap;
use std::sync::{Arc, Weak};

pub struct PeerScoring {
    channel_limit: usize,
    /// Keyed by channel address; insertion order is the tie-break order.
    scores: IndexMap<usize, PeerScore>,
    /// Roster from the last `sync`, pre-shuffled by the network.
    channels: Vec<Arc<dyn Channel>>,
}

struct PeerScore {
    channel: Weak<dyn Channel>,
    outstanding: u64,
    request_count: u64,
    response_count: u64,
}

fn address(channel: &Arc<dyn Channel>) -> usize {
    Arc::as_ptr(channel) as *const () as usize
}

impl PeerScoring {
    pub fn new(channel_limit: usize) -> Self {
        Self {
            channel_limit,
            scores: IndexMap::new(),
            channels: Vec::new(),
        }
    }

    /// Selects the live, uncongested channel with the fewest outstanding
    /// pulls, and accounts one more request against it. `None` when every
    /// channel is saturated or the roster is empty.
    pub fn pick_channel(&mut self) -> Option<Arc<dyn Channel>> {
        let mut best: Option<(u64, usize)> = None;
        for (index, channel) in self.channels.iter().enumerate() {
            if !channel.is_alive() || channel.congested(TrafficType::BootstrapRequests) {
                continue;
            }
            let outstanding = self
                .scores
                .get(&address(channel))
                .map(|score| score.outstanding)
                .unwrap_or(0);
            if outstanding >= self.channel_limit as u64 {
                continue;
            }
            match best {
                Some((lowest, _)) if lowest <= outstanding => {}
                _ => best = Some((outstanding, index)),
            }
        }
        let (_, index) = best?;
        let channel = Arc::clone(&self.channels[index]);
        let score = self
            .scores
            .entry(address(&channel))
            .or_insert_with(|| PeerScore {
                channel: Arc::downgrade(&channel),
                outstanding: 0,
                request_count: 0,
                response_count: 0,
            });
        score.outstanding += 1;
        score.request_count += 1;
        Some(channel)
    }

    /// Accounts a response arriving on `channel`.
    pub fn received(&mut self, channel: &Arc<dyn Channel>) {
        if let Some(score) = self.scores.get_mut(&address(channel)) {
            score.outstanding = score.outstanding.saturating_sub(1);
            score.response_count += 1;
        }
    }

    /// Drops scores for closed channels and decays every outstanding count
    /// by one, so responses lost in transit cannot blacklist a peer
    /// forever.
    pub fn timeout(&mut self) {
        self.scores.retain(|_, score| {
            score
                .channel
                .upgrade()
                .map(|channel| channel.is_alive())
                .unwrap_or(false)
        });
        for score in self.scores.values_mut() {
            score.outstanding = score.outstanding.saturating_sub(1);
        }
    }

    /// Replaces the channel roster. The list should already be shuffled.
    pub fn sync(&mut self, list: Vec<Arc<dyn Channel>>) {
        self.channels = list;
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Channels that could take one more pull right now.
    pub fn available(&self) -> usize {
        self.channels
            .iter()
            .filter(|channel| {
                channel.is_alive()
                    && self
                        .scores
                        .get(&address(channel))
                        .map(|score| score.outstanding < self.channel_limit as u64)
                        .unwrap_or(true)
            })
            .count()
    }
}
