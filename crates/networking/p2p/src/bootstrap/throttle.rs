//! Elastic suppression of the database source.
//!
//! A bounded window of recent pull outcomes; while every sample in a full
//! window is fruitless, cold database scans pause so the network is not
//! hammered with requests that keep returning nothing. The window size
//! tracks ledger growth and is recomputed by the cleanup pass.

use std::collections::VecDeque;

pub struct Throttle {
    samples: VecDeque<bool>,
    successes: usize,
}

impl Throttle {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "throttle window must be non-empty");
        // Start optimistic so a fresh service is never throttled
        Self {
            samples: VecDeque::from(vec![true; size]),
            successes: size,
        }
    }

    /// Whether a full window of samples came back fruitless.
    pub fn throttled(&self) -> bool {
        self.successes == 0
    }

    pub fn add(&mut self, useful: bool) {
        if let Some(oldest) = self.samples.pop_front() {
            if oldest {
                self.successes -= 1;
            }
        }
        self.samples.push_back(useful);
        if useful {
            self.successes += 1;
        }
    }

    /// Grows pad with optimistic samples; shrinking drops the oldest.
    pub fn resize(&mut self, new_size: usize) {
        assert!(new_size > 0, "throttle window must be non-empty");
        while self.samples.len() > new_size {
            if self.samples.pop_front() == Some(true) {
                self.successes -= 1;
            }
        }
        while self.samples.len() < new_size {
            self.samples.push_back(true);
            self.successes += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
