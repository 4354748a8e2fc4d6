// src/dedup.rs
//! Set of broadcasts already surfaced to the user.
//!
//! Owned by the [`Monitor`](crate::scheduler::Monitor); never shared, never persisted.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::event::{DedupKey, Platform};

/// How long a key is remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Retention {
    /// Append-only: a key is never forgotten for the life of the process.
    #[default]
    Forever,
    /// A key survives up to `ticks` answered ticks of its platform without it and
    /// is forgotten on the next one. Failed or skipped ticks do not count.
    GracePeriod { ticks: u64 },
}

#[derive(Debug, Default)]
pub struct DedupStore {
    retention: Retention,
    // platform -> number of sweeps in which it answered
    answered: HashMap<Platform, u64>,
    // key -> its platform's answered count when the key was last observed
    seen: HashMap<DedupKey, u64>,
}

impl DedupStore {
    pub fn new(retention: Retention) -> Self {
        Self {
            retention,
            answered: HashMap::new(),
            seen: HashMap::new(),
        }
    }

    /// Returns `true` if `key` was not present (and is now recorded).
    /// A known key only has its last sighting refreshed.
    pub fn check_and_insert(&mut self, key: &DedupKey) -> bool {
        let now = self.answered_ticks(key.platform());
        match self.seen.get_mut(key) {
            Some(last) => {
                *last = now;
                false
            }
            None => {
                self.seen.insert(key.clone(), now);
                true
            }
        }
    }

    pub fn contains(&self, key: &DedupKey) -> bool {
        self.seen.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Number of ticks in which `platform` answered so far.
    pub fn answered_ticks(&self, platform: Platform) -> u64 {
        self.answered.get(&platform).copied().unwrap_or(0)
    }

    /// Close a tick: count an answer for every platform in `answered`, then evict
    /// their keys that have been absent for more than the grace period.
    /// Keys of platforms that did not answer are left alone.
    /// Returns how many keys were dropped.
    pub fn sweep(&mut self, answered: &HashSet<Platform>) -> usize {
        for platform in answered {
            *self.answered.entry(*platform).or_insert(0) += 1;
        }
        let Retention::GracePeriod { ticks } = self.retention else {
            return 0;
        };
        let counts = &self.answered;
        let before = self.seen.len();
        self.seen.retain(|key, last_seen| {
            let platform = key.platform();
            if !answered.contains(&platform) {
                return true;
            }
            let now = counts.get(&platform).copied().unwrap_or(0);
            // The tick a key was observed in is not an absence.
            let absent = now.saturating_sub(*last_seen).saturating_sub(1);
            absent <= ticks
        });
        before - self.seen.len()
    }
}
