//! Round-trip latency measurement for the initiating side of a connection

use shared::{ClientMessage, PROBE_INTERVAL};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Tracks outstanding probes and a bounded history of round-trip times
///
/// Probes carry an increasing nonce. A missing ack is never retried: once a
/// probe is older than the staleness window it is forgotten and counted as lost.
#[derive(Debug)]
pub struct LatencyMonitor {
    outstanding: HashMap<u64, Instant>,
    next_nonce: u64,
    history: VecDeque<Duration>,
    max_samples: usize,
    stale_after: Duration,
    lost: u64,
}

impl Default for LatencyMonitor {
    fn default() -> Self {
        Self::new(100, PROBE_INTERVAL * 10)
    }
}

impl LatencyMonitor {
    pub fn new(max_samples: usize, stale_after: Duration) -> Self {
        Self {
            outstanding: HashMap::new(),
            next_nonce: 1,
            history: VecDeque::with_capacity(max_samples),
            max_samples: max_samples.max(1),
            stale_after,
            lost: 0,
        }
    }

    /// Starts a new probe and returns the message to send
    pub fn next_probe(&mut self, now: Instant) -> ClientMessage {
        self.expire_stale(now);

        let nonce = self.next_nonce;
        self.next_nonce += 1;
        self.outstanding.insert(nonce, now);
        ClientMessage::Probe { nonce }
    }

    /// Records the ack for `nonce`. Unknown or expired nonces are ignored.
    pub fn on_ack(&mut self, nonce: u64, now: Instant) -> Option<Duration> {
        let sent_at = self.outstanding.remove(&nonce)?;
        let rtt = now.saturating_duration_since(sent_at);

        if self.history.len() == self.max_samples {
            self.history.pop_front();
        }
        self.history.push_back(rtt);
        Some(rtt)
    }

    /// Forgets probes older than the staleness window, returning how many
    pub fn expire_stale(&mut self, now: Instant) -> usize {
        let before = self.outstanding.len();
        let stale_after = self.stale_after;
        self.outstanding
            .retain(|_, sent_at| now.saturating_duration_since(*sent_at) <= stale_after);

        let expired = before - self.outstanding.len();
        self.lost += expired as u64;
        expired
    }

    pub fn last(&self) -> Option<Duration> {
        self.history.back().copied()
    }

    pub fn average(&self) -> Option<Duration> {
        if self.history.is_empty() {
            return None;
        }
        let total: Duration = self.history.iter().sum();
        Some(total / self.history.len() as u32)
    }

    pub fn min(&self) -> Option<Duration> {
        self.history.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.history.iter().max().copied()
    }

    pub fn samples(&self) -> usize {
        self.history.len()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn lost(&self) -> u64 {
        self.lost
    }
}
