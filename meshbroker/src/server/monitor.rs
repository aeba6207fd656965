//! Adaptive polling control and peer liveness thresholds.
//!
//! The monitor owns two related pieces of bookkeeping:
//!
//! - the current poll timeout, halved on traffic and doubled on idle
//!   iterations, clamped to the configured `[minRate, maxRate]` band;
//! - the last time each peer identity was heard from, against which the
//!   expiry threshold is checked.
//!
//! The expiry threshold is `2 × max(current interval, maxRate)`: derived
//! from the polling interval but never tighter than a small multiple of the
//! ceiling, so a briefly busy broker does not declare quiet workers dead.

use crate::server::config::PollingRates;
use crate::transport::SocketIdentity;
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub struct SocketMonitor {
    rates: PollingRates,
    current: Duration,
    last_heard: HashMap<SocketIdentity, Instant>,
}

impl SocketMonitor {
    pub fn new(rates: PollingRates) -> Self {
        Self {
            rates,
            current: rates.min_rate(),
            last_heard: HashMap::new(),
        }
    }

    /// The timeout for the next poll.
    pub fn current_interval(&self) -> Duration {
        self.current
    }

    /// An iteration serviced at least one message.
    pub fn record_traffic(&mut self) {
        self.current = (self.current / 2).max(self.rates.min_rate());
    }

    /// An iteration timed out with nothing to do.
    pub fn record_idle(&mut self) {
        self.current = self
            .current
            .saturating_mul(2)
            .min(self.rates.max_rate());
    }

    /// Notes that `identity` was heard from at `now`.
    pub fn heartbeat(&mut self, identity: &SocketIdentity, now: Instant) {
        self.last_heard.insert(identity.clone(), now);
    }

    /// Maximum heartbeat age before a peer is considered dead.
    pub fn expiry_threshold(&self) -> Duration {
        self.current.max(self.rates.max_rate()) * 2
    }

    /// Whether `identity` has been silent past the expiry threshold.
    ///
    /// Identities never heard from are not expired; they get an entry the
    /// first time the dispatch loop sees a message from them.
    pub fn is_expired(&self, identity: &SocketIdentity, now: Instant) -> bool {
        match self.last_heard.get(identity) {
            Some(last) => now.saturating_duration_since(*last) > self.expiry_threshold(),
            None => false,
        }
    }

    /// Drops the bookkeeping for a departed peer.
    pub fn forget(&mut self, identity: &SocketIdentity) {
        self.last_heard.remove(identity);
    }

    /// Drops every expired entry. Peers that disconnected without ever
    /// being purged from the pool would otherwise accumulate here.
    pub fn sweep_expired(&mut self, now: Instant) {
        let threshold = self.expiry_threshold();
        self.last_heard
            .retain(|_, last| now.saturating_duration_since(*last) <= threshold);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(min_ms: u64, max_ms: u64) -> SocketMonitor {
        SocketMonitor::new(PollingRates::new(min_ms, max_ms).unwrap())
    }

    #[test]
    fn test_interval_starts_at_floor() {
        let monitor = monitor(100, 1000);
        assert_eq!(monitor.current_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_idle_doubles_up_to_ceiling() {
        let mut monitor = monitor(100, 1000);
        monitor.record_idle();
        assert_eq!(monitor.current_interval(), Duration::from_millis(200));
        for _ in 0..10 {
            monitor.record_idle();
        }
        assert_eq!(monitor.current_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_traffic_halves_down_to_floor() {
        let mut monitor = monitor(100, 1000);
        for _ in 0..10 {
            monitor.record_idle();
        }
        monitor.record_traffic();
        assert_eq!(monitor.current_interval(), Duration::from_millis(500));
        for _ in 0..10 {
            monitor.record_traffic();
        }
        assert_eq!(monitor.current_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_fixed_interval_when_rates_equal() {
        let mut monitor = monitor(300, 300);
        monitor.record_idle();
        monitor.record_traffic();
        assert_eq!(monitor.current_interval(), Duration::from_millis(300));
    }

    #[test]
    fn test_expiry_threshold_tracks_ceiling() {
        let monitor = monitor(100, 1000);
        assert_eq!(monitor.expiry_threshold(), Duration::from_millis(2000));
    }

    #[test]
    fn test_sweep_drops_only_expired_entries() {
        let mut monitor = monitor(10, 20); // threshold 40ms
        let quiet = SocketIdentity::from_sequence(1);
        let chatty = SocketIdentity::from_sequence(2);
        let start = Instant::now();

        monitor.heartbeat(&quiet, start);
        monitor.heartbeat(&chatty, start + Duration::from_millis(60));
        monitor.sweep_expired(start + Duration::from_millis(70));

        assert!(!monitor.is_expired(&quiet, start + Duration::from_millis(70))); // swept, unknown again
        assert!(!monitor.is_expired(&chatty, start + Duration::from_millis(70)));
        monitor.heartbeat(&quiet, start + Duration::from_millis(70));
        assert!(monitor.is_expired(&quiet, start + Duration::from_millis(200)));
    }

    #[test]
    fn test_expiry_by_heartbeat_age() {
        let mut monitor = monitor(10, 20);
        let peer = SocketIdentity::from_sequence(7);
        let start = Instant::now();

        assert!(!monitor.is_expired(&peer, start)); // never heard from

        monitor.heartbeat(&peer, start);
        assert!(!monitor.is_expired(&peer, start + Duration::from_millis(30)));
        assert!(monitor.is_expired(&peer, start + Duration::from_millis(50)));

        monitor.forget(&peer);
        assert!(!monitor.is_expired(&peer, start + Duration::from_millis(50)));
    }
}
