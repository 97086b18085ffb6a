//! Traffic accounting for a link.
//!
//! Counters are shared between the write path (caller context) and the
//! inbound read pump, so the aggregate sits behind a mutex. Critical
//! sections are a few loads and stores; nothing awaits under the lock.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Point-in-time copy of a link's traffic counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficSnapshot {
    pub bytes_sent_total: u64,
    pub bytes_sent_window: u64,
    pub bytes_sent_window_max: u64,
    pub bytes_received_total: u64,
    pub bytes_received_window: u64,
    pub bytes_received_window_max: u64,
    /// Time since the current connection was established, if connected.
    pub uptime: Option<Duration>,
}

#[derive(Debug, Default)]
struct Counters {
    sent_total: u64,
    sent_window: u64,
    sent_window_max: u64,
    received_total: u64,
    received_window: u64,
    received_window_max: u64,
    connected_since: Option<Instant>,
}

/// Mutex-guarded traffic counters for one link.
#[derive(Debug, Default)]
pub struct TrafficStats {
    inner: Mutex<Counters>,
}

impl TrafficStats {
    pub fn record_sent(&self, bytes: u64) {
        let mut c = self.inner.lock().unwrap();
        c.sent_total += bytes;
        c.sent_window += bytes;
    }

    pub fn record_received(&self, bytes: u64) {
        let mut c = self.inner.lock().unwrap();
        c.received_total += bytes;
        c.received_window += bytes;
    }

    /// Marks the start of a connection, resetting the window counters.
    pub fn mark_connected(&self) {
        let mut c = self.inner.lock().unwrap();
        c.connected_since = Some(Instant::now());
        c.sent_window = 0;
        c.received_window = 0;
    }

    pub fn mark_disconnected(&self) {
        self.inner.lock().unwrap().connected_since = None;
    }

    /// Folds the current window into the window maxima and starts a
    /// fresh window. Called by whoever samples throughput periodically.
    pub fn roll_window(&self) {
        let mut c = self.inner.lock().unwrap();
        c.sent_window_max = c.sent_window_max.max(c.sent_window);
        c.received_window_max = c.received_window_max.max(c.received_window);
        c.sent_window = 0;
        c.received_window = 0;
    }

    pub fn snapshot(&self) -> TrafficSnapshot {
        let c = self.inner.lock().unwrap();
        TrafficSnapshot {
            bytes_sent_total: c.sent_total,
            bytes_sent_window: c.sent_window,
            bytes_sent_window_max: c.sent_window_max,
            bytes_received_total: c.received_total,
            bytes_received_window: c.received_window,
            bytes_received_window_max: c.received_window_max,
            uptime: c.connected_since.map(|t| t.elapsed()),
        }
    }
}
