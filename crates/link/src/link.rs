//! The dual-port link orchestrator.
//!
//! Owns the outbound socket and the inbound pump, drives the
//! connect/disconnect state machine, and emits lifecycle, traffic and
//! error events to whoever took the event receiver.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SharedLinkConfig;
use crate::establish::ConnectionEstablisher;
use crate::events::{Channel, FaultReporter, LinkEvent};
use crate::relay::{self, PumpContext};
use crate::stats::{TrafficSnapshot, TrafficStats};

struct PumpHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

/// A logical bidirectional link over two outbound TCP connections.
///
/// `connect()` is all-or-nothing: after it returns, either both
/// channels are live or neither is. All failures surface as
/// [`LinkEvent`]s; the link never auto-reconnects.
pub struct DualPortLink {
    config: SharedLinkConfig,
    name: String,
    socket_to: tokio::sync::Mutex<Option<TcpStream>>,
    pump: std::sync::Mutex<Option<PumpHandle>>,
    connected: AtomicBool,
    stats: Arc<TrafficStats>,
    events_tx: mpsc::Sender<LinkEvent>,
    events_rx: tokio::sync::Mutex<Option<mpsc::Receiver<LinkEvent>>>,
    faults: FaultReporter,
}

impl DualPortLink {
    /// Creates a link bound to a shared configuration.
    pub fn new(config: SharedLinkConfig) -> Self {
        let name = config.read().unwrap().name().to_string();
        let (events_tx, events_rx) = mpsc::channel(64);
        Self {
            config,
            faults: FaultReporter::new(name.clone(), events_tx.clone()),
            name,
            socket_to: tokio::sync::Mutex::new(None),
            pump: std::sync::Mutex::new(None),
            connected: AtomicBool::new(false),
            stats: Arc::new(TrafficStats::default()),
            events_tx,
            events_rx: tokio::sync::Mutex::new(Some(events_rx)),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<LinkEvent>> {
        self.events_rx.lock().await.take()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> SharedLinkConfig {
        self.config.clone()
    }

    /// Connects both channels.
    ///
    /// Returns `true` once both channels are live, `false` after a
    /// failure on either (no sockets remain in that case; each failing
    /// channel was reported as a communication-error event). Calling
    /// while already connected is a no-op returning `true`.
    pub async fn connect(&self) -> bool {
        if self.connected.load(Ordering::Acquire) {
            warn!(link = %self.name, "connect called while already connected");
            return true;
        }

        debug_assert!(self.socket_to.lock().await.is_none());
        debug_assert!(self.pump.lock().unwrap().is_none());

        let (address, port_to, port_from) = {
            let config = self.config.read().unwrap();
            (config.address(), config.port_to(), config.port_from())
        };

        let establisher = ConnectionEstablisher {
            address,
            port_to,
            port_from,
            faults: &self.faults,
        };
        let Some((socket_to, socket_from)) = establisher.establish().await else {
            return false;
        };

        let cancel = CancellationToken::new();
        let ctx = PumpContext {
            link_name: self.name.clone(),
            events_tx: self.events_tx.clone(),
            stats: self.stats.clone(),
            faults: self.faults.clone(),
        };
        let task = tokio::spawn(relay::read_pump(socket_from, ctx, cancel.clone()));

        *self.socket_to.lock().await = Some(socket_to);
        *self.pump.lock().unwrap() = Some(PumpHandle { cancel, task });

        self.stats.mark_connected();
        self.connected.store(true, Ordering::Release);
        let _ = self.events_tx.try_send(LinkEvent::Connected);
        info!(link = %self.name, %address, port_to, port_from, "link connected");
        true
    }

    /// Tears the link down. Safe to call any number of times, including
    /// when never connected, and from a task reacting to this link's
    /// own events.
    pub async fn disconnect(&self) {
        // Cancel the readiness notifications first so a stale cycle
        // can't run the relay mid-teardown. The pump drops the inbound
        // socket after its current cycle, not here.
        if let Some(pump) = self.pump.lock().unwrap().take() {
            pump.cancel.cancel();
        }

        if let Some(mut socket_to) = self.socket_to.lock().await.take() {
            use tokio::io::AsyncWriteExt;
            let _ = socket_to.shutdown().await;
        }

        self.connected.store(false, Ordering::Release);
        self.stats.mark_disconnected();
        // Emitted on every call, connected or not; see DESIGN.md. The
        // non-blocking send keeps disconnect callable when nobody ever
        // took the event receiver.
        let _ = self.events_tx.try_send(LinkEvent::Disconnected);
        debug!(link = %self.name, "link disconnected");
    }

    /// Writes `data` verbatim to the outbound channel.
    ///
    /// A silent no-op while disconnected. Write faults surface as
    /// communication-error events rather than a return value.
    pub async fn write(&self, data: &[u8]) {
        let mut guard = self.socket_to.lock().await;
        let Some(socket) = guard.as_mut() else {
            return;
        };

        match relay::write_bytes(socket, data).await {
            Ok(()) => {
                drop(guard);
                self.stats.record_sent(data.len() as u64);
                let _ = self.events_tx.try_send(LinkEvent::BytesSent {
                    link: self.name.clone(),
                    data: data.to_vec(),
                });
            }
            Err(e) => {
                drop(guard);
                self.faults.socket_fault(Channel::Outbound, &e);
            }
        }
    }

    /// Whether both channels are currently live.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Current traffic counters.
    pub fn stats(&self) -> TrafficSnapshot {
        self.stats.snapshot()
    }

    /// Folds the current throughput window into the maxima. Intended to
    /// be called periodically by whoever displays data rates.
    pub fn roll_stats_window(&self) {
        self.stats.roll_window();
    }
}

impl Drop for DualPortLink {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().unwrap().take() {
            pump.cancel.cancel();
            pump.task.abort();
        }
    }
}
