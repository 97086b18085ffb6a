//! Byte relay: outbound writes and inbound draining.
//!
//! Writes go to the outbound socket verbatim. Inbound data is drained by
//! a pump task: each readiness cycle reads whatever is available in one
//! pass into a fresh buffer and emits it as a single event. No partial
//! reads are retried and nothing is buffered across cycles.

use std::io;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::READ_BUFFER_SIZE;
use crate::events::{Channel, FaultReporter, LinkEvent};
use crate::stats::TrafficStats;

/// Outcome of a single inbound drain pass.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Drained {
    /// Bytes were available and read in one pass.
    Data(Vec<u8>),
    /// Nothing available right now (spurious readiness).
    Empty,
    /// The peer closed the connection.
    Closed,
}

/// Reads whatever is available on `socket` right now, without blocking.
pub(crate) fn drain_available(socket: &TcpStream) -> io::Result<Drained> {
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    match socket.try_read(&mut buf) {
        Ok(0) => Ok(Drained::Closed),
        Ok(n) => {
            buf.truncate(n);
            Ok(Drained::Data(buf))
        }
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(Drained::Empty),
        Err(e) => Err(e),
    }
}

/// Writes `data` verbatim to the outbound socket.
pub(crate) async fn write_bytes(socket: &mut TcpStream, data: &[u8]) -> io::Result<()> {
    trace!(bytes = data.len(), payload = %payload_preview(data), "outbound write");
    socket.write_all(data).await
}

/// Shared state the inbound pump needs from its link.
pub(crate) struct PumpContext {
    pub link_name: String,
    pub events_tx: mpsc::Sender<LinkEvent>,
    pub stats: Arc<TrafficStats>,
    pub faults: FaultReporter,
}

/// Drains the inbound socket until cancelled or the channel fails.
///
/// The pump owns the socket. Cancellation makes the loop exit after the
/// cycle in progress, so the socket is dropped here rather than inside
/// whatever context requested the teardown.
pub(crate) async fn read_pump(socket: TcpStream, ctx: PumpContext, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            ready = socket.readable() => {
                if let Err(e) = ready {
                    ctx.faults.socket_fault(Channel::Inbound, &e);
                    break;
                }
                match drain_available(&socket) {
                    Ok(Drained::Data(data)) => {
                        trace!(bytes = data.len(), payload = %payload_preview(&data), "inbound drain");
                        ctx.stats.record_received(data.len() as u64);
                        let _ = ctx.events_tx.try_send(LinkEvent::BytesReceived {
                            link: ctx.link_name.clone(),
                            data,
                        });
                    }
                    Ok(Drained::Empty) => {}
                    Ok(Drained::Closed) => {
                        let err = io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed by peer",
                        );
                        ctx.faults.socket_fault(Channel::Inbound, &err);
                        break;
                    }
                    Err(e) => {
                        ctx.faults.socket_fault(Channel::Inbound, &e);
                        break;
                    }
                }
            }
        }
    }

    debug!(link = %ctx.link_name, "inbound pump stopped");
}

/// Hex + ASCII rendering of a payload prefix for trace logging.
fn payload_preview(data: &[u8]) -> String {
    const MAX: usize = 32;
    let shown = &data[..data.len().min(MAX)];
    let mut out = String::with_capacity(shown.len() * 4 + 8);
    for b in shown {
        out.push_str(&format!("{b:02x} "));
    }
    out.push('|');
    for &b in shown {
        out.push(if (32..127).contains(&b) { b as char } else { '.' });
    }
    out.push('|');
    if data.len() > MAX {
        out.push_str(&format!(" +{}", data.len() - MAX));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (accepted, _) = listener.accept().await.unwrap();
        (connect.await.unwrap(), accepted)
    }

    fn pump_context(
        stats: Arc<TrafficStats>,
    ) -> (PumpContext, mpsc::Receiver<LinkEvent>) {
        let (events_tx, events_rx) = mpsc::channel(64);
        let ctx = PumpContext {
            link_name: "test link".into(),
            events_tx: events_tx.clone(),
            stats,
            faults: FaultReporter::new("test link".into(), events_tx),
        };
        (ctx, events_rx)
    }

    #[tokio::test]
    async fn drain_with_nothing_available_is_empty() {
        let (local, _peer) = socket_pair().await;
        assert_eq!(drain_available(&local).unwrap(), Drained::Empty);
    }

    #[tokio::test]
    async fn drain_reads_available_bytes_in_one_pass() {
        let (local, mut peer) = socket_pair().await;
        peer.write_all(b"telemetry frame").await.unwrap();

        local.readable().await.unwrap();
        match drain_available(&local).unwrap() {
            Drained::Data(data) => assert_eq!(data, b"telemetry frame"),
            other => panic!("expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_detects_peer_close() {
        let (local, peer) = socket_pair().await;
        drop(peer);

        local.readable().await.unwrap();
        assert_eq!(drain_available(&local).unwrap(), Drained::Closed);
    }

    #[tokio::test]
    async fn write_bytes_reaches_peer() {
        let (mut local, mut peer) = socket_pair().await;
        write_bytes(&mut local, b"\x01\x02\x03").await.unwrap();

        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"\x01\x02\x03");
    }

    #[tokio::test]
    async fn pump_emits_received_bytes() {
        let (local, mut peer) = socket_pair().await;
        let stats = Arc::new(TrafficStats::default());
        let (ctx, mut events_rx) = pump_context(stats.clone());
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(read_pump(local, ctx, cancel.clone()));

        peer.write_all(b"hello link").await.unwrap();

        let event = events_rx.recv().await.unwrap();
        assert_eq!(
            event,
            LinkEvent::BytesReceived {
                link: "test link".into(),
                data: b"hello link".to_vec(),
            }
        );
        assert_eq!(stats.snapshot().bytes_received_total, 10);

        cancel.cancel();
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn pump_reports_fault_on_peer_close() {
        let (local, peer) = socket_pair().await;
        let (ctx, mut events_rx) = pump_context(Arc::new(TrafficStats::default()));
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(read_pump(local, ctx, cancel));
        drop(peer);

        // Dual-message fault: one event per channel.
        let first = events_rx.recv().await.unwrap();
        let second = events_rx.recv().await.unwrap();
        assert!(matches!(first, LinkEvent::CommunicationError { .. }));
        assert!(matches!(
            second,
            LinkEvent::CommunicationError { ref message, .. }
                if message.contains("connection closed by peer")
        ));

        // The pump ends on its own; no auto-disconnect happens here.
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn pump_exits_on_cancel_without_events() {
        let (local, _peer) = socket_pair().await;
        let (ctx, mut events_rx) = pump_context(Arc::new(TrafficStats::default()));
        let cancel = CancellationToken::new();

        let pump = tokio::spawn(read_pump(local, ctx, cancel.clone()));
        cancel.cancel();
        pump.await.unwrap();

        assert!(events_rx.try_recv().is_err());
    }

    #[test]
    fn payload_preview_renders_hex_and_ascii() {
        let preview = payload_preview(b"AB\x00");
        assert!(preview.contains("41 42 00"));
        assert!(preview.contains("|AB.|"));
    }

    #[test]
    fn payload_preview_truncates_long_payloads() {
        let preview = payload_preview(&[0u8; 100]);
        assert!(preview.ends_with("+68"));
    }
}
