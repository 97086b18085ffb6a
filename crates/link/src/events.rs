//! Observable link events and socket-fault reporting.
//!
//! Events are emitted without blocking: when the channel buffer is full
//! (for example when the caller never takes the receiver) the event is
//! dropped rather than stalling the link. Lifecycle operations must
//! stay callable with no consumer attached.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::warn;

/// Title used for all communication-error events.
pub const ERROR_TITLE: &str = "Link Error";

/// Events emitted by a [`DualPortLink`](crate::DualPortLink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Both channels connected; the link is up.
    Connected,
    /// The link was torn down. Emitted on every `disconnect()` call,
    /// including when the link was never connected.
    Disconnected,
    /// Bytes were written to the outbound channel.
    BytesSent { link: String, data: Vec<u8> },
    /// Bytes were drained from the inbound channel.
    BytesReceived { link: String, data: Vec<u8> },
    /// A connect attempt failed or a connected channel faulted.
    CommunicationError { title: String, message: String },
}

/// Which of the two channels an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Outbound,
    Inbound,
}

#[derive(Debug)]
struct ChannelErrors {
    outbound: String,
    inbound: String,
}

impl Default for ChannelErrors {
    fn default() -> Self {
        Self {
            outbound: "no error".into(),
            inbound: "no error".into(),
        }
    }
}

/// Emits communication-error events for a link.
///
/// A socket fault on either channel produces one message per channel,
/// each describing that channel's current error string, including the
/// channel that did not fault. Callers depend on that surface; see
/// DESIGN.md before changing it.
#[derive(Clone)]
pub(crate) struct FaultReporter {
    link_name: String,
    events_tx: mpsc::Sender<LinkEvent>,
    errors: Arc<Mutex<ChannelErrors>>,
}

impl FaultReporter {
    pub(crate) fn new(link_name: String, events_tx: mpsc::Sender<LinkEvent>) -> Self {
        Self {
            link_name,
            events_tx,
            errors: Arc::new(Mutex::new(ChannelErrors::default())),
        }
    }

    /// Reports a failed connection attempt on one channel.
    pub(crate) fn connect_failed(&self, channel: Channel, err: &crate::LinkError) {
        warn!(link = %self.link_name, ?channel, error = %err, "connection failed");
        let _ = self.events_tx.try_send(LinkEvent::CommunicationError {
            title: ERROR_TITLE.into(),
            message: format!("Error on link {}. Connection failed", self.link_name),
        });
    }

    /// Reports a fault on an already-connected channel.
    pub(crate) fn socket_fault(&self, channel: Channel, err: &io::Error) {
        warn!(link = %self.link_name, ?channel, error = %err, "socket fault");

        let (outbound, inbound) = {
            let mut errors = self.errors.lock().unwrap();
            match channel {
                Channel::Outbound => errors.outbound = err.to_string(),
                Channel::Inbound => errors.inbound = err.to_string(),
            }
            (errors.outbound.clone(), errors.inbound.clone())
        };

        for error_string in [outbound, inbound] {
            let _ = self.events_tx.try_send(LinkEvent::CommunicationError {
                title: ERROR_TITLE.into(),
                message: format!(
                    "Error on link {}. Error on socket: {}.",
                    self.link_name, error_string
                ),
            });
        }
    }
}
