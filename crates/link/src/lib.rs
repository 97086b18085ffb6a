//! Dual-port TCP link for ground-control communication.
//!
//! Establishes and maintains a logical bidirectional link to a remote
//! endpoint over two independent outbound TCP connections: one dedicated
//! to outbound ("to") traffic and one dedicated to inbound ("from")
//! traffic. Connecting is all-or-nothing across the pair — the link is
//! never left with exactly one live socket.
//!
//! The link moves raw bytes only. Framing, retries and authentication
//! are the caller's concern.

pub mod config;
pub mod error;
pub mod events;
pub mod link;
pub mod resolver;
pub mod stats;

pub(crate) mod establish;
pub(crate) mod relay;

pub use config::{DualPortConfig, SharedLinkConfig};
pub use error::LinkError;
pub use events::LinkEvent;
pub use link::DualPortLink;
pub use resolver::{HostResolver, SystemResolver};
pub use stats::TrafficSnapshot;

use std::time::Duration;

/// Default port for the outbound ("to") channel.
pub const DEFAULT_PORT_TO: u16 = 8888;

/// Default port for the inbound ("from") channel.
pub const DEFAULT_PORT_FROM: u16 = 8080;

/// Per-channel bound on a connection attempt. A full connect waits up
/// to twice this in the worst case (two sequential channels).
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Inbound drain buffer size (64 KB). Each readiness cycle reads at
/// most this much in one pass.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;
