//! Link configuration: target address and the two channel ports.
//!
//! A configuration is created by the link registry from persisted
//! settings or defaults, shared with the link it describes, and edited
//! from the settings UI. Every setter bumps a watch channel so
//! observers (settings pages, the registry) can react to edits.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, RwLock};

use tokio::sync::watch;
use tracing::warn;

use groundlink_settings::SettingsStore;

use crate::resolver::{HostResolver, lookup_address};
use crate::{DEFAULT_PORT_FROM, DEFAULT_PORT_TO};

/// Shared handle to a link configuration.
///
/// The configuration is shared, not owned: it may outlive the link and
/// is also held by the registry and the settings UI.
pub type SharedLinkConfig = Arc<RwLock<DualPortConfig>>;

/// Configuration for a dual-port link.
#[derive(Debug)]
pub struct DualPortConfig {
    name: String,
    address: IpAddr,
    port_to: u16,
    port_from: u16,
    changes: watch::Sender<u64>,
}

fn change_channel() -> watch::Sender<u64> {
    watch::channel(0).0
}

impl DualPortConfig {
    /// Creates a configuration with default ports and the "any" address.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port_to: DEFAULT_PORT_TO,
            port_from: DEFAULT_PORT_FROM,
            changes: change_channel(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.notify();
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn set_address(&mut self, address: IpAddr) {
        self.address = address;
        self.notify();
    }

    /// Outbound ("to") channel port.
    pub fn port_to(&self) -> u16 {
        self.port_to
    }

    pub fn set_port_to(&mut self, port: u16) {
        self.port_to = port;
        self.notify();
    }

    /// Inbound ("from") channel port.
    pub fn port_from(&self) -> u16 {
        self.port_from
    }

    pub fn set_port_from(&mut self, port: u16) {
        self.port_from = port;
        self.notify();
    }

    /// The current address as a host string.
    pub fn host(&self) -> String {
        self.address.to_string()
    }

    /// Sets the address from a host string, resolving non-numeric hosts
    /// through `resolver`.
    ///
    /// Resolution failure is non-fatal: the current address is kept and
    /// a warning is logged.
    pub fn set_host(&mut self, host: &str, resolver: &dyn HostResolver) {
        match lookup_address(host, resolver) {
            Some(address) => {
                self.address = address;
                self.notify();
            }
            None => warn!(%host, "could not resolve host, keeping current address"),
        }
    }

    /// Overwrites every field from another configuration.
    pub fn copy_from(&mut self, other: &DualPortConfig) {
        self.name = other.name.clone();
        self.address = other.address;
        self.port_to = other.port_to;
        self.port_from = other.port_from;
        self.notify();
    }

    /// Returns a receiver that observes configuration edits.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Persists this configuration under `group`.
    pub fn save_settings(&self, store: &mut SettingsStore, group: &str) {
        store.set_u16(group, "portTo", self.port_to);
        store.set_u16(group, "portFrom", self.port_from);
        store.set_str(group, "host", &self.host());
    }

    /// Loads this configuration from `group`, falling back to defaults
    /// for missing keys.
    pub fn load_settings(&mut self, store: &SettingsStore, group: &str) {
        self.port_to = store.get_u16(group, "portTo", DEFAULT_PORT_TO);
        self.port_from = store.get_u16(group, "portFrom", DEFAULT_PORT_FROM);
        let host = store.get_str(group, "host", &self.host());
        match host.parse::<IpAddr>() {
            Ok(address) => self.address = address,
            Err(_) => warn!(%host, "stored host is not a numeric address, keeping current"),
        }
        self.notify();
    }

    fn notify(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }
}

impl Clone for DualPortConfig {
    /// Clones the configuration data. The clone gets its own change
    /// channel; observers of the source do not see edits to the clone.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            address: self.address,
            port_to: self.port_to,
            port_from: self.port_from,
            changes: change_channel(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SystemResolver;
    use std::io;
    use std::net::Ipv6Addr;

    struct FixedResolver(Vec<IpAddr>);

    impl HostResolver for FixedResolver {
        fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
            Ok(self.0.clone())
        }
    }

    struct FailingResolver;

    impl HostResolver for FailingResolver {
        fn resolve(&self, _host: &str) -> io::Result<Vec<IpAddr>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such host"))
        }
    }

    #[test]
    fn defaults() {
        let config = DualPortConfig::new("vehicle 1");
        assert_eq!(config.name(), "vehicle 1");
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.port_to(), 8888);
        assert_eq!(config.port_from(), 8080);
    }

    #[test]
    fn setters_notify_observers() {
        let mut config = DualPortConfig::new("l");
        let mut changes = config.changes();
        assert!(!changes.has_changed().unwrap());

        config.set_port_to(9000);
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        config.set_port_from(9001);
        assert!(changes.has_changed().unwrap());
        changes.mark_unchanged();

        config.set_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(changes.has_changed().unwrap());
    }

    #[test]
    fn set_host_numeric_bypasses_resolver() {
        let mut config = DualPortConfig::new("l");
        config.set_host("127.0.0.1", &FailingResolver);
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::LOCALHOST));

        config.set_host("::1", &FailingResolver);
        assert_eq!(config.address(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn set_host_resolves_names() {
        let mut config = DualPortConfig::new("l");
        config.set_host(
            "gcs.example.com",
            &FixedResolver(vec![IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))]),
        );
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)));
    }

    #[test]
    fn set_host_failure_keeps_address() {
        let mut config = DualPortConfig::new("l");
        config.set_address(IpAddr::V4(Ipv4Addr::new(192, 168, 0, 9)));
        config.set_host("nope.invalid", &FailingResolver);
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::new(192, 168, 0, 9)));
    }

    #[test]
    fn copy_from_overwrites_all_fields() {
        let mut source = DualPortConfig::new("source");
        source.set_address(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        source.set_port_to(7000);
        source.set_port_from(7001);

        let mut config = DualPortConfig::new("target");
        config.copy_from(&source);
        assert_eq!(config.name(), "source");
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)));
        assert_eq!(config.port_to(), 7000);
        assert_eq!(config.port_from(), 7001);
    }

    #[test]
    fn clone_gets_fresh_change_channel() {
        let config = DualPortConfig::new("l");
        let mut observer = config.changes();

        let mut copy = config.clone();
        copy.set_port_to(1234);
        assert!(!observer.has_changed().unwrap());
    }

    #[test]
    fn settings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::open(dir.path().join("settings.json")).unwrap();

        let mut config = DualPortConfig::new("vehicle 1");
        config.set_host("127.0.0.1", &SystemResolver);
        config.set_port_to(9888);
        config.set_port_from(9080);
        config.save_settings(&mut store, "link.vehicle1");
        store.save().unwrap();

        let store = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        let mut loaded = DualPortConfig::new("vehicle 1");
        loaded.load_settings(&store, "link.vehicle1");
        assert_eq!(loaded.port_to(), 9888);
        assert_eq!(loaded.port_from(), 9080);
        assert_eq!(loaded.address(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn load_missing_group_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(dir.path().join("settings.json")).unwrap();

        let mut config = DualPortConfig::new("l");
        config.set_address(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1)));
        config.load_settings(&store, "no.such.group");
        assert_eq!(config.port_to(), 8888);
        assert_eq!(config.port_from(), 8080);
        // Host default is the current address.
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::new(172, 16, 0, 1)));
    }

    #[test]
    fn load_unparsable_host_keeps_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::open(dir.path().join("settings.json")).unwrap();
        store.set_str("g", "host", "not an address");

        let mut config = DualPortConfig::new("l");
        config.set_address(IpAddr::V4(Ipv4Addr::new(10, 9, 8, 7)));
        config.load_settings(&store, "g");
        assert_eq!(config.address(), IpAddr::V4(Ipv4Addr::new(10, 9, 8, 7)));
    }
}
