//! Hardware identifier lookup for engine creation

use std::path::PathBuf;
use std::sync::LazyLock;

use genie_core::prelude::*;
use regex::Regex;

static MAC_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$").expect("Invalid MAC address regex")
});

/// Source of the device identifier handed to the engine
pub trait DeviceIdResolver: Send + Sync {
    /// `None` when no identifier can be determined
    fn resolve(&self) -> Option<String>;
}

/// A fixed identifier, typically from `[device] id`
#[derive(Debug, Clone)]
pub struct StaticDeviceId(pub String);

impl DeviceIdResolver for StaticDeviceId {
    fn resolve(&self) -> Option<String> {
        let id = self.0.trim();
        (!id.is_empty()).then(|| id.to_string())
    }
}

/// Reads the MAC address of a network interface from sysfs
#[derive(Debug, Clone)]
pub struct InterfaceMacResolver {
    interface: String,
    sysfs_root: PathBuf,
}

impl InterfaceMacResolver {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            sysfs_root: PathBuf::from("/sys/class/net"),
        }
    }

    /// Read from a different root instead of `/sys/class/net`
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }
}

impl DeviceIdResolver for InterfaceMacResolver {
    fn resolve(&self) -> Option<String> {
        let path = self.sysfs_root.join(&self.interface).join("address");
        match std::fs::read_to_string(&path) {
            Ok(raw) => {
                let mac = normalize_mac(&raw);
                if mac.is_none() {
                    warn!("Unusable MAC address {:?} in {:?}", raw.trim(), path);
                }
                mac
            }
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                None
            }
        }
    }
}

/// Validate and upper-case a colon-separated MAC address.
///
/// The all-zero address is what virtual or down interfaces report and does
/// not identify a device.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let mac = raw.trim();
    if !MAC_REGEX.is_match(mac) {
        return None;
    }

    let mac = mac.to_ascii_uppercase();
    (mac != "00:00:00:00:00:00").then_some(mac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(
            normalize_mac("aa:bb:cc:0d:1e:ff\n"),
            Some("AA:BB:CC:0D:1E:FF".to_string())
        );
        assert_eq!(normalize_mac("00:00:00:00:00:00"), None);
        assert_eq!(normalize_mac("aa-bb-cc-dd-ee-ff"), None);
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee"), None);
        assert_eq!(normalize_mac(""), None);
    }

    #[test]
    fn test_static_id() {
        assert_eq!(
            StaticDeviceId("dev-1".into()).resolve(),
            Some("dev-1".to_string())
        );
        assert_eq!(StaticDeviceId("   ".into()).resolve(), None);
    }

    #[test]
    fn test_interface_resolver_reads_sysfs() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("wlan0")).unwrap();
        std::fs::write(
            temp.path().join("wlan0").join("address"),
            "de:ad:be:ef:00:01\n",
        )
        .unwrap();

        let resolver = InterfaceMacResolver::new("wlan0").with_root(temp.path());
        assert_eq!(resolver.resolve(), Some("DE:AD:BE:EF:00:01".to_string()));
    }

    #[test]
    fn test_interface_resolver_missing_interface() {
        let temp = tempdir().unwrap();
        let resolver = InterfaceMacResolver::new("eth9").with_root(temp.path());
        assert_eq!(resolver.resolve(), None);
    }
}
