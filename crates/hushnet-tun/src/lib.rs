//! Virtual network adapter lifecycle.
//!
//! Creates and configures the local virtual interface that carries
//! overlay traffic as ordinary IP packets. One implementation per
//! target operating system, all satisfying the same contract:
//!
//! - `create_interface(&TunConfig) -> Result<TunInterface>` — create
//!   (or re-attach to) the virtual interface itself.
//! - `prepare_interface(&TunConfig) -> Result<()>` — apply the IP
//!   address and MTU to an already-created interface. Sub-step
//!   failures are logged and non-fatal: the interface may be usable
//!   even if one configuration command failed, so callers must not
//!   treat a prepare error as adapter-creation failure.
//!
//! Interface identity is deterministic given the interface name, so
//! repeated process restarts reuse the same adapter instead of
//! accumulating orphaned ones on the host OS. On Linux the name
//! itself is the handle; on Windows the adapter GUID is derived from
//! the name via [`deterministic_guid`].
//!
//! This component is independent of the relay and host; it only
//! shares configuration values (addresses, MTU) with them.

use std::fmt;
use std::process::Command;

use uuid::{Builder, Uuid};

use hushnet_crypto::hash::sha3_256;
use hushnet_types::{HushnetError, Result};

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use linux::{create_interface, prepare_interface};

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub use macos::{create_interface, prepare_interface};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{create_interface, prepare_interface};

/// Default MTU for the virtual device.
pub const DEFAULT_MTU: u32 = 1_420;

// ---------------------------------------------------------------------------
// DeviceKind
// ---------------------------------------------------------------------------

/// Virtual device type.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DeviceKind {
    /// Layer-3 device carrying IP packets.
    #[default]
    Tun,
    /// Layer-2 device carrying Ethernet frames.
    Tap,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tun => write!(f, "tun"),
            Self::Tap => write!(f, "tap"),
        }
    }
}

// ---------------------------------------------------------------------------
// TunConfig
// ---------------------------------------------------------------------------

/// Configuration for the virtual interface.
#[derive(Clone, Debug)]
pub struct TunConfig {
    /// Interface name, e.g. `hush0`. Also determines the adapter
    /// identity (see [`deterministic_guid`]).
    pub name: String,
    /// Interface address in CIDR form, e.g. `10.1.0.1/24`.
    pub address: String,
    /// Maximum transmission unit.
    pub mtu: u32,
    /// Device type.
    pub kind: DeviceKind,
}

impl Default for TunConfig {
    fn default() -> Self {
        Self {
            name: "hush0".into(),
            address: "10.1.0.1/24".into(),
            mtu: DEFAULT_MTU,
            kind: DeviceKind::Tun,
        }
    }
}

impl TunConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HushnetError::ConfigError`] on an empty or whitespace
    /// name, a non-CIDR address, or a zero MTU.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.contains(char::is_whitespace) {
            return Err(HushnetError::ConfigError {
                reason: format!("invalid interface name '{}'", self.name),
            });
        }
        if !self.address.contains('/') {
            return Err(HushnetError::ConfigError {
                reason: format!(
                    "interface address '{}' must be in CIDR form",
                    self.address
                ),
            });
        }
        if self.mtu == 0 {
            return Err(HushnetError::ConfigError {
                reason: "MTU must be greater than 0".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TunInterface
// ---------------------------------------------------------------------------

/// Handle to a created virtual interface.
#[derive(Clone, Debug)]
pub struct TunInterface {
    name: String,
    kind: DeviceKind,
}

impl TunInterface {
    pub(crate) fn new(config: &TunConfig) -> Self {
        Self {
            name: config.name.clone(),
            kind: config.kind,
        }
    }

    /// The interface name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The device type.
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }
}

// ---------------------------------------------------------------------------
// Deterministic adapter identity
// ---------------------------------------------------------------------------

/// Derives a stable adapter GUID from the interface name.
///
/// The same name always maps to the same GUID, so restarts re-open
/// the adapter created by a previous run instead of flooding the
/// system with new network profiles. The UUID is built from the
/// leading 16 bytes of SHA3-256(name), with standard version/variant
/// bits applied.
pub fn deterministic_guid(name: &str) -> Uuid {
    let digest = sha3_256(name.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_random_bytes(bytes).into_uuid()
}

// ---------------------------------------------------------------------------
// OS command execution
// ---------------------------------------------------------------------------

/// Runs an OS network-configuration utility to completion.
///
/// # Errors
///
/// Returns [`HushnetError::AdapterError`] if the command cannot be
/// spawned or exits non-zero.
#[allow(dead_code)] // unused on platforms without an adapter module
pub(crate) fn run_command(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| HushnetError::AdapterError {
            reason: format!("failed to run {program}: {e}"),
        })?;

    if !status.success() {
        return Err(HushnetError::AdapterError {
            reason: format!("{program} {} exited with {status}", args.join(" ")),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TunConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let config = TunConfig {
            name: String::new(),
            ..TunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn whitespace_name_rejected() {
        let config = TunConfig {
            name: "hush 0".into(),
            ..TunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_cidr_address_rejected() {
        let config = TunConfig {
            address: "10.1.0.1".into(),
            ..TunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_mtu_rejected() {
        let config = TunConfig {
            mtu: 0,
            ..TunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn guid_is_stable_for_a_name() {
        assert_eq!(deterministic_guid("hush0"), deterministic_guid("hush0"));
    }

    #[test]
    fn guid_differs_between_names() {
        assert_ne!(deterministic_guid("hush0"), deterministic_guid("hush1"));
    }

    #[test]
    fn guid_is_well_formed() {
        let guid = deterministic_guid("hush0");
        assert_eq!(guid.get_version_num(), 4);
    }

    #[test]
    fn device_kind_display() {
        assert_eq!(DeviceKind::Tun.to_string(), "tun");
        assert_eq!(DeviceKind::Tap.to_string(), "tap");
    }
}
