//! macOS implementation of the adapter contract.
//!
//! Darwin creates `utun` devices on open, so creation only validates
//! the name; identity is deterministic because the kernel hands back
//! the device matching the requested unit number.

use hushnet_types::{HushnetError, Result};

use crate::{run_command, TunConfig, TunInterface};

/// Attaches to the named `utun` device.
///
/// # Errors
///
/// Returns [`HushnetError::ConfigError`] when the name is not a
/// `utun` device — Darwin does not support arbitrary names.
pub fn create_interface(config: &TunConfig) -> Result<TunInterface> {
    config.validate()?;

    if !config.name.starts_with("utun") {
        return Err(HushnetError::ConfigError {
            reason: format!(
                "interface name '{}' must be a utun device on macOS",
                config.name
            ),
        });
    }

    Ok(TunInterface::new(config))
}

/// Applies address and MTU via `ifconfig`.
///
/// Sub-step failures are logged at warn level and non-fatal.
pub fn prepare_interface(config: &TunConfig) -> Result<()> {
    config.validate()?;

    // Point-to-point addressing: the local address doubles as the
    // peer for the utun device.
    let local = config
        .address
        .split('/')
        .next()
        .unwrap_or(config.address.as_str());
    if let Err(e) = run_command(
        "ifconfig",
        &[&config.name, "inet", &config.address, local, "up"],
    ) {
        tracing::warn!(name = %config.name, %e, "address assignment failed");
    }

    let mtu = config.mtu.to_string();
    if let Err(e) = run_command("ifconfig", &[&config.name, "mtu", &mtu]) {
        tracing::warn!(name = %config.name, %e, "MTU configuration failed");
    }

    Ok(())
}
