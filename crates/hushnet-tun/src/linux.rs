//! Linux implementation of the adapter contract, via the `ip` utility.
//!
//! Interface identity is the name itself: creation first looks for an
//! existing device and re-attaches to it, so restarts never
//! accumulate devices.

use hushnet_types::Result;

use crate::{run_command, DeviceKind, TunConfig, TunInterface};

/// Creates the virtual interface, reusing an existing device of the
/// same name.
///
/// # Errors
///
/// Returns [`hushnet_types::HushnetError::ConfigError`] on invalid
/// configuration and
/// [`hushnet_types::HushnetError::AdapterError`] when the device can
/// neither be found nor created.
pub fn create_interface(config: &TunConfig) -> Result<TunInterface> {
    config.validate()?;

    if run_command("ip", &["link", "show", "dev", &config.name]).is_ok() {
        tracing::info!(name = %config.name, "reusing existing interface");
        return Ok(TunInterface::new(config));
    }

    let mode = match config.kind {
        DeviceKind::Tun => "tun",
        DeviceKind::Tap => "tap",
    };
    run_command("ip", &["tuntap", "add", "dev", &config.name, "mode", mode])?;
    tracing::info!(name = %config.name, mode, "interface created");

    Ok(TunInterface::new(config))
}

/// Applies address and MTU to an already-created interface.
///
/// Each sub-step failure is logged at warn level and does not abort
/// the remaining steps — the interface may be usable regardless.
pub fn prepare_interface(config: &TunConfig) -> Result<()> {
    config.validate()?;

    if let Err(e) = run_command(
        "ip",
        &["addr", "replace", &config.address, "dev", &config.name],
    ) {
        tracing::warn!(name = %config.name, %e, "address assignment failed");
    }

    let mtu = config.mtu.to_string();
    if let Err(e) = run_command(
        "ip",
        &["link", "set", "dev", &config.name, "mtu", &mtu, "up"],
    ) {
        tracing::warn!(name = %config.name, %e, "MTU/link-up configuration failed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Device manipulation needs CAP_NET_ADMIN, so tests only cover the
    // validation path that runs before any command.

    #[test]
    fn create_rejects_invalid_config() {
        let config = TunConfig {
            name: String::new(),
            ..TunConfig::default()
        };
        assert!(create_interface(&config).is_err());
    }

    #[test]
    fn prepare_rejects_invalid_config() {
        let config = TunConfig {
            address: "no-prefix".into(),
            ..TunConfig::default()
        };
        assert!(prepare_interface(&config).is_err());
    }
}
