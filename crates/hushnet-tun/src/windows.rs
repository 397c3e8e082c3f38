//! Windows implementation of the adapter contract.
//!
//! The adapter is pre-created through the wintun driver with a GUID
//! derived from the interface name, so repeated process restarts
//! re-open the same adapter instead of flooding the system with new
//! network profiles. Address and MTU are applied with `netsh`.

use hushnet_types::{HushnetError, Result};

use crate::{deterministic_guid, run_command, TunConfig, TunInterface};

/// Tunnel type label registered with the wintun driver.
const TUNNEL_TYPE: &str = "Hushnet";

/// Creates (or re-opens) the wintun adapter with the deterministic
/// GUID for this interface name.
pub fn create_interface(config: &TunConfig) -> Result<TunInterface> {
    config.validate()?;

    let guid = deterministic_guid(&config.name);
    let wintun = unsafe { wintun::load() }.map_err(|e| HushnetError::AdapterError {
        reason: format!("failed to load wintun driver: {e}"),
    })?;

    wintun::Adapter::create(&wintun, &config.name, TUNNEL_TYPE, Some(guid.as_u128()))
        .map_err(|e| HushnetError::AdapterError {
            reason: format!("failed to create wintun adapter: {e}"),
        })?;
    tracing::info!(name = %config.name, %guid, "wintun adapter ready");

    Ok(TunInterface::new(config))
}

/// Applies address and MTU via `netsh`.
///
/// Sub-step failures are logged at warn level and non-fatal.
pub fn prepare_interface(config: &TunConfig) -> Result<()> {
    config.validate()?;

    let name_arg = format!("name={}", config.name);
    if let Err(e) = run_command(
        "netsh",
        &[
            "interface",
            "ip",
            "set",
            "address",
            &name_arg,
            "static",
            &config.address,
        ],
    ) {
        tracing::warn!(name = %config.name, %e, "address assignment failed");
    }

    let mtu_arg = format!("mtu={}", config.mtu);
    if let Err(e) = run_command(
        "netsh",
        &[
            "interface",
            "ipv4",
            "set",
            "subinterface",
            &config.name,
            &mtu_arg,
        ],
    ) {
        tracing::warn!(name = %config.name, %e, "MTU configuration failed");
    }

    Ok(())
}
