//! Local interface address lookup.

use crate::error::ReporterError;
use get_if_addrs::{get_if_addrs, IfAddr};
use std::net::Ipv4Addr;

/// Kernel limit on interface name length, excluding the NUL terminator.
pub const MAX_IFNAME_LEN: usize = 15;

/// IPv4 address bound to the interface `ifname`.
///
/// When an interface carries several IPv4 addresses the first one reported
/// by the OS wins.
///
/// # Errors
///
/// [`ReporterError::Interface`] if the interface does not exist or has no
/// IPv4 address.
pub fn interface_ipv4(ifname: &str) -> Result<Ipv4Addr, ReporterError> {
    if ifname.is_empty() {
        return Err(ReporterError::Interface(
            "interface name is empty".to_string(),
        ));
    }
    if ifname.len() > MAX_IFNAME_LEN {
        return Err(ReporterError::Interface(format!(
            "interface name '{}' is longer than {} bytes",
            ifname, MAX_IFNAME_LEN
        )));
    }

    let interfaces = get_if_addrs().map_err(|e| {
        ReporterError::Interface(format!("failed to list network interfaces: {}", e))
    })?;

    let mut found = false;
    for iface in interfaces.into_iter().filter(|i| i.name == ifname) {
        found = true;
        if let IfAddr::V4(v4) = iface.addr {
            return Ok(v4.ip);
        }
    }

    if found {
        Err(ReporterError::Interface(format!(
            "interface '{}' has no IPv4 address",
            ifname
        )))
    } else {
        Err(ReporterError::Interface(format!(
            "interface '{}' not found",
            ifname
        )))
    }
}

/// Every (interface name, IPv4 address) pair on this host, in OS order.
pub fn ipv4_interfaces() -> Result<Vec<(String, Ipv4Addr)>, ReporterError> {
    let interfaces = get_if_addrs().map_err(|e| {
        ReporterError::Interface(format!("failed to list network interfaces: {}", e))
    })?;

    Ok(interfaces
        .into_iter()
        .filter_map(|iface| match iface.addr {
            IfAddr::V4(v4) => Some((iface.name, v4.ip)),
            IfAddr::V6(_) => None,
        })
        .collect())
}
