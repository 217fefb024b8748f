//! Provides helpers for discovering network interfaces and their addresses

use pnet::{
    datalink::NetworkInterface as PNetNetworkInterface,
    ipnetwork::{self, IpNetwork},
    util::MacAddr,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use crate::{
    error::{RCapLibError, Result},
    wire::{Backend, PNetBackend},
};

const IPV4_ROUTE_TABLE: &str = "/proc/net/route";
const IPV6_ROUTE_TABLE: &str = "/proc/net/ipv6_route";

// route flags from linux/route.h
const RTF_UP: u32 = 0x0001;
const RTF_GATEWAY: u32 = 0x0002;

/// Length in bytes of a link-layer (MAC) address
pub const MAC_ADDRESS_LEN: usize = 6;

/// Network-layer address assigned to an interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    /// The assigned address
    pub addr: IpAddr,
    /// Netmask of the network the address belongs to
    pub netmask: IpAddr,
    /// Broadcast address of the network (IPv4 only)
    pub broadcast: Option<IpAddr>,
}

impl InterfaceAddress {
    /// Returns the prefix length of the netmask if it is contiguous
    pub fn prefix(&self) -> Option<u8> {
        ipnetwork::ip_mask_to_prefix(self.netmask).ok()
    }
}

impl From<&IpNetwork> for InterfaceAddress {
    fn from(value: &IpNetwork) -> Self {
        let broadcast = match value {
            IpNetwork::V4(net) => Some(IpAddr::V4(net.broadcast())),
            IpNetwork::V6(_) => None,
        };

        Self {
            addr: value.ip(),
            netmask: value.mask(),
            broadcast,
        }
    }
}

fn serialize_mac<S>(
    mac: &Option<MacAddr>,
    s: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match mac {
        Some(m) => s.serialize_some(&m.to_string()),
        None => s.serialize_none(),
    }
}

fn deserialize_mac<'de, D>(
    d: D,
) -> std::result::Result<Option<MacAddr>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(d)?
        .map(|s| s.parse::<MacAddr>().map_err(serde::de::Error::custom))
        .transpose()
}

/// Data structure representing a capturable network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Name of the interface i.e. eth0, en0
    pub name: String,
    /// Human readable description, may be empty
    pub description: String,
    /// OS index of the interface
    pub index: u32,
    /// Raw OS interface flags
    pub flags: u32,
    /// Link-layer address if the interface has one
    #[serde(serialize_with = "serialize_mac", deserialize_with = "deserialize_mac")]
    pub mac: Option<MacAddr>,
    /// Network-layer addresses assigned to the interface
    pub addresses: Vec<InterfaceAddress>,
    /// Default gateways reachable through the interface
    pub gateway_addresses: Vec<IpAddr>,
}

impl NetworkInterface {
    /// Returns the link-layer address as raw bytes
    pub fn mac_bytes(&self) -> Option<[u8; MAC_ADDRESS_LEN]> {
        self.mac.map(|m| [m.0, m.1, m.2, m.3, m.4, m.5])
    }

    /// Returns the first IPv4 address assigned to the interface
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        self.addresses.iter().find_map(|a| match a.addr {
            IpAddr::V4(ip) => Some(ip),
            IpAddr::V6(_) => None,
        })
    }

    /// Whether the interface is administratively up
    pub fn is_up(&self) -> bool {
        PNetNetworkInterface::from(self).is_up()
    }

    /// Whether the interface is a loopback interface
    pub fn is_loopback(&self) -> bool {
        PNetNetworkInterface::from(self).is_loopback()
    }

    /// Returns a copy of this interface with the given gateways attached
    pub fn with_gateways(mut self, gateways: Vec<IpAddr>) -> Self {
        self.gateway_addresses = gateways;
        self
    }
}

impl From<PNetNetworkInterface> for NetworkInterface {
    fn from(value: PNetNetworkInterface) -> Self {
        Self {
            addresses: value.ips.iter().map(InterfaceAddress::from).collect(),
            name: value.name,
            description: value.description,
            index: value.index,
            flags: value.flags,
            mac: value.mac,
            gateway_addresses: Vec::new(),
        }
    }
}

impl From<&NetworkInterface> for PNetNetworkInterface {
    fn from(value: &NetworkInterface) -> Self {
        Self {
            name: value.name.clone(),
            description: value.description.clone(),
            index: value.index,
            mac: value.mac,
            ips: value
                .addresses
                .iter()
                .filter_map(|a| IpNetwork::with_netmask(a.addr, a.netmask).ok())
                .collect(),
            flags: value.flags,
        }
    }
}

/// Returns all network interfaces on the current host
///
/// Example
/// ```no_run
/// # use r_caplib::network;
/// for iface in network::interfaces().unwrap() {
///     println!("{}: {}", iface.name, iface.description);
/// }
/// ```
pub fn interfaces() -> Result<Vec<NetworkInterface>> {
    PNetBackend.interfaces()
}

/// Returns the network interface with the given name
pub fn get_interface(name: &str) -> Result<NetworkInterface> {
    interfaces()?
        .into_iter()
        .find(|i| i.name == name)
        .ok_or_else(|| RCapLibError::DeviceNotFound(name.to_string()))
}

/// Returns the first interface that is up, is not a loopback and has an
/// IPv4 address assigned
pub fn get_default_interface() -> Result<NetworkInterface> {
    interfaces()?
        .into_iter()
        .find(|i| i.is_up() && !i.is_loopback() && i.ipv4().is_some())
        .ok_or_else(|| {
            RCapLibError::DeviceNotFound("no default interface".to_string())
        })
}

/// Returns default gateways keyed by interface name. Empty on platforms
/// without a procfs routing table.
pub fn get_default_gateways() -> HashMap<String, Vec<IpAddr>> {
    let mut gateways = HashMap::new();

    if let Ok(table) = std::fs::read_to_string(IPV4_ROUTE_TABLE) {
        merge_gateways(&mut gateways, parse_ipv4_route_table(&table));
    }

    if let Ok(table) = std::fs::read_to_string(IPV6_ROUTE_TABLE) {
        merge_gateways(&mut gateways, parse_ipv6_route_table(&table));
    }

    gateways
}

fn merge_gateways(
    into: &mut HashMap<String, Vec<IpAddr>>,
    from: HashMap<String, Vec<IpAddr>>,
) {
    for (iface, addrs) in from {
        let entry = into.entry(iface).or_default();
        for addr in addrs {
            if !entry.contains(&addr) {
                entry.push(addr);
            }
        }
    }
}

fn is_default_gateway_route(flags: u32) -> bool {
    flags & RTF_UP != 0 && flags & RTF_GATEWAY != 0
}

// Iface Destination Gateway Flags RefCnt Use Metric Mask MTU Window IRTT
// Addresses are printed as hex in host byte order.
fn parse_ipv4_route_table(table: &str) -> HashMap<String, Vec<IpAddr>> {
    let mut gateways: HashMap<String, Vec<IpAddr>> = HashMap::new();

    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() < 8 {
            continue;
        }

        let (Ok(dest), Ok(gw), Ok(flags), Ok(mask)) = (
            u32::from_str_radix(fields[1], 16),
            u32::from_str_radix(fields[2], 16),
            u32::from_str_radix(fields[3], 16),
            u32::from_str_radix(fields[7], 16),
        ) else {
            continue;
        };

        if dest != 0 || mask != 0 || gw == 0 || !is_default_gateway_route(flags)
        {
            continue;
        }

        let addr = IpAddr::V4(Ipv4Addr::from(gw.to_ne_bytes()));
        let entry = gateways.entry(fields[0].to_string()).or_default();
        if !entry.contains(&addr) {
            entry.push(addr);
        }
    }

    gateways
}

// dest dest_prefix src src_prefix next_hop metric refcnt use flags iface
// Addresses are printed as hex in network byte order.
fn parse_ipv6_route_table(table: &str) -> HashMap<String, Vec<IpAddr>> {
    let mut gateways: HashMap<String, Vec<IpAddr>> = HashMap::new();

    for line in table.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() < 10 {
            continue;
        }

        let (Ok(dest), Ok(prefix), Ok(next_hop), Ok(flags)) = (
            u128::from_str_radix(fields[0], 16),
            u8::from_str_radix(fields[1], 16),
            u128::from_str_radix(fields[4], 16),
            u32::from_str_radix(fields[8], 16),
        ) else {
            continue;
        };

        if dest != 0
            || prefix != 0
            || next_hop == 0
            || !is_default_gateway_route(flags)
        {
            continue;
        }

        let addr = IpAddr::V6(Ipv6Addr::from(next_hop));
        let entry = gateways.entry(fields[9].to_string()).or_default();
        if !entry.contains(&addr) {
            entry.push(addr);
        }
    }

    gateways
}

#[cfg(test)]
#[path = "./network_tests.rs"]
mod tests;
