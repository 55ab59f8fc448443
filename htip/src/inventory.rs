//! Interface discovery and classification.
//!
//! Discovery (`read_ifinfo`) and classification (`read_net_type`) are kept as separate
//! passes, mirroring how the two concerns are separated upstream: discovery only needs
//! to know what interfaces and addresses the kernel reports, while classification needs
//! host-specific ioctls that have nothing to do with Netlink.

use std::ffi::CString;
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use slog::{debug, warn};

use netlink::rtnetlink::{AddressFamily, IPAddress, NetlinkRoute, RTNetlink};
use netlink::NetlinkSocket;

use crate::error::{HtipError, Result};
use crate::transmit::{TransmitBackend, Transmitter};

pub const MAX_INTERFACES: usize = 20;

const LOOPBACK_NAMES: [&str; 2] = ["lo", "lo0"];

/// IANA ifType values this implementation distinguishes; anything else classifies as
/// [`LinkType::Other`] and is dropped from the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
	EthernetCsmaCd,
	Ieee80211,
	Other,
}

impl LinkType {
	pub fn iana_code(self) -> u32 {
		match self {
			LinkType::EthernetCsmaCd => 6,
			LinkType::Ieee80211 => 71,
			LinkType::Other => 1,
		}
	}
}

/// A discovered, classified L2 interface and, once opened, its transmit handle.
#[derive(Debug)]
pub struct InterfaceRecord {
	pub name: String,
	pub mac: [u8; 6],
	pub ipv4: Option<([u8; 4], u8)>,
	pub link_type: LinkType,
	pub port_no: u16,
	pub handle: Option<Box<dyn Transmitter>>,
}

/// A bare interface as reported by the kernel, before classification.
#[derive(Debug, Clone)]
pub struct RawInterface {
	pub index: i32,
	pub name: String,
	pub mac: Option<[u8; 6]>,
}

/// A bare address as reported by the kernel, before being matched to an interface.
#[derive(Debug, Clone)]
pub struct RawAddress {
	pub index: i32,
	pub ipv4: [u8; 4],
	pub prefix_length: u8,
}

/// Abstracts over how the interface and address lists are obtained, so tests can supply
/// a fixed list instead of talking to the kernel.
pub trait InventorySource {
	fn list_interfaces(&mut self) -> io::Result<Vec<RawInterface>>;
	fn list_addresses(&mut self) -> io::Result<Vec<RawAddress>>;
}

/// Production [`InventorySource`] backed by an `NETLINK_ROUTE` socket.
pub struct NetlinkInventorySource {
	socket: NetlinkSocket<NetlinkRoute>,
}

impl NetlinkInventorySource {
	pub fn new() -> io::Result<Self> {
		Ok(Self {
			socket: NetlinkSocket::new(Default::default())?,
		})
	}
}

impl InventorySource for NetlinkInventorySource {
	fn list_interfaces(&mut self) -> io::Result<Vec<RawInterface>> {
		let links = self.socket.get_links()?;
		Ok(links
			.into_iter()
			.filter_map(|link| {
				let name = link.attributes.name.clone()?;
				Some(RawInterface {
					index: link.index,
					name,
					mac: link.attributes.mac_address.as_ref().map(|m| {
						let text = m.to_string();
						let mut bytes = [0u8; 6];
						for (i, octet) in text.split(':').enumerate().take(6) {
							bytes[i] = u8::from_str_radix(octet, 16).unwrap_or(0);
						}
						bytes
					}),
				})
			})
			.collect())
	}

	fn list_addresses(&mut self) -> io::Result<Vec<RawAddress>> {
		let addrs = self.socket.get_addrs(0)?;
		Ok(addrs
			.into_iter()
			.filter_map(|addr| {
				if !matches!(addr.message.family, AddressFamily::IPv4) {
					return None;
				}
				let ipv4 = match addr.attributes.local.or(addr.attributes.address) {
					Some(IPAddress::IPv4(bytes)) => bytes,
					_ => return None,
				};

				Some(RawAddress {
					index: addr.message.index as i32,
					ipv4,
					prefix_length: addr.message.prefix_length,
				})
			})
			.collect())
	}
}

/// Discovers every usable L2 interface: queries the inventory source, drops loopback and
/// bridge-master interfaces, attaches the matching IPv4 address if any, and caps the
/// result at [`MAX_INTERFACES`].
pub fn read_ifinfo(logger: &slog::Logger, source: &mut dyn InventorySource) -> Result<Vec<InterfaceRecord>> {
	let interfaces = source.list_interfaces().map_err(HtipError::InventoryUnavailable)?;
	let addresses = source.list_addresses().map_err(HtipError::InventoryUnavailable)?;

	let mut records = Vec::new();
	for iface in interfaces {
		if LOOPBACK_NAMES.contains(&iface.name.as_str()) {
			continue;
		}

		let Some(mac) = iface.mac else {
			debug!(logger, "skipping interface with no link-layer address"; "interface" => &iface.name);
			continue;
		};

		if mac == [0u8; 6] {
			continue;
		}

		if is_bridge_master(&iface.name) {
			debug!(logger, "skipping bridge master interface"; "interface" => &iface.name);
			continue;
		}

		if records.len() >= MAX_INTERFACES {
			warn!(logger, "dropping further interfaces from inventory"; "error" => %HtipError::InventoryFull(MAX_INTERFACES));
			break;
		}

		let ipv4 = addresses
			.iter()
			.find(|a| a.index == iface.index)
			.map(|a| (a.ipv4, a.prefix_length));

		records.push(InterfaceRecord {
			name: iface.name,
			mac,
			ipv4,
			link_type: LinkType::Other,
			port_no: 0xFFFF,
			handle: None,
		});
	}

	Ok(records)
}

/// Resolves each record's [`LinkType`], dropping any that classify as [`LinkType::Other`].
pub fn read_net_type(logger: &slog::Logger, records: Vec<InterfaceRecord>) -> Vec<InterfaceRecord> {
	records
		.into_iter()
		.filter_map(|mut record| match classify(&record.name) {
			Ok(LinkType::Other) => {
				debug!(logger, "interface has unsupported link type, dropping"; "interface" => &record.name);
				None
			}
			Ok(link_type) => {
				record.link_type = link_type;
				Some(record)
			}
			Err(e) => {
				debug!(logger, "failed to classify interface, dropping"; "interface" => &record.name, "error" => %e);
				None
			}
		})
		.collect()
}

/// Mirrors the upstream `get_iftype`: `SIOCGIFHWADDR` gives the hardware family,
/// `SIOCGIWNAME` (legacy Wireless Extensions) overrides it to 802.11 when the driver
/// supports it, and `IEEE802`/`Ether` families both classify as Ethernet-CSMA/CD.
fn classify(ifname: &str) -> io::Result<LinkType> {
	let sock = nix::sys::socket::socket(
		nix::sys::socket::AddressFamily::Inet,
		nix::sys::socket::SockType::Datagram,
		nix::sys::socket::SockFlag::empty(),
		None,
	)?;

	let name = CString::new(ifname).map_err(|_| io::Error::other("interface name contains NUL"))?;
	let name_bytes = name.as_bytes_with_nul();
	if name_bytes.len() > nix::libc::IFNAMSIZ {
		return Err(io::Error::other("interface name too long"));
	}

	#[repr(C)]
	struct IfReqHwAddr {
		ifr_name: [u8; nix::libc::IFNAMSIZ],
		sa_family: u16,
		sa_data: [u8; 14],
	}

	let mut ifr_name = [0u8; nix::libc::IFNAMSIZ];
	ifr_name[..name_bytes.len()].copy_from_slice(name_bytes);

	let mut req = IfReqHwAddr {
		ifr_name,
		sa_family: 0,
		sa_data: [0; 14],
	};

	if unsafe { nix::libc::ioctl(sock.as_raw_fd(), nix::libc::SIOCGIFHWADDR, &mut req) } < 0 {
		return Err(io::Error::last_os_error());
	}

	const ARPHRD_ETHER: u16 = 1;
	const ARPHRD_EETHER: u16 = 2;
	const SIOCGIWNAME: u64 = 0x8B01;

	let mut link_type = match req.sa_family {
		ARPHRD_ETHER | ARPHRD_EETHER => LinkType::EthernetCsmaCd,
		_ => LinkType::Other,
	};

	#[repr(C)]
	struct IfReqWireless {
		ifr_name: [u8; nix::libc::IFNAMSIZ],
		ifr_wname: [u8; 16],
	}

	let mut wreq = IfReqWireless {
		ifr_name,
		ifr_wname: [0; 16],
	};

	if unsafe { nix::libc::ioctl(sock.as_raw_fd(), SIOCGIWNAME as _, &mut wreq) } >= 0 {
		link_type = LinkType::Ieee80211;
	}

	Ok(link_type)
}

/// A bridge master interface is identified by the existence of its own
/// `/sys/class/net/<ifname>/bridge` directory.
fn is_bridge_master(ifname: &str) -> bool {
	Path::new(&format!("/sys/class/net/{}/bridge", ifname)).is_dir()
}

/// Opens a transmit handle for every record that doesn't already have one. Per-interface
/// failures are logged and skipped rather than aborting the whole pass.
pub fn open_all(logger: &slog::Logger, records: &mut [InterfaceRecord], backend: &dyn TransmitBackend) {
	for record in records.iter_mut() {
		if record.handle.is_some() {
			continue;
		}

		match backend.open(&record.name) {
			Ok(handle) => record.handle = Some(handle),
			Err(e) => {
				slog::warn!(logger, "failed to open interface"; "interface" => &record.name, "error" => %e)
			}
		}
	}
}

/// Closes and drops every open transmit handle.
pub fn close_all(records: &mut [InterfaceRecord]) {
	for record in records.iter_mut() {
		if let Some(handle) = &mut record.handle {
			handle.close();
		}
		record.handle = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	struct FakeSource {
		interfaces: Vec<RawInterface>,
		addresses: Vec<RawAddress>,
	}

	impl InventorySource for FakeSource {
		fn list_interfaces(&mut self) -> io::Result<Vec<RawInterface>> {
			Ok(self.interfaces.clone())
		}

		fn list_addresses(&mut self) -> io::Result<Vec<RawAddress>> {
			Ok(self.addresses.clone())
		}
	}

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, slog::o!())
	}

	#[test]
	fn loopback_and_zero_mac_are_excluded() {
		let mut source = FakeSource {
			interfaces: vec![
				RawInterface {
					index: 1,
					name: "lo".to_string(),
					mac: Some([0; 6]),
				},
				RawInterface {
					index: 2,
					name: "eth0".to_string(),
					mac: Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
				},
				RawInterface {
					index: 3,
					name: "dummy0".to_string(),
					mac: Some([0; 6]),
				},
			],
			addresses: vec![],
		};

		let records = read_ifinfo(&logger(), &mut source).unwrap();
		assert_eq!(records.len(), 1);
		assert_eq!(records[0].name, "eth0");
	}

	#[test]
	fn ipv4_address_is_attached_by_index() {
		let mut source = FakeSource {
			interfaces: vec![RawInterface {
				index: 2,
				name: "eth0".to_string(),
				mac: Some([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]),
			}],
			addresses: vec![RawAddress {
				index: 2,
				ipv4: [192, 168, 1, 5],
				prefix_length: 24,
			}],
		};

		let records = read_ifinfo(&logger(), &mut source).unwrap();
		assert_eq!(records[0].ipv4, Some(([192, 168, 1, 5], 24)));
	}

	#[test]
	fn inventory_cap_is_enforced_without_failing_the_tick() {
		let interfaces = (0..MAX_INTERFACES + 1)
			.map(|i| RawInterface {
				index: i as i32,
				name: format!("eth{i}"),
				mac: Some([0, 0, 0, 0, 0, i as u8 + 1]),
			})
			.collect();

		let mut source = FakeSource {
			interfaces,
			addresses: vec![],
		};

		let records = read_ifinfo(&logger(), &mut source).unwrap();
		assert_eq!(records.len(), MAX_INTERFACES);
	}

	#[test]
	fn open_all_skips_interfaces_that_already_have_a_handle_and_logs_failures() {
		use crate::transmit::tests::FakeBackend;

		let mut records = vec![
			InterfaceRecord {
				name: "eth0".to_string(),
				mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
				ipv4: None,
				link_type: LinkType::EthernetCsmaCd,
				port_no: 0xFFFF,
				handle: None,
			},
			InterfaceRecord {
				name: "eth1".to_string(),
				mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01],
				ipv4: None,
				link_type: LinkType::EthernetCsmaCd,
				port_no: 0xFFFF,
				handle: None,
			},
		];

		let backend = FakeBackend {
			fail_on: vec!["eth1".to_string()],
		};

		open_all(&logger(), &mut records, &backend);

		assert!(records[0].handle.is_some());
		assert_eq!(records[0].handle.as_ref().unwrap().ifname(), "eth0");
		assert!(records[1].handle.is_none());

		close_all(&mut records);
		assert!(records[0].handle.is_none());
	}
}
