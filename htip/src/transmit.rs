//! L2 frame transmission and promiscuous-mode interface handles.
//!
//! Mirrors the two socket roles used upstream: a long-lived `AF_PACKET`/`SOCK_RAW` socket
//! per interface that only exists to hold `PACKET_MR_PROMISC` membership, and a short-lived
//! raw socket per send that builds the Ethernet header by hand and `sendto`s it.
//!
//! Opening and sending live behind the [`Transmitter`]/[`TransmitBackend`] traits so tests
//! can substitute an in-memory fake that records frames instead of touching the network,
//! the same treatment `InventorySource` gets in `inventory.rs`.

use std::ffi::CString;
use std::fmt;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use crate::error::{HtipError, Result};

pub const ETHERTYPE_LLDP: u16 = 0x88CC;
pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERNET_PAYLOAD_BUDGET: usize = 1500;

const ETH_P_ALL: u16 = 0x0003;
const SOL_PACKET: i32 = 263;
const PACKET_ADD_MEMBERSHIP: i32 = 1;
const PACKET_MR_PROMISC: u16 = 1;

#[repr(C)]
struct IfReq {
	ifr_name: [u8; nix::libc::IFNAMSIZ],
	ifr_ifindex: i32,
	_pad: [u8; 20],
}

#[repr(C)]
struct PacketMreq {
	mr_ifindex: i32,
	mr_type: u16,
	mr_alen: u16,
	mr_address: [u8; 8],
}

#[repr(C)]
#[derive(Clone, Copy)]
struct SockaddrLl {
	sll_family: u16,
	sll_protocol: u16,
	sll_ifindex: i32,
	sll_hatype: u16,
	sll_pkttype: u8,
	sll_halen: u8,
	sll_addr: [u8; 8],
}

fn ifreq_name(ifname: &str) -> Result<[u8; nix::libc::IFNAMSIZ]> {
	let name = CString::new(ifname).map_err(|_| HtipError::OpenFailed(ifname.to_string(), nix::Error::EINVAL))?;
	let name_bytes = name.as_bytes_with_nul();
	if name_bytes.len() > nix::libc::IFNAMSIZ {
		return Err(HtipError::OpenFailed(ifname.to_string(), nix::Error::ENAMETOOLONG));
	}
	let mut buf = [0u8; nix::libc::IFNAMSIZ];
	buf[..name_bytes.len()].copy_from_slice(name_bytes);
	Ok(buf)
}

fn ifindex_of(ifname: &str) -> Result<i32> {
	let sock = nix::sys::socket::socket(
		nix::sys::socket::AddressFamily::Inet,
		nix::sys::socket::SockType::Datagram,
		nix::sys::socket::SockFlag::empty(),
		None,
	)
	.map_err(|e| HtipError::OpenFailed(ifname.to_string(), e))?;

	let mut ifr = IfReq {
		ifr_name: ifreq_name(ifname)?,
		ifr_ifindex: 0,
		_pad: [0; 20],
	};

	if unsafe { nix::libc::ioctl(sock.as_raw_fd(), nix::libc::SIOCGIFINDEX, &mut ifr) } < 0 {
		return Err(HtipError::OpenFailed(ifname.to_string(), nix::Error::last()));
	}

	Ok(ifr.ifr_ifindex)
}

/// Applies to every backend alike, real or fake.
fn check_payload_budget(ifname: &str, payload_len: usize) -> Result<()> {
	if payload_len > ETHERNET_PAYLOAD_BUDGET {
		return Err(HtipError::FrameTooLarge {
			interface: ifname.to_string(),
			size: payload_len,
			budget: ETHERNET_PAYLOAD_BUDGET,
		});
	}
	Ok(())
}

/// A per-interface transmit handle. `frame.rs` and `inventory.rs` talk to this trait, not
/// to `L2Socket`, so tests can substitute an in-memory fake.
pub trait Transmitter: fmt::Debug {
	/// Sends `payload` out this handle's interface wrapped in an Ethernet II header
	/// addressed `src_mac` -> `dst_mac`. Returns the number of value-octets transmitted
	/// (excludes the 14-octet Ethernet header). Fails with [`HtipError::FrameTooLarge`] if
	/// `payload` exceeds [`ETHERNET_PAYLOAD_BUDGET`], or [`HtipError::TransmitError`] on
	/// any write failure.
	fn send(&mut self, dst_mac: [u8; 6], src_mac: [u8; 6], payload: &[u8]) -> Result<usize>;

	/// Releases the handle's resources. Idempotent.
	fn close(&mut self);

	fn ifname(&self) -> &str;
}

/// Opens [`Transmitter`] handles. A separate trait from `Transmitter` itself because
/// opening has nothing to hang it off until a handle exists.
pub trait TransmitBackend {
	fn open(&self, ifname: &str) -> Result<Box<dyn Transmitter>>;
}

/// A promiscuous-mode `AF_PACKET` handle for one interface. Holds the kernel's
/// `PACKET_MR_PROMISC` group membership open for as long as the interface is in the
/// inventory, and is also where `send` builds and writes each frame.
#[derive(Debug)]
pub struct L2Socket {
	fd: Option<OwnedFd>,
	ifname: String,
}

impl L2Socket {
	pub fn open(ifname: &str) -> Result<Self> {
		// nix's `SockProtocol` enum has no variant for ETH_P_ALL, so the socket is opened
		// directly via libc rather than through `nix::sys::socket::socket`.
		let raw_fd = unsafe {
			nix::libc::socket(
				nix::libc::AF_PACKET,
				nix::libc::SOCK_RAW,
				ETH_P_ALL.to_be() as i32,
			)
		};
		if raw_fd < 0 {
			return Err(HtipError::OpenFailed(ifname.to_string(), nix::Error::last()));
		}
		let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

		let ifindex = ifindex_of(ifname)?;

		let mreq = PacketMreq {
			mr_ifindex: ifindex,
			mr_type: PACKET_MR_PROMISC,
			mr_alen: 0,
			mr_address: [0; 8],
		};

		let result = unsafe {
			nix::libc::setsockopt(
				fd.as_raw_fd(),
				SOL_PACKET,
				PACKET_ADD_MEMBERSHIP,
				&mreq as *const PacketMreq as *const nix::libc::c_void,
				std::mem::size_of::<PacketMreq>() as u32,
			)
		};

		if result < 0 {
			return Err(HtipError::OpenFailed(ifname.to_string(), nix::Error::last()));
		}

		Ok(Self {
			fd: Some(fd),
			ifname: ifname.to_string(),
		})
	}
}

impl Transmitter for L2Socket {
	fn send(&mut self, dst_mac: [u8; 6], src_mac: [u8; 6], payload: &[u8]) -> Result<usize> {
		check_payload_budget(&self.ifname, payload.len())?;

		if self.fd.is_none() {
			return Err(HtipError::TransmitError(self.ifname.clone(), nix::Error::EBADF));
		}

		let mut frame = Vec::with_capacity(ETHERNET_HEADER_LEN + payload.len());
		frame.extend_from_slice(&dst_mac);
		frame.extend_from_slice(&src_mac);
		frame.extend_from_slice(&ETHERTYPE_LLDP.to_be_bytes());
		frame.extend_from_slice(payload);

		let sock = nix::sys::socket::socket(
			nix::sys::socket::AddressFamily::Packet,
			nix::sys::socket::SockType::Raw,
			nix::sys::socket::SockFlag::empty(),
			None,
		)
		.map_err(|e| HtipError::TransmitError(self.ifname.clone(), e))?;

		let ifindex = ifindex_of(&self.ifname).map_err(|_| HtipError::TransmitError(self.ifname.clone(), nix::Error::ENODEV))?;

		let mut addr = SockaddrLl {
			sll_family: nix::libc::AF_PACKET as u16,
			sll_protocol: ETHERTYPE_LLDP.to_be(),
			sll_ifindex: ifindex,
			sll_hatype: 0,
			sll_pkttype: 0,
			sll_halen: 6,
			sll_addr: [0; 8],
		};
		addr.sll_addr[..6].copy_from_slice(&dst_mac);

		let sent = unsafe {
			nix::libc::sendto(
				sock.as_raw_fd(),
				frame.as_ptr() as *const nix::libc::c_void,
				frame.len(),
				0,
				&addr as *const SockaddrLl as *const nix::libc::sockaddr,
				std::mem::size_of::<SockaddrLl>() as u32,
			)
		};

		if sent < 0 {
			return Err(HtipError::TransmitError(self.ifname.clone(), nix::Error::last()));
		}

		Ok(sent as usize - ETHERNET_HEADER_LEN)
	}

	fn close(&mut self) {
		self.fd = None;
	}

	fn ifname(&self) -> &str {
		&self.ifname
	}
}

/// Production [`TransmitBackend`]: opens a real promiscuous-mode `AF_PACKET` socket.
#[derive(Debug, Default)]
pub struct RawSocketBackend;

impl TransmitBackend for RawSocketBackend {
	fn open(&self, ifname: &str) -> Result<Box<dyn Transmitter>> {
		Ok(Box::new(L2Socket::open(ifname)?))
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;

	/// In-memory [`Transmitter`]/[`TransmitBackend`] that records frames instead of
	/// touching the network.
	#[derive(Debug, Default)]
	pub(crate) struct FakeTransmitter {
		pub(crate) ifname: String,
		pub(crate) closed: bool,
		pub(crate) sent: Vec<Vec<u8>>,
	}

	impl Transmitter for FakeTransmitter {
		fn send(&mut self, dst_mac: [u8; 6], src_mac: [u8; 6], payload: &[u8]) -> Result<usize> {
			check_payload_budget(&self.ifname, payload.len())?;

			let mut frame = Vec::with_capacity(ETHERNET_HEADER_LEN + payload.len());
			frame.extend_from_slice(&dst_mac);
			frame.extend_from_slice(&src_mac);
			frame.extend_from_slice(&ETHERTYPE_LLDP.to_be_bytes());
			frame.extend_from_slice(payload);
			self.sent.push(frame);

			Ok(payload.len())
		}

		fn close(&mut self) {
			self.closed = true;
		}

		fn ifname(&self) -> &str {
			&self.ifname
		}
	}

	#[derive(Debug, Default)]
	pub(crate) struct FakeBackend {
		pub(crate) fail_on: Vec<String>,
	}

	impl TransmitBackend for FakeBackend {
		fn open(&self, ifname: &str) -> Result<Box<dyn Transmitter>> {
			if self.fail_on.iter().any(|n| n == ifname) {
				return Err(HtipError::OpenFailed(ifname.to_string(), nix::Error::ENODEV));
			}
			Ok(Box::new(FakeTransmitter {
				ifname: ifname.to_string(),
				..Default::default()
			}))
		}
	}

	#[test]
	fn oversized_payload_is_rejected_before_touching_a_socket() {
		let mut handle = FakeTransmitter {
			ifname: "eth0".to_string(),
			..Default::default()
		};
		let payload = vec![0u8; ETHERNET_PAYLOAD_BUDGET + 1];
		let err = handle.send([0xff; 6], [0xaa; 6], &payload).unwrap_err();
		assert!(matches!(err, HtipError::FrameTooLarge { size, budget, .. } if size == payload.len() && budget == ETHERNET_PAYLOAD_BUDGET));
		assert!(handle.sent.is_empty());
	}

	#[test]
	fn payload_at_budget_is_not_rejected_by_the_size_check() {
		let mut handle = FakeTransmitter {
			ifname: "eth0".to_string(),
			..Default::default()
		};
		let payload = vec![0u8; ETHERNET_PAYLOAD_BUDGET];
		let sent = handle.send([0xff; 6], [0xaa; 6], &payload).unwrap();
		assert_eq!(sent, ETHERNET_PAYLOAD_BUDGET);
		assert_eq!(handle.sent.len(), 1);
		assert_eq!(handle.sent[0].len(), ETHERNET_HEADER_LEN + ETHERNET_PAYLOAD_BUDGET);
	}

	#[test]
	fn backend_open_failure_is_reported_per_interface() {
		let backend = FakeBackend {
			fail_on: vec!["eth1".to_string()],
		};
		assert!(backend.open("eth0").is_ok());
		assert!(backend.open("eth1").is_err());
	}
}
