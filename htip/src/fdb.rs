//! Bridge forwarding database ingestion.
//!
//! Reads the kernel's per-bridge FDB either from the `brforward` sysfs file or, if that
//! is unavailable, via the legacy `SIOCDEVPRIVATE`/`BRCTL_GET_FDB_ENTRIES` ioctl. Both
//! sources produce the same 16-octet kernel `__fdb_entry` record.

use std::ffi::CString;
use std::fs::File;
use std::io::Read;
use std::os::fd::AsRawFd;
use std::time::Duration;

use slog::{debug, warn};

use crate::error::{HtipError, Result};

const SYSFS_CLASS_NET: &str = "/sys/class/net";
const RAW_ENTRY_SIZE: usize = 16;
const JIFFY: Duration = Duration::from_millis(10);

const SIOCDEVPRIVATE: u64 = 0x89F0;
const BRCTL_GET_FDB_ENTRIES: u64 = 5;
const IOCTL_RETRY_LIMIT: u32 = 10;

/// A single bridge forwarding database entry, normalized from the kernel's raw layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdbEntry {
	pub mac: [u8; 6],
	pub port_no: u16,
	pub is_local: bool,
	pub ageing: Duration,
}

const PORT_NO_INVALID: u16 = 0xFFFF;

fn parse_raw_entry(raw: &[u8; RAW_ENTRY_SIZE]) -> FdbEntry {
	let mac = raw[0..6].try_into().unwrap();
	let port_lo = raw[6];
	let is_local = raw[7] != 0;
	let jiffies = u32::from_le_bytes(raw[8..12].try_into().unwrap());
	let port_hi = raw[12];

	FdbEntry {
		mac,
		port_no: ((port_hi as u16) << 8) | port_lo as u16,
		is_local,
		ageing: JIFFY * jiffies,
	}
}

/// In-memory snapshot of a bridge's forwarding database, rebuilt from scratch every tick.
#[derive(Debug, Default)]
pub struct FdbTable {
	entries: Vec<FdbEntry>,
}

impl FdbTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Discards any previous contents and reloads up to `max_entries` from the named
	/// bridge. Fails with [`HtipError::FdbUnavailable`] if neither the sysfs file nor the
	/// ioctl fallback can be read, or [`HtipError::FdbOverflow`] if the kernel reports
	/// more entries than `max_entries`.
	pub fn load(&mut self, logger: &slog::Logger, bridge: &str, max_entries: usize) -> Result<()> {
		self.entries.clear();

		let raw = match read_sysfs(bridge) {
			Ok(raw) => raw,
			Err(sysfs_err) => {
				debug!(logger, "brforward sysfs read failed, falling back to ioctl"; "bridge" => bridge, "error" => %sysfs_err);
				read_ioctl(logger, bridge, max_entries)?
			}
		};

		if raw.len() / RAW_ENTRY_SIZE > max_entries {
			return Err(HtipError::FdbOverflow(raw.len() / RAW_ENTRY_SIZE, max_entries));
		}

		for chunk in raw.chunks_exact(RAW_ENTRY_SIZE) {
			let entry = parse_raw_entry(chunk.try_into().unwrap());
			if !self.entries.iter().any(|e| e.mac == entry.mac && e.port_no == entry.port_no) {
				self.entries.push(entry);
			}
		}

		Ok(())
	}

	pub fn free(&mut self) {
		self.entries.clear();
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The bridge port a locally-attached MAC is reachable on, or `0xFFFF` if unknown.
	pub fn portno_of(&self, mac: &[u8; 6]) -> u16 {
		self.entries
			.iter()
			.find(|e| e.is_local && &e.mac == mac)
			.map(|e| e.port_no)
			.unwrap_or(PORT_NO_INVALID)
	}

	/// All remote (non-local) MACs learned on `port_no`, in insertion order.
	pub fn remote_macs_on_port(&self, port_no: u16) -> Vec<&[u8; 6]> {
		self.entries
			.iter()
			.filter(|e| !e.is_local && e.port_no == port_no)
			.map(|e| &e.mac)
			.collect()
	}

	/// Resolves `local_mac` to its port, then returns the remote MACs reachable through
	/// it. Returns an empty list if `local_mac` is not present in the table.
	pub fn remote_macs_via(&self, local_mac: &[u8; 6]) -> Vec<&[u8; 6]> {
		let port_no = self.portno_of(local_mac);
		if port_no == PORT_NO_INVALID {
			return Vec::new();
		}

		self.remote_macs_on_port(port_no)
	}
}

fn read_sysfs(bridge: &str) -> std::io::Result<Vec<u8>> {
	let path = format!("{}/{}/brforward", SYSFS_CLASS_NET, bridge);
	let mut file = File::open(path)?;
	let mut buf = Vec::new();
	file.read_to_end(&mut buf)?;
	Ok(buf)
}

/// `ioctl(sock, SIOCDEVPRIVATE, &ifreq)` with `ifreq.ifr_data` pointing at
/// `{BRCTL_GET_FDB_ENTRIES, buffer, maxnum, offset}`, retrying on `EAGAIN` the kernel
/// uses to signal the table changed mid-read.
fn read_ioctl(logger: &slog::Logger, bridge: &str, max_entries: usize) -> Result<Vec<u8>> {
	let sock = nix::sys::socket::socket(
		nix::sys::socket::AddressFamily::Inet,
		nix::sys::socket::SockType::Datagram,
		nix::sys::socket::SockFlag::empty(),
		None,
	)
	.map_err(|e| HtipError::FdbUnavailable(std::io::Error::from(e)))?;

	let mut buf = vec![0u8; max_entries * RAW_ENTRY_SIZE];

	#[repr(C)]
	struct BridgeFdbArgs {
		cmd: u64,
		buffer: u64,
		maxnum: u64,
		offset: u64,
	}

	#[repr(C)]
	struct IfReq {
		ifr_name: [u8; nix::libc::IFNAMSIZ],
		ifr_data: u64,
	}

	let name = CString::new(bridge).map_err(|_| HtipError::FdbUnavailable(std::io::Error::other("bridge name contains NUL")))?;
	let name_bytes = name.as_bytes_with_nul();
	if name_bytes.len() > nix::libc::IFNAMSIZ {
		return Err(HtipError::FdbUnavailable(std::io::Error::other("bridge name too long")));
	}

	let mut ifr_name = [0u8; nix::libc::IFNAMSIZ];
	ifr_name[..name_bytes.len()].copy_from_slice(name_bytes);

	let mut attempt = 0;
	loop {
		let args = BridgeFdbArgs {
			cmd: BRCTL_GET_FDB_ENTRIES,
			buffer: buf.as_mut_ptr() as u64,
			maxnum: max_entries as u64,
			offset: 0,
		};

		let ifreq = IfReq {
			ifr_name,
			ifr_data: &args as *const BridgeFdbArgs as u64,
		};

		let result = unsafe { nix::libc::ioctl(sock.as_raw_fd(), SIOCDEVPRIVATE as _, &ifreq) };
		if result >= 0 {
			buf.truncate(result as usize * RAW_ENTRY_SIZE);
			return Ok(buf);
		}

		let errno = nix::errno::Errno::last();
		if errno == nix::errno::Errno::EAGAIN && attempt < IOCTL_RETRY_LIMIT {
			attempt += 1;
			warn!(logger, "FDB ioctl returned EAGAIN, retrying"; "bridge" => bridge, "attempt" => attempt);
			continue;
		}

		return Err(HtipError::FdbUnavailable(std::io::Error::from(errno)));
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn entry(mac: u8, port_no: u16, is_local: bool) -> FdbEntry {
		FdbEntry {
			mac: [0, 0, 0, 0, 0, mac],
			port_no,
			is_local,
			ageing: Duration::ZERO,
		}
	}

	#[test]
	fn portno_of_finds_local_entry() {
		let mut table = FdbTable::new();
		table.entries.push(entry(1, 3, true));
		table.entries.push(entry(2, 5, false));

		assert_eq!(table.portno_of(&[0, 0, 0, 0, 0, 1]), 3);
		assert_eq!(table.portno_of(&[0, 0, 0, 0, 0, 9]), PORT_NO_INVALID);
	}

	#[test]
	fn remote_macs_on_port_filters_local_and_port() {
		let mut table = FdbTable::new();
		table.entries.push(entry(1, 3, true));
		table.entries.push(entry(2, 3, false));
		table.entries.push(entry(3, 3, true)); // local, should be excluded
		table.entries.push(entry(4, 7, false)); // different port, should be excluded

		let macs = table.remote_macs_on_port(3);
		assert_eq!(macs, vec![&[0, 0, 0, 0, 0, 2]]);
	}

	#[test]
	fn remote_macs_via_composes_lookup() {
		let mut table = FdbTable::new();
		table.entries.push(entry(1, 3, true));
		table.entries.push(entry(2, 3, false));

		assert_eq!(table.remote_macs_via(&[0, 0, 0, 0, 0, 1]), vec![&[0, 0, 0, 0, 0, 2]]);
		assert!(table.remote_macs_via(&[9, 9, 9, 9, 9, 9]).is_empty());
	}

	#[test]
	fn jiffies_convert_at_ten_ms() {
		let raw: [u8; RAW_ENTRY_SIZE] = [
			0, 0, 0, 0, 0, 1, // mac
			3, // port_no low
			1, // is_local
			100, 0, 0, 0, // 100 jiffies
			0, // port_hi
			0, 0, 0, // pad/unused
		];
		let parsed = parse_raw_entry(&raw);
		assert_eq!(parsed.ageing, Duration::from_millis(1000));
		assert_eq!(parsed.port_no, 3);
		assert!(parsed.is_local);
	}

	#[test]
	fn port_hi_widens_port_number() {
		let raw: [u8; RAW_ENTRY_SIZE] = [0, 0, 0, 0, 0, 1, 0x34, 0, 0, 0, 0, 0, 0x12, 0, 0, 0];
		let parsed = parse_raw_entry(&raw);
		assert_eq!(parsed.port_no, 0x1234);
	}
}
