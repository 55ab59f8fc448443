//! Per-tick, per-interface assembly of the LLDP+HTIP payload.

use slog::debug;

use crate::config::DeviceIdentity;
use crate::error::{HtipError, Result};
use crate::fdb::FdbTable;
use crate::htip::{self, DEVICE_INFO_DEVICE_CATEGORY, DEVICE_INFO_MANUFACTURER_CODE, DEVICE_INFO_MODEL_NAME, DEVICE_INFO_MODEL_NUMBER};
use crate::inventory::InterfaceRecord;
use crate::tlv;
use crate::transmit::ETHERNET_PAYLOAD_BUDGET;

const BROADCAST_MAC: [u8; 6] = [0xFF; 6];

fn emit_device_info_block(logger: &slog::Logger, buf: &mut Vec<u8>, identity: &DeviceIdentity) -> Result<usize> {
	let mut written = 0;
	written += htip::emit_device_info(logger, buf, DEVICE_INFO_DEVICE_CATEGORY, &identity.device_category)?;
	written += htip::emit_device_info(logger, buf, DEVICE_INFO_MODEL_NAME, &identity.model_name)?;
	written += htip::emit_manufacturer_code(logger, buf, &identity.manufacturer_code)?;
	written += htip::emit_device_info(logger, buf, DEVICE_INFO_MODEL_NUMBER, &identity.model_number)?;
	Ok(written)
}

fn build_prelude_and_identity(logger: &slog::Logger, record: &InterfaceRecord, identity: &DeviceIdentity) -> Result<Vec<u8>> {
	let mut buf = Vec::with_capacity(ETHERNET_PAYLOAD_BUDGET);
	tlv::emit_lldp_prelude(&mut buf, record.mac, &record.name)?;
	emit_device_info_block(logger, &mut buf, identity)?;
	Ok(buf)
}

/// Agent-mode emission: device-info only, no link-info. One frame per interface that has
/// an open transmit handle.
pub fn device_info(logger: &slog::Logger, records: &mut [InterfaceRecord], identity: &DeviceIdentity) -> Result<usize> {
	let mut sent = 0;
	for record in records.iter_mut() {
		if record.handle.is_none() {
			debug!(logger, "interface has no open handle, skipping"; "interface" => &record.name);
			continue;
		}

		let mut buf = build_prelude_and_identity(logger, record, identity)?;
		tlv::emit_end_of_lldpdu(&mut buf);

		if buf.len() > ETHERNET_PAYLOAD_BUDGET {
			return Err(HtipError::FrameTooLarge {
				interface: record.name.clone(),
				size: buf.len(),
				budget: ETHERNET_PAYLOAD_BUDGET,
			});
		}

		let mac = record.mac;
		let handle = record.handle.as_mut().expect("checked above");
		sent += handle.send(BROADCAST_MAC, mac, &buf)?;
	}
	Ok(sent)
}

/// Switch-mode emission: device-info plus the aggregated link-info block, built once and
/// reused across every qualifying interface's frame.
pub fn device_link(logger: &slog::Logger, records: &mut [InterfaceRecord], identity: &DeviceIdentity, fdb: &FdbTable) -> Result<usize> {
	let mut link_info = Vec::new();
	let mut port_nos = Vec::with_capacity(records.len());

	for record in &mut *records {
		let port_no = fdb.portno_of(&record.mac);
		port_nos.push(port_no);

		if port_no == 0xFFFF {
			debug!(logger, "interface is not part of the bridge, skipping link-info"; "interface" => &record.name);
			continue;
		}

		let remote_macs: Vec<[u8; 6]> = fdb.remote_macs_via(&record.mac).into_iter().copied().collect();
		htip::emit_link_info(&mut link_info, record.link_type.iana_code(), port_no, &remote_macs)?;
	}

	let mut sent = 0;
	for (record, &port_no) in records.iter_mut().zip(port_nos.iter()) {
		if record.handle.is_none() {
			continue;
		}
		if port_no == 0xFFFF || fdb.remote_macs_via(&record.mac).is_empty() {
			continue;
		}

		let mut buf = build_prelude_and_identity(logger, record, identity)?;

		if buf.len() + link_info.len() + 2 > ETHERNET_PAYLOAD_BUDGET {
			return Err(HtipError::FrameTooLarge {
				interface: record.name.clone(),
				size: buf.len() + link_info.len() + 2,
				budget: ETHERNET_PAYLOAD_BUDGET,
			});
		}

		buf.extend_from_slice(&link_info);
		tlv::emit_end_of_lldpdu(&mut buf);

		let mac = record.mac;
		let handle = record.handle.as_mut().expect("checked above");
		sent += handle.send(BROADCAST_MAC, mac, &buf)?;
	}

	Ok(sent)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, slog::o!())
	}

	fn identity() -> DeviceIdentity {
		DeviceIdentity {
			device_category: b"AV_TV".to_vec(),
			manufacturer_code: *b"JAIST\0",
			model_name: b"JAIST_VTV_01".to_vec(),
			model_number: b"VTV01".to_vec(),
		}
	}

	#[test]
	fn prelude_and_identity_starts_with_chassis_id() {
		let record = InterfaceRecord {
			name: "eth0".to_string(),
			mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
			ipv4: None,
			link_type: crate::inventory::LinkType::EthernetCsmaCd,
			port_no: 0xFFFF,
			handle: None,
		};

		let buf = build_prelude_and_identity(&logger(), &record, &identity()).unwrap();
		assert_eq!(buf[0] >> 1, tlv::CHASSIS_ID_TLV);
	}

	#[test]
	fn device_info_skips_interfaces_without_a_handle() {
		let record = InterfaceRecord {
			name: "eth0".to_string(),
			mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
			ipv4: None,
			link_type: crate::inventory::LinkType::EthernetCsmaCd,
			port_no: 0xFFFF,
			handle: None,
		};

		let sent = device_info(&logger(), &mut [record], &identity()).unwrap();
		assert_eq!(sent, 0);
	}

	#[test]
	fn device_info_sends_one_frame_per_open_handle() {
		use crate::transmit::tests::FakeTransmitter;

		let record = InterfaceRecord {
			name: "eth0".to_string(),
			mac: [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff],
			ipv4: None,
			link_type: crate::inventory::LinkType::EthernetCsmaCd,
			port_no: 0xFFFF,
			handle: Some(Box::new(FakeTransmitter {
				ifname: "eth0".to_string(),
				..Default::default()
			})),
		};

		let sent = device_info(&logger(), &mut [record], &identity()).unwrap();
		assert!(sent > 0);
	}
}
