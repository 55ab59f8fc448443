//! HTIP (TTC JJ-300.00) organizationally-specific TLVs riding on LLDP.
//!
//! Every HTIP TLV is an LLDP organizationally-specific TLV (type 127) whose value opens
//! with the TTC OUI `E0:27:1A` and a one-octet subtype.

use slog::warn;

use crate::error::{HtipError, Result};
use crate::tlv::{write_tlv, ORGANIZATIONALLY_SPECIFIC_TLV};

pub const HTIP_OUI: [u8; 3] = [0xE0, 0x27, 0x1A];

pub const HTIP_SUBTYPE_DEVICE_INFO: u8 = 1;
pub const HTIP_SUBTYPE_LINK_INFO: u8 = 2;
pub const HTIP_SUBTYPE_MAC_ADDRESS_LIST: u8 = 3;

pub const DEVICE_INFO_DEVICE_CATEGORY: u8 = 1;
pub const DEVICE_INFO_MANUFACTURER_CODE: u8 = 2;
pub const DEVICE_INFO_MODEL_NAME: u8 = 3;
pub const DEVICE_INFO_MODEL_NUMBER: u8 = 4;

const MANUFACTURER_CODE_LEN: usize = 6;

/// Per-information-ID nominal length caps, used only to produce advisory log lines.
/// Exceeding a cap does not truncate the value or fail the encode.
fn nominal_cap(id: u8) -> Option<usize> {
	match id {
		DEVICE_INFO_DEVICE_CATEGORY => Some(255),
		DEVICE_INFO_MANUFACTURER_CODE => Some(MANUFACTURER_CODE_LEN),
		DEVICE_INFO_MODEL_NAME => Some(31),
		DEVICE_INFO_MODEL_NUMBER => Some(31),
		_ => None,
	}
}

/// The number of MAC addresses that fit in a single link-info TLV fragment:
/// floor((511 - 4 - 5) / 6).
pub const LINK_INFO_FRAGMENT_CAPACITY: usize = (crate::tlv::MAX_TLV_VALUE_LEN - 4 - 5) / 6;

/// Emits a complete HTIP device-info TLV: outer org-specific header, OUI+subtype, then
/// the (id, length, value) information element. Logs a `warn` if `value` exceeds the
/// information ID's nominal cap, but still emits the full value.
pub fn emit_device_info(logger: &slog::Logger, buf: &mut Vec<u8>, id: u8, value: &[u8]) -> Result<usize> {
	if let Some(cap) = nominal_cap(id) {
		if value.len() > cap {
			warn!(logger, "HTIP device-info value exceeds nominal length"; "id" => id, "len" => value.len(), "cap" => cap);
		}
	}

	let mut inner = Vec::with_capacity(4 + 2 + value.len());
	inner.extend_from_slice(&HTIP_OUI);
	inner.push(HTIP_SUBTYPE_DEVICE_INFO);
	inner.push(id);
	inner.push(value.len() as u8);
	inner.extend_from_slice(value);

	write_tlv(buf, ORGANIZATIONALLY_SPECIFIC_TLV, &inner)
}

/// Emits a manufacturer-code device-info TLV, padding or truncating `code` to exactly
/// the 6-octet HTIP field width.
pub fn emit_manufacturer_code(logger: &slog::Logger, buf: &mut Vec<u8>, code: &[u8]) -> Result<usize> {
	let mut padded = [0u8; MANUFACTURER_CODE_LEN];
	let n = code.len().min(MANUFACTURER_CODE_LEN);
	padded[..n].copy_from_slice(&code[..n]);

	emit_device_info(logger, buf, DEVICE_INFO_MANUFACTURER_CODE, &padded)
}

/// Computes how many link-info fragments `mac_count` MAC addresses require. Zero MACs
/// still require exactly one (empty) fragment.
fn fragment_count(mac_count: usize) -> usize {
	if mac_count == 0 {
		1
	} else {
		mac_count.div_ceil(LINK_INFO_FRAGMENT_CAPACITY)
	}
}

/// Emits one or more HTIP link-info TLVs covering `macs`, fragmenting into chunks of at
/// most [`LINK_INFO_FRAGMENT_CAPACITY`] MAC addresses when the list does not fit in a
/// single TLV. `iftype` and `port_no` are truncated to 8 bits per the wire format.
pub fn emit_link_info(buf: &mut Vec<u8>, iftype: u32, port_no: u16, macs: &[[u8; 6]]) -> Result<usize> {
	let fragments = fragment_count(macs.len());
	let mut written = 0;

	for fragment_index in 0..fragments {
		let start = fragment_index * LINK_INFO_FRAGMENT_CAPACITY;
		let end = (start + LINK_INFO_FRAGMENT_CAPACITY).min(macs.len());
		let chunk = &macs[start..end];

		let mut inner = Vec::with_capacity(4 + 5 + chunk.len() * 6);
		inner.extend_from_slice(&HTIP_OUI);
		inner.push(HTIP_SUBTYPE_LINK_INFO);
		inner.push(1); // iftype_len
		inner.push(iftype as u8);
		inner.push(1); // portno_len
		inner.push(port_no as u8);
		inner.push(chunk.len() as u8);
		for mac in chunk {
			inner.extend_from_slice(mac);
		}

		written += write_tlv(buf, ORGANIZATIONALLY_SPECIFIC_TLV, &inner)?;
	}

	Ok(written)
}

/// True when `ty`/`value` together form a well-formed HTIP organizationally-specific
/// TLV, and if so, its subtype.
pub fn htip_subtype(ty: u8, value: &[u8]) -> Option<u8> {
	if ty != ORGANIZATIONALLY_SPECIFIC_TLV || value.len() < 4 || value[0..3] != HTIP_OUI {
		return None;
	}

	let subtype = value[3];
	matches!(
		subtype,
		HTIP_SUBTYPE_DEVICE_INFO | HTIP_SUBTYPE_LINK_INFO | HTIP_SUBTYPE_MAC_ADDRESS_LIST
	)
	.then_some(subtype)
}

/// Human-readable one-line summary of an HTIP TLV payload, for the diagnostic decoder.
pub fn describe(value: &[u8]) -> Result<String> {
	let subtype = htip_subtype(ORGANIZATIONALLY_SPECIFIC_TLV, value).ok_or_else(|| HtipError::MalformedTlv {
		offset: 0,
		reason: "not an HTIP TLV".to_string(),
	})?;

	let body = &value[4..];
	match subtype {
		HTIP_SUBTYPE_DEVICE_INFO => {
			if body.len() < 2 {
				return Err(HtipError::MalformedTlv {
					offset: 4,
					reason: "truncated device-info header".to_string(),
				});
			}
			let id = body[0];
			let len = body[1] as usize;
			let value = body.get(2..2 + len).ok_or_else(|| HtipError::MalformedTlv {
				offset: 6,
				reason: "device-info value overruns TLV".to_string(),
			})?;
			Ok(format!("device-info id={} value={}", id, String::from_utf8_lossy(value)))
		}
		HTIP_SUBTYPE_LINK_INFO => {
			if body.len() < 5 {
				return Err(HtipError::MalformedTlv {
					offset: 4,
					reason: "truncated link-info header".to_string(),
				});
			}
			let iftype = body[1];
			let port_no = body[3];
			let count = body[4] as usize;
			Ok(format!(
				"link-info iftype={} port={} macs={}",
				iftype, port_no, count
			))
		}
		HTIP_SUBTYPE_MAC_ADDRESS_LIST => Ok("mac-address-list".to_string()),
		_ => unreachable!("htip_subtype only returns recognized subtypes"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_macs_is_one_empty_fragment() {
		let mut buf = Vec::new();
		emit_link_info(&mut buf, 6, 3, &[]).unwrap();
		assert_eq!(buf, vec![0xFE, 0x09, 0xE0, 0x27, 0x1A, 0x02, 0x01, 0x06, 0x01, 0x03, 0x00]);
	}

	#[test]
	fn one_mac() {
		let mut buf = Vec::new();
		emit_link_info(&mut buf, 6, 3, &[[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]]).unwrap();
		assert_eq!(
			buf,
			vec![
				0xFE, 0x0F, 0xE0, 0x27, 0x1A, 0x02, 0x01, 0x06, 0x01, 0x03, 0x01, 0x00, 0x11, 0x22, 0x33, 0x44, 0x55
			]
		);
	}

	#[test]
	fn fragments_at_capacity_boundary() {
		let macs: Vec<[u8; 6]> = (0..84).map(|i| [0, 0, 0, 0, 0, i as u8]).collect();
		let mut buf = Vec::new();
		emit_link_info(&mut buf, 6, 3, &macs).unwrap();

		// First fragment: header(2) + oui/subtype(4) + link header(5) + 83*6 macs.
		assert_eq!(buf[0], 0xFF); // length >= 256 sets the length high bit
		assert_eq!(buf[1], 0xFB); // 507 & 0xFF
		let first_fragment_len = 2 + 4 + 5 + 83 * 6;
		assert_eq!(buf[first_fragment_len], 0xFE);
		assert_eq!(buf[first_fragment_len + 1], 0x0F); // second fragment carries 1 MAC: value len 15
	}

	#[test]
	fn device_category_round_trip() {
		let logger = slog::Logger::root(slog::Discard, slog::o!());
		let mut buf = Vec::new();
		emit_device_info(&logger, &mut buf, DEVICE_INFO_DEVICE_CATEGORY, b"AV_TV").unwrap();
		assert_eq!(
			buf,
			vec![0xFE, 0x0B, 0xE0, 0x27, 0x1A, 0x01, 0x01, 0x05, b'A', b'V', b'_', b'T', b'V']
		);

		let described = describe(&buf[2..]).unwrap();
		assert_eq!(described, "device-info id=1 value=AV_TV");
	}

	#[test]
	fn manufacturer_code_is_padded_to_six() {
		let logger = slog::Logger::root(slog::Discard, slog::o!());
		let mut buf = Vec::new();
		emit_manufacturer_code(&logger, &mut buf, b"JAIST").unwrap();
		// OUI(3) + subtype(1) + id(1) + len(1) + value(6) = 12, plus TLV header = 14.
		assert_eq!(buf.len(), 14);
		assert_eq!(buf[7], 6); // length field of the inner device-info element
	}
}
