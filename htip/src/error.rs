use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtipError {
	#[error("value of length {0} does not fit in a TLV (max 511 octets)")]
	EncodingOverflow(usize),

	#[error("malformed TLV at offset {offset}: {reason}")]
	MalformedTlv { offset: usize, reason: String },

	#[error("bridge forwarding database unavailable: {0}")]
	FdbUnavailable(#[from] io::Error),

	#[error("interface inventory unavailable: {0}")]
	InventoryUnavailable(#[source] io::Error),

	#[error("bridge forwarding database returned {0} entries, exceeding the configured capacity of {1}")]
	FdbOverflow(usize, usize),

	#[error("interface inventory is full (capacity {0}), dropping further interfaces")]
	InventoryFull(usize),

	#[error("failed to open interface {0}: {1}")]
	OpenFailed(String, #[source] nix::Error),

	#[error("failed to transmit frame on {0}: {1}")]
	TransmitError(String, #[source] nix::Error),

	#[error("assembled frame for {interface} is {size} octets, exceeding the {budget}-octet Ethernet payload budget")]
	FrameTooLarge {
		interface: String,
		size: usize,
		budget: usize,
	},

	#[error("invalid configuration: {0}")]
	ConfigInvalid(String),
}

pub type Result<T> = std::result::Result<T, HtipError>;
