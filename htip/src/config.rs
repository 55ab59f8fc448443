//! Device-identity resolution from the environment (§4.7).

use slog::warn;

use crate::error::{HtipError, Result};

const MANUFACTURER_CODE_LEN: usize = 6;
const MODEL_FIELD_MAX_LEN: usize = 31;

/// The four HTIP device-info fields, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
	pub device_category: Vec<u8>,
	pub manufacturer_code: [u8; MANUFACTURER_CODE_LEN],
	pub model_name: Vec<u8>,
	pub model_number: Vec<u8>,
}

/// Per-daemon compiled-in defaults.
pub struct Defaults {
	pub device_category: &'static str,
	pub manufacturer_code: &'static str,
	pub model_name: &'static str,
	pub model_number: &'static str,
}

pub const AGENT_DEFAULTS: Defaults = Defaults {
	device_category: "AV_TV",
	manufacturer_code: "JAIST",
	model_name: "JAIST_VTV_01",
	model_number: "VTV01",
};

pub const SWITCH_DEFAULTS: Defaults = Defaults {
	device_category: "COM_Switch",
	manufacturer_code: "JAIST",
	model_name: "JAIST_VSW_01",
	model_number: "VSW01",
};

fn env_or_default(name: &str, default: &str) -> Result<String> {
	match std::env::var(name) {
		Ok(value) => Ok(value),
		Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
		Err(std::env::VarError::NotUnicode(_)) => Err(HtipError::ConfigInvalid(format!("{name} is not valid UTF-8"))),
	}
}

fn manufacturer_code(logger: &slog::Logger, raw: &str) -> [u8; MANUFACTURER_CODE_LEN] {
	let bytes = raw.as_bytes();
	let mut code = [0u8; MANUFACTURER_CODE_LEN];
	let n = bytes.len().min(MANUFACTURER_CODE_LEN);
	code[..n].copy_from_slice(&bytes[..n]);

	if bytes.len() != MANUFACTURER_CODE_LEN {
		warn!(logger, "MANUFACTURER_CODE does not match the 6-octet HTIP field width, padding/truncating"; "configured_len" => bytes.len());
	}

	code
}

/// Resolves the device identity for a daemon, falling back to `defaults` for any unset
/// environment variable. Fails with [`HtipError::ConfigInvalid`] if `DEVICE_CATEGORY`,
/// `MODEL_NAME`, or `MODEL_NUMBER` exceed their length budgets.
pub fn load(logger: &slog::Logger, defaults: &Defaults) -> Result<DeviceIdentity> {
	let device_category = env_or_default("DEVICE_CATEGORY", defaults.device_category)?.into_bytes();
	if device_category.len() > 255 {
		return Err(HtipError::ConfigInvalid(format!(
			"DEVICE_CATEGORY is {} octets, exceeding the 255-octet budget",
			device_category.len()
		)));
	}

	let manufacturer_code_raw = env_or_default("MANUFACTURER_CODE", defaults.manufacturer_code)?;
	let manufacturer_code = manufacturer_code(logger, &manufacturer_code_raw);

	let model_name = env_or_default("MODEL_NAME", defaults.model_name)?.into_bytes();
	if model_name.len() > MODEL_FIELD_MAX_LEN {
		return Err(HtipError::ConfigInvalid(format!(
			"MODEL_NAME is {} octets, exceeding the {}-octet budget",
			model_name.len(),
			MODEL_FIELD_MAX_LEN
		)));
	}

	let model_number = env_or_default("MODEL_NUMBER", defaults.model_number)?.into_bytes();
	if model_number.len() > MODEL_FIELD_MAX_LEN {
		return Err(HtipError::ConfigInvalid(format!(
			"MODEL_NUMBER is {} octets, exceeding the {}-octet budget",
			model_number.len(),
			MODEL_FIELD_MAX_LEN
		)));
	}

	Ok(DeviceIdentity {
		device_category,
		manufacturer_code,
		model_name,
		model_number,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::Mutex;

	static ENV_LOCK: Mutex<()> = Mutex::new(());

	fn logger() -> slog::Logger {
		slog::Logger::root(slog::Discard, slog::o!())
	}

	#[test]
	fn defaults_are_used_when_unset() {
		let _guard = ENV_LOCK.lock().unwrap();
		std::env::remove_var("DEVICE_CATEGORY");
		std::env::remove_var("MANUFACTURER_CODE");
		std::env::remove_var("MODEL_NAME");
		std::env::remove_var("MODEL_NUMBER");

		let identity = load(&logger(), &AGENT_DEFAULTS).unwrap();
		assert_eq!(identity.device_category, b"AV_TV");
		assert_eq!(&identity.manufacturer_code, b"JAIST\0");
		assert_eq!(identity.model_name, b"JAIST_VTV_01");
		assert_eq!(identity.model_number, b"VTV01");
	}

	#[test]
	fn overlong_manufacturer_code_is_truncated_not_rejected() {
		let _guard = ENV_LOCK.lock().unwrap();
		std::env::set_var("MANUFACTURER_CODE", "TOOLONGCODE");
		let identity = load(&logger(), &AGENT_DEFAULTS).unwrap();
		assert_eq!(&identity.manufacturer_code, b"TOOLON");
		std::env::remove_var("MANUFACTURER_CODE");
	}

	#[test]
	fn overlong_model_name_is_config_invalid() {
		let _guard = ENV_LOCK.lock().unwrap();
		std::env::set_var("MODEL_NAME", "x".repeat(32));
		let err = load(&logger(), &AGENT_DEFAULTS).unwrap_err();
		assert!(matches!(err, HtipError::ConfigInvalid(_)));
		std::env::remove_var("MODEL_NAME");
	}
}
