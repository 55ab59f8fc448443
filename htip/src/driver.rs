//! Single-threaded, cooperative tick loop shared by both daemons (§4.6).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nix::sys::signal::{self, SigHandler, Signal};
use slog::{error, info};

use crate::config::DeviceIdentity;
use crate::error::Result;
use crate::fdb::FdbTable;
use crate::frame;
use crate::inventory::{self, InventorySource};
use crate::transmit::{RawSocketBackend, TransmitBackend};

const TICK_INTERVAL: Duration = Duration::from_secs(30);
const SLEEP_SLICE: Duration = Duration::from_millis(200);

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigint(_signum: i32) {
	SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Installs the SIGINT handler. Idempotent; safe to call once per process.
pub fn install_signal_handler() -> Result<()> {
	unsafe {
		signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint))
			.map_err(|e| crate::error::HtipError::OpenFailed("SIGINT".to_string(), e))?;
	}
	Ok(())
}

fn shutdown_requested() -> bool {
	SHUTDOWN.load(Ordering::SeqCst)
}

/// Sleeps for [`TICK_INTERVAL`], waking early and returning as soon as the shutdown flag
/// is observed, so SIGINT is noticed within [`SLEEP_SLICE`] rather than only at the next
/// tick boundary.
fn interruptible_sleep() {
	let mut remaining = TICK_INTERVAL;
	while remaining > Duration::ZERO && !shutdown_requested() {
		let slice = SLEEP_SLICE.min(remaining);
		thread::sleep(slice);
		remaining = remaining.saturating_sub(slice);
	}
}

/// What the driver should do each tick, beyond the inventory/handle bookkeeping common to
/// both daemons.
pub enum Mode<'a> {
	Agent,
	Switch { bridge: &'a str },
}

/// Runs the tick loop until SIGINT is observed. Shared between `htip-agent` and
/// `htip-switch`; `mode` selects the per-tick emission and FDB behavior.
pub fn run(logger: &slog::Logger, source: Arc<std::sync::Mutex<dyn InventorySource + Send>>, identity: &DeviceIdentity, mode: Mode) -> Result<()> {
	run_with_backend(logger, source, identity, mode, &RawSocketBackend)
}

/// Same as [`run`], but takes the transmit backend explicitly so tests can substitute an
/// in-memory fake instead of opening real `AF_PACKET` sockets.
pub fn run_with_backend(
	logger: &slog::Logger,
	source: Arc<std::sync::Mutex<dyn InventorySource + Send>>,
	identity: &DeviceIdentity,
	mode: Mode,
	backend: &dyn TransmitBackend,
) -> Result<()> {
	let mut fdb = FdbTable::new();
	let open_handles_persist = matches!(mode, Mode::Agent);
	let mut records = Vec::new();

	while !shutdown_requested() {
		let discovered = {
			let mut source = source.lock().expect("inventory source mutex poisoned");
			inventory::read_ifinfo(logger, &mut *source)?
		};
		records = inventory::read_net_type(logger, discovered);

		inventory::open_all(logger, &mut records, backend);

		let sent = match &mode {
			Mode::Agent => frame::device_info(logger, &mut records, identity)?,
			Mode::Switch { bridge } => {
				if let Err(e) = fdb.load(logger, bridge, 4096) {
					error!(logger, "FDB load failed, abandoning tick"; "bridge" => *bridge, "error" => %e);
					inventory::close_all(&mut records);
					interruptible_sleep();
					continue;
				}
				let sent = frame::device_link(logger, &mut records, identity, &fdb)?;
				fdb.free();
				sent
			}
		};

		info!(logger, "tick complete"; "interfaces" => records.len(), "frames_sent" => sent);

		if !open_handles_persist {
			inventory::close_all(&mut records);
		}

		interruptible_sleep();
	}

	inventory::close_all(&mut records);
	fdb.free();
	info!(logger, "shutdown complete");
	Ok(())
}
