use std::io::stderr;
use std::sync::{Arc, Mutex};

use clap::Parser;
use common::obs::assemble_logger;
use slog::{error, info};

use htip::config;
use htip::driver::{self, Mode};
use htip::inventory::NetlinkInventorySource;

/// HTIP switch agent: advertises bridge link-info alongside device identity.
#[derive(Parser)]
#[command(about = "HTIP switch link-information agent")]
struct Cli {
	/// Bridge interface whose forwarding database is advertised.
	#[arg(short = 'i', long = "interface")]
	interface: String,

	#[arg(short = 'v', long = "verbose")]
	verbose: bool,
}

fn main() {
	let cli = Cli::parse();
	let logger = assemble_logger(stderr());

	if let Err(e) = run(&logger, &cli) {
		error!(logger, "htip-switch failed to start"; "error" => %e);
		std::process::exit(1);
	}
}

fn run(logger: &slog::Logger, cli: &Cli) -> anyhow::Result<()> {
	info!(logger, "starting htip-switch"; "bridge" => &cli.interface, "verbose" => cli.verbose);

	let identity = config::load(logger, &config::SWITCH_DEFAULTS)?;
	driver::install_signal_handler()?;

	let source: Arc<Mutex<dyn htip::inventory::InventorySource + Send>> = Arc::new(Mutex::new(NetlinkInventorySource::new()?));

	driver::run(logger, source, &identity, Mode::Switch { bridge: &cli.interface })?;

	info!(logger, "htip-switch exiting cleanly");
	Ok(())
}
