use std::io::stderr;
use std::sync::{Arc, Mutex};

use clap::Parser;
use common::obs::assemble_logger;
use slog::{error, info};

use htip::config;
use htip::driver::{self, Mode};
use htip::inventory::NetlinkInventorySource;

/// HTIP device agent: advertises this host's device identity over LLDP.
#[derive(Parser)]
#[command(about = "HTIP device-information agent")]
struct Cli {
	/// Advisory interface name; currently logged only, not otherwise used.
	#[arg(short = 'i', long = "interface")]
	interface: Option<String>,

	#[arg(short = 'v', long = "verbose")]
	verbose: bool,
}

fn main() {
	let cli = Cli::parse();
	let logger = assemble_logger(stderr());

	if let Err(e) = run(&logger, &cli) {
		error!(logger, "htip-agent failed to start"; "error" => %e);
		std::process::exit(1);
	}
}

fn run(logger: &slog::Logger, cli: &Cli) -> anyhow::Result<()> {
	info!(logger, "starting htip-agent"; "interface" => cli.interface.as_deref().unwrap_or("-"), "verbose" => cli.verbose);

	let identity = config::load(logger, &config::AGENT_DEFAULTS)?;
	driver::install_signal_handler()?;

	let source: Arc<Mutex<dyn htip::inventory::InventorySource + Send>> = Arc::new(Mutex::new(NetlinkInventorySource::new()?));

	driver::run(logger, source, &identity, Mode::Agent)?;

	info!(logger, "htip-agent exiting cleanly");
	Ok(())
}
