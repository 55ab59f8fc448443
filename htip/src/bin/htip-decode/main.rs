use std::fs;
use std::path::PathBuf;

use clap::Parser;

use htip::htip::{describe, htip_subtype};
use htip::tlv::TlvIterator;

/// Diagnostic decoder: walks a raw LLDPDU payload and prints one line per TLV.
#[derive(Parser)]
#[command(about = "Decode a raw LLDPDU payload and print its TLVs")]
struct Cli {
	/// Path to a file containing a raw LLDPDU payload (as captured off the wire).
	path: PathBuf,
}

fn main() {
	let cli = Cli::parse();

	let buf = match fs::read(&cli.path) {
		Ok(buf) => buf,
		Err(e) => {
			eprintln!("htip-decode: failed to read {}: {}", cli.path.display(), e);
			std::process::exit(1);
		}
	};

	for decoded in TlvIterator::new(&buf) {
		match decoded {
			Ok(tlv) => {
				if let Some(_subtype) = htip_subtype(tlv.ty, tlv.value) {
					match describe(tlv.value) {
						Ok(line) => println!("{}", line),
						Err(e) => println!("type={} <malformed htip tlv: {}>", tlv.ty, e),
					}
				} else {
					println!("type={} len={} value={:02x?}", tlv.ty, tlv.value.len(), tlv.value);
				}
			}
			Err(e) => println!("<malformed tlv: {}>", e),
		}
	}
}
