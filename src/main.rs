use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use hid_parser::annotate;

mod device;
mod output;

use device::Device;
use output::{hexdump, Output};

#[derive(Parser, Debug)]
#[command(name = "hidtool", version, about = "Inspect and talk to HID character devices")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List HID devices known to the system
    List,

    /// Dump device metadata and the decoded report descriptor
    Dump {
        /// Path to the hidraw device node
        device: PathBuf,

        /// Output file, or a directory for a timestamped file
        output: Option<PathBuf>,
    },

    /// Dump the report descriptor as an annotated byte listing
    Dumphid {
        /// Path to the hidraw device node
        device: PathBuf,

        /// Output file, or a directory for a timestamped file
        output: Option<PathBuf>,
    },

    /// Write one output report to the device
    Send {
        /// Path to the hidraw device node
        device: PathBuf,

        /// Report bytes, Report ID first; decimal or 0x-prefixed hex
        #[arg(required = true, value_parser = parse_byte)]
        bytes: Vec<u8>,
    },

    /// Read one input report from the device
    Recv {
        /// Path to the hidraw device node
        device: PathBuf,
    },

    /// Fetch a feature report, sized from the report descriptor
    FeatureGet {
        /// Path to the hidraw device node
        device: PathBuf,

        /// Report ID, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_byte)]
        report_id: u8,

        /// Output file, or a directory for a timestamped file
        output: Option<PathBuf>,
    },

    /// Send a feature report
    FeatureSet {
        /// Path to the hidraw device node
        device: PathBuf,

        /// Report ID, decimal or 0x-prefixed hex
        #[arg(value_parser = parse_byte)]
        report_id: u8,

        /// Report bytes following the ID; decimal or 0x-prefixed hex
        #[arg(required = true, value_parser = parse_byte)]
        bytes: Vec<u8>,
    },
}

/// Report IDs and report bytes: decimal or 0x-prefixed hex, at most 255.
fn parse_byte(arg: &str) -> std::result::Result<u8, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => arg.parse::<u8>(),
    };

    parsed.map_err(|_| format!("'{arg}' is not a byte value (decimal or 0x-hex, at most 255)"))
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // clap renders usage and help itself; --help and --version
            // land here too and exit clean
            let failed = err.use_stderr();
            let _ = err.print();
            return if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::List => list(),
        Command::Dump { device, output } => dump(&device, output.as_deref()),
        Command::Dumphid { device, output } => dumphid(&device, output.as_deref()),
        Command::Send { device, bytes } => send(&device, &bytes),
        Command::Recv { device } => recv(&device),
        Command::FeatureGet {
            device,
            report_id,
            output,
        } => feature_get(&device, report_id, output.as_deref()),
        Command::FeatureSet {
            device,
            report_id,
            bytes,
        } => feature_set(&device, report_id, &bytes),
    }
}

fn list() -> Result<()> {
    let api = hidapi::HidApi::new().context("cannot start hidapi")?;

    for device in api.device_list() {
        println!(
            "{:04x}:{:04x} - Usage Page: {:04X}h, Usage: {:04X}h, Interface: {}, {}",
            device.vendor_id(),
            device.product_id(),
            device.usage_page(),
            device.usage(),
            device.interface_number(),
            device.product_string().unwrap_or_default(),
        );
    }

    Ok(())
}

fn dump(path: &Path, output: Option<&Path>) -> Result<()> {
    let device = Device::open(path)?;
    let mut out = Output::create(output)?;

    let info = device.info()?;
    writeln!(out, "Device: {}", device.name()?)?;
    writeln!(out, "Physical address: {}", device.physical_address()?)?;
    writeln!(
        out,
        "Bus 0x{:02x}, vendor 0x{:04x}, product 0x{:04x}",
        info.bustype, info.vendor as u16, info.product as u16
    )?;

    let descriptor = device.report_descriptor()?;
    writeln!(out)?;
    writeln!(out, "Report descriptor ({} bytes):", descriptor.bytes.len())?;
    write!(out, "{}", hexdump(&descriptor.bytes))?;

    let tree = descriptor.decode();
    writeln!(out)?;
    write!(out, "{tree}")?;

    report_saved(&out);
    Ok(())
}

fn dumphid(path: &Path, output: Option<&Path>) -> Result<()> {
    let device = Device::open(path)?;
    let descriptor = device.report_descriptor()?;

    let mut out = Output::create(output)?;
    write!(out, "{}", annotate(&descriptor.bytes))?;

    report_saved(&out);
    Ok(())
}

fn send(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut device = Device::open(path)?;
    let sent = device.write_report(bytes)?;

    println!("Sent {sent} bytes");
    Ok(())
}

fn recv(path: &Path) -> Result<()> {
    let mut device = Device::open(path)?;

    let mut buf = [0u8; 4096];
    let got = device.read_report(&mut buf)?;

    print!("{}", hexdump(&buf[..got]));
    Ok(())
}

fn feature_get(path: &Path, report_id: u8, output: Option<&Path>) -> Result<()> {
    let device = Device::open(path)?;
    let tree = device.report_descriptor()?.decode();

    let len = tree.feature_report_len(report_id)?;
    let mut buf = vec![0u8; len];
    buf[0] = report_id;
    device.get_feature_report(&mut buf)?;

    let mut out = Output::create(output)?;
    write!(out, "{}", hexdump(&buf))?;

    report_saved(&out);
    Ok(())
}

fn feature_set(path: &Path, report_id: u8, bytes: &[u8]) -> Result<()> {
    let device = Device::open(path)?;

    let mut buf = Vec::with_capacity(bytes.len() + 1);
    buf.push(report_id);
    buf.extend_from_slice(bytes);

    device.send_feature_report(&buf)?;
    Ok(())
}

fn report_saved(out: &Output) {
    if let Some(path) = out.path() {
        println!("Saved to {}", path.display());
    }
}
