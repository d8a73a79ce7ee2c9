//! Command-line front end for the firmware metadata client.
//!
//! Usage:
//!   ipswme devices
//!   ipswme device --name "iPhone 14 Pro"
//!   ipswme firmware --identifier iPhone14,7 --version 16.1
//!   ipswme -vv --json firmware --name "14 Pro" --buildid 20B82

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use ipswme_client::archive;
use ipswme_client::config::{self, ClientConfig};
use ipswme_client::endpoint::{self, Operation};
use ipswme_client::{Api, Device, Firmware, FirmwareSelector, FwError, HttpTransport};

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "ipswme", version, about = "Resolve devices and firmwares on ipsw.me")]
struct Cli {
    /// Path to a key = value configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct DeviceSelector {
    /// Device name or fragment of it (case-insensitive).
    #[arg(long)]
    name: Option<String>,

    /// Exact device identifier, e.g. iPhone14,7 (case-insensitive).
    #[arg(long)]
    identifier: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every device.
    Devices,
    /// Show one device and its board variants.
    Device(DeviceSelector),
    /// Resolve one firmware of a device.
    Firmware {
        #[command(flatten)]
        device: DeviceSelector,
        /// Exact version string (may be shared by several builds).
        #[arg(long)]
        version: Option<String>,
        /// Build id; takes precedence over --version.
        #[arg(long)]
        buildid: Option<String>,
        /// Also query the live signing status.
        #[arg(long)]
        signed: bool,
    },
    /// Query the live signing status of one build.
    Signed { identifier: String, buildid: String },
    /// Device behind a hardware model number.
    Model { model: String },
    /// Every firmware with this version, across devices.
    Version { version: String },
    /// Check the remote archive of one build is reachable for ranged reads.
    Archive { identifier: String, buildid: String },
    /// Print the URL of an endpoint, e.g. `url ipsw-info identifier=iPhone14,7 buildid=20B82`.
    Url {
        operation: Operation,
        #[arg(value_parser = parse_key_val)]
        args: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("ipswme: {e:#}");
        let code = exit_code(&e);
        if code == EXIT_RESOLUTION {
            eprintln!("ipswme: narrow the selector (--identifier, --buildid) and retry");
        }
        process::exit(code);
    }
}

const EXIT_FAILURE:    i32 = 1;
const EXIT_RESOLUTION: i32 = 2;

/// 2 when a selector matched zero or several records, 1 for anything else.
fn exit_code(e: &anyhow::Error) -> i32 {
    let resolution = e
        .chain()
        .filter_map(|c| c.downcast_ref::<FwError>())
        .any(FwError::is_resolution);
    if resolution { EXIT_RESOLUTION } else { EXIT_FAILURE }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ClientConfig::default(),
    };
    let cfg = config::validate_config(config::apply_env(cfg)).context("config validation")?;
    info!("using {}", cfg.base_url);

    let api = Api::from_config(&cfg);
    let http = HttpTransport::new(&cfg).context("building HTTP client")?;

    match cli.command {
        Command::Devices => {
            let devices = api.devices(&http).context("listing devices")?;
            if cli.json {
                print_json(&devices)?;
            } else {
                for d in &devices {
                    println!("{:<16} {}", d.identifier, d.name);
                }
            }
        }
        Command::Device(sel) => {
            let device = resolve_device(&api, &http, &sel)?;
            if cli.json {
                print_json(&device)?;
            } else {
                print_device(&device);
            }
        }
        Command::Firmware { device, version, buildid, signed } => {
            let device = resolve_device(&api, &http, &device)?;
            let selector = FirmwareSelector { version, buildid };
            let fw = api
                .firmware(&http, &device, &selector)
                .with_context(|| format!("resolving firmware of {}", device.identifier()))?;
            let signed = if signed { Some(api.firmware_signed(&http, &fw)?) } else { None };
            if cli.json {
                print_json(&serde_json::json!({ "firmware": fw, "signed": signed }))?;
            } else {
                print_firmware(&fw);
                if let Some(s) = signed {
                    println!("signed:    {s}");
                }
            }
        }
        Command::Signed { identifier, buildid } => {
            let device = api.device(&http, &identifier)?;
            let fw = api.firmware(&http, &device, &FirmwareSelector::buildid(buildid))?;
            let signed = api.firmware_signed(&http, &fw)?;
            if cli.json {
                print_json(&serde_json::json!({ "signed": signed }))?;
            } else {
                println!("{signed}");
            }
        }
        Command::Model { model } => {
            let device = api
                .model_device(&http, &model)
                .with_context(|| format!("looking up model {model}"))?;
            if cli.json {
                print_json(&device)?;
            } else {
                print_device(&device);
            }
        }
        Command::Version { version } => {
            let fws = api.version_firmwares(&http, &version)?;
            if cli.json {
                print_json(&fws)?;
            } else {
                for fw in &fws {
                    println!("{:<16} {:<10} {}", fw.device(), fw.buildid(), fw.url());
                }
            }
        }
        Command::Archive { identifier, buildid } => {
            let device = api.device(&http, &identifier)?;
            let fw = api.firmware(&http, &device, &FirmwareSelector::buildid(buildid))?;
            let reader = archive::open_archive(&http, &fw, cfg.range_chunk)
                .with_context(|| format!("opening {}", fw.url()))?;
            if reader.len() != fw.size() {
                warn!("{}: server reports {} bytes, metadata says {}", fw.url(), reader.len(), fw.size());
            }
            if cli.json {
                print_json(&serde_json::json!({ "url": fw.url(), "length": reader.len() }))?;
            } else {
                println!("{} {}", reader.len(), fw.url());
            }
        }
        Command::Url { operation, args } => {
            let args: endpoint::Args = args.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
            println!("{}", endpoint::build(api.base_url(), operation.template(), &args)?);
        }
    }
    Ok(())
}

fn resolve_device(api: &Api, http: &HttpTransport, sel: &DeviceSelector) -> anyhow::Result<Device> {
    let device = match (&sel.name, &sel.identifier) {
        (_, Some(identifier)) => api.device(http, identifier)?,
        (Some(name), None) => api.search_device(http, name)?,
        (None, None) => anyhow::bail!("either --name or --identifier is required"),
    };
    Ok(device)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_device(device: &Device) {
    println!("{} ({})", device.name(), device.identifier());
    for b in device.boards() {
        println!("  {:<10} {:<8} cpid=0x{:04x} bdid=0x{:02x}", b.boardconfig, b.platform, b.cpid, b.bdid);
    }
}

fn print_firmware(fw: &Firmware) {
    println!("device:    {}", fw.device());
    println!("version:   {}", fw.version());
    println!("buildid:   {}", fw.buildid());
    println!("size:      {}", fw.size());
    println!("released:  {}", fw.released());
    println!("uploaded:  {}", fw.uploaded());
    println!("sha1:      {}", fw.checksums().sha1);
    println!("sha256:    {}", fw.checksums().sha256);
    println!("md5:       {}", fw.checksums().md5);
    println!("url:       {}", fw.url());
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}
