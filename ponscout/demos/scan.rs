//! OLT inventory scan example
//!
//! Scans one OLT, or every device in a JSON registry file, and prints the
//! resulting inventory.
//!
//! # Prerequisites
//!
//! - A ZTE GPON or HIOSO EPON OLT reachable over Telnet and/or SNMP
//! - A read-only CLI account and SNMP community
//!
//! # Usage
//!
//! Credentials are read from the environment, never from the command line:
//!
//! ```bash
//! export PONSCOUT_PASSWORD=secret PONSCOUT_COMMUNITY=public
//! cargo run --example scan -- --host 10.0.0.2 --user monitor --vendor ZTE-GPON --slots 2 --ports 16
//! ```
//!
//! Scan a registry of devices, four at a time, as JSON:
//! ```bash
//! cargo run --example scan -- --devices olts.json --concurrency 4 --json
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use ponscout::{Device, DeviceBuilder, DiscoveryOrchestrator, ScanOptions, ScanResult, Severity, Vendor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let options = ScanOptions::default()
        .with_command_timeout(Duration::from_secs(args.timeout))
        .with_details(!args.no_details)
        .with_concurrency(args.concurrency);
    let orchestrator = DiscoveryOrchestrator::new(options);

    let devices: Vec<Device> = match &args.devices {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => {
            let vendor: Vendor = args.vendor.parse()?;
            let mut builder = DeviceBuilder::new(&args.host, &args.host)
                .vendor(vendor)
                .pon_layout(args.slots, args.ports);
            if let Ok(password) = env::var("PONSCOUT_PASSWORD") {
                builder = builder.telnet(&args.user, password).telnet_port(args.port);
            }
            if let Ok(community) = env::var("PONSCOUT_COMMUNITY") {
                builder = builder.snmp(community);
            }
            vec![builder.build()?]
        }
    };

    println!("=== Ponscout scan of {} device(s) ===\n", devices.len());

    for (id, result) in orchestrator.scan_all(&devices).await {
        match result {
            Ok(result) if args.json => println!("{}", serde_json::to_string_pretty(&result)?),
            Ok(result) => print_summary(&result),
            Err(e) => eprintln!("{}: scan failed: {}", id, e),
        }
    }

    Ok(())
}

fn print_summary(result: &ScanResult) {
    let elapsed = result.finished_at - result.started_at;
    println!(
        "--- {} ({}, {}) in {}ms ---\n",
        result.device_id,
        result.host,
        result.vendor,
        elapsed.num_milliseconds()
    );

    for card in &result.cards {
        println!("slot {:>2}  {:<8} {:?}", card.slot, card.card_type, card.state);
    }
    if !result.cards.is_empty() {
        println!();
    }

    for onu in &result.onus {
        println!(
            "{}:{:<3} {:<14} {:<10} {:>8}  {}",
            onu.port,
            onu.onu_id,
            onu.serial.as_deref().or(onu.mac_address.as_deref()).unwrap_or("-"),
            onu.status.map(|s| format!("{:?}", s)).unwrap_or_else(|| "-".to_string()),
            onu.rx_power.map(|p| format!("{:.2}", p)).unwrap_or_else(|| "-".to_string()),
            onu.name.as_deref().unwrap_or(""),
        );
    }
    println!();

    for diag in &result.diagnostics {
        let tag = match diag.severity {
            Severity::Warning => "WARN",
            Severity::Info => "INFO",
        };
        println!("[{}] {:?}: {}", tag, diag.kind, diag.message);
    }
    println!();
}

struct Args {
    host: String,
    port: u16,
    user: String,
    vendor: String,
    slots: u8,
    ports: u8,
    devices: Option<PathBuf>,
    timeout: u64,
    concurrency: usize,
    no_details: bool,
    json: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut host = "localhost".to_string();
        let mut port = 23u16;
        let mut user = env::var("USER").unwrap_or_else(|_| "admin".to_string());
        let mut vendor = "ZTE-GPON".to_string();
        let mut slots = 1u8;
        let mut ports = 16u8;
        let mut devices = None;
        let mut timeout = 15u64;
        let mut concurrency = 8usize;
        let mut no_details = false;
        let mut json = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    i += 1;
                    if i < args.len() {
                        host = args[i].clone();
                    }
                }
                "--port" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        port = args[i].parse().unwrap_or(23);
                    }
                }
                "--user" | "-u" => {
                    i += 1;
                    if i < args.len() {
                        user = args[i].clone();
                    }
                }
                "--vendor" | "-v" => {
                    i += 1;
                    if i < args.len() {
                        vendor = args[i].clone();
                    }
                }
                "--slots" => {
                    i += 1;
                    if i < args.len() {
                        slots = args[i].parse().unwrap_or(1);
                    }
                }
                "--ports" => {
                    i += 1;
                    if i < args.len() {
                        ports = args[i].parse().unwrap_or(16);
                    }
                }
                "--devices" | "-d" => {
                    i += 1;
                    if i < args.len() {
                        devices = Some(PathBuf::from(&args[i]));
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(15);
                    }
                }
                "--concurrency" | "-c" => {
                    i += 1;
                    if i < args.len() {
                        concurrency = args[i].parse().unwrap_or(8);
                    }
                }
                "--no-details" => {
                    no_details = true;
                }
                "--json" => {
                    json = true;
                }
                "--help" => {
                    Self::print_help();
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            host,
            port,
            user,
            vendor,
            slots,
            ports,
            devices,
            timeout,
            concurrency,
            no_details,
            json,
        }
    }

    fn print_help() {
        println!("OLT inventory scan example");
        println!();
        println!("Usage: cargo run --example scan -- [OPTIONS]");
        println!();
        println!("Options:");
        println!("  -h, --host <HOST>          OLT hostname or IP [default: localhost]");
        println!("  -p, --port <PORT>          Telnet port [default: 23]");
        println!("  -u, --user <USER>          CLI username [default: $USER]");
        println!("  -v, --vendor <VENDOR>      ZTE-GPON or HIOSO-EPON [default: ZTE-GPON]");
        println!("      --slots <N>            PON slots to scan [default: 1]");
        println!("      --ports <N>            Ports per slot [default: 16]");
        println!("  -d, --devices <FILE>       JSON device registry; overrides the above");
        println!("  -t, --timeout <SECS>       Per-command timeout [default: 15]");
        println!("  -c, --concurrency <N>      Devices scanned in parallel [default: 8]");
        println!("      --no-details           Skip per-ONU detail commands");
        println!("      --json                 Print results as JSON");
        println!("      --help                 Print this help");
        println!();
        println!("Environment:");
        println!("  PONSCOUT_PASSWORD          Telnet password; Telnet is off when unset");
        println!("  PONSCOUT_COMMUNITY         SNMP community; SNMP is off when unset");
    }
}
