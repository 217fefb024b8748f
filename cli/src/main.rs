//! CLI for capturing packets on local network interfaces
//!
//! # Examples
//!
//! ```bash
//! # help menu
//! sudo r-capcli --help
//!
//! # list interfaces
//! r-capcli --list
//!
//! # capture 10 packets on the default interface
//! sudo r-capcli
//!
//! # capture until interrupted, reading synchronously
//! sudo r-capcli -i eth0 -c 0 --sync
//! ```
use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use itertools::Itertools;
use log::*;
use r_caplib::{
    device::{
        CaptureConfig, CaptureDevice, CaptureStoppedStatus, DEFAULT_BUFFER_SIZE,
        PacketArrival,
    },
    error::Result as LibResult,
    network::{self, NetworkInterface},
    packet::{CapturedPacket, DEFAULT_SNAPLEN},
};
use serde::Serialize;
use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    time::Duration,
};

const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

// how often the background consumer checks for an interrupt
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
/// CLI for capturing packets on local network interfaces
struct Args {
    /// List available network interfaces and exit
    #[arg(short, long, default_value_t = false)]
    list: bool,

    /// Choose a specific network interface to capture on
    #[arg(short, long)]
    interface: Option<String>,

    /// Number of packets to capture, 0 captures until interrupted
    #[arg(short, long, default_value_t = 10)]
    count: usize,

    /// Read packets synchronously instead of in a background capture
    #[arg(long, default_value_t = false)]
    sync: bool,

    /// Do not put the interface into promiscuous mode
    #[arg(long, default_value_t = false)]
    no_promiscuous: bool,

    /// Time in milliseconds a single read waits for a packet
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_MS)]
    read_timeout_ms: u64,

    /// Maximum number of bytes kept per packet
    #[arg(long, default_value_t = DEFAULT_SNAPLEN)]
    snaplen: usize,

    /// Size in bytes of the native read buffer
    #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
    buffer_size: usize,

    /// Output in json instead of text
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Only print captured packets nothing else
    #[arg(short, long, default_value_t = false)]
    quiet: bool,

    /// Prints debug logs including those from r-caplib
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[doc(hidden)]
#[derive(Debug, Serialize)]
struct PacketRecord<'a> {
    timestamp: String,
    interface: &'a str,
    length: usize,
    captured: usize,
}

#[doc(hidden)]
enum CaptureEvent {
    Packet(PacketArrival),
    Stopped(CaptureStoppedStatus),
}

#[doc(hidden)]
fn initialize_logger(args: &Args) -> Result<()> {
    let filter = if args.quiet {
        simplelog::LevelFilter::Error
    } else if args.debug {
        simplelog::LevelFilter::Debug
    } else {
        simplelog::LevelFilter::Info
    };

    simplelog::TermLogger::init(
        filter,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    Ok(())
}

#[doc(hidden)]
fn build_config(args: &Args) -> LibResult<CaptureConfig> {
    Ok(CaptureConfig::builder()
        .promiscuous(!args.no_promiscuous)
        .read_timeout(Duration::from_millis(args.read_timeout_ms))
        .snaplen(args.snaplen)
        .buffer_size(args.buffer_size)
        .build()?)
}

#[doc(hidden)]
fn print_args(args: &Args, interface: &NetworkInterface) {
    info!("configuration:");
    info!("interface:       {}", interface.name);
    info!("description:     {}", interface.description);
    info!("count:           {}", args.count);
    info!("sync:            {}", args.sync);
    info!("promiscuous:     {}", !args.no_promiscuous);
    info!("read_timeout_ms: {}", args.read_timeout_ms);
    info!("snaplen:         {}", args.snaplen);
    info!("buffer_size:     {}", args.buffer_size);
    info!("json:            {}", args.json);
    info!("quiet:           {}", args.quiet);
}

#[doc(hidden)]
fn format_addresses(interface: &NetworkInterface) -> String {
    interface
        .addresses
        .iter()
        .map(|a| match a.prefix() {
            Some(prefix) => format!("{}/{}", a.addr, prefix),
            None => a.addr.to_string(),
        })
        .join(", ")
}

#[doc(hidden)]
fn print_interfaces(args: &Args, interfaces: &[NetworkInterface]) -> Result<()> {
    if args.json {
        let j: String = serde_json::to_string(interfaces)?;
        println!("{}", j);
        return Ok(());
    }

    let mut table = prettytable::Table::new();

    table.add_row(prettytable::row![
        "NAME",
        "DESCRIPTION",
        "MAC",
        "ADDRESSES",
        "GATEWAYS",
    ]);

    for iface in interfaces {
        let mac = iface.mac.map(|m| m.to_string()).unwrap_or_default();
        let gateways = iface.gateway_addresses.iter().join(", ");
        table.add_row(prettytable::row![
            iface.name,
            iface.description,
            mac,
            format_addresses(iface),
            gateways
        ]);
    }

    table.printstd();

    Ok(())
}

#[doc(hidden)]
fn packet_record<'a>(
    interface: &'a str,
    packet: &CapturedPacket,
) -> PacketRecord<'a> {
    PacketRecord {
        timestamp: humantime::format_rfc3339_micros(packet.timestamp)
            .to_string(),
        interface,
        length: packet.length,
        captured: packet.data.len(),
    }
}

#[doc(hidden)]
fn print_packet(
    args: &Args,
    interface: &str,
    packet: &CapturedPacket,
) -> Result<()> {
    let record = packet_record(interface, packet);

    if args.json {
        println!("{}", serde_json::to_string(&record)?);
    } else {
        println!(
            "{} {} length {} captured {}",
            record.timestamp, record.interface, record.length, record.captured
        );
    }

    Ok(())
}

#[doc(hidden)]
fn capture_sync(
    device: &CaptureDevice,
    count: usize,
    interrupt: &Receiver<()>,
    mut on_packet: impl FnMut(&CapturedPacket),
) -> LibResult<usize> {
    let mut received = 0;

    while count == 0 || received < count {
        if interrupt.try_recv().is_ok() {
            debug!("capture interrupted");
            break;
        }

        // poll so interrupts are noticed between reads
        if let Some(packet) = device.poll_next_packet()? {
            on_packet(&packet);
            received += 1;
        }
    }

    Ok(received)
}

#[doc(hidden)]
fn capture_background(
    device: &CaptureDevice,
    count: usize,
    interrupt: &Receiver<()>,
    mut on_packet: impl FnMut(&CapturedPacket),
) -> LibResult<usize> {
    let (tx, rx) = mpsc::channel::<CaptureEvent>();
    let stopped_tx = tx.clone();

    let packet_handler = device.on_packet_arrival(move |arrival| {
        let _ = tx.send(CaptureEvent::Packet(arrival.clone()));
    })?;

    let stopped_handler = device.on_capture_stopped(move |stopped| {
        let _ = stopped_tx.send(CaptureEvent::Stopped(stopped.status.clone()));
    })?;

    device.start_capture()?;

    let mut received = 0;

    loop {
        if interrupt.try_recv().is_ok() {
            debug!("capture interrupted");
            break;
        }

        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(CaptureEvent::Packet(arrival)) => {
                on_packet(&arrival.packet);
                received += 1;
                if count > 0 && received >= count {
                    break;
                }
            }
            Ok(CaptureEvent::Stopped(status)) => {
                debug!("capture stopped: {:?}", status);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let stopped = device.stop_capture();

    device.remove_packet_arrival(packet_handler)?;
    device.remove_capture_stopped(stopped_handler)?;

    stopped?;

    Ok(received)
}

#[doc(hidden)]
#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[doc(hidden)]
#[cfg(windows)]
fn is_root() -> bool {
    // On Windows, check if running as Administrator
    use std::process::Command;
    Command::new("net")
        .args(["session"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[doc(hidden)]
fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    initialize_logger(&args)?;

    if args.list {
        let interfaces = network::interfaces()?;
        return print_interfaces(&args, &interfaces);
    }

    if !is_root() {
        return Err(eyre!("permission denied: must run with root privileges"));
    }

    let interface = match &args.interface {
        Some(name) => network::get_interface(name)
            .map_err(|e| eyre!("Could not find network interface: {}", e))?,
        None => network::get_default_interface().map_err(|e| {
            eyre!("Could not detect default network interface: {}", e)
        })?,
    };

    print_args(&args, &interface);

    let device = CaptureDevice::builder()
        .name(interface.name.clone())
        .config(build_config(&args)?)
        .build()?;

    device.open()?;

    let (interrupt_tx, interrupt_rx) = mpsc::channel::<()>();

    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    let printer = |packet: &CapturedPacket| {
        if let Err(e) = print_packet(&args, device.name(), packet) {
            error!("failed to print packet: {}", e);
        }
    };

    info!("starting capture...");

    let result = if args.sync {
        capture_sync(&device, args.count, &interrupt_rx, printer)
    } else {
        capture_background(&device, args.count, &interrupt_rx, printer)
    };

    device.close()?;

    let received = result?;

    info!("captured {} packets", received);
    info!("statistics: {:?}", device.statistics());

    Ok(())
}

#[cfg(test)]
#[path = "./main_tests.rs"]
mod tests;
