use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use tracing_subscriber::EnvFilter;

use icmpkit::cli::{Args, Command, PingArgs, TraceArgs};
use icmpkit::config::{PingConfig, TraceConfig};
use icmpkit::export::{export_json, write_ping_report, write_traceroute_report};
use icmpkit::{IcmpSocket, Pinger, SocketMode, Tracer};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let dest = resolve_target(args.target())
        .with_context(|| format!("Failed to resolve target: {}", args.target()))?;

    // Open the socket early so permission problems surface before any output
    let socket = match open_socket(args.dgram) {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    match &args.command {
        Command::Ping(ping) => run_ping(&args, ping, socket, dest),
        Command::Traceroute(trace) => run_traceroute(&args, trace, socket, dest),
    }
}

fn open_socket(dgram: bool) -> icmpkit::Result<IcmpSocket> {
    if dgram {
        IcmpSocket::with_mode(SocketMode::Datagram)
    } else {
        IcmpSocket::open()
    }
}

fn run_ping(args: &Args, ping: &PingArgs, socket: IcmpSocket, dest: Ipv4Addr) -> Result<()> {
    let mut pinger = Pinger::new(PingConfig::from(ping), socket);
    let result = pinger.run(dest);

    if args.json {
        export_json(&result, std::io::stdout())?;
    } else {
        write_ping_report(&result, std::io::stdout()).context("Failed to write report")?;
    }
    Ok(())
}

fn run_traceroute(args: &Args, trace: &TraceArgs, socket: IcmpSocket, dest: Ipv4Addr) -> Result<()> {
    let mut tracer = Tracer::new(TraceConfig::from(trace), socket);
    let result = tracer.run(dest);

    if args.json {
        export_json(&result, std::io::stdout())?;
    } else {
        write_traceroute_report(&result, std::io::stdout()).context("Failed to write report")?;
    }
    Ok(())
}

fn resolve_target(target: &str) -> Result<Ipv4Addr> {
    // Try parsing as IP address first
    if let Ok(ip) = target.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(_) => anyhow::bail!("IPv6 targets are not supported"),
        };
    }

    // Resolve hostname, keeping the first IPv4 address
    format!("{}:0", target)
        .to_socket_addrs()?
        .find_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .ok_or_else(|| anyhow::anyhow!("No IPv4 addresses found for hostname"))
}
