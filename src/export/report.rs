use std::io::Write;
use std::time::Duration;

use crate::icmp::{IcmpCode, IcmpType};
use crate::state::{HopProbe, PingPacket, PingResult, TracerouteResult};

fn ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn ping_line(packet: &PingPacket) -> String {
    match (packet.from, packet.rtt) {
        (Some(from), Some(rtt)) => {
            format!("reply from {}: icmp_seq={} time={:.3} ms", from, packet.seq, ms(rtt))
        }
        (Some(from), None) => format!(
            "from {}: icmp_seq={} {}",
            from,
            packet.seq,
            packet
                .description()
                .or(packet.icmp_type.map(IcmpType::label))
                .unwrap_or("ICMP error")
        ),
        (None, _) => format!("request timeout for icmp_seq {}", packet.seq),
    }
}

/// Write a ping(8)-style report: one line per probe, then statistics
pub fn write_ping_report<W: Write>(result: &PingResult, mut writer: W) -> std::io::Result<()> {
    writeln!(
        writer,
        "PING {} at {}",
        result.dest,
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    )?;
    for packet in &result.packets {
        writeln!(writer, "{}", ping_line(packet))?;
    }

    writeln!(writer)?;
    writeln!(writer, "--- {} ping statistics ---", result.dest)?;
    writeln!(
        writer,
        "{} packets transmitted, {} received, {:.1}% packet loss",
        result.sent,
        result.recvd,
        result.loss_pct()
    )?;

    if let (Some(min), Some(avg), Some(max), Some(mdev)) =
        (result.min_rtt(), result.avg_rtt(), result.max_rtt(), result.mdev())
    {
        writeln!(
            writer,
            "rtt min/avg/max/mdev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            ms(min),
            ms(avg),
            ms(max),
            ms(mdev)
        )?;
    }

    Ok(())
}

/// traceroute(8) annotation for error responses (`!H`, `!N`, ...)
fn annotation(icmp_type: Option<IcmpType>, icmp_code: Option<IcmpCode>) -> &'static str {
    match (icmp_type, icmp_code) {
        (Some(IcmpType::DestinationUnreachable), Some(code)) => match code {
            IcmpCode::Code0 => " !N",
            IcmpCode::Code1 => " !H",
            IcmpCode::Code2 => " !P",
            IcmpCode::Code4 => " !F",
            IcmpCode::Code5 => " !S",
            _ => "",
        },
        (Some(IcmpType::ParameterProblem), _) => " !X",
        _ => "",
    }
}

fn hop_line(ttl: u8, probes: &[HopProbe]) -> String {
    let mut line = format!("{:>2} ", ttl);
    let mut last_address = None;

    for probe in probes {
        match (probe.address, probe.rtt) {
            (Some(address), Some(rtt)) => {
                // Name the responder whenever it changes within the hop
                if last_address != Some(address) {
                    line.push_str(&format!(" {}", address));
                    last_address = Some(address);
                }
                line.push_str(&format!(
                    "  {:.3} ms{}",
                    ms(rtt),
                    annotation(probe.icmp_type, probe.icmp_code)
                ));
            }
            _ => line.push_str(" *"),
        }
    }
    line
}

/// Write a traceroute(8)-style report: one line per hop
pub fn write_traceroute_report<W: Write>(
    result: &TracerouteResult,
    mut writer: W,
) -> std::io::Result<()> {
    writeln!(
        writer,
        "traceroute to {}, {} hops",
        result.dest,
        result.hops.len()
    )?;
    for hop in &result.hops {
        writeln!(writer, "{}", hop_line(hop.ttl, &hop.probes))?;
    }
    if !result.reached {
        writeln!(writer, "destination not reached")?;
    }
    Ok(())
}
