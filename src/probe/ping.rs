//! ICMP echo with native sockets and a `ping` command fallback.
//!
//! Native ICMP runs on blocking sockets inside spawn_blocking so round-trip
//! timing stays precise.

use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::Regex;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::process::Command;

use super::ProbeError;

/// Echo sequence counter so concurrent pings stay distinguishable.
static ECHO_SEQUENCE: AtomicU16 = AtomicU16::new(0);

#[derive(Debug, Clone, Copy, PartialEq)]
enum IcmpMode {
    Native,
    CommandOnly,
}

static ICMP_MODE: OnceLock<IcmpMode> = OnceLock::new();

fn detect_icmp_mode() -> IcmpMode {
    // RAW needs CAP_NET_RAW or root; DGRAM works unprivileged where
    // ping_group_range allows it.
    if Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)).is_ok() {
        tracing::info!("ping: native ICMP available (raw socket)");
        return IcmpMode::Native;
    }
    if Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4)).is_ok() {
        tracing::info!("ping: native ICMP available (datagram socket)");
        return IcmpMode::Native;
    }
    tracing::info!("ping: native ICMP unavailable, using command fallback");
    IcmpMode::CommandOnly
}

/// Send one echo request and wait for the matching reply.
pub(super) async fn echo(address: &str, timeout: Duration) -> Result<Duration, ProbeError> {
    if *ICMP_MODE.get_or_init(detect_icmp_mode) == IcmpMode::CommandOnly {
        return echo_command(address, timeout).await;
    }

    let ip = resolve(address).await?;
    let IpAddr::V4(v4) = ip else {
        // Store WAN addresses are IPv4; anything else goes through the
        // system ping.
        return echo_command(address, timeout).await;
    };

    let outcome = tokio::task::spawn_blocking(move || echo_native(v4, timeout))
        .await
        .map_err(|e| ProbeError::Network(format!("probe task failed: {e}")))?;

    match outcome {
        Err(ProbeError::Network(msg))
            if msg.contains("Permission") || msg.contains("not permitted") =>
        {
            tracing::warn!("ping: native ICMP denied for {address}, falling back to command");
            echo_command(address, timeout).await
        }
        other => other,
    }
}

/// Parse the address directly or resolve it through DNS.
async fn resolve(address: &str) -> Result<IpAddr, ProbeError> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addrs = tokio::net::lookup_host(format!("{address}:0"))
        .await
        .map_err(|e| ProbeError::Network(format!("dns lookup failed: {e}")))?;
    addrs
        .next()
        .map(|sa| sa.ip())
        .ok_or_else(|| ProbeError::Network(format!("no addresses for {address}")))
}

/// One echo request / echo reply exchange on a blocking ICMP socket.
fn echo_native(ip: Ipv4Addr, timeout: Duration) -> Result<Duration, ProbeError> {
    let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))
        .or_else(|_| Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::ICMPV4)))
        .map_err(|e| ProbeError::Network(format!("icmp socket: {e}")))?;

    socket
        .set_read_timeout(Some(timeout))
        .map_err(|e| ProbeError::Network(format!("set read timeout: {e}")))?;
    socket
        .set_write_timeout(Some(timeout))
        .map_err(|e| ProbeError::Network(format!("set write timeout: {e}")))?;

    let dest = SocketAddr::new(IpAddr::V4(ip), 0);
    socket
        .connect(&dest.into())
        .map_err(|e| ProbeError::Network(format!("connect: {e}")))?;

    let ident: u16 = rand::random();
    let sequence = ECHO_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let request = echo_request(ident, sequence);

    let start = Instant::now();
    socket
        .send(&request)
        .map_err(|e| ProbeError::Network(format!("send: {e}")))?;

    // Replies for other exchanges can arrive on the same socket; keep
    // reading until ours shows up or the timeout elapses.
    loop {
        let mut buf: [MaybeUninit<u8>; 1500] = [MaybeUninit::uninit(); 1500];
        let len = socket.recv(&mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock
                || e.kind() == std::io::ErrorKind::TimedOut
            {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Network(format!("recv: {e}"))
            }
        })?;

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(ProbeError::Timeout(timeout));
        }

        // SAFETY: recv initialized the first `len` bytes.
        let reply = unsafe { std::slice::from_raw_parts(buf.as_ptr() as *const u8, len) };
        if is_our_reply(reply, ident, sequence) {
            return Ok(elapsed);
        }
    }
}

/// Match an incoming packet against our echo request. Raw sockets deliver
/// the IP header, datagram sockets deliver bare ICMP.
fn is_our_reply(packet: &[u8], ident: u16, sequence: u16) -> bool {
    if packet.len() < 8 {
        return false;
    }
    let offset = if packet[0] >> 4 == 4 { 20 } else { 0 };
    if packet.len() < offset + 8 {
        return false;
    }
    let reply_type = packet[offset];
    let reply_ident = u16::from_be_bytes([packet[offset + 4], packet[offset + 5]]);
    let reply_seq = u16::from_be_bytes([packet[offset + 6], packet[offset + 7]]);
    reply_type == 0 && reply_ident == ident && reply_seq == sequence
}

/// ICMP echo request: type 8, code 0, 56-byte payload.
fn echo_request(ident: u16, sequence: u16) -> Vec<u8> {
    let mut packet = vec![0u8; 64];
    packet[0] = 8;
    packet[4..6].copy_from_slice(&ident.to_be_bytes());
    packet[6..8].copy_from_slice(&sequence.to_be_bytes());
    let checksum = rfc1071_checksum(&packet);
    packet[2..4].copy_from_slice(&checksum.to_be_bytes());
    packet
}

/// Internet checksum (RFC 1071).
fn rfc1071_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut i = 0;

    while i + 1 < data.len() {
        sum += u16::from_be_bytes([data[i], data[i + 1]]) as u32;
        i += 2;
    }
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// Ping via the system command when native ICMP is unavailable.
async fn echo_command(address: &str, timeout: Duration) -> Result<Duration, ProbeError> {
    let wait_secs = timeout.as_secs().max(1);

    let output = Command::new("ping")
        .args(["-c", "1", "-W", &wait_secs.to_string(), address])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ProbeError::Command(format!("failed to run ping: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        if stdout.contains("100% packet loss") || stdout.contains("100.0% packet loss") {
            return Err(ProbeError::Timeout(timeout));
        }
        return Err(ProbeError::Command(format!(
            "ping exited with {}",
            output.status
        )));
    }

    parse_rtt(&stdout)
}

/// Pull the round-trip time out of ping output. Handles the per-packet
/// `time=12.3 ms` form and the Linux/macOS summary lines.
fn parse_rtt(output: &str) -> Result<Duration, ProbeError> {
    static PER_PACKET: OnceLock<Regex> = OnceLock::new();
    let per_packet = PER_PACKET.get_or_init(|| Regex::new(r"time[=<]([0-9.]+)\s*ms").unwrap());

    if let Some(caps) = per_packet.captures(output) {
        if let Ok(ms) = caps[1].parse::<f64>() {
            return Ok(Duration::from_secs_f64(ms / 1000.0));
        }
    }

    static SUMMARY: OnceLock<Regex> = OnceLock::new();
    let summary = SUMMARY.get_or_init(|| {
        Regex::new(r"(?:rtt|round-trip)\s+min/avg/max/\w+\s*=\s*[0-9.]+/([0-9.]+)/").unwrap()
    });

    if let Some(caps) = summary.captures(output) {
        if let Ok(ms) = caps[1].parse::<f64>() {
            return Ok(Duration::from_secs_f64(ms / 1000.0));
        }
    }

    Err(ProbeError::Command(
        "no round-trip time in ping output".to_string(),
    ))
}
