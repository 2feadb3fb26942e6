use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser};
use tokio::net::UdpSocket;
use tracing_subscriber::EnvFilter;

use gvcp_device::config::{DeviceIdentity, DiscoveryConfig, EngineConfig, NetworkInfo};
use gvcp_device::{GvcpEngine, NullCollaborator, Platform, PlatformError};

/// Default GVCP control-channel port (`spec.md` §1).
const GVCP_PORT: u16 = 3956;

#[derive(Parser, Debug)]
#[command(name = "gvcp-sim", version, about = "GVCP device simulator")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Network interface to bind and advertise (defaults to the first
    /// non-loopback IPv4 interface).
    #[arg(long)]
    iface: Option<Ipv4Addr>,

    /// UDP port to bind (default is the standard GVCP port).
    #[arg(long, default_value_t = GVCP_PORT)]
    port: u16,

    /// Gateway address to advertise. `if-addrs` has no notion of a default
    /// gateway, so this has to be supplied explicitly if it matters to the
    /// client under test.
    #[arg(long, default_value = "0.0.0.0")]
    gateway: Ipv4Addr,

    /// MAC address to advertise, colon-separated hex (e.g. `aa:bb:cc:dd:ee:ff`).
    #[arg(long, value_parser = parse_mac, default_value = "00:00:00:00:00:00")]
    mac: [u8; 6],

    #[arg(long, default_value = "Acme Vision")]
    manufacturer: String,
    #[arg(long, default_value = "GVCP-SIM")]
    model: String,
    #[arg(long, default_value = "1.0")]
    device_version: String,
    #[arg(long, default_value = "0000000001")]
    serial: String,
    #[arg(long, default_value = "")]
    user_name: String,

    /// Disable the periodic unsolicited discovery broadcast.
    #[arg(long)]
    no_discovery_broadcast: bool,
    #[arg(long, default_value_t = 1000)]
    discovery_interval_ms: u32,
    #[arg(long, default_value_t = 3)]
    discovery_retries: u32,
}

fn parse_mac(s: &str) -> Result<[u8; 6], String> {
    let mut out = [0u8; 6];
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(format!("expected 6 colon-separated octets, got {s}"));
    }
    for (i, part) in parts.iter().enumerate() {
        out[i] = u8::from_str_radix(part, 16).map_err(|e| e.to_string())?;
    }
    Ok(out)
}

/// Live [`Platform`] backed by a real, non-blocking [`UdpSocket`].
struct RealPlatform {
    socket: UdpSocket,
    start: Instant,
    network: NetworkInfo,
}

impl Platform for RealPlatform {
    fn monotonic_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> Result<(), PlatformError> {
        self.socket
            .try_send_to(payload, dest)
            .map(|_| ())
            .map_err(|e| PlatformError::Send(e.to_string()))
    }

    fn network_info(&self) -> NetworkInfo {
        self.network
    }
}

/// Resolve the address/mask to advertise from the host's interfaces.
fn resolve_network(iface: Option<Ipv4Addr>, mac: [u8; 6], gateway: Ipv4Addr) -> Result<NetworkInfo> {
    let interfaces = if_addrs::get_if_addrs().context("enumerating network interfaces")?;
    let chosen = interfaces
        .into_iter()
        .filter(|i| !i.is_loopback())
        .find_map(|i| match i.addr {
            if_addrs::IfAddr::V4(v4) => {
                if iface.map(|want| want == v4.ip).unwrap_or(true) {
                    Some(v4)
                } else {
                    None
                }
            }
            _ => None,
        })
        .ok_or_else(|| anyhow!("no matching non-loopback IPv4 interface found"))?;

    Ok(NetworkInfo {
        mac,
        ip: chosen.ip,
        mask: chosen.netmask,
        gateway,
    })
}

fn broadcast_address(network: &NetworkInfo, port: u16) -> SocketAddr {
    let ip = u32::from(network.ip);
    let mask = u32::from(network.mask);
    let broadcast = Ipv4Addr::from(ip | !mask);
    SocketAddr::new(broadcast.into(), port)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| level.into()),
        ))
        .with_target(false)
        .init();

    let network = resolve_network(cli.iface, cli.mac, cli.gateway)?;
    let broadcast_addr = broadcast_address(&network, cli.port);

    let socket = UdpSocket::bind((network.ip, cli.port))
        .await
        .with_context(|| format!("binding GVCP socket on {}:{}", network.ip, cli.port))?;
    socket.set_broadcast(true).context("enabling SO_BROADCAST")?;

    tracing::info!(ip = %network.ip, port = cli.port, "gvcp-sim listening");

    let platform = RealPlatform {
        socket,
        start: Instant::now(),
        network,
    };

    let config = EngineConfig {
        identity: DeviceIdentity {
            manufacturer: cli.manufacturer,
            model: cli.model,
            version: cli.device_version,
            serial: cli.serial,
            user_name: cli.user_name,
        },
        network,
        discovery: DiscoveryConfig {
            enabled: !cli.no_discovery_broadcast,
            interval_ms: cli.discovery_interval_ms,
            retries: cli.discovery_retries,
        },
        max_socket_errors: 3,
    };

    let mut engine = GvcpEngine::new(config, platform, NullCollaborator);

    let mut tick_interval = tokio::time::interval(std::time::Duration::from_millis(100));
    let mut buf = vec![0u8; 2048];
    let start = Instant::now();

    loop {
        tokio::select! {
            recv = engine_recv(&engine, &mut buf) => {
                let (len, from) = recv?;
                engine.handle_datagram(&buf[..len], from);
            }
            _ = tick_interval.tick() => {
                engine.tick(start.elapsed().as_millis() as u64, broadcast_addr);
                if engine.should_recreate_socket() {
                    tracing::warn!("socket error threshold reached, exiting for supervisor restart");
                    return Ok(());
                }
            }
        }
    }
}

/// `tokio::select!` needs an owned future per branch; `GvcpEngine` doesn't
/// expose its socket, so reads go through the platform's own socket handle
/// via this thin wrapper instead of borrowing the engine mutably twice.
async fn engine_recv(
    engine: &GvcpEngine<RealPlatform, NullCollaborator>,
    buf: &mut [u8],
) -> Result<(usize, SocketAddr)> {
    engine
        .platform()
        .socket
        .recv_from(buf)
        .await
        .context("receiving GVCP datagram")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_parses_colon_separated_hex() {
        assert_eq!(
            parse_mac("aa:bb:cc:dd:ee:ff").unwrap(),
            [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]
        );
    }

    #[test]
    fn mac_rejects_wrong_length() {
        assert!(parse_mac("aa:bb:cc").is_err());
    }

    #[test]
    fn broadcast_address_masks_host_bits() {
        let network = NetworkInfo {
            mac: [0; 6],
            ip: Ipv4Addr::new(192, 168, 1, 42),
            mask: Ipv4Addr::new(255, 255, 255, 0),
            gateway: Ipv4Addr::UNSPECIFIED,
        };
        let addr = broadcast_address(&network, GVCP_PORT);
        assert_eq!(addr.ip(), Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(addr.port(), GVCP_PORT);
    }
}
