//! Network association: wait until the broker is routable, then report the
//! link the node ended up on.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tokio::net::{TcpStream, UdpSocket, lookup_host};
use tracing::{error, info};

const ASSOCIATION_POLL: Duration = Duration::from_millis(500);
const PING_ATTEMPTS: u32 = 3;
const PING_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct NetworkInfo {
    pub local_ip: IpAddr,
    pub gateway: Option<Ipv4Addr>,
    pub mac: Option<String>,
    pub hostname: String,
}

/// Block until a route to the broker exists. Never gives up.
pub async fn associate(ssid: Option<&str>, broker_host: &str, broker_port: u16, hostname: &str) -> NetworkInfo {
    match ssid {
        Some(ssid) => info!("Connecting to WiFi network: {}", ssid),
        None => info!("Waiting for network"),
    }

    let local_ip = loop {
        if let Some(ip) = local_route(broker_host, broker_port).await {
            break ip;
        }
        tokio::time::sleep(ASSOCIATION_POLL).await;
    };

    let network = NetworkInfo {
        local_ip,
        gateway: default_gateway(),
        mac: first_mac(),
        hostname: hostname.to_string(),
    };
    info!(
        "Network connected (ip={}, gateway={}, mac={}, hostname={})",
        network.local_ip,
        network
            .gateway
            .map(|gw| gw.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        network.mac.as_deref().unwrap_or("unknown"),
        network.hostname,
    );
    network
}

/// Local address the kernel would use to reach the broker. Connecting a UDP
/// socket only selects a route; nothing is sent.
async fn local_route(host: &str, port: u16) -> Option<IpAddr> {
    let target = lookup_host((host, port)).await.ok()?.next()?;
    let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind).await.ok()?;
    socket.connect(target).await.ok()?;
    Some(socket.local_addr().ok()?.ip())
}

fn default_gateway() -> Option<Ipv4Addr> {
    parse_default_gateway(&fs::read_to_string("/proc/net/route").ok()?)
}

/// Gateway of the IPv4 default route in a `/proc/net/route` table. Addresses
/// there are hex in host byte order.
fn parse_default_gateway(table: &str) -> Option<Ipv4Addr> {
    table.lines().skip(1).find_map(|line| {
        let mut fields = line.split_whitespace();
        let (_iface, destination, gateway) = (fields.next()?, fields.next()?, fields.next()?);
        if destination != "00000000" {
            return None;
        }
        let raw = u32::from_str_radix(gateway, 16).ok()?;
        (raw != 0).then(|| Ipv4Addr::from(raw.to_ne_bytes()))
    })
}

fn first_mac() -> Option<String> {
    let entries = fs::read_dir("/sys/class/net").ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .collect();
    names.sort();
    names.into_iter().find_map(|name| {
        let mac = fs::read_to_string(format!("/sys/class/net/{name}/address")).ok()?;
        let mac = mac.trim().to_uppercase();
        (mac != "00:00:00:00:00:00" && !mac.is_empty()).then_some(mac)
    })
}

/// Reachability probe against the broker; the outcome is only logged.
pub async fn ping_broker(host: &str, port: u16) -> bool {
    for _ in 0..PING_ATTEMPTS {
        if let Ok(Ok(_)) = tokio::time::timeout(PING_TIMEOUT, TcpStream::connect((host, port))).await {
            info!("Ping OK to {}", host);
            return true;
        }
    }
    error!("Ping failed to {}", host);
    false
}
