//! Wall-clock source for message timestamps, synced over SNTP.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::NtpConfig;
use crate::error::TimeError;

const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;
/// Seconds between the NTP era (1900-01-01) and the unix epoch.
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

#[allow(async_fn_in_trait)]
pub trait Clock {
    /// Sync if the update interval has passed. `true` when no sync was due
    /// or the sync succeeded.
    async fn update(&mut self) -> bool;

    /// Sync now, regardless of the interval.
    async fn force_update(&mut self) -> bool;

    /// Seconds since the unix epoch; 0 until the first successful sync.
    fn epoch_seconds(&self) -> u64;
}

/// Block until the clock reports a successful update.
pub async fn refresh<C: Clock>(clock: &mut C) {
    while !clock.update().await {
        clock.force_update().await;
    }
}

pub struct NtpClock {
    server: String,
    update_interval: Duration,
    synced: Option<(u64, Instant)>,
}

impl NtpClock {
    pub fn new(config: &NtpConfig) -> Self {
        Self {
            server: config.server.clone(),
            update_interval: config.update_interval,
            synced: None,
        }
    }

    async fn query(&self) -> Result<u64, TimeError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        socket.connect((self.server.as_str(), NTP_PORT)).await?;
        socket.send(&request_packet()).await?;

        let mut buf = [0u8; NTP_PACKET_LEN];
        let len = tokio::time::timeout(RESPONSE_TIMEOUT, socket.recv(&mut buf))
            .await
            .map_err(|_| TimeError::Timeout(RESPONSE_TIMEOUT))??;
        transmit_seconds(&buf[..len])
    }
}

impl Clock for NtpClock {
    async fn update(&mut self) -> bool {
        match self.synced {
            Some((_, at)) if at.elapsed() < self.update_interval => true,
            _ => self.force_update().await,
        }
    }

    async fn force_update(&mut self) -> bool {
        debug!("Syncing time from {}", self.server);
        match self.query().await {
            Ok(secs) => {
                if self.synced.is_none() {
                    match chrono::DateTime::from_timestamp(secs as i64, 0) {
                        Some(at) => info!("Time synced from {}: {}", self.server, at.to_rfc3339()),
                        None => info!("Time synced from {}: {}", self.server, secs),
                    }
                }
                self.synced = Some((secs, Instant::now()));
                true
            }
            Err(e) => {
                warn!("Time sync from {} failed: {}", self.server, e);
                // Errors other than a timeout return at once; keep retries paced.
                tokio::time::sleep(RESPONSE_TIMEOUT).await;
                false
            }
        }
    }

    fn epoch_seconds(&self) -> u64 {
        match self.synced {
            Some((secs, at)) => secs + at.elapsed().as_secs(),
            None => 0,
        }
    }
}

/// SNTP v4 client request.
fn request_packet() -> [u8; NTP_PACKET_LEN] {
    let mut packet = [0u8; NTP_PACKET_LEN];
    packet[0] = 0b1110_0011; // LI unsynchronized, version 4, mode client
    packet[1] = 0; // stratum
    packet[2] = 6; // poll interval
    packet[3] = 0xEC; // precision
    packet[12..16].copy_from_slice(&[49, 0x4E, 49, 52]);
    packet
}

/// Unix seconds from the transmit timestamp of an NTP response.
fn transmit_seconds(response: &[u8]) -> Result<u64, TimeError> {
    if response.len() < NTP_PACKET_LEN {
        return Err(TimeError::ShortResponse(response.len()));
    }
    let ntp = u64::from(u32::from_be_bytes([
        response[40],
        response[41],
        response[42],
        response[43],
    ]));
    ntp.checked_sub(NTP_UNIX_OFFSET)
        .ok_or(TimeError::BeforeEpoch(ntp))
}
