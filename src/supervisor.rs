use std::time::Duration;

use tracing::{error, info, warn};

use crate::config::ResyncPolicy;
use crate::message::{StatusMessage, publish_json};
use crate::mqtt::{TOPIC_COMMAND, Transport};
use crate::relay::{OutputPin, RelayBank, RelayId, RelayState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}

/// Keeps the broker session up. Reconnection blocks the caller until it
/// succeeds; there is no attempt limit and no backoff growth.
pub struct Supervisor {
    broker: String,
    retry_delay: Duration,
    resync: ResyncPolicy,
    state: LinkState,
}

impl Supervisor {
    pub fn new(broker: String, retry_delay: Duration, resync: ResyncPolicy) -> Self {
        Self {
            broker,
            retry_delay,
            resync,
            state: LinkState::Disconnected,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Returns the number of connect attempts made (0 when already connected).
    pub async fn ensure_connected<T: Transport, P: OutputPin>(
        &mut self,
        transport: &mut T,
        relays: &mut RelayBank<P>,
        client_id: &str,
        device_name: &str,
        time: impl Fn() -> u64,
    ) -> u32 {
        if transport.connected() {
            return 0;
        }
        if self.state == LinkState::Connected {
            warn!("Lost connection to MQTT broker {}", self.broker);
            self.state = LinkState::Disconnected;
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            info!("Attempting MQTT connection to {}", self.broker);
            match transport.connect().await {
                Ok(()) => {
                    info!("Connected as clientId {}", client_id);
                    self.state = LinkState::Connected;
                    self.resynchronize(transport, relays, device_name, time());
                    return attempts;
                }
                Err(e) => {
                    error!(
                        "MQTT connection failed: {}. Trying again in {:?}",
                        e, self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }

    /// Subscribe to commands, then tell listeners where every relay stands.
    fn resynchronize<T: Transport, P: OutputPin>(
        &self,
        transport: &mut T,
        relays: &mut RelayBank<P>,
        device_name: &str,
        time: u64,
    ) {
        match transport.subscribe(TOPIC_COMMAND) {
            Ok(()) => info!("Subscribed to the command topic {}", TOPIC_COMMAND),
            Err(e) => warn!("Failed to subscribe to {}: {}", TOPIC_COMMAND, e),
        }

        if self.resync == ResyncPolicy::ResetOff {
            relays.all_off();
        }
        for relay in RelayId::ALL {
            let status = match self.resync {
                ResyncPolicy::ReportOff => {
                    StatusMessage::new(device_name, time, relay, RelayState::Off)
                }
                ResyncPolicy::ResetOff | ResyncPolicy::ReportActual => {
                    relays.status(relay, device_name, time)
                }
            };
            publish_json(transport, relay.status_topic(), &status);
        }
    }
}
