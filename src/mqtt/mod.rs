pub mod client;

use crate::error::TransportError;

pub const TOPIC_TELEMETRY: &str = "esp32/telemetry_data";
pub const TOPIC_COMMAND: &str = "esp32/command";
pub const TOPIC_RELAY_STATUS: [&str; 4] = [
    "esp32/relay_00_status",
    "esp32/relay_01_status",
    "esp32/relay_02_status",
    "esp32/relay_03_status",
];

/// An inbound PUBLISH delivered by [`Transport::service`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Pub/sub connection used by the control loop.
///
/// `subscribe` and `publish` only enqueue; queued packets go out the next
/// time the loop calls `service`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Open a session with the broker. Returns once the broker acknowledged it.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Liveness as last observed by `connect` or `service`.
    fn connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Drive network I/O for one loop tick and hand back whatever arrived.
    async fn service(&mut self) -> Vec<InboundMessage>;
}
