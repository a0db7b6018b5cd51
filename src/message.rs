//! JSON documents published by the node and the capacity-checked encoder
//! they go through.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EncodeError;
use crate::mqtt::Transport;
use crate::relay::{RelayId, RelayState};

/// Largest payload the node will put on the wire.
pub const PAYLOAD_CAPACITY: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    pub device_name: String,
    pub time: u64,
    pub relay_id: u8,
    /// `"1"` when on, `"0"` when off.
    pub status: String,
}

impl StatusMessage {
    pub fn new(device_name: &str, time: u64, relay: RelayId, state: RelayState) -> Self {
        Self {
            device_name: device_name.to_string(),
            time,
            relay_id: relay.index() as u8,
            status: state.as_status().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMessage {
    pub client_id: String,
    pub device_name: String,
    pub time: u64,
    pub temperature: f32,
    pub humidity: f32,
    /// Pascals.
    pub pressure: i32,
    /// Milliseconds.
    pub interval: u64,
    pub counter: u32,
}

/// Serialize `message`, refusing anything larger than [`PAYLOAD_CAPACITY`].
pub fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, EncodeError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > PAYLOAD_CAPACITY {
        return Err(EncodeError::TooLarge {
            len: payload.len(),
            capacity: PAYLOAD_CAPACITY,
        });
    }
    Ok(payload)
}

/// Fire-and-forget publish: failures are logged and dropped.
///
/// Returns whether the payload was handed to the transport.
pub fn publish_json<T: Transport, M: Serialize>(transport: &mut T, topic: &str, message: &M) -> bool {
    let payload = match encode(message) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Not publishing to {}: {}", topic, e);
            return false;
        }
    };
    debug!("Publishing {} bytes to {}", payload.len(), topic);
    match transport.publish(topic, payload) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to publish {}: {}", topic, e);
            false
        }
    }
}
