use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::message::{TelemetryMessage, publish_json};
use crate::mqtt::{TOPIC_TELEMETRY, Transport};
use crate::sensor::Sensor;

/// Interval-gated read-and-publish cycle, timed on the monotonic clock.
pub struct TelemetryPublisher {
    interval: Duration,
    last_fire: Instant,
    counter: u32,
}

impl TelemetryPublisher {
    /// The first publish happens one full interval after `started`.
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            last_fire: started,
            counter: 0,
        }
    }

    /// Strictly more than one interval since the last fire.
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_fire) > self.interval
    }

    #[cfg(test)]
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Read the sensor and publish one telemetry document. The gate and the
    /// counter advance whether or not the publish goes through.
    pub fn fire<S: Sensor, T: Transport>(
        &mut self,
        now: Instant,
        sensor: &mut S,
        transport: &mut T,
        client_id: &str,
        device_name: &str,
        time: u64,
    ) -> TelemetryMessage {
        self.last_fire = now;
        self.counter = self.counter.wrapping_add(1);

        let temperature = sensor.read_temperature();
        let humidity = sensor.read_humidity();
        // Saturating float-to-int cast: NaN becomes 0.
        let pressure = sensor.read_pressure() as i32;

        let message = TelemetryMessage {
            client_id: client_id.to_string(),
            device_name: device_name.to_string(),
            time,
            temperature,
            humidity,
            pressure,
            interval: self.interval.as_millis() as u64,
            counter: self.counter,
        };

        publish_json(transport, TOPIC_TELEMETRY, &message);

        if let Ok(pretty) = serde_json::to_string_pretty(&message) {
            info!(target: "telemetry", "\n{}", pretty);
        }
        message
    }
}
