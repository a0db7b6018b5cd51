//! In-memory collaborators for unit tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::mqtt::{InboundMessage, Transport};
use crate::relay::OutputPin;
use crate::sensor::Sensor;
use crate::time::Clock;

/// Records everything sent through it. Connect attempts pop from
/// `connect_results`; an empty queue means success.
#[derive(Default)]
pub struct MockTransport {
    pub is_connected: bool,
    pub connect_results: VecDeque<bool>,
    pub connect_attempts: u32,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: VecDeque<InboundMessage>,
    pub fail_publish: bool,
    /// Drop the link the next time `service` runs.
    pub drop_on_service: bool,
}

impl MockTransport {
    pub fn connected() -> Self {
        Self {
            is_connected: true,
            ..Self::default()
        }
    }

    pub fn drop_link(&mut self) {
        self.is_connected = false;
    }

    pub fn push_inbound(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        });
    }

    pub fn published_to(&self, topic: &str) -> Vec<&[u8]> {
        self.published
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, p)| p.as_slice())
            .collect()
    }
}

impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connect_attempts += 1;
        if self.connect_results.pop_front().unwrap_or(true) {
            self.is_connected = true;
            Ok(())
        } else {
            Err(TransportError::NotConnected)
        }
    }

    fn connected(&self) -> bool {
        self.is_connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if self.fail_publish {
            return Err(TransportError::NotConnected);
        }
        self.published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn service(&mut self) -> Vec<InboundMessage> {
        if self.drop_on_service {
            self.drop_on_service = false;
            self.is_connected = false;
            return Vec::new();
        }
        self.inbound.drain(..).collect()
    }
}

pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    async fn update(&mut self) -> bool {
        true
    }

    async fn force_update(&mut self) -> bool {
        true
    }

    fn epoch_seconds(&self) -> u64 {
        self.0
    }
}

pub struct FixedSensor {
    pub present: bool,
    temperature: f32,
    humidity: f32,
    pressure: f32,
}

impl FixedSensor {
    pub fn new(temperature: f32, humidity: f32, pressure: f32) -> Self {
        Self {
            present: true,
            temperature,
            humidity,
            pressure,
        }
    }
}

impl Sensor for FixedSensor {
    fn begin(&mut self) -> bool {
        self.present
    }

    fn read_temperature(&mut self) -> f32 {
        self.temperature
    }

    fn read_humidity(&mut self) -> f32 {
        self.humidity
    }

    fn read_pressure(&mut self) -> f32 {
        self.pressure
    }
}

/// Remembers the last level it was driven to.
#[derive(Default)]
pub struct RecordingPin {
    pub high: Option<bool>,
    pub writes: u32,
}

impl OutputPin for RecordingPin {
    fn set_high(&mut self) {
        self.high = Some(true);
        self.writes += 1;
    }

    fn set_low(&mut self) {
        self.high = Some(false);
        self.writes += 1;
    }
}

/// Shared buffer the fmt subscriber writes into.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` under a plain-text subscriber and return everything it logged.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&captured.0.lock().unwrap()).into_owned();
    (result, logs)
}
