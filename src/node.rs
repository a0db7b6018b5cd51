//! The control loop. One iteration: refresh the clock, make sure the broker
//! session is up, handle whatever arrived, publish telemetry when due.

use tokio::time::Instant;
use tracing::{error, info};

use crate::command::{self, Dispatch};
use crate::config::Config;
use crate::message::publish_json;
use crate::mqtt::{InboundMessage, Transport};
use crate::relay::{OutputPin, RelayBank};
use crate::sensor::Sensor;
use crate::supervisor::Supervisor;
use crate::telemetry::TelemetryPublisher;
use crate::time::{self, Clock};

pub struct Node<T, S, C, P> {
    transport: T,
    sensor: S,
    clock: C,
    relays: RelayBank<P>,
    supervisor: Supervisor,
    telemetry: TelemetryPublisher,
    client_id: String,
    device_name: String,
}

impl<T: Transport, S: Sensor, C: Clock, P: OutputPin> Node<T, S, C, P> {
    pub fn new(
        config: &Config,
        client_id: String,
        transport: T,
        sensor: S,
        clock: C,
        relays: RelayBank<P>,
    ) -> Self {
        Self {
            transport,
            sensor,
            clock,
            relays,
            supervisor: Supervisor::new(
                format!("{}:{}", config.mqtt.broker_host, config.mqtt.broker_port),
                config.mqtt.retry_delay,
                config.relay.resync,
            ),
            telemetry: TelemetryPublisher::new(config.telemetry_interval, Instant::now()),
            client_id,
            device_name: config.device_name.clone(),
        }
    }

    /// Probe the sensor; if it is missing, halt here for good.
    pub async fn check_sensor(&mut self) {
        if self.sensor.begin() {
            info!("Sensor found");
            return;
        }
        error!("Could not find a BME280 sensor, check wiring! Halting.");
        std::future::pending::<()>().await;
    }

    pub async fn run(&mut self) {
        loop {
            self.iterate().await;
        }
    }

    pub async fn iterate(&mut self) {
        time::refresh(&mut self.clock).await;
        let now = Instant::now();

        let clock = &self.clock;
        self.supervisor
            .ensure_connected(
                &mut self.transport,
                &mut self.relays,
                &self.client_id,
                &self.device_name,
                || clock.epoch_seconds(),
            )
            .await;

        for message in self.transport.service().await {
            self.on_message(&message);
        }

        if self.telemetry.is_due(now) {
            self.telemetry.fire(
                now,
                &mut self.sensor,
                &mut self.transport,
                &self.client_id,
                &self.device_name,
                self.clock.epoch_seconds(),
            );
        }
    }

    fn on_message(&mut self, message: &InboundMessage) {
        let Dispatch::Switch(relay, state) = command::dispatch(&message.topic, &message.payload)
        else {
            return;
        };

        self.relays.set_level(relay, state);
        info!("Switch {} relay {}", state, relay);

        let status = self
            .relays
            .status(relay, &self.device_name, self.clock.epoch_seconds());
        publish_json(&mut self.transport, relay.status_topic(), &status);
    }

    /// Leave every relay de-energized.
    pub fn shutdown(&mut self) {
        info!("Switching all relays off");
        self.relays.all_off();
    }
}
