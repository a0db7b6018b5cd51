mod command;
mod config;
mod error;
mod message;
mod mqtt;
mod network;
mod node;
mod relay;
mod sensor;
mod supervisor;
mod telemetry;
#[cfg(test)]
mod testing;
mod time;

use tracing::{error, info};

use config::{Config, SensorConfig};
use node::Node;
use relay::RelayBank;
use sensor::{IioSensor, Sensor, SimulatedSensor};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let client_id = format!("{}{:x}", config.mqtt.client_id_prefix, rand::random::<u16>());

    info!(
        "Starting relay node {} (client={}, mqtt={}:{}, telemetry every {:?})",
        config.device_name,
        client_id,
        config.mqtt.broker_host,
        config.mqtt.broker_port,
        config.telemetry_interval,
    );

    match config.sensor.clone() {
        SensorConfig::Iio { path, name } => run(config, client_id, IioSensor::new(path, name)).await,
        SensorConfig::Simulated => run(config, client_id, SimulatedSensor::default()).await,
    }
}

async fn run<S: Sensor>(config: Config, client_id: String, sensor: S) {
    #[cfg(feature = "gpio")]
    let pins = match relay::gpio::relay_pins(config.relay.active_low) {
        Ok(pins) => pins,
        Err(e) => {
            error!("Failed to claim relay GPIOs: {}", e);
            std::process::exit(1);
        }
    };
    #[cfg(not(feature = "gpio"))]
    let pins = relay::RelayId::ALL.map(|r| relay::LogPin::new(r.pin()));

    let relays = RelayBank::new(pins, config.relay.active_low);
    let transport = mqtt::client::MqttClient::new(&config, &client_id);
    let clock = time::NtpClock::new(&config.ntp);
    let mut node = Node::new(&config, client_id.clone(), transport, sensor, clock, relays);

    tokio::select! {
        _ = async {
            node.check_sensor().await;

            network::associate(
                config.wifi_ssid.as_deref(),
                &config.mqtt.broker_host,
                config.mqtt.broker_port,
                &client_id,
            )
            .await;
            network::ping_broker(&config.mqtt.broker_host, config.mqtt.broker_port).await;

            node.run().await;
        } => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
        }
        _ = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to register SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        } => {
            info!("Received SIGTERM, shutting down");
        }
    }

    node.shutdown();
    info!("Relay node stopped");
}
