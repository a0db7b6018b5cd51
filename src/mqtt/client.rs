use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::TransportError;

use super::{InboundMessage, Transport};

const REQUEST_CAPACITY: usize = 32;

pub struct MqttClient {
    client: AsyncClient,
    eventloop: EventLoop,
    connected: bool,
    connect_timeout: Duration,
    tick: Duration,
}

impl MqttClient {
    pub fn new(config: &Config, client_id: &str) -> Self {
        let mut mqttopts =
            MqttOptions::new(client_id, &config.mqtt.broker_host, config.mqtt.broker_port);
        mqttopts.set_keep_alive(config.mqtt.keep_alive);
        mqttopts.set_clean_session(true);

        if let Some((user, pass)) = config.credentials() {
            mqttopts.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(mqttopts, REQUEST_CAPACITY);

        Self {
            client,
            eventloop,
            connected: false,
            // The keep-alive is the longest a healthy broker should take to answer.
            connect_timeout: config.mqtt.keep_alive,
            tick: config.loop_tick,
        }
    }

    /// Poll until the broker acknowledges the session. A refused CONNACK
    /// surfaces from rumqttc as a connection error.
    async fn await_connack(&mut self) -> Result<(), TransportError> {
        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Incoming::ConnAck(ack)) => {
                    debug!("CONNACK: {:?}", ack.code);
                    return Ok(());
                }
                event => debug!("Event before CONNACK: {:?}", event),
            }
        }
    }
}

impl Transport for MqttClient {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let timeout = self.connect_timeout;
        let result = match tokio::time::timeout(timeout, self.await_connack()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };
        self.connected = result.is_ok();
        result
    }

    fn connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.client.try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    async fn service(&mut self) -> Vec<InboundMessage> {
        let mut inbound = Vec::new();
        if !self.connected {
            return inbound;
        }

        // Drain whatever the event loop produces within one tick; queued
        // subscribes and publishes are flushed by the same polls.
        let deadline = tokio::time::Instant::now() + self.tick;
        loop {
            let event = match tokio::time::timeout_at(deadline, self.eventloop.poll()).await {
                Ok(event) => event,
                Err(_) => break,
            };
            match event {
                Ok(Event::Incoming(Incoming::Publish(publish))) => {
                    inbound.push(InboundMessage {
                        topic: publish.topic.clone(),
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Incoming::Disconnect)) => {
                    info!("Broker closed the session");
                    self.connected = false;
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    self.connected = false;
                    break;
                }
            }
        }
        inbound
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;
    use crate::mqtt::{TOPIC_COMMAND, TOPIC_TELEMETRY};

    const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    fn config(port: u16) -> Config {
        let vars: HashMap<&str, String> = HashMap::from([
            ("MQTT_BROKER_HOST", "127.0.0.1".to_string()),
            ("MQTT_BROKER_PORT", port.to_string()),
            ("DEVICE_NAME", "greenhouse".to_string()),
        ]);
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    /// Accept one client, check it opened with CONNECT, and acknowledge it.
    async fn accept_session(listener: &TcpListener) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0);
        assert_eq!(buf[0], 0x10, "first packet must be CONNECT");
        stream.write_all(&CONNACK_ACCEPTED).await.unwrap();
        stream
    }

    /// Read until every needle shows up in the byte stream or the peer closes.
    async fn read_until(stream: &mut TcpStream, needles: &[&str]) -> Vec<u8> {
        let mut received = Vec::new();
        let mut buf = [0u8; 512];
        while !needles.iter().all(|n| find(&received, n).is_some()) {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        received
    }

    fn find(haystack: &[u8], needle: &str) -> Option<usize> {
        haystack
            .windows(needle.len())
            .position(|w| w == needle.as_bytes())
    }

    #[tokio::test]
    async fn flushes_queued_packets_and_notices_a_dropped_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let broker = tokio::spawn(async move {
            let mut first = accept_session(&listener).await;
            let received = read_until(&mut first, &[TOPIC_COMMAND, TOPIC_TELEMETRY]).await;
            drop(first);
            let second = accept_session(&listener).await;
            (received, second)
        });

        let mut client = MqttClient::new(&config(port), "esp32-client-test");
        assert!(!client.connected());
        client.connect().await.unwrap();
        assert!(client.connected());

        client.subscribe(TOPIC_COMMAND).unwrap();
        client.publish(TOPIC_TELEMETRY, b"{}".to_vec()).unwrap();

        for _ in 0..100 {
            if !client.connected() {
                break;
            }
            assert!(client.service().await.is_empty());
        }
        assert!(!client.connected(), "closed socket must clear the liveness flag");
        assert!(matches!(
            client.publish(TOPIC_TELEMETRY, b"{}".to_vec()),
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(client.subscribe(TOPIC_COMMAND), Err(TransportError::NotConnected)));

        client.connect().await.unwrap();
        assert!(client.connected());

        let (received, _second) = broker.await.unwrap();
        let subscribe_at = find(&received, TOPIC_COMMAND).expect("SUBSCRIBE reached the broker");
        let publish_at = find(&received, TOPIC_TELEMETRY).expect("PUBLISH reached the broker");
        assert!(subscribe_at < publish_at, "packets go out in the order they were queued");
    }

    #[tokio::test]
    async fn silent_broker_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let mut client = MqttClient::new(&config(port), "esp32-client-test");
        client.connect_timeout = Duration::from_millis(200);
        assert!(matches!(client.connect().await, Err(TransportError::Timeout(_))));
        assert!(!client.connected());
        assert!(client.service().await.is_empty());
        broker.abort();
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = MqttClient::new(&config(port), "esp32-client-test");
        assert!(matches!(client.connect().await, Err(TransportError::Connection(_))));
        assert!(!client.connected());
    }
}
