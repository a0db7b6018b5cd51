use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub device_name: String,
    pub wifi_ssid: Option<String>,
    pub telemetry_interval: Duration,
    pub loop_tick: Duration,
    pub ntp: NtpConfig,
    pub sensor: SensorConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id_prefix: String,
    pub retry_delay: Duration,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone)]
pub struct NtpConfig {
    pub server: String,
    pub update_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorConfig {
    Iio { path: PathBuf, name: String },
    Simulated,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub active_low: bool,
    pub resync: ResyncPolicy,
}

/// What the node reports for each relay right after a broker (re)connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResyncPolicy {
    /// Publish `off` for every relay, leaving outputs untouched.
    #[default]
    ReportOff,
    /// Drive every output `off`, then publish from the mirror.
    ResetOff,
    /// Publish the current mirror value for every relay.
    ReportActual,
}

impl FromStr for ResyncPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report_off" => Ok(Self::ReportOff),
            "reset_off" => Ok(Self::ResetOff),
            "report_actual" => Ok(Self::ReportActual),
            _ => Err(()),
        }
    }
}

/// Variable lookup, so parsing can be exercised without touching the process environment.
struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        (self.lookup)(key).ok_or(ConfigError::Missing(key))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|v| !v.is_empty())
    }

    fn or_default<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value }),
        }
    }

    fn millis(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.or_default(key, default).map(Duration::from_millis)
    }

    fn secs(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        self.or_default(key, default).map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let sensor = match vars.optional("SENSOR_KIND").as_deref() {
            None | Some("iio") => SensorConfig::Iio {
                path: PathBuf::from(vars.or_default(
                    "SENSOR_IIO_PATH",
                    "/sys/bus/iio/devices/iio:device0".to_string(),
                )?),
                name: vars.or_default("SENSOR_IIO_NAME", "bme280".to_string())?,
            },
            Some("simulated") => SensorConfig::Simulated,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "SENSOR_KIND",
                    value: other.to_string(),
                });
            }
        };

        let resync = match vars.optional("RELAY_RESYNC") {
            None => ResyncPolicy::default(),
            Some(value) => value.parse().map_err(|()| ConfigError::Invalid {
                key: "RELAY_RESYNC",
                value,
            })?,
        };

        let config = Self {
            mqtt: MqttConfig {
                broker_host: vars.required("MQTT_BROKER_HOST")?,
                broker_port: vars.or_default("MQTT_BROKER_PORT", 1883)?,
                username: vars.optional("MQTT_USERNAME"),
                password: vars.optional("MQTT_PASSWORD"),
                client_id_prefix: vars
                    .or_default("MQTT_CLIENT_ID_PREFIX", "esp32-client-".to_string())?,
                retry_delay: vars.millis("MQTT_RETRY_DELAY_MS", 5000)?,
                keep_alive: vars.secs("MQTT_KEEP_ALIVE_SECS", 15)?,
            },
            device_name: vars.required("DEVICE_NAME")?,
            wifi_ssid: vars.optional("WIFI_SSID"),
            telemetry_interval: vars.millis("TELEMETRY_INTERVAL_MS", 5000)?,
            loop_tick: vars.millis("LOOP_TICK_MS", 50)?,
            ntp: NtpConfig {
                server: vars.or_default("NTP_SERVER", "pool.ntp.org".to_string())?,
                update_interval: vars.secs("NTP_UPDATE_INTERVAL_SECS", 60)?,
            },
            sensor,
            relay: RelayConfig {
                active_low: parse_bool(vars.optional("RELAY_ACTIVE_LOW"), true)?,
                resync,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.broker_host.trim().is_empty() {
            return Err(ConfigError::Empty("MQTT_BROKER_HOST"));
        }
        if self.device_name.trim().is_empty() {
            return Err(ConfigError::Empty("DEVICE_NAME"));
        }
        if self.telemetry_interval.is_zero() {
            return Err(ConfigError::Zero("TELEMETRY_INTERVAL_MS"));
        }
        if self.loop_tick.is_zero() {
            return Err(ConfigError::Zero("LOOP_TICK_MS"));
        }
        // rumqttc rejects keep-alives shorter than 5 seconds.
        if self.mqtt.keep_alive < Duration::from_secs(5) {
            return Err(ConfigError::Invalid {
                key: "MQTT_KEEP_ALIVE_SECS",
                value: self.mqtt.keep_alive.as_secs().to_string(),
            });
        }
        Ok(())
    }

    /// Credentials are only sent when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.mqtt.username, &self.mqtt.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConfigError::Invalid {
            key: "RELAY_ACTIVE_LOW",
            value,
        })
    }
}
