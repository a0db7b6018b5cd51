use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{0} must be > 0")]
    Zero(&'static str),
}

/// Failures reported by the messaging transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("no CONNACK within {0:?}")]
    Timeout(std::time::Duration),

    #[error("not connected")]
    NotConnected,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum TimeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),

    #[error("short response ({0} bytes)")]
    ShortResponse(usize),

    #[error("transmit timestamp {0} predates the unix epoch")]
    BeforeEpoch(u64),
}
