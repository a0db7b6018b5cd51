use tracing::{info, warn};

use crate::mqtt::TOPIC_COMMAND;
use crate::relay::{RelayId, RelayState};

/// Every command the node understands, matched by exact, case-sensitive equality.
pub const COMMANDS: [(&str, RelayId, RelayState); 8] = [
    ("relay 0 on", RelayId::R0, RelayState::On),
    ("relay 0 off", RelayId::R0, RelayState::Off),
    ("relay 1 on", RelayId::R1, RelayState::On),
    ("relay 1 off", RelayId::R1, RelayState::Off),
    ("relay 2 on", RelayId::R2, RelayState::On),
    ("relay 2 off", RelayId::R2, RelayState::Off),
    ("relay 3 on", RelayId::R3, RelayState::On),
    ("relay 3 off", RelayId::R3, RelayState::Off),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Drive `relay` to `state` and report it.
    Switch(RelayId, RelayState),
    /// Arrived on the command topic but matched nothing.
    Unrecognized,
    /// Not on the command topic.
    Ignored,
}

pub fn lookup(token: &str) -> Option<(RelayId, RelayState)> {
    COMMANDS
        .iter()
        .find(|(text, _, _)| *text == token)
        .map(|&(_, relay, state)| (relay, state))
}

/// Classify an inbound message. Every message is logged, whatever the outcome.
pub fn dispatch(topic: &str, payload: &[u8]) -> Dispatch {
    let text = String::from_utf8_lossy(payload);
    info!("Message arrived on topic: {} content: {}", topic, text);

    if topic != TOPIC_COMMAND {
        return Dispatch::Ignored;
    }

    // Invalid UTF-8 turns into replacement characters and can never match.
    match lookup(&text) {
        Some((relay, state)) => Dispatch::Switch(relay, state),
        None => {
            warn!("No command recognized: {:?}", text);
            Dispatch::Unrecognized
        }
    }
}
