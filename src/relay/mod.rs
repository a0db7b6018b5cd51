//! Relay bank: four active-low outputs plus the in-memory mirror of what was
//! last commanded. The mirror is never read back from hardware.

#[cfg(feature = "gpio")]
pub mod gpio;

use std::fmt;

#[cfg(not(feature = "gpio"))]
use tracing::debug;

use crate::message::StatusMessage;
use crate::mqtt::TOPIC_RELAY_STATUS;

/// One of the four relay outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayId {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
}

impl RelayId {
    pub const ALL: [RelayId; 4] = [RelayId::R0, RelayId::R1, RelayId::R2, RelayId::R3];

    pub fn index(self) -> usize {
        self as usize
    }

    /// BCM / GPIO number the relay is wired to.
    pub fn pin(self) -> u8 {
        match self {
            RelayId::R0 => 26,
            RelayId::R1 => 25,
            RelayId::R2 => 27,
            RelayId::R3 => 14,
        }
    }

    pub fn status_topic(self) -> &'static str {
        TOPIC_RELAY_STATUS[self.index()]
    }
}

impl fmt::Display for RelayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    #[default]
    Off,
    On,
}

impl RelayState {
    /// Pin level for this state: `true` is high. With an active-low board
    /// `on` pulls the pin low.
    pub fn pin_high(self, active_low: bool) -> bool {
        (self == RelayState::On) != active_low
    }

    /// Wire form used in status messages.
    pub fn as_status(self) -> &'static str {
        match self {
            RelayState::On => "1",
            RelayState::Off => "0",
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelayState::On => "on",
            RelayState::Off => "off",
        })
    }
}

/// A single digital output driving one relay coil.
pub trait OutputPin {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

/// Output that only records level changes in the log, for hosts without GPIO.
#[cfg(not(feature = "gpio"))]
pub struct LogPin {
    pin: u8,
}

#[cfg(not(feature = "gpio"))]
impl LogPin {
    pub fn new(pin: u8) -> Self {
        Self { pin }
    }
}

#[cfg(not(feature = "gpio"))]
impl OutputPin for LogPin {
    fn set_high(&mut self) {
        debug!("GPIO {} -> HIGH", self.pin);
    }

    fn set_low(&mut self) {
        debug!("GPIO {} -> LOW", self.pin);
    }
}

pub struct RelayBank<P> {
    pins: [P; 4],
    states: [RelayState; 4],
    active_low: bool,
}

impl<P: OutputPin> RelayBank<P> {
    /// Takes ownership of the four outputs (indexed by [`RelayId`]) and drives
    /// every one of them to its `off` level.
    pub fn new(pins: [P; 4], active_low: bool) -> Self {
        let mut bank = Self {
            pins,
            states: [RelayState::Off; 4],
            active_low,
        };
        bank.all_off();
        bank
    }

    pub fn set_level(&mut self, relay: RelayId, state: RelayState) {
        let pin = &mut self.pins[relay.index()];
        if state.pin_high(self.active_low) {
            pin.set_high();
        } else {
            pin.set_low();
        }
        self.states[relay.index()] = state;
    }

    pub fn state(&self, relay: RelayId) -> RelayState {
        self.states[relay.index()]
    }

    pub fn all_off(&mut self) {
        for relay in RelayId::ALL {
            self.set_level(relay, RelayState::Off);
        }
    }

    /// Status message for `relay` built from the mirror.
    pub fn status(&self, relay: RelayId, device_name: &str, time: u64) -> StatusMessage {
        StatusMessage::new(device_name, time, relay, self.state(relay))
    }

    #[cfg(test)]
    pub fn pin(&self, relay: RelayId) -> &P {
        &self.pins[relay.index()]
    }
}
