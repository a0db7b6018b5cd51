use rppal::gpio::{Gpio, OutputPin as RppalPin};

use super::{OutputPin, RelayId, RelayState};

pub struct GpioPin {
    pin: RppalPin,
}

impl OutputPin for GpioPin {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }
}

/// Claim the four relay GPIOs. Each pin starts at the `off` level for the
/// board's polarity, so no relay clicks on before the bank takes over.
pub fn relay_pins(active_low: bool) -> Result<[GpioPin; 4], rppal::gpio::Error> {
    let gpio = Gpio::new()?;
    let initial_high = RelayState::Off.pin_high(active_low);
    let claim = |relay: RelayId| -> Result<GpioPin, rppal::gpio::Error> {
        let pin = gpio.get(relay.pin())?;
        let pin = if initial_high {
            pin.into_output_high()
        } else {
            pin.into_output_low()
        };
        Ok(GpioPin { pin })
    };
    Ok([
        claim(RelayId::R0)?,
        claim(RelayId::R1)?,
        claim(RelayId::R2)?,
        claim(RelayId::R3)?,
    ])
}
