use super::Sensor;

/// Bench stand-in: slow deterministic drift around indoor conditions.
#[derive(Default)]
pub struct SimulatedSensor {
    tick: u32,
}

impl Sensor for SimulatedSensor {
    fn begin(&mut self) -> bool {
        true
    }

    fn read_temperature(&mut self) -> f32 {
        // Temperature is read first in every cycle, so it advances the pattern.
        self.tick = self.tick.wrapping_add(1);
        21.0 + (self.tick % 8) as f32 * 0.25
    }

    fn read_humidity(&mut self) -> f32 {
        45.0 + (self.tick % 6) as f32 * 0.5
    }

    fn read_pressure(&mut self) -> f32 {
        101_325.0 - (self.tick % 10) as f32 * 12.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_plausible() {
        let mut sensor = SimulatedSensor::default();
        assert!(sensor.begin());
        for _ in 0..50 {
            let t = sensor.read_temperature();
            let h = sensor.read_humidity();
            let p = sensor.read_pressure();
            assert!((20.0..25.0).contains(&t));
            assert!((40.0..50.0).contains(&h));
            assert!((100_000.0..102_000.0).contains(&p));
        }
    }
}
