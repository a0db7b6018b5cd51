//! BME280 read through the Linux IIO sysfs interface exposed by the kernel's
//! `bmp280` driver.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use super::Sensor;

pub struct IioSensor {
    dir: PathBuf,
    name: String,
}

impl IioSensor {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Read one channel and scale it. NaN on any failure.
    fn channel(&self, file: &str, scale: f32) -> f32 {
        let path = self.dir.join(file);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                return f32::NAN;
            }
        };
        match raw.trim().parse::<f32>() {
            Ok(value) => value * scale,
            Err(e) => {
                warn!("Unparseable value in {}: {:?} ({})", path.display(), raw.trim(), e);
                f32::NAN
            }
        }
    }
}

impl Sensor for IioSensor {
    fn begin(&mut self) -> bool {
        match fs::read_to_string(self.dir.join("name")) {
            Ok(found) => {
                debug!("IIO device at {}: {}", self.dir.display(), found.trim());
                found.trim() == self.name
            }
            Err(_) => false,
        }
    }

    // millidegrees Celsius
    fn read_temperature(&mut self) -> f32 {
        self.channel("in_temp_input", 0.001)
    }

    // milli-percent
    fn read_humidity(&mut self) -> f32 {
        self.channel("in_humidityrelative_input", 0.001)
    }

    // kilopascals
    fn read_pressure(&mut self) -> f32 {
        self.channel("in_pressure_input", 1000.0)
    }
}
