pub mod iio;
pub mod simulated;

/// Temperature / humidity / pressure source, polled synchronously.
///
/// A failed read yields NaN rather than an error.
pub trait Sensor {
    /// Probe for the device. `false` means it is not there.
    fn begin(&mut self) -> bool;

    /// Degrees Celsius.
    fn read_temperature(&mut self) -> f32;

    /// Percent relative humidity.
    fn read_humidity(&mut self) -> f32;

    /// Pascals.
    fn read_pressure(&mut self) -> f32;
}

pub use iio::IioSensor;
pub use simulated::SimulatedSensor;
