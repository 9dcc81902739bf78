use crate::pasco2::MeasurementConfig;
use crate::status::SensorStatus;

/// Why a compensated read produced no concentration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// No new value since the last read. Expected on most cycles.
    NotReady,

    /// Bus transfer failed.
    CommError,

    /// Any other failure.
    Unexpected,
}

/// Implementation of the `Display` trait for `ReadOutcome`.
impl core::fmt::Display for ReadOutcome {
    /// Format the console message.
    ///
    /// # Arguments
    /// * `f` - The formatter.
    ///
    /// # Returns
    /// * `core::fmt::Result` - The result of the operation.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReadOutcome::NotReady => write!(f, "CO2 PPM value is not ready"),
            ReadOutcome::CommError => write!(f, "I2C communication error"),
            ReadOutcome::Unexpected => write!(f, "Unexpected error"),
        }
    }
}

/// Read side of the primary CO2 sensor.
pub trait Co2Sensor {
    type Error: core::fmt::Debug;

    /// Read the concentration in ppm, compensated for `pressure_hpa`.
    fn compensated_read(&mut self, pressure_hpa: u16) -> Result<u16, ReadOutcome>;

    /// Read the raw health status.
    fn status(&mut self) -> Result<SensorStatus, Self::Error>;
}

/// Configuration side of the primary CO2 sensor.
///
/// The console uses this while the acquisition loop keeps reading; the bus
/// beneath both is expected to serialize transfers.
pub trait MeasurementControl {
    type Error: core::fmt::Debug;

    fn set_measurement_config(&mut self, config: MeasurementConfig) -> Result<(), Self::Error>;

    /// Set the sensor-internal sampling period in seconds.
    fn set_measurement_rate(&mut self, seconds: u16) -> Result<(), Self::Error>;
}

/// Auxiliary ambient pressure sensor.
pub trait PressureSensor {
    type Error: core::fmt::Debug;

    /// Read `(pressure_hpa, temperature_c)`.
    fn read(&mut self) -> Result<(f32, f32), Self::Error>;
}
