use crate::sensor::{Co2Sensor, PressureSensor, ReadOutcome};
use crate::settings::{PressureFailurePolicy, Settings};
use log::{trace, warn};

/// One compensated concentration reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementSample {
    /// CO2 concentration in ppm.
    pub ppm: u16,

    /// Ambient pressure used for compensation, in hPa.
    pub pressure_hpa: f32,
}

/// Where the ambient pressure comes from.
pub enum PressureSource<P> {
    /// An auxiliary pressure sensor.
    Auxiliary(P),

    /// The fixed fallback pressure.
    Fallback,
}

/// Failure of a single sense cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadError {
    /// The CO2 sensor produced no value. Never fatal.
    Outcome(ReadOutcome),

    /// The auxiliary pressure sensor failed under the `Halt` policy.
    Pressure(String),
}

impl ReadError {
    /// Whether acquisition must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadError::Pressure(_))
    }
}

/// Implementation of the `Display` trait for `ReadError`.
impl core::fmt::Display for ReadError {
    /// Format the error message.
    ///
    /// # Arguments
    /// * `f` - The formatter.
    ///
    /// # Returns
    /// * `core::fmt::Result` - The result of the operation.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReadError::Outcome(outcome) => write!(f, "{outcome}"),
            ReadError::Pressure(msg) => write!(f, "Error while reading from pressure sensor: {msg}"),
        }
    }
}

/// Implementation of the `Error` trait for `ReadError`.
impl std::error::Error for ReadError {}

/// Performs one sense cycle: ambient pressure, then compensated CO2 read.
pub struct MeasurementReader<S, P> {
    /// The CO2 sensor.
    sensor: S,

    /// The pressure source; may switch to `Fallback` at runtime.
    pressure: PressureSource<P>,

    /// Fallback pressure in hPa.
    fallback_pressure_hpa: f32,

    /// Auxiliary sensor failure handling.
    policy: PressureFailurePolicy,
}

impl<S: Co2Sensor, P: PressureSensor> MeasurementReader<S, P> {
    /// Create a reader.
    ///
    /// # Arguments
    /// * `sensor` - The CO2 sensor.
    /// * `pressure` - Where ambient pressure comes from.
    /// * `settings` - Fallback pressure and failure policy.
    pub fn new(sensor: S, pressure: PressureSource<P>, settings: &Settings) -> Self {
        Self {
            sensor,
            pressure,
            fallback_pressure_hpa: settings.fallback_pressure_hpa,
            policy: settings.pressure_failure_policy,
        }
    }

    /// Read one compensated sample.
    ///
    /// The pressure is truncated toward zero before it is handed to the
    /// sensor.
    ///
    /// # Returns
    /// * `Result<MeasurementSample, ReadError>` - The sample, a per-cycle
    ///   outcome, or a fatal pressure sensor failure.
    pub fn read_one_sample(&mut self) -> Result<MeasurementSample, ReadError> {
        let pressure_hpa = self.ambient_pressure()?;

        let ppm = self
            .sensor
            .compensated_read(pressure_hpa as u16)
            .map_err(ReadError::Outcome)?;

        trace!("{ppm} ppm at {pressure_hpa:.1} hPa");

        Ok(MeasurementSample { ppm, pressure_hpa })
    }

    /// Whether an auxiliary pressure sensor is in use.
    pub fn uses_auxiliary(&self) -> bool {
        matches!(self.pressure, PressureSource::Auxiliary(_))
    }

    /// The CO2 sensor, for status reads.
    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    fn ambient_pressure(&mut self) -> Result<f32, ReadError> {
        let reading = match &mut self.pressure {
            PressureSource::Fallback => return Ok(self.fallback_pressure_hpa),
            PressureSource::Auxiliary(sensor) => sensor.read(),
        };

        match reading {
            Ok((pressure_hpa, _temperature_c)) => Ok(pressure_hpa),
            Err(e) => match self.policy {
                PressureFailurePolicy::Halt => Err(ReadError::Pressure(format!("{:?}", e))),
                PressureFailurePolicy::Fallback => {
                    warn!(
                        "Pressure sensor failed ({:?}), using {:.1} hPa from now on",
                        e, self.fallback_pressure_hpa
                    );
                    self.pressure = PressureSource::Fallback;
                    Ok(self.fallback_pressure_hpa)
                }
            },
        }
    }
}
