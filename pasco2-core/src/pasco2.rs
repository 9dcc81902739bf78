use crate::sensor::{Co2Sensor, MeasurementControl, ReadOutcome};
use crate::status::SensorStatus;
use embedded_hal::i2c::I2c;

/// PAS CO2 I2C address.
pub const ADDRESS: u8 = 0x28;

/// Shortest measurement period in seconds.
pub const MEAS_RATE_MIN: u16 = 5;

/// Longest measurement period in seconds.
pub const MEAS_RATE_MAX: u16 = 4095;

/// Measurement period after reset, in seconds.
pub const MEAS_RATE_DEFAULT: u16 = 60;

/// Lowest accepted pressure reference in hPa.
pub const PRESSURE_REF_MIN: u16 = 600;

/// Highest accepted pressure reference in hPa.
pub const PRESSURE_REF_MAX: u16 = 1600;

/// Register map.
mod reg {
    pub const PROD_ID: u8 = 0x00;
    pub const SENS_STS: u8 = 0x01;
    pub const MEAS_RATE_H: u8 = 0x02;
    pub const MEAS_CFG: u8 = 0x04;
    pub const CO2PPM_H: u8 = 0x05;
    pub const MEAS_STS: u8 = 0x07;
    pub const INT_CFG: u8 = 0x08;
    pub const PRES_REF_H: u8 = 0x0B;
    pub const SCRATCH_PAD: u8 = 0x0F;
}

/// `MEAS_STS` data ready bit.
const MEAS_STS_DRDY: u8 = 1 << 4;

/// `SENS_STS` clear bits for ICCER, ORVS and ORTMP.
const SENS_STS_CLEAR_ALL: u8 = 0b0000_0111;

/// Value written to the scratch pad to test communication.
const SCRATCH_PAD_TEST: u8 = 0xA5;

/// Sensor operating mode, `MEAS_CFG` bits `[1:0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperatingMode {
    Idle = 0,
    Single = 1,
    Continuous = 2,
}

/// Automatic baseline offset compensation, `MEAS_CFG` bits `[3:2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BaselineCompensation {
    Disabled = 0,
    Automatic = 1,
    Forced = 2,
}

/// Measurement configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementConfig {
    /// Operating mode.
    pub op_mode: OperatingMode,

    /// Baseline compensation.
    pub boc: BaselineCompensation,
}

impl MeasurementConfig {
    /// Idle with automatic baseline compensation.
    pub const fn idle() -> Self {
        Self {
            op_mode: OperatingMode::Idle,
            boc: BaselineCompensation::Automatic,
        }
    }

    /// Continuous with automatic baseline compensation.
    pub const fn continuous() -> Self {
        Self {
            op_mode: OperatingMode::Continuous,
            boc: BaselineCompensation::Automatic,
        }
    }

    /// Encode into a `MEAS_CFG` value.
    pub fn to_register(self) -> u8 {
        ((self.boc as u8) << 2) | self.op_mode as u8
    }

    /// Decode a `MEAS_CFG` value. Reserved encodings yield `None`.
    pub fn from_register(value: u8) -> Option<Self> {
        let op_mode = match value & 0b11 {
            0 => OperatingMode::Idle,
            1 => OperatingMode::Single,
            2 => OperatingMode::Continuous,
            _ => return None,
        };

        let boc = match (value >> 2) & 0b11 {
            0 => BaselineCompensation::Disabled,
            1 => BaselineCompensation::Automatic,
            2 => BaselineCompensation::Forced,
            _ => return None,
        };

        Some(Self { op_mode, boc })
    }
}

/// Function of the interrupt pin, `INT_CFG` bits `[3:1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InterruptFunction {
    Disabled = 0,
    Alarm = 1,
    DataReady = 2,
    SensorBusy = 3,
    /// Signals an upcoming measurement. The wing board uses it to enable
    /// the 12 V boost converter.
    EarlyMeasurement = 4,
}

/// Interrupt pin configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptConfig {
    pub function: InterruptFunction,
    pub active_high: bool,
}

impl InterruptConfig {
    /// Early measurement notice, active high.
    pub const fn early_measurement() -> Self {
        Self {
            function: InterruptFunction::EarlyMeasurement,
            active_high: true,
        }
    }

    /// Encode into an `INT_CFG` value.
    pub fn to_register(self) -> u8 {
        ((self.active_high as u8) << 4) | ((self.function as u8) << 1)
    }
}

/// PAS CO2 driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Bus error.
    I2c(E),

    /// The scratch pad did not read back what was written.
    Init { expected: u8, actual: u8 },

    /// Measurement rate outside `[5, 4095]` seconds.
    InvalidRate(u16),

    /// Pressure reference outside `[600, 1600]` hPa.
    InvalidPressure(u16),

    /// `MEAS_CFG` holds a reserved encoding.
    InvalidConfig(u8),
}

/// Implementation of the `Display` trait for `Error`.
impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {:?}", e),
            Error::Init { expected, actual } => write!(
                f,
                "Scratch pad check failed: wrote 0x{expected:02x}, read 0x{actual:02x}"
            ),
            Error::InvalidRate(rate) => write!(
                f,
                "Invalid measurement rate {rate}s (valid range: {MEAS_RATE_MIN}-{MEAS_RATE_MAX})"
            ),
            Error::InvalidPressure(hpa) => write!(
                f,
                "Invalid pressure reference {hpa} hPa (valid range: {PRESSURE_REF_MIN}-{PRESSURE_REF_MAX})"
            ),
            Error::InvalidConfig(value) => {
                write!(f, "Reserved measurement configuration 0x{value:02x}")
            }
        }
    }
}

/// Implementation of the `Error` trait for `Error`.
impl<E: core::fmt::Debug> std::error::Error for Error<E> {}

/// PAS CO2 photoacoustic CO2 sensor.
pub struct PasCo2<I> {
    /// The I2C bus.
    i2c: I,
}

impl<I: I2c> PasCo2<I> {
    /// Create a driver. Does not touch the bus.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus.
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Check communication and start continuous measurement.
    ///
    /// The scratch pad is written and read back, stale fault flags are
    /// cleared, and the sensor is put into continuous mode at the reset
    /// default period.
    ///
    /// # Returns
    /// * `Result<(), Error<I::Error>>` - The result of the operation.
    pub fn init(&mut self) -> Result<(), Error<I::Error>> {
        self.write_register(reg::SCRATCH_PAD, SCRATCH_PAD_TEST)?;

        let actual = self.read_register(reg::SCRATCH_PAD)?;
        if actual != SCRATCH_PAD_TEST {
            return Err(Error::Init {
                expected: SCRATCH_PAD_TEST,
                actual,
            });
        }

        self.write_register(reg::SENS_STS, SENS_STS_CLEAR_ALL)?;
        self.set_measurement_config(MeasurementConfig::idle())?;
        self.set_measurement_rate(MEAS_RATE_DEFAULT)?;
        self.set_measurement_config(MeasurementConfig::continuous())?;

        log::debug!("PAS CO2 product id 0x{:02x}", self.product_id()?);

        Ok(())
    }

    /// Read the product and version identifier.
    pub fn product_id(&mut self) -> Result<u8, Error<I::Error>> {
        self.read_register(reg::PROD_ID)
    }

    /// Configure the interrupt pin.
    pub fn set_interrupt_config(&mut self, config: InterruptConfig) -> Result<(), Error<I::Error>> {
        self.write_register(reg::INT_CFG, config.to_register())
    }

    /// Write the measurement configuration.
    pub fn set_measurement_config(
        &mut self,
        config: MeasurementConfig,
    ) -> Result<(), Error<I::Error>> {
        self.write_register(reg::MEAS_CFG, config.to_register())
    }

    /// Read back the measurement configuration.
    pub fn measurement_config(&mut self) -> Result<MeasurementConfig, Error<I::Error>> {
        let value = self.read_register(reg::MEAS_CFG)?;
        MeasurementConfig::from_register(value).ok_or(Error::InvalidConfig(value))
    }

    /// Set the sensor-internal measurement period.
    ///
    /// # Arguments
    /// * `seconds` - The period, `[5, 4095]`.
    ///
    /// # Returns
    /// * `Result<(), Error<I::Error>>` - `InvalidRate` if out of range.
    pub fn set_measurement_rate(&mut self, seconds: u16) -> Result<(), Error<I::Error>> {
        if !(MEAS_RATE_MIN..=MEAS_RATE_MAX).contains(&seconds) {
            return Err(Error::InvalidRate(seconds));
        }

        self.write_u16(reg::MEAS_RATE_H, seconds)
    }

    /// Read the sensor-internal measurement period in seconds.
    pub fn measurement_rate(&mut self) -> Result<u16, Error<I::Error>> {
        self.read_u16(reg::MEAS_RATE_H)
    }

    /// Set the ambient pressure used for compensation.
    pub fn set_pressure_reference(&mut self, hpa: u16) -> Result<(), Error<I::Error>> {
        if !(PRESSURE_REF_MIN..=PRESSURE_REF_MAX).contains(&hpa) {
            return Err(Error::InvalidPressure(hpa));
        }

        self.write_u16(reg::PRES_REF_H, hpa)
    }

    /// Read the health status.
    pub fn status(&mut self) -> Result<SensorStatus, Error<I::Error>> {
        self.read_register(reg::SENS_STS)
            .map(SensorStatus::from_register)
    }

    /// Read a new concentration value if one is available.
    ///
    /// The pressure reference is only written when a value is ready, right
    /// before the result registers are read.
    ///
    /// # Arguments
    /// * `pressure_hpa` - Ambient pressure in hPa.
    ///
    /// # Returns
    /// * `Result<u16, ReadOutcome>` - The concentration in ppm.
    pub fn compensated_read(&mut self, pressure_hpa: u16) -> Result<u16, ReadOutcome> {
        if !(PRESSURE_REF_MIN..=PRESSURE_REF_MAX).contains(&pressure_hpa) {
            return Err(ReadOutcome::Unexpected);
        }

        let meas_sts = self
            .read_register(reg::MEAS_STS)
            .map_err(|_| ReadOutcome::CommError)?;

        if meas_sts & MEAS_STS_DRDY == 0 {
            return Err(ReadOutcome::NotReady);
        }

        self.set_pressure_reference(pressure_hpa)
            .map_err(|_| ReadOutcome::CommError)?;

        self.read_u16(reg::CO2PPM_H)
            .map_err(|_| ReadOutcome::CommError)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<I::Error>> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(ADDRESS, &[register], &mut buffer)
            .map_err(Error::I2c)?;

        Ok(buffer[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<I::Error>> {
        self.i2c
            .write(ADDRESS, &[register, value])
            .map_err(Error::I2c)
    }

    fn read_u16(&mut self, register: u8) -> Result<u16, Error<I::Error>> {
        let mut buffer = [0u8; 2];
        self.i2c
            .write_read(ADDRESS, &[register], &mut buffer)
            .map_err(Error::I2c)?;

        Ok(u16::from_be_bytes(buffer))
    }

    fn write_u16(&mut self, register: u8, value: u16) -> Result<(), Error<I::Error>> {
        let [high, low] = value.to_be_bytes();
        self.i2c
            .write(ADDRESS, &[register, high, low])
            .map_err(Error::I2c)
    }
}

impl<I: I2c> Co2Sensor for PasCo2<I> {
    type Error = Error<I::Error>;

    fn compensated_read(&mut self, pressure_hpa: u16) -> Result<u16, ReadOutcome> {
        PasCo2::compensated_read(self, pressure_hpa)
    }

    fn status(&mut self) -> Result<SensorStatus, Self::Error> {
        PasCo2::status(self)
    }
}

impl<I: I2c> MeasurementControl for PasCo2<I> {
    type Error = Error<I::Error>;

    fn set_measurement_config(&mut self, config: MeasurementConfig) -> Result<(), Self::Error> {
        PasCo2::set_measurement_config(self, config)
    }

    fn set_measurement_rate(&mut self, seconds: u16) -> Result<(), Self::Error> {
        PasCo2::set_measurement_rate(self, seconds)
    }
}
