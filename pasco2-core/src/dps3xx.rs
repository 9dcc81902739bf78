//! DPS310/DPS368 barometric pressure sensor.
//!
//! Only the subset needed for CO2 pressure compensation: background
//! measurement at one sample per second with no oversampling.

use crate::sensor::PressureSensor;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// Default I2C address (SDO high).
pub const ADDRESS: u8 = 0x77;

/// Alternate I2C address (SDO low), used on the CO2 wing board.
pub const ADDRESS_ALT: u8 = 0x76;

/// Expected `PRODUCT_ID` register value.
const PRODUCT_ID: u8 = 0x10;

mod reg {
    pub const PSR_B2: u8 = 0x00;
    pub const PRS_CFG: u8 = 0x06;
    pub const TMP_CFG: u8 = 0x07;
    pub const MEAS_CFG: u8 = 0x08;
    pub const CFG_REG: u8 = 0x09;
    pub const RESET: u8 = 0x0C;
    pub const PRODUCT_ID: u8 = 0x0D;
    pub const COEF: u8 = 0x10;
    pub const COEF_SRCE: u8 = 0x28;
}

const SOFT_RESET: u8 = 0x89;
const MEAS_CFG_COEF_RDY: u8 = 1 << 7;
const MEAS_CFG_SENSOR_RDY: u8 = 1 << 6;
const MEAS_CTRL_CONTINUOUS_BOTH: u8 = 0x07;
const COEF_SRCE_EXTERNAL: u8 = 1 << 7;
const TMP_CFG_EXTERNAL: u8 = 1 << 7;

/// Compensation scale factor for single oversampling.
const SCALE_FACTOR_1X: f32 = 524_288.0;

const COEF_LEN: usize = 18;
const RESET_DELAY_MS: u32 = 40;
const READY_POLL_DELAY_MS: u32 = 10;
const READY_POLL_ATTEMPTS: u32 = 20;

/// DPS3xx driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Bus error.
    I2c(E),

    /// A different chip answered.
    ProductId(u8),

    /// Coefficients or sensor did not become ready after reset.
    NotReady,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {:?}", e),
            Error::ProductId(id) => {
                write!(f, "Unexpected product id 0x{id:02x}, expected 0x{PRODUCT_ID:02x}")
            }
            Error::NotReady => write!(f, "Sensor did not become ready after reset"),
        }
    }
}

impl<E: core::fmt::Debug> std::error::Error for Error<E> {}

/// Factory calibration coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Coefficients {
    pub c0: i32,
    pub c1: i32,
    pub c00: i32,
    pub c10: i32,
    pub c01: i32,
    pub c11: i32,
    pub c20: i32,
    pub c21: i32,
    pub c30: i32,
}

impl Coefficients {
    /// Unpack the coefficient block starting at `COEF`.
    ///
    /// `c0` and `c1` are 12 bit, `c00` and `c10` 20 bit, the rest 16 bit,
    /// all two's complement and packed big-endian across nibble boundaries.
    pub fn parse(buffer: &[u8; COEF_LEN]) -> Self {
        let b = |i: usize| buffer[i] as u32;

        Self {
            c0: sign_extend((b(0) << 4) | (b(1) >> 4), 12),
            c1: sign_extend(((b(1) & 0x0F) << 8) | b(2), 12),
            c00: sign_extend((b(3) << 12) | (b(4) << 4) | (b(5) >> 4), 20),
            c10: sign_extend(((b(5) & 0x0F) << 16) | (b(6) << 8) | b(7), 20),
            c01: sign_extend((b(8) << 8) | b(9), 16),
            c11: sign_extend((b(10) << 8) | b(11), 16),
            c20: sign_extend((b(12) << 8) | b(13), 16),
            c21: sign_extend((b(14) << 8) | b(15), 16),
            c30: sign_extend((b(16) << 8) | b(17), 16),
        }
    }

    /// Compensate raw readings.
    ///
    /// # Arguments
    /// * `raw_pressure` - Sign-extended 24-bit pressure result.
    /// * `raw_temperature` - Sign-extended 24-bit temperature result.
    ///
    /// # Returns
    /// * `(f32, f32)` - Pressure in Pa and temperature in degrees Celsius.
    pub fn compensate(&self, raw_pressure: i32, raw_temperature: i32) -> (f32, f32) {
        let p_sc = raw_pressure as f32 / SCALE_FACTOR_1X;
        let t_sc = raw_temperature as f32 / SCALE_FACTOR_1X;

        let temperature = self.c0 as f32 * 0.5 + self.c1 as f32 * t_sc;

        let pressure = self.c00 as f32
            + p_sc * (self.c10 as f32 + p_sc * (self.c20 as f32 + p_sc * self.c30 as f32))
            + t_sc * self.c01 as f32
            + t_sc * p_sc * (self.c11 as f32 + p_sc * self.c21 as f32);

        (pressure, temperature)
    }
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// DPS310/DPS368 driver in continuous background mode.
pub struct Dps3xx<I> {
    i2c: I,
    address: u8,
    coefficients: Coefficients,
}

impl<I: I2c> Dps3xx<I> {
    /// Check the product ID, reset and start continuous pressure and temperature
    /// measurement.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus.
    /// * `address` - [`ADDRESS`] or [`ADDRESS_ALT`].
    /// * `delay` - Used to wait for the sensor after reset.
    ///
    /// # Returns
    /// * `Result<Self, Error<I::Error>>` - The running driver.
    pub fn init(i2c: I, address: u8, delay: &mut impl DelayNs) -> Result<Self, Error<I::Error>> {
        let mut dps = Self {
            i2c,
            address,
            coefficients: Coefficients::default(),
        };

        let id = dps.read_register(reg::PRODUCT_ID)?;
        if id != PRODUCT_ID {
            return Err(Error::ProductId(id));
        }

        dps.write_register(reg::RESET, SOFT_RESET)?;
        delay.delay_ms(RESET_DELAY_MS);
        dps.wait_ready(delay)?;

        let mut buffer = [0u8; COEF_LEN];
        dps.read_into(reg::COEF, &mut buffer)?;
        dps.coefficients = Coefficients::parse(&buffer);

        let external = dps.read_register(reg::COEF_SRCE)? & COEF_SRCE_EXTERNAL != 0;
        let tmp_cfg = if external { TMP_CFG_EXTERNAL } else { 0 };

        dps.write_register(reg::PRS_CFG, 0x00)?;
        dps.write_register(reg::TMP_CFG, tmp_cfg)?;
        dps.write_register(reg::CFG_REG, 0x00)?;
        dps.write_register(reg::MEAS_CFG, MEAS_CTRL_CONTINUOUS_BOTH)?;

        log::debug!("DPS3xx at 0x{address:02x}: {:?}", dps.coefficients);

        Ok(dps)
    }

    /// Read the latest background result.
    ///
    /// # Returns
    /// * `Result<(f32, f32), Error<I::Error>>` - Pressure in hPa and
    ///   temperature in degrees Celsius.
    pub fn read(&mut self) -> Result<(f32, f32), Error<I::Error>> {
        let mut buffer = [0u8; 6];
        self.read_into(reg::PSR_B2, &mut buffer)?;

        let raw = |bytes: &[u8]| {
            sign_extend(
                ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32,
                24,
            )
        };

        let (pascal, celsius) = self
            .coefficients
            .compensate(raw(&buffer[0..3]), raw(&buffer[3..6]));

        Ok((pascal / 100.0, celsius))
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    fn wait_ready(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<I::Error>> {
        let ready = MEAS_CFG_COEF_RDY | MEAS_CFG_SENSOR_RDY;

        for _ in 0..READY_POLL_ATTEMPTS {
            if self.read_register(reg::MEAS_CFG)? & ready == ready {
                return Ok(());
            }
            delay.delay_ms(READY_POLL_DELAY_MS);
        }

        Err(Error::NotReady)
    }

    fn read_register(&mut self, register: u8) -> Result<u8, Error<I::Error>> {
        let mut buffer = [0u8; 1];
        self.read_into(register, &mut buffer)?;
        Ok(buffer[0])
    }

    fn read_into(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.i2c
            .write_read(self.address, &[register], buffer)
            .map_err(Error::I2c)
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), Error<I::Error>> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::I2c)
    }
}

impl<I: I2c> PressureSensor for Dps3xx<I> {
    type Error = Error<I::Error>;

    fn read(&mut self) -> Result<(f32, f32), Self::Error> {
        Dps3xx::read(self)
    }
}
