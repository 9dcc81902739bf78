use crate::device::{Bus, BusDevice};
use crate::error::AppError;
use embedded_hal_bus::i2c::MutexDevice;
use esp_idf_svc::hal::delay::FreeRtos;
use log::{info, warn};
use pasco2_core::dps3xx::Dps3xx;
use pasco2_core::pasco2::{InterruptConfig, PasCo2};
use pasco2_core::reader::PressureSource;

/// The PAS CO2 sensor on the shared bus.
pub type Co2 = PasCo2<BusDevice>;

/// The DPS3xx pressure sensor on the shared bus.
pub type Pressure = Dps3xx<BusDevice>;

/// Look for the auxiliary pressure sensor.
///
/// # Parameters
/// - `bus`: The shared bus.
/// - `address`: The DPS3xx I2C address.
///
/// # Returns
/// The pressure source; the fallback constant if no sensor answers.
pub fn init_pressure(bus: Bus, address: u8) -> PressureSource<Pressure> {
  match Dps3xx::init(MutexDevice::new(bus), address, &mut FreeRtos) {
    Ok(dps) => {
      info!("DPS3xx pressure sensor at 0x{:02x}", address);
      PressureSource::Auxiliary(dps)
    }
    Err(e) => {
      warn!("No pressure sensor at 0x{:02x} ({}), using fallback pressure", address, e);
      PressureSource::Fallback
    }
  }
}

/// Initialize the CO2 sensor and start continuous measurement.
///
/// # Parameters
/// - `bus`: The shared bus.
///
/// # Returns
/// The running sensor.
pub fn init_co2(bus: Bus) -> Result<Co2, AppError> {
  let mut sensor = PasCo2::new(MutexDevice::new(bus));

  sensor
    .init()
    .map_err(|e| AppError::SensorError(format!("PAS CO2 initialization failed: {}", e)))?;

  info!("PAS CO2 sensor ready");

  Ok(sensor)
}

/// Enable the early-measurement interrupt, active high.
pub fn configure_interrupt(sensor: &mut Co2) -> Result<(), AppError> {
  sensor
    .set_interrupt_config(InterruptConfig::early_measurement())
    .map_err(|e| AppError::SensorError(format!("PAS CO2 interrupt configuration failed: {}", e)))
}

/// A second handle on the CO2 sensor for reconfiguration from the console.
pub fn control_handle(bus: Bus) -> Co2 {
  PasCo2::new(MutexDevice::new(bus))
}
