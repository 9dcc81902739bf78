mod device;
mod error;
mod sensor;
mod tasks;

use crate::device::{Board, StartupBlink};
use crate::error::AppError;
use crate::tasks::SensorTask;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::sys::link_patches;
use log::info;
use pasco2_core::acquisition::Indicators;
use pasco2_core::session::SessionState;
use pasco2_core::settings::Settings;
use pasco2_core::terminal::write_banner;
use std::sync::Arc;
use std::time::Duration;

/// This function brings up the board and hands it to the sensor task.
///
/// # Returns
/// The result of the operation.
fn main() -> Result<(), AppError> {
  // Initialize system
  link_patches();
  EspLogger::initialize_default();
  info!("Starting the PAS CO2 application...");

  let peripherals = Peripherals::take()
    .map_err(|_| AppError::PeripheralsError("Failed to acquire ESP32 peripherals".into()))?;

  let Board {
    bus,
    console_rx,
    mut console_tx,
    led_ok,
    led_warning,
    user_led,
    sensor_power,
  } = Board::new(peripherals)?;

  write_banner(&mut console_tx)
    .map_err(|e| AppError::ConsoleError(format!("Failed to print banner: {:?}", e)))?;

  let settings = Settings::default();
  let blink = StartupBlink::start(
    user_led,
    Duration::from_millis(u64::from(settings.startup_blink_period_ms)),
  )?;

  tasks::spawn_sensor_task(SensorTask {
    bus,
    console_rx,
    console_tx,
    indicators: Indicators {
      ok: led_ok,
      warning: led_warning,
    },
    sensor_power,
    blink,
    session: Arc::new(SessionState::new()),
    settings,
  })?;

  // The sensor task owns everything from here on
  Ok(())
}
