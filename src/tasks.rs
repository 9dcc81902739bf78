use crate::device::{Bus, ConsoleTx, OutputDriver, SensorPower, StartupBlink};
use crate::error::AppError;
use crate::sensor;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_svc::hal::uart::UartRxDriver;
use log::{error, info, warn};
use pasco2_core::acquisition::{Acquisition, Indicators};
use pasco2_core::console::Console;
use pasco2_core::reader::MeasurementReader;
use pasco2_core::session::SessionState;
use pasco2_core::settings::Settings;
use pasco2_core::terminal::{write_line, Duplex};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Acquisition task name, NUL terminated.
const SENSOR_TASK_NAME: &[u8] = b"CO2 SENSOR TASK\0";

/// Acquisition task stack size in bytes.
const SENSOR_TASK_STACK_SIZE: usize = 4 * 1024;

/// Below the console so key handling preempts sampling.
const SENSOR_TASK_PRIORITY: u8 = 4;

/// Console task name, NUL terminated.
const CONSOLE_TASK_NAME: &[u8] = b"CONSOLE TASK\0";

/// Console task stack size in bytes.
const CONSOLE_TASK_STACK_SIZE: usize = 4 * 1024;

/// Console task priority.
const CONSOLE_TASK_PRIORITY: u8 = 5;

/// Everything the acquisition task takes ownership of.
pub struct SensorTask {
  /// The shared bus.
  pub bus: Bus,

  /// Console receive half, handed to the console task.
  pub console_rx: UartRxDriver<'static>,

  /// Console transmit half.
  pub console_tx: ConsoleTx,

  /// The ok and warning LEDs.
  pub indicators: Indicators<OutputDriver, OutputDriver>,

  /// Kept alive for the sensor.
  pub sensor_power: SensorPower,

  /// Stopped once bring-up completes.
  pub blink: StartupBlink,

  /// Flags shared with the console.
  pub session: Arc<SessionState>,

  /// Timing, fallback pressure and failure policy.
  pub settings: Settings,
}

/// Spawn the acquisition task.
///
/// # Parameters
/// - `task`: The resources the task owns.
///
/// # Returns
/// The thread handle.
pub fn spawn_sensor_task(task: SensorTask) -> Result<JoinHandle<()>, AppError> {
  spawn(
    SENSOR_TASK_NAME,
    SENSOR_TASK_STACK_SIZE,
    SENSOR_TASK_PRIORITY,
    move || task.run(),
  )
}

impl SensorTask {
  /// Bring up the sensors, start the console and sample forever.
  ///
  /// A CO2 sensor that fails to initialize ends this task only. Any later
  /// failure halts the system.
  fn run(self) {
    let SensorTask {
      bus,
      console_rx,
      mut console_tx,
      indicators,
      sensor_power,
      blink,
      session,
      settings,
    } = self;

    FreeRtos::delay_ms(settings.startup_delay_ms);

    let pressure = sensor::init_pressure(bus, settings.pressure_sensor_address);

    let mut co2 = match sensor::init_co2(bus) {
      Ok(co2) => co2,
      Err(e) => {
        error!("{}", e);
        print(&mut console_tx, "PAS CO2 device initialization error");
        print(&mut console_tx, "Exiting CO2 sensor task");

        // Only this task ends. The blink keeps running and the sensor stays
        // powered, so the drivers must not reset their pins on drop.
        std::mem::forget(blink);
        std::mem::forget(sensor_power);
        return;
      }
    };

    if let Err(e) = sensor::configure_interrupt(&mut co2) {
      halt(&mut console_tx, "PAS CO2 interrupt configuration error", &e);
    }

    if let Err(e) = blink.stop() {
      halt(&mut console_tx, "Startup indicator error", &e);
    }

    if let Err(e) = spawn_console(
      console_rx,
      console_tx.clone(),
      sensor::control_handle(bus),
      Arc::clone(&session),
    ) {
      halt(&mut console_tx, "Console task creation error", &e);
    }

    let reader = MeasurementReader::new(co2, pressure, &settings);
    let mut acquisition = Acquisition::new(reader, session, console_tx.clone(), indicators);

    match acquisition.run(&mut FreeRtos, settings.cycle_delay_ms) {
      Ok(never) => match never {},
      Err(e) => halt(&mut console_tx, "Acquisition stopped", &e),
    }
  }
}

/// Spawn the console task.
fn spawn_console(
  rx: UartRxDriver<'static>,
  tx: ConsoleTx,
  control: sensor::Co2,
  session: Arc<SessionState>,
) -> Result<JoinHandle<()>, AppError> {
  spawn(
    CONSOLE_TASK_NAME,
    CONSOLE_TASK_STACK_SIZE,
    CONSOLE_TASK_PRIORITY,
    move || {
      let mut console = Console::new(Duplex { rx, tx }, control, session);

      // Only a broken UART gets here; sampling carries on without the console
      if let Err(e) = console.run() {
        error!("Console stopped: {}", e);
      }
    },
  )
}

/// Spawn a FreeRTOS-backed thread with the given name, stack and priority.
fn spawn<F>(
  name: &'static [u8],
  stack_size: usize,
  priority: u8,
  body: F,
) -> Result<JoinHandle<()>, AppError>
where
  F: FnOnce() + Send + 'static,
{
  ThreadSpawnConfiguration {
    name: Some(name),
    stack_size,
    priority,
    ..Default::default()
  }
  .set()
  .map_err(|e| AppError::TaskError(format!("Failed to configure thread: {:?}", e)))?;

  let handle = std::thread::Builder::new()
    .stack_size(stack_size)
    .spawn(body)
    .map_err(|e| AppError::TaskError(format!("Failed to spawn thread: {:?}", e)));

  ThreadSpawnConfiguration::default()
    .set()
    .map_err(|e| AppError::TaskError(format!("Failed to reset thread configuration: {:?}", e)))?;

  let handle = handle?;
  info!("Started task {}", String::from_utf8_lossy(&name[..name.len() - 1]));

  Ok(handle)
}

/// Print to the console; a failed write is only logged.
fn print(console: &mut ConsoleTx, line: &str) {
  if let Err(e) = write_line(console, line) {
    warn!("Console write failed: {:?}", e);
  }
}

/// Report a fatal error and stop the system.
fn halt(console: &mut ConsoleTx, message: &str, cause: &dyn std::fmt::Display) -> ! {
  error!("{}: {}", message, cause);
  print(console, message);

  std::process::abort()
}
