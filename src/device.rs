use crate::error::AppError;
use embedded_hal_bus::i2c::MutexDevice;
use esp_idf_svc::hal::gpio::{AnyIOPin, AnyOutputPin, Output, OutputPin, PinDriver};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;
use esp_idf_svc::hal::uart::{config, UartDriver, UartRxDriver, UartTxDriver};
use esp_idf_svc::timer::{EspTaskTimerService, EspTimer};
use log::warn;
use pasco2_core::terminal::SharedWriter;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Console baud rate.
const CONSOLE_BAUDRATE: u32 = 115_200;

/// I2C clock in kHz.
const I2C_FREQUENCY_KHZ: u32 = 100;

/// A push-pull output.
pub type OutputDriver = PinDriver<'static, AnyOutputPin, Output>;

/// The sensor bus, shared by the acquisition and console threads. Lives for
/// the whole run, so every device handle borrows it for `'static`.
pub type Bus = &'static Mutex<I2cDriver<'static>>;

/// One user's handle on [`Bus`]; each transfer holds the bus lock.
pub type BusDevice = MutexDevice<'static, I2cDriver<'static>>;

/// Console transmit half, shared by both threads.
pub type ConsoleTx = SharedWriter<UartTxDriver<'static>>;

/// Board wiring.
///
/// | Signal              | Pin    |
/// |---------------------|--------|
/// | I2C SDA / SCL       | 8 / 9  |
/// | PAS CO2 PSEL        | 3      |
/// | PAS CO2 12 V switch | 4      |
/// | LED ok / warning    | 5 / 6  |
/// | User LED (low on)   | 7      |
/// | UART0 TX / RX       | 21 / 20|
pub struct Board {
  /// The I2C bus.
  pub bus: Bus,

  /// Console receive half.
  pub console_rx: UartRxDriver<'static>,

  /// Console transmit half.
  pub console_tx: ConsoleTx,

  /// Lit while sampling.
  pub led_ok: OutputDriver,

  /// Lit while the sensor reports a fault.
  pub led_warning: OutputDriver,

  /// Blinks during startup.
  pub user_led: OutputDriver,

  /// Must outlive the sensor.
  pub sensor_power: SensorPower,
}

/// PAS CO2 interface select and emitter power, held for as long as it lives.
pub struct SensorPower {
  /// Low selects I2C.
  _psel: OutputDriver,

  /// High powers the emitter.
  _power: OutputDriver,
}

impl Board {
  /// Bring up the console, the bus and every output.
  ///
  /// # Parameters
  /// - `peripherals`: The ESP32 peripherals.
  ///
  /// # Returns
  /// The board.
  pub fn new(peripherals: Peripherals) -> Result<Self, AppError> {
    let pins = peripherals.pins;

    let uart_config = config::Config::default().baudrate(Hertz(CONSOLE_BAUDRATE));
    let uart = UartDriver::new(
      peripherals.uart0,
      pins.gpio21,
      pins.gpio20,
      Option::<AnyIOPin>::None,
      Option::<AnyIOPin>::None,
      &uart_config,
    )
    .map_err(|e| AppError::ConsoleError(format!("Failed to initialize UART0: {:?}", e)))?;
    let (tx, rx) = uart.into_split();

    let i2c_config = I2cConfig::default().baudrate(I2C_FREQUENCY_KHZ.kHz().into());
    let i2c = I2cDriver::new(peripherals.i2c0, pins.gpio8, pins.gpio9, &i2c_config)
      .map_err(|e| AppError::I2cError(format!("Failed to initialize I2C: {:?}", e)))?;

    // Interface select and power must settle before the sensor is addressed
    let psel = output(pins.gpio3, false)?;
    let power = output(pins.gpio4, true)?;

    let led_ok = output(pins.gpio5, false)?;
    let led_warning = output(pins.gpio6, false)?;
    let user_led = output(pins.gpio7, true)?;

    Ok(Self {
      bus: Box::leak(Box::new(Mutex::new(i2c))),
      console_rx: rx,
      console_tx: SharedWriter::new(tx),
      led_ok,
      led_warning,
      user_led,
      sensor_power: SensorPower {
        _psel: psel,
        _power: power,
      },
    })
  }
}

/// Configure a pin as output with an initial level.
fn output(pin: impl OutputPin, high: bool) -> Result<OutputDriver, AppError> {
  let mut driver = PinDriver::output(pin.downgrade_output())
    .map_err(|e| AppError::GpioError(format!("Failed to configure output: {:?}", e)))?;

  let level = if high { driver.set_high() } else { driver.set_low() };
  level.map_err(|e| AppError::GpioError(format!("Failed to drive output: {:?}", e)))?;

  Ok(driver)
}

/// Toggles the user LED on a periodic timer until bring-up completes.
pub struct StartupBlink {
  /// The periodic timer.
  timer: EspTimer<'static>,

  /// The LED, shared with the timer callback.
  led: Arc<Mutex<OutputDriver>>,
}

impl StartupBlink {
  /// Start blinking.
  ///
  /// # Parameters
  /// - `led`: The user LED.
  /// - `period`: Time between toggles.
  ///
  /// # Returns
  /// The running blink.
  pub fn start(led: OutputDriver, period: Duration) -> Result<Self, AppError> {
    let led = Arc::new(Mutex::new(led));
    let toggled = Arc::clone(&led);

    let timer = EspTaskTimerService::new()?.timer(move || {
      if let Ok(mut led) = toggled.lock() {
        if let Err(e) = led.toggle() {
          warn!("Failed to toggle user LED: {:?}", e);
        }
      }
    })?;

    timer
      .every(period)
      .map_err(|e| AppError::TaskError(format!("Failed to start blink timer: {:?}", e)))?;

    Ok(Self { timer, led })
  }

  /// Stop blinking and leave the LED lit.
  pub fn stop(self) -> Result<(), AppError> {
    self.timer
      .cancel()
      .map_err(|e| AppError::TaskError(format!("Failed to stop blink timer: {:?}", e)))?;

    let mut led = self
      .led
      .lock()
      .map_err(|_| AppError::GpioError("User LED lock poisoned".into()))?;

    // Active low
    led
      .set_low()
      .map_err(|e| AppError::GpioError(format!("Failed to drive user LED: {:?}", e)))?;

    Ok(())
  }
}
