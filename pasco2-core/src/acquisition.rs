use crate::reader::{MeasurementReader, MeasurementSample, ReadError};
use crate::sensor::{Co2Sensor, PressureSensor, ReadOutcome};
use crate::session::SessionState;
use crate::status::{decode, FaultSet, IndicatorState};
use crate::terminal::write_line;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use embedded_io::Write;
use log::{debug, error, info, warn};
use std::convert::Infallible;
use std::sync::Arc;

/// Fatal acquisition failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The auxiliary pressure sensor could not be read.
    Pressure(String),
}

/// Implementation of the `Display` trait for `AcquisitionError`.
impl core::fmt::Display for AcquisitionError {
    /// Format the error message.
    ///
    /// # Arguments
    /// * `f` - The formatter.
    ///
    /// # Returns
    /// * `core::fmt::Result` - The result of the operation.
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AcquisitionError::Pressure(msg) => write!(f, "Pressure sensor error: {msg}"),
        }
    }
}

/// Implementation of the `Error` trait for `AcquisitionError`.
impl std::error::Error for AcquisitionError {}

/// What one cycle observed.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// The sample, or why there was none.
    pub sample: Result<MeasurementSample, ReadOutcome>,

    /// Decoded faults, `None` if the status read failed.
    pub faults: Option<FaultSet>,
}

/// Status indicator outputs.
pub struct Indicators<OK, WARN> {
    /// Lit once sampling starts.
    pub ok: OK,

    /// Lit while any fault is present.
    pub warning: WARN,
}

/// The periodic sampling loop.
///
/// Each cycle reads pressure, reads the concentration, reads the status and
/// drives the warning indicator, in that order.
pub struct Acquisition<S, P, W, OK, WARN> {
    /// One-sample reader.
    reader: MeasurementReader<S, P>,

    /// Flags written by the console.
    session: Arc<SessionState>,

    /// Console output.
    console: W,

    /// Indicator outputs.
    indicators: Indicators<OK, WARN>,
}

impl<S, P, W, OK, WARN> Acquisition<S, P, W, OK, WARN>
where
    S: Co2Sensor,
    P: PressureSensor,
    W: Write,
    OK: OutputPin,
    WARN: OutputPin,
{
    /// Create the loop.
    ///
    /// # Arguments
    /// * `reader` - The measurement reader.
    /// * `session` - Flags shared with the console.
    /// * `console` - Where values and diagnostics are printed.
    /// * `indicators` - The ok and warning outputs.
    pub fn new(
        reader: MeasurementReader<S, P>,
        session: Arc<SessionState>,
        console: W,
        indicators: Indicators<OK, WARN>,
    ) -> Self {
        Self {
            reader,
            session,
            console,
            indicators,
        }
    }

    /// Light the ok indicator and clear the warning indicator.
    pub fn enter_sampling(&mut self) {
        if let Err(e) = self.indicators.ok.set_high() {
            warn!("Failed to set ok indicator: {:?}", e);
        }

        if let Err(e) = self.indicators.warning.set_low() {
            warn!("Failed to clear warning indicator: {:?}", e);
        }
    }

    /// Run one acquisition cycle.
    ///
    /// # Returns
    /// * `Result<CycleReport, AcquisitionError>` - What the cycle observed,
    ///   or a fatal pressure sensor failure.
    pub fn cycle(&mut self) -> Result<CycleReport, AcquisitionError> {
        let sample = match self.reader.read_one_sample() {
            Ok(sample) => {
                if self.session.display_enabled() {
                    self.print(&format!("CO2 PPM Level: {}", sample.ppm));
                }
                Ok(sample)
            }
            Err(ReadError::Outcome(outcome)) => {
                self.diagnostic(&outcome.to_string());
                Err(outcome)
            }
            Err(ReadError::Pressure(msg)) => {
                error!("Error while reading from pressure sensor: {msg}");
                self.print("Error while reading from pressure sensor");
                return Err(AcquisitionError::Pressure(msg));
            }
        };

        let faults = self.update_indicator();

        Ok(CycleReport { sample, faults })
    }

    /// Sample forever at a fixed cadence.
    ///
    /// The cadence does not follow the sensor's measurement period.
    ///
    /// # Arguments
    /// * `delay` - Delay provider.
    /// * `cycle_delay_ms` - Sleep between cycles.
    ///
    /// # Returns
    /// * `Result<Infallible, AcquisitionError>` - Only on a fatal failure.
    pub fn run<D: DelayNs>(
        &mut self,
        delay: &mut D,
        cycle_delay_ms: u32,
    ) -> Result<Infallible, AcquisitionError> {
        self.enter_sampling();
        info!(
            "Sampling every {} ms ({} pressure)",
            cycle_delay_ms,
            if self.reader.uses_auxiliary() {
                "measured"
            } else {
                "fallback"
            }
        );

        loop {
            self.cycle()?;
            delay.delay_ms(cycle_delay_ms);
        }
    }

    fn update_indicator(&mut self) -> Option<FaultSet> {
        let status = match self.reader.sensor_mut().status() {
            Ok(status) => status,
            Err(e) => {
                debug!("Status read failed: {:?}", e);
                return None;
            }
        };

        let faults = decode(status);
        for fault in faults.iter() {
            self.diagnostic(fault.message());
        }

        let state = IndicatorState::from(&faults);
        if let Err(e) = self
            .indicators
            .warning
            .set_state(PinState::from(state.is_alert()))
        {
            warn!("Failed to drive warning indicator: {:?}", e);
        }

        Some(faults)
    }

    /// Print only when diagnostics and display are both enabled.
    fn diagnostic(&mut self, line: &str) {
        debug!("{line}");

        if self.session.should_log_diagnostics() {
            self.print(line);
        }
    }

    fn print(&mut self, line: &str) {
        if let Err(e) = write_line(&mut self.console, line) {
            warn!("Console write failed: {:?}", e);
        }
    }
}

/// Tests.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PressureSource;
    use crate::settings::Settings;
    use crate::status::{Fault, SensorStatus};
    use crate::pasco2::{MeasurementConfig, PasCo2, ADDRESS};
    use crate::reconfig::{MeasurementPeriod, PeriodChange};
    use crate::testing::{
        CountingDelay, FakeCo2, FakeError, FakePressure, RecordingPin, RegisterBus,
        ScriptedTerminal,
    };
    use embedded_hal_bus::i2c::MutexDevice;
    use std::sync::Mutex;

    type TestLoop =
        Acquisition<FakeCo2, FakePressure, ScriptedTerminal, RecordingPin, RecordingPin>;

    struct Rig {
        acquisition: TestLoop,
        session: Arc<SessionState>,
        ok: RecordingPin,
        warning: RecordingPin,
    }

    fn rig(co2: FakeCo2, pressure: PressureSource<FakePressure>) -> Rig {
        let session = Arc::new(SessionState::new());
        let ok = RecordingPin::default();
        let warning = RecordingPin::default();
        let reader = MeasurementReader::new(co2, pressure, &Settings::default());

        Rig {
            acquisition: Acquisition::new(
                reader,
                Arc::clone(&session),
                ScriptedTerminal::default(),
                Indicators {
                    ok: ok.clone(),
                    warning: warning.clone(),
                },
            ),
            session,
            ok,
            warning,
        }
    }

    impl Rig {
        fn output(&self) -> String {
            self.acquisition.console.output()
        }
    }

    #[test]
    fn ready_value_is_printed_when_display_enabled() {
        let mut co2 = FakeCo2::new();
        co2.reads.push_back(Ok(412));
        let mut rig = rig(co2, PressureSource::Fallback);

        let report = rig.acquisition.cycle().unwrap();

        assert_eq!(report.sample.map(|s| s.ppm), Ok(412));
        assert_eq!(rig.output(), "CO2 PPM Level: 412\r\n");
    }

    #[test]
    fn ready_value_is_suppressed_while_display_disabled() {
        let mut co2 = FakeCo2::new();
        co2.reads.push_back(Ok(412));
        let mut rig = rig(co2, PressureSource::Fallback);
        rig.session.set_display_enabled(false);

        rig.acquisition.cycle().unwrap();

        assert_eq!(rig.output(), "");
    }

    #[test]
    fn outcomes_are_silent_without_diagnostics() {
        let mut co2 = FakeCo2::new();
        co2.reads.push_back(Err(ReadOutcome::CommError));
        let mut rig = rig(co2, PressureSource::Fallback);

        let report = rig.acquisition.cycle().unwrap();

        assert_eq!(report.sample, Err(ReadOutcome::CommError));
        assert_eq!(rig.output(), "");
    }

    #[test]
    fn outcomes_are_printed_with_diagnostics_and_display() {
        let mut co2 = FakeCo2::new();
        co2.reads.push_back(Err(ReadOutcome::NotReady));
        co2.reads.push_back(Err(ReadOutcome::CommError));
        co2.reads.push_back(Err(ReadOutcome::Unexpected));
        co2.reads.push_back(Err(ReadOutcome::NotReady));
        let mut rig = rig(co2, PressureSource::Fallback);
        rig.session.set_diagnostics_enabled(true);

        for _ in 0..3 {
            rig.acquisition.cycle().unwrap();
        }
        rig.session.set_display_enabled(false);
        rig.acquisition.cycle().unwrap();

        assert_eq!(
            rig.output(),
            "CO2 PPM value is not ready\r\n\
             I2C communication error\r\n\
             Unexpected error\r\n"
        );
    }

    #[test]
    fn fault_drives_warning_indicator_each_cycle() {
        let mut co2 = FakeCo2::new();
        co2.statuses
            .push_back(Ok(SensorStatus(SensorStatus::COMM_ERROR)));
        co2.statuses.push_back(Ok(SensorStatus(0)));
        let mut rig = rig(co2, PressureSource::Fallback);

        let report = rig.acquisition.cycle().unwrap();
        assert_eq!(report.faults, Some(Fault::CommunicationError.into()));
        assert_eq!(rig.warning.level(), Some(true));

        rig.acquisition.cycle().unwrap();
        assert_eq!(rig.warning.level(), Some(false));
    }

    #[test]
    fn fault_lines_follow_the_conditional_log_policy() {
        let mut co2 = FakeCo2::new();
        co2.reads.push_back(Ok(800));
        co2.statuses.push_back(Ok(SensorStatus(0b110)));
        let mut rig = rig(co2, PressureSource::Fallback);
        rig.session.set_diagnostics_enabled(true);

        rig.acquisition.cycle().unwrap();

        assert_eq!(
            rig.output(),
            "CO2 PPM Level: 800\r\n\
             CO2 Sensor Over-Voltage Error\r\n\
             CO2 Sensor Temperature Error\r\n"
        );
    }

    #[test]
    fn status_read_failure_leaves_indicator_untouched() {
        let mut co2 = FakeCo2::new();
        co2.statuses
            .push_back(Ok(SensorStatus(SensorStatus::OVER_TEMPERATURE)));
        co2.statuses.push_back(Err(FakeError));
        let mut rig = rig(co2, PressureSource::Fallback);

        rig.acquisition.cycle().unwrap();
        let report = rig.acquisition.cycle().unwrap();

        assert_eq!(report.faults, None);
        assert_eq!(rig.warning.level(), Some(true));
    }

    #[test]
    fn run_stops_only_on_pressure_failure() {
        let aux = FakePressure::new(&[Ok((1000.0, 20.0)), Ok((1000.0, 20.0)), Err(FakeError)]);
        let mut rig = rig(FakeCo2::new(), PressureSource::Auxiliary(aux));
        let mut delay = CountingDelay::default();

        let result = rig.acquisition.run(&mut delay, 1000);

        assert!(matches!(result, Err(AcquisitionError::Pressure(_))));
        assert_eq!(delay.calls, 2);
        assert_eq!(delay.total_ms, 2000);
        assert_eq!(rig.ok.level(), Some(true));
        assert!(rig
            .output()
            .ends_with("Error while reading from pressure sensor\r\n"));
    }

    #[test]
    fn period_change_beside_sampling_keeps_every_transfer_intact() {
        const SENS_STS: u8 = 0x01;
        const MEAS_RATE_H: u8 = 0x02;
        const MEAS_RATE_L: u8 = 0x03;
        const MEAS_CFG: u8 = 0x04;
        const CO2PPM_H: u8 = 0x05;
        const MEAS_STS: u8 = 0x07;
        const PRES_REF_H: u8 = 0x0B;
        const PRES_REF_L: u8 = 0x0C;

        let fake = RegisterBus::new();
        fake.set_register(ADDRESS, SENS_STS, 0);
        fake.set_register(ADDRESS, MEAS_STS, 1 << 4);
        fake.set_registers(ADDRESS, CO2PPM_H, &412u16.to_be_bytes());
        let bus = Mutex::new(fake.clone());

        std::thread::scope(|scope| {
            let console = scope.spawn(|| {
                let mut control = PasCo2::new(MutexDevice::new(&bus));

                for seconds in (5u16..=4095).step_by(97).chain(std::iter::once(120)) {
                    let period = MeasurementPeriod::try_from(i64::from(seconds)).unwrap();
                    let applied = PeriodChange::new(period).apply(&mut control).unwrap();
                    assert_eq!(applied.seconds(), seconds);
                }
            });

            let sampler = scope.spawn(|| {
                let reader = MeasurementReader::new(
                    PasCo2::new(MutexDevice::new(&bus)),
                    PressureSource::<FakePressure>::Fallback,
                    &Settings::default(),
                );
                let mut acquisition = Acquisition::new(
                    reader,
                    Arc::new(SessionState::new()),
                    ScriptedTerminal::default(),
                    Indicators {
                        ok: RecordingPin::default(),
                        warning: RecordingPin::default(),
                    },
                );

                for _ in 0..200 {
                    let report = acquisition.cycle().unwrap();
                    assert_eq!(report.sample.map(|s| s.ppm), Ok(412));
                    assert_eq!(report.faults, Some(FaultSet::empty()));
                }
            });

            console.join().unwrap();
            sampler.join().unwrap();
        });

        let rate = u16::from_be_bytes([
            fake.register(ADDRESS, MEAS_RATE_H),
            fake.register(ADDRESS, MEAS_RATE_L),
        ]);
        let pressure = u16::from_be_bytes([
            fake.register(ADDRESS, PRES_REF_H),
            fake.register(ADDRESS, PRES_REF_L),
        ]);

        assert_eq!(rate, 120);
        assert_eq!(
            fake.register(ADDRESS, MEAS_CFG),
            MeasurementConfig::continuous().to_register()
        );
        assert_eq!(pressure, 1015);
    }
}
