use crate::pasco2::{MeasurementConfig, MEAS_RATE_MAX, MEAS_RATE_MIN};
use crate::sensor::MeasurementControl;
use log::{info, warn};

/// A validated measurement period in seconds, `[5, 4095]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementPeriod(u16);

/// Requested period outside `[5, 4095]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodOutOfRange(pub i64);

impl core::fmt::Display for PeriodOutOfRange {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Measurement period {}s outside [{MEAS_RATE_MIN}-{MEAS_RATE_MAX}]s",
            self.0
        )
    }
}

impl std::error::Error for PeriodOutOfRange {}

impl MeasurementPeriod {
    pub fn seconds(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for MeasurementPeriod {
    type Error = PeriodOutOfRange;

    fn try_from(seconds: i64) -> Result<Self, Self::Error> {
        if (i64::from(MEAS_RATE_MIN)..=i64::from(MEAS_RATE_MAX)).contains(&seconds) {
            Ok(Self(seconds as u16))
        } else {
            Err(PeriodOutOfRange(seconds))
        }
    }
}

/// Step of the period change transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Put the sensor into idle mode.
    Halt,

    /// Write the new rate.
    SetRate,

    /// Return to continuous mode.
    Resume,
}

/// A failed period change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconfigError<E> {
    /// The step that failed.
    pub step: Step,

    /// The driver error of that step.
    pub source: E,

    /// Whether continuous mode is known to be running again. Always true
    /// when `Halt` failed, since nothing was changed.
    pub resumed: bool,
}

impl<E: core::fmt::Debug> core::fmt::Display for ReconfigError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Measurement period change failed at {:?}: {:?}{}",
            self.step,
            self.source,
            if self.resumed {
                ""
            } else {
                " (sensor left idle)"
            }
        )
    }
}

impl<E: core::fmt::Debug> std::error::Error for ReconfigError<E> {}

/// Halt, set rate, resume: applied as one logical change.
///
/// Steps run in order and stop at the first failure. If the sensor was
/// already halted when a step failed, one attempt is made to resume
/// continuous mode so measurement does not stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodChange {
    period: MeasurementPeriod,
}

impl PeriodChange {
    pub fn new(period: MeasurementPeriod) -> Self {
        Self { period }
    }

    /// Run the transaction.
    ///
    /// # Arguments
    /// * `control` - The sensor configuration interface.
    ///
    /// # Returns
    /// * `Result<MeasurementPeriod, ReconfigError<C::Error>>` - The applied
    ///   period, or the failed step.
    pub fn apply<C: MeasurementControl>(
        &self,
        control: &mut C,
    ) -> Result<MeasurementPeriod, ReconfigError<C::Error>> {
        let seconds = self.period.seconds();

        control
            .set_measurement_config(MeasurementConfig::idle())
            .map_err(|source| ReconfigError {
                step: Step::Halt,
                source,
                resumed: true,
            })?;

        if let Err(source) = control.set_measurement_rate(seconds) {
            return Err(Self::roll_forward(control, Step::SetRate, source));
        }

        if let Err(source) = control.set_measurement_config(MeasurementConfig::continuous()) {
            return Err(Self::roll_forward(control, Step::Resume, source));
        }

        info!("Measurement period set to {seconds}s");

        Ok(self.period)
    }

    /// Best-effort return to continuous mode after a failure past `Halt`.
    fn roll_forward<C: MeasurementControl>(
        control: &mut C,
        step: Step,
        source: C::Error,
    ) -> ReconfigError<C::Error> {
        let resumed = match control.set_measurement_config(MeasurementConfig::continuous()) {
            Ok(()) => {
                warn!("Period change failed at {step:?}, continuous mode restored");
                true
            }
            Err(e) => {
                warn!("Period change failed at {step:?}, sensor left idle: {e:?}");
                false
            }
        };

        ReconfigError {
            step,
            source,
            resumed,
        }
    }
}

/// Tests.
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ControlCall, FakeControl, FakeError};

    fn sixty() -> PeriodChange {
        PeriodChange::new(MeasurementPeriod::try_from(60).unwrap())
    }

    #[test]
    fn period_bounds_are_inclusive() {
        assert!(MeasurementPeriod::try_from(5).is_ok());
        assert!(MeasurementPeriod::try_from(4095).is_ok());
        assert_eq!(MeasurementPeriod::try_from(4), Err(PeriodOutOfRange(4)));
        assert_eq!(
            MeasurementPeriod::try_from(4096),
            Err(PeriodOutOfRange(4096))
        );
        assert_eq!(MeasurementPeriod::try_from(-1), Err(PeriodOutOfRange(-1)));
    }

    #[test]
    fn successful_change_runs_three_steps_in_order() {
        let mut control = FakeControl::default();

        let applied = sixty().apply(&mut control).unwrap();

        assert_eq!(applied.seconds(), 60);
        assert_eq!(
            control.calls,
            vec![
                ControlCall::Config(MeasurementConfig::idle()),
                ControlCall::Rate(60),
                ControlCall::Config(MeasurementConfig::continuous()),
            ]
        );
    }

    #[test]
    fn halt_failure_changes_nothing() {
        let mut control = FakeControl::failing_on(&[0]);

        let err = sixty().apply(&mut control).unwrap_err();

        assert_eq!(
            err,
            ReconfigError {
                step: Step::Halt,
                source: FakeError,
                resumed: true
            }
        );
        assert_eq!(control.calls.len(), 1);
    }

    #[test]
    fn rate_failure_resumes_continuous_mode() {
        let mut control = FakeControl::failing_on(&[1]);

        let err = sixty().apply(&mut control).unwrap_err();

        assert_eq!(err.step, Step::SetRate);
        assert!(err.resumed);
        assert_eq!(
            control.calls.last(),
            Some(&ControlCall::Config(MeasurementConfig::continuous()))
        );
        assert_eq!(control.calls.len(), 3);
    }

    #[test]
    fn resume_failure_is_retried_once() {
        let mut control = FakeControl::failing_on(&[2]);

        let err = sixty().apply(&mut control).unwrap_err();

        assert_eq!(err.step, Step::Resume);
        assert!(err.resumed);
        assert_eq!(control.calls.len(), 4);
    }

    #[test]
    fn failed_retry_reports_sensor_left_idle() {
        let mut control = FakeControl::failing_on(&[2, 3]);

        let err = sixty().apply(&mut control).unwrap_err();

        assert!(!err.resumed);
        assert!(err.to_string().contains("sensor left idle"));
    }
}
