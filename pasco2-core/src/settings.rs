/// Pressure used when no auxiliary pressure sensor is fitted, in hPa.
pub const FALLBACK_PRESSURE_HPA: f32 = 1015.0;

/// Delay between acquisition cycles in milliseconds.
pub const CYCLE_DELAY_MS: u32 = 1000;

/// Delay after power-up before the sensors are initialized, in milliseconds.
pub const STARTUP_DELAY_MS: u32 = 2000;

/// Toggle period of the startup indicator in milliseconds.
pub const STARTUP_BLINK_PERIOD_MS: u32 = 1000;

/// What to do when the auxiliary pressure sensor fails mid-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PressureFailurePolicy {
    /// Treat the failure as fatal and stop acquisition.
    #[default]
    Halt,

    /// Use the fallback pressure for the rest of the session.
    Fallback,
}

/// Session-scoped settings. Nothing here is persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Pressure used without an auxiliary sensor, in hPa.
    pub fallback_pressure_hpa: f32,

    /// Fixed delay between acquisition cycles, in milliseconds.
    pub cycle_delay_ms: u32,

    /// Delay before sensor bring-up, in milliseconds.
    pub startup_delay_ms: u32,

    /// Startup indicator toggle period, in milliseconds.
    pub startup_blink_period_ms: u32,

    /// Auxiliary pressure sensor failure handling.
    pub pressure_failure_policy: PressureFailurePolicy,

    /// I2C address of the auxiliary pressure sensor.
    pub pressure_sensor_address: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fallback_pressure_hpa: FALLBACK_PRESSURE_HPA,
            cycle_delay_ms: CYCLE_DELAY_MS,
            startup_delay_ms: STARTUP_DELAY_MS,
            startup_blink_period_ms: STARTUP_BLINK_PERIOD_MS,
            pressure_failure_policy: PressureFailurePolicy::Halt,
            pressure_sensor_address: crate::dps3xx::ADDRESS_ALT,
        }
    }
}

/// Tests.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_module_constants() {
        let settings = Settings::default();

        assert_eq!(settings.fallback_pressure_hpa, FALLBACK_PRESSURE_HPA);
        assert_eq!(settings.pressure_failure_policy, PressureFailurePolicy::Halt);
        assert_eq!(settings.pressure_sensor_address, crate::dps3xx::ADDRESS_ALT);
    }

    #[test]
    fn all_timings_are_milliseconds_in_u32() {
        let settings = Settings::default();
        let timings: [u32; 3] = [
            settings.cycle_delay_ms,
            settings.startup_delay_ms,
            settings.startup_blink_period_ms,
        ];

        assert_eq!(timings, [1000, 2000, 1000]);
    }
}
