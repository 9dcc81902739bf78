use enumset::{EnumSet, EnumSetType};

/// A health condition reported by the CO2 sensor.
#[derive(Debug, EnumSetType)]
pub enum Fault {
    /// The sensor detected a communication problem with the host.
    CommunicationError,

    /// The sensor supply voltage is out of range.
    OverVoltage,

    /// The sensor temperature is out of range.
    OverTemperature,
}

/// Decoded set of independent faults. Any combination may be present.
pub type FaultSet = EnumSet<Fault>;

impl Fault {
    /// Diagnostic line printed when the fault is present.
    ///
    /// # Returns
    /// * `&'static str` - The message, without line ending.
    pub fn message(self) -> &'static str {
        match self {
            Fault::CommunicationError => "CO2 Sensor Communication Error",
            Fault::OverVoltage => "CO2 Sensor Over-Voltage Error",
            Fault::OverTemperature => "CO2 Sensor Temperature Error",
        }
    }

    /// Bit mask of this fault in a [`SensorStatus`].
    fn mask(self) -> u8 {
        match self {
            Fault::CommunicationError => SensorStatus::COMM_ERROR,
            Fault::OverVoltage => SensorStatus::OVER_VOLTAGE,
            Fault::OverTemperature => SensorStatus::OVER_TEMPERATURE,
        }
    }
}

/// Raw 8-bit sensor status bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorStatus(pub u8);

impl SensorStatus {
    /// Communication error bit.
    pub const COMM_ERROR: u8 = 1 << 0;

    /// Over-voltage bit.
    pub const OVER_VOLTAGE: u8 = 1 << 1;

    /// Over-temperature bit.
    pub const OVER_TEMPERATURE: u8 = 1 << 2;

    /// `SENS_STS` register: interface communication error.
    const REG_ICCER: u8 = 1 << 3;

    /// `SENS_STS` register: out-of-range voltage.
    const REG_ORVS: u8 = 1 << 4;

    /// `SENS_STS` register: out-of-range temperature.
    const REG_ORTMP: u8 = 1 << 5;

    /// Convert the PAS CO2 `SENS_STS` register value into a status bitfield.
    ///
    /// # Arguments
    /// * `register` - The value read from the `SENS_STS` register.
    ///
    /// # Returns
    /// * `SensorStatus` - The status with only the fault bits retained.
    pub fn from_register(register: u8) -> Self {
        let mut bits = 0;

        if register & Self::REG_ICCER != 0 {
            bits |= Self::COMM_ERROR;
        }

        if register & Self::REG_ORVS != 0 {
            bits |= Self::OVER_VOLTAGE;
        }

        if register & Self::REG_ORTMP != 0 {
            bits |= Self::OVER_TEMPERATURE;
        }

        SensorStatus(bits)
    }
}

/// Decode a status bitfield into the set of faults it reports.
///
/// Each fault is an independent bit test; unknown bits are ignored.
///
/// # Arguments
/// * `status` - The raw status.
///
/// # Returns
/// * `FaultSet` - The faults whose bit is set.
pub fn decode(status: SensorStatus) -> FaultSet {
    FaultSet::all()
        .iter()
        .filter(|fault| status.0 & fault.mask() != 0)
        .collect()
}

/// State of the warning indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    /// No fault present.
    Normal,

    /// At least one fault present.
    Alert,
}

impl From<&FaultSet> for IndicatorState {
    fn from(faults: &FaultSet) -> Self {
        if faults.is_empty() {
            IndicatorState::Normal
        } else {
            IndicatorState::Alert
        }
    }
}

impl IndicatorState {
    /// Whether the warning output should be driven high.
    pub fn is_alert(self) -> bool {
        self == IndicatorState::Alert
    }
}
