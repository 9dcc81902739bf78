use crate::reconfig::{MeasurementPeriod, PeriodChange};
use crate::sensor::MeasurementControl;
use crate::session::SessionState;
use crate::terminal::{write_line, CRLF};
use embedded_io::{Read, Write};
use log::{debug, error, info};
use std::convert::Infallible;
use std::sync::Arc;

/// Capacity of the line input buffer, terminator slot included.
pub const LINE_CAPACITY: usize = 256;

/// Bytes of one line input dialog, whitespace removed.
pub type LineBuffer = heapless::Vec<u8, LINE_CAPACITY>;

/// A command key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `?`: list the settings.
    Menu,

    /// `p`: set the measurement period.
    MeasurementPeriod,

    /// `i`: toggle diagnostic output.
    Diagnostics,

    /// Anything else.
    Unknown(u8),
}

impl From<u8> for Command {
    fn from(key: u8) -> Self {
        match key {
            b'?' => Command::Menu,
            b'p' => Command::MeasurementPeriod,
            b'i' => Command::Diagnostics,
            other => Command::Unknown(other),
        }
    }
}

/// Console stream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleError<E> {
    /// Read or write failed.
    Io(E),

    /// The input stream ended.
    Closed,
}

impl<E: core::fmt::Debug> core::fmt::Display for ConsoleError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConsoleError::Io(e) => write!(f, "Console I/O error: {:?}", e),
            ConsoleError::Closed => write!(f, "Console input closed"),
        }
    }
}

impl<E: core::fmt::Debug> std::error::Error for ConsoleError<E> {}

/// Interactive settings console.
///
/// Reads one key at a time and runs at most one line input dialog per key.
/// Concentration output is paused while a command is handled.
pub struct Console<T, C> {
    /// Bidirectional byte stream.
    terminal: T,

    /// Sensor configuration interface.
    control: C,

    /// Flags shared with the acquisition loop.
    session: Arc<SessionState>,

    /// Reused by every line input dialog.
    line: LineBuffer,
}

impl<T, C> Console<T, C>
where
    T: Read + Write,
    C: MeasurementControl,
{
    /// Create a console.
    ///
    /// # Arguments
    /// * `terminal` - The console byte stream.
    /// * `control` - The sensor configuration interface.
    /// * `session` - Flags shared with the acquisition loop.
    pub fn new(terminal: T, control: C, session: Arc<SessionState>) -> Self {
        Self {
            terminal,
            control,
            session,
            line: LineBuffer::new(),
        }
    }

    /// Print the menu, then handle keys forever.
    ///
    /// # Returns
    /// * `Result<Infallible, ConsoleError<T::Error>>` - Only if the stream fails.
    pub fn run(&mut self) -> Result<Infallible, ConsoleError<T::Error>> {
        self.print_menu()?;

        loop {
            self.step()?;
        }
    }

    /// Block for one key and handle it.
    pub fn step(&mut self) -> Result<(), ConsoleError<T::Error>> {
        let key = self.read_byte()?;
        self.handle_key(key)
    }

    /// Handle one key with concentration output paused.
    pub fn handle_key(&mut self, key: u8) -> Result<(), ConsoleError<T::Error>> {
        let session = Arc::clone(&self.session);
        let _pause = session.pause_display();

        let command = Command::from(key);
        debug!("Console command {:?}", command);

        match command {
            Command::Menu => self.print_menu(),
            Command::MeasurementPeriod => self.measurement_period(),
            Command::Diagnostics => self.diagnostics(),
            Command::Unknown(_) => self.print("Press '?' to list all CO2 sensor settings"),
        }
    }

    /// Print the list of settings.
    pub fn print_menu(&mut self) -> Result<(), ConsoleError<T::Error>> {
        self.print("Select a setting to configure")?;
        self.print("'p': Set the measurement period")?;
        self.print("'i': Print additional diagnostic information if available")?;
        self.print("")
    }

    fn measurement_period(&mut self) -> Result<(), ConsoleError<T::Error>> {
        self.print("Enter the measurement period [5-4095]s")?;
        self.read_line()?;

        let Some(value) = parse_leading_integer(&self.line) else {
            return Ok(());
        };

        let period = match MeasurementPeriod::try_from(value) {
            Ok(period) => period,
            Err(e) => {
                debug!("{e}");
                return self.print_paragraph(
                    "CO2 sensor measurement period configuration error, Valid range is [5-4095]s",
                );
            }
        };

        match PeriodChange::new(period).apply(&mut self.control) {
            Ok(applied) => self.print_paragraph(&format!(
                "CO2 measurement period set to: {}",
                applied.seconds()
            )),
            Err(e) => {
                error!("{e}");
                self.print_paragraph(
                    "An unexpected error occurred while trying to change the measurement period",
                )
            }
        }
    }

    fn diagnostics(&mut self) -> Result<(), ConsoleError<T::Error>> {
        self.print("Display additional diagnostic information [y/n]?")?;
        self.read_line()?;

        let enable = match self.line.as_slice() {
            [b'y'] => Some(true),
            [b'n'] => Some(false),
            _ => None,
        };
        let Some(enable) = enable else {
            return self.print_paragraph("Input error, valid values are [y/n]");
        };

        self.session.set_diagnostics_enabled(enable);
        info!("Diagnostic logging {}", if enable { "on" } else { "off" });

        self.print_paragraph(if enable {
            "Enabled additional diagnostic logging"
        } else {
            "Disabled additional diagnostic logging"
        })
    }

    /// Read one line into `self.line`.
    ///
    /// Consumes at most `LINE_CAPACITY - 1` bytes and stops after a carriage
    /// return. Every byte is echoed; whitespace is echoed but not stored.
    fn read_line(&mut self) -> Result<(), ConsoleError<T::Error>> {
        self.line.clear();

        for _ in 1..LINE_CAPACITY {
            let byte = self.read_byte()?;
            self.write(&[byte])?;

            if byte == b'\r' {
                break;
            }

            if is_space(byte) {
                continue;
            }

            if self.line.push(byte).is_err() {
                break;
            }
        }

        self.write(b"\n")?;
        self.terminal.flush().map_err(ConsoleError::Io)
    }

    fn read_byte(&mut self) -> Result<u8, ConsoleError<T::Error>> {
        let mut byte = [0u8; 1];

        match self.terminal.read(&mut byte).map_err(ConsoleError::Io)? {
            0 => Err(ConsoleError::Closed),
            _ => Ok(byte[0]),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ConsoleError<T::Error>> {
        self.terminal.write_all(bytes).map_err(ConsoleError::Io)
    }

    fn print(&mut self, line: &str) -> Result<(), ConsoleError<T::Error>> {
        write_line(&mut self.terminal, line).map_err(ConsoleError::Io)
    }

    /// Print `text` followed by an empty line.
    fn print_paragraph(&mut self, text: &str) -> Result<(), ConsoleError<T::Error>> {
        self.print(text)?;
        self.write(CRLF.as_bytes())
    }
}

/// Whitespace as the C locale defines it.
fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | 0x0B | 0x0C | b'\r')
}

/// Parse a decimal integer prefix: optional sign, then digits. Trailing
/// bytes are ignored and overflow saturates.
///
/// # Returns
/// * `Option<i64>` - `None` if there are no digits.
fn parse_leading_integer(line: &[u8]) -> Option<i64> {
    let (negative, rest) = match line.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, line),
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let magnitude = rest[..digits].iter().fold(0i64, |acc, digit| {
        acc.saturating_mul(10)
            .saturating_add(i64::from(digit - b'0'))
    });

    Some(if negative { -magnitude } else { magnitude })
}
