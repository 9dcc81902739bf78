use embedded_io::{ErrorType, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Line ending used on the console.
pub const CRLF: &str = "\r\n";

/// ANSI clear screen and cursor home.
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[;H";

/// Printed once at boot.
const BANNER: &str = "=====================================================\r\n\
                      Connected Sensor Kit: PAS CO2 Application\r\n\
                      =====================================================\r\n";

/// Write `line` followed by CRLF in a single `write_all`.
///
/// # Arguments
/// * `out` - The console.
/// * `line` - The text, without line ending.
///
/// # Returns
/// * `Result<(), W::Error>` - The result of the operation.
pub fn write_line<W: Write>(out: &mut W, line: &str) -> Result<(), W::Error> {
    let mut buffer = String::with_capacity(line.len() + CRLF.len());
    buffer.push_str(line);
    buffer.push_str(CRLF);

    out.write_all(buffer.as_bytes())
}

/// Clear the screen and print the application banner.
pub fn write_banner<W: Write>(out: &mut W) -> Result<(), W::Error> {
    out.write_all(CLEAR_SCREEN.as_bytes())?;
    out.write_all(BANNER.as_bytes())?;
    out.flush()
}

/// Console writer shared by the acquisition thread and the console thread.
///
/// Each `write_all` holds the lock for its whole buffer, so lines written
/// with [`write_line`] never interleave.
pub struct SharedWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> SharedWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(Mutex::new(writer)),
        }
    }

    /// A panic while printing leaves nothing half-updated that matters, so
    /// a poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, W> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> ErrorType for SharedWriter<W> {
    type Error = W::Error;
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.lock().write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.lock().flush()
    }
}

/// Joins separate receive and transmit halves into one console stream.
pub struct Duplex<R, W> {
    /// Receive half.
    pub rx: R,

    /// Transmit half.
    pub tx: W,
}

impl<R: ErrorType, W: ErrorType<Error = R::Error>> ErrorType for Duplex<R, W> {
    type Error = R::Error;
}

impl<R: Read, W: Write<Error = R::Error>> Read for Duplex<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.rx.read(buf)
    }
}

impl<R: Read, W: Write<Error = R::Error>> Write for Duplex<R, W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.tx.write_all(buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.tx.flush()
    }
}
