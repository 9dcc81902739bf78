//! Hardware-independent core of the PAS CO2 monitor.
//!
//! Everything here is generic over `embedded-hal` and `embedded-io` traits so
//! the acquisition loop, the console and the sensor drivers can be exercised
//! on the host.

pub mod acquisition;
pub mod console;
pub mod dps3xx;
pub mod pasco2;
pub mod reader;
pub mod reconfig;
pub mod sensor;
pub mod session;
pub mod settings;
pub mod status;
pub mod terminal;

#[cfg(test)]
pub(crate) mod testing;
