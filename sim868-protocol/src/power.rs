use std::thread;
use std::time::Duration;

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::error::{ModemError, Result};

/// The modem's PWRKEY line.
///
/// Holding the key low for a few seconds toggles the modem on or off.
pub trait PowerKey: Send {
    /// Drive the key low for `hold`, then release it. Blocks for the whole press.
    fn pulse(&mut self, hold: Duration) -> Result<()>;
}

/// A power key wired to a GPIO output.
pub struct PinPowerKey<P> {
    pin: P,
}

impl<P: OutputPin> PinPowerKey<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: OutputPin + Send> PowerKey for PinPowerKey<P> {
    fn pulse(&mut self, hold: Duration) -> Result<()> {
        debug!("pressing power key for {hold:?}");
        self.pin
            .set_low()
            .map_err(|e| ModemError::Power(format!("set low: {e:?}")))?;
        thread::sleep(hold);
        self.pin
            .set_high()
            .map_err(|e| ModemError::Power(format!("set high: {e:?}")))
    }
}

/// Stand-in when no power line is wired; every press fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPowerKey;

impl PowerKey for NoPowerKey {
    fn pulse(&mut self, _hold: Duration) -> Result<()> {
        Err(ModemError::Power("no power key configured".to_string()))
    }
}
