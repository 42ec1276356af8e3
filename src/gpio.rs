use sim868_protocol::power::PowerKey;

use crate::cli::CliError;

#[cfg(target_os = "linux")]
mod linux {
    use embedded_hal::digital::PinState;
    use linux_embedded_hal::SysfsPin;
    use log::debug;
    use sim868_protocol::power::{PinPowerKey, PowerKey};

    use crate::cli::CliError;

    /// Export the sysfs line and drive it high (key released).
    pub fn power_key(pin: u64) -> Result<Box<dyn PowerKey>, CliError> {
        let gpio_err = |detail: String| CliError::Gpio { pin, detail };

        let line = SysfsPin::new(pin);
        line.export().map_err(|e| gpio_err(e.to_string()))?;
        let line = line
            .into_output_pin(PinState::High)
            .map_err(|e| gpio_err(format!("{e:?}")))?;
        debug!("GPIO {pin} exported as power key");
        Ok(Box::new(PinPowerKey::new(line)))
    }
}

#[cfg(target_os = "linux")]
pub fn power_key(pin: u64) -> Result<Box<dyn PowerKey>, CliError> {
    linux::power_key(pin)
}

#[cfg(not(target_os = "linux"))]
pub fn power_key(pin: u64) -> Result<Box<dyn PowerKey>, CliError> {
    log::warn!("GPIO {pin} unavailable on this platform, power changes will fail");
    Ok(Box::new(sim868_protocol::power::NoPowerKey))
}
