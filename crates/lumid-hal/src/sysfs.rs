//! The sysfs-backed HAL used on real hardware.

use crate::gpio::SysfsGpio;
use crate::pwm::SysfsPwm;
use crate::{GpioLine, Hal, PwmChannel, Result};
use std::path::PathBuf;

const GPIO_ROOT: &str = "/sys/class/gpio";
const PWM_ROOT: &str = "/sys/class/pwm";

/// HAL implementation backed by `/sys/class/gpio` and `/sys/class/pwm`.
pub struct SysfsHal {
    gpio_root: PathBuf,
    pwm_root: PathBuf,
}

impl SysfsHal {
    pub fn new() -> Self {
        Self {
            gpio_root: PathBuf::from(GPIO_ROOT),
            pwm_root: PathBuf::from(PWM_ROOT),
        }
    }

    /// Build a HAL rooted somewhere else, for tests and container setups.
    pub fn with_roots(gpio_root: impl Into<PathBuf>, pwm_root: impl Into<PathBuf>) -> Self {
        Self {
            gpio_root: gpio_root.into(),
            pwm_root: pwm_root.into(),
        }
    }
}

impl Default for SysfsHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for SysfsHal {
    fn claim_gpio(&mut self, id: u32, label: &str) -> Result<Box<dyn GpioLine>> {
        let line = SysfsGpio::claim(&self.gpio_root, id, label)?;
        Ok(Box::new(line))
    }

    fn claim_pwm(&mut self, chip: u32, channel: u32, label: &str) -> Result<Box<dyn PwmChannel>> {
        let pwm = SysfsPwm::claim(&self.pwm_root, chip, channel, label)?;
        Ok(Box::new(pwm))
    }
}
