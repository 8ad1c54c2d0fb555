//! Hardware access layer for lumid
//!
//! This crate provides the two hardware seams the backlight service sits on:
//! GPIO lines (panel supply, backlight enable) and a PWM channel. Both are
//! defined as traits so the power-sequencing logic can be exercised against
//! the mock backend in [`mock`] without real hardware; the sysfs-backed
//! implementations talk to `/sys/class/gpio` and `/sys/class/pwm`.
//!
//! # Example
//!
//! ```no_run
//! use lumid_hal::{Hal, SysfsHal};
//!
//! fn main() -> Result<(), lumid_hal::HalError> {
//!     let mut hal = SysfsHal::new();
//!     let mut enable = hal.claim_gpio(68, "bl_enable")?;
//!     enable.set_direction_output(false);
//!     let pwm = hal.claim_pwm(0, 0, "pwm-backlight")?;
//!     println!("channel period: {} ns", pwm.period());
//!     Ok(())
//! }
//! ```

pub mod gpio;
pub mod mock;
pub mod pwm;
mod sysfs;

pub use gpio::GpioLine;
pub use pwm::{Polarity, PwmChannel};
pub use sysfs::SysfsHal;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HalError {
    #[error("{0} is busy")]
    Busy(String),

    #[error("{0} is not available yet")]
    ProbeDeferred(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HalError {
    /// Whether this failure means "try again later" rather than "give up":
    /// the provider (pwmchip, gpiochip) has not been bound by its own driver
    /// yet, so a later claim may succeed.
    pub fn is_deferred(&self) -> bool {
        matches!(self, HalError::ProbeDeferred(_))
    }
}

/// Resource provider the attach path claims its lines and channel from.
///
/// Implemented by [`SysfsHal`] for real hardware and by
/// [`mock::MockHal`] for tests.
pub trait Hal {
    /// Claim exclusive ownership of a GPIO line. The handle releases the
    /// line when dropped.
    fn claim_gpio(&mut self, id: u32, label: &str) -> Result<Box<dyn GpioLine>>;

    /// Claim exclusive ownership of a PWM channel. The handle releases the
    /// channel when dropped. Returns [`HalError::ProbeDeferred`] when the
    /// chip is not present yet.
    fn claim_pwm(&mut self, chip: u32, channel: u32, label: &str) -> Result<Box<dyn PwmChannel>>;
}

/// HAL Result type
pub type Result<T> = std::result::Result<T, HalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_is_distinguishable() {
        assert!(HalError::ProbeDeferred("pwmchip0".into()).is_deferred());
        assert!(!HalError::Busy("gpio12".into()).is_deferred());
        let io = HalError::from(std::io::Error::other("boom"));
        assert!(!io.is_deferred());
    }

    #[test]
    fn test_error_display() {
        let err = HalError::Busy("gpio68".into());
        assert_eq!(format!("{err}"), "gpio68 is busy");

        let err = HalError::ProbeDeferred("pwmchip2".into());
        assert!(format!("{err}").contains("not available yet"));
    }
}
