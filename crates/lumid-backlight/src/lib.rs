//! PWM backlight control.
//!
//! A [`BacklightDevice`] owns one PWM channel and up to two GPIO lines
//! (panel power and backlight enable) claimed through a [`lumid_hal::Hal`],
//! and drives them from a small set of properties: requested brightness,
//! power state and framebuffer blank state. All observable output goes
//! through a single update path so the hardware always reflects the
//! combined state.
//!
//! ```no_run
//! use lumid_backlight::{BacklightDevice, BacklightHooks};
//! use lumid_config::BoardConfig;
//! use lumid_hal::SysfsHal;
//!
//! # fn main() -> Result<(), lumid_backlight::BacklightError> {
//! let mut hal = SysfsHal::new();
//! let config = BoardConfig::default();
//! let mut device = BacklightDevice::attach(&mut hal, &config, BacklightHooks::default())?;
//! device.set_brightness(200)?;
//! # Ok(())
//! # }
//! ```

pub mod controller;
pub mod device;
pub mod hooks;

pub use controller::BacklightController;
pub use device::{BacklightDevice, BacklightProperties, BlankMode};
pub use hooks::BacklightHooks;

use lumid_hal::HalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacklightError {
    #[error(transparent)]
    Hal(#[from] HalError),

    #[error("setup hook failed: {0}")]
    Setup(String),

    #[error("channel reports no period and none is configured")]
    NoPeriod,

    #[error("brightness {requested} exceeds maximum {max}")]
    OutOfRange { requested: u32, max: u32 },
}

impl BacklightError {
    /// True when attaching failed only because a resource is not there
    /// yet and the caller should retry later.
    pub fn is_deferred(&self) -> bool {
        matches!(self, BacklightError::Hal(e) if e.is_deferred())
    }
}
