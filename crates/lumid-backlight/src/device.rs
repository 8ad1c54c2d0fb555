//! The backlight device state machine.

use crate::controller::BacklightController;
use crate::hooks::BacklightHooks;
use crate::BacklightError;
use lumid_config::BoardConfig;
use lumid_hal::{GpioLine, Hal};

/// Framebuffer blank levels, in escalating depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlankMode {
    #[default]
    Unblank,
    Normal,
    VsyncSuspend,
    HsyncSuspend,
    Powerdown,
}

impl BlankMode {
    pub fn from_level(level: u32) -> Option<Self> {
        match level {
            0 => Some(BlankMode::Unblank),
            1 => Some(BlankMode::Normal),
            2 => Some(BlankMode::VsyncSuspend),
            3 => Some(BlankMode::HsyncSuspend),
            4 => Some(BlankMode::Powerdown),
            _ => None,
        }
    }

    pub fn as_level(&self) -> u32 {
        match self {
            BlankMode::Unblank => 0,
            BlankMode::Normal => 1,
            BlankMode::VsyncSuspend => 2,
            BlankMode::HsyncSuspend => 3,
            BlankMode::Powerdown => 4,
        }
    }

    /// Anything deeper than `Unblank` turns the backlight off.
    pub fn is_blanking(&self) -> bool {
        !matches!(self, BlankMode::Unblank)
    }
}

/// The externally visible state of a backlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklightProperties {
    /// Requested brightness; what the panel shows once unblanked.
    pub brightness: u32,
    pub max_brightness: u32,
    /// Device power state, driven by suspend and user writes.
    pub power: BlankMode,
    /// Blank state of the framebuffer this backlight lights.
    pub fb_blank: BlankMode,
}

impl BacklightProperties {
    pub fn is_blanked(&self) -> bool {
        self.power.is_blanking() || self.fb_blank.is_blanking()
    }

    /// The brightness the hardware should actually show right now.
    pub fn effective_brightness(&self) -> u32 {
        if self.is_blanked() { 0 } else { self.brightness }
    }
}

/// One attached PWM backlight.
///
/// Every state change funnels through [`BacklightDevice::update_status`],
/// which folds brightness, power state and framebuffer blanking into a
/// single value before touching the hardware.
pub struct BacklightDevice {
    name: String,
    props: BacklightProperties,
    controller: BacklightController,
    // held only for its release on drop, declared after the controller
    // so the pwm and enable line go back first and the panel keeps
    // power until the end
    #[allow(dead_code)]
    panel_power: Option<Box<dyn GpioLine>>,
    hooks: BacklightHooks,
}

impl std::fmt::Debug for BacklightDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacklightDevice")
            .field("name", &self.name)
            .field("props", &self.props)
            .field("panel_power", &self.panel_power.is_some())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl BacklightDevice {
    /// Claim the hardware described by `config` and bring the backlight
    /// to its initial state.
    ///
    /// The setup hook runs before anything is claimed; if it fails the
    /// attach is abandoned without running the exit hook. Failures after
    /// setup release whatever was claimed and do run the exit hook.
    /// A [`BacklightError::is_deferred`] failure means the PWM controller
    /// has not shown up yet and the attach can be retried.
    pub fn attach(
        hal: &mut dyn Hal,
        config: &BoardConfig,
        mut hooks: BacklightHooks,
    ) -> Result<Self, BacklightError> {
        if let Some(setup) = hooks.setup.as_mut() {
            setup().map_err(BacklightError::Setup)?;
        }

        let (controller, panel_power) = match Self::claim_hardware(hal, config) {
            Ok(parts) => parts,
            Err(e) => {
                if e.is_deferred() {
                    tracing::info!("backlight '{}' not ready yet: {}", config.name, e);
                } else {
                    tracing::warn!("failed to attach backlight '{}': {}", config.name, e);
                }
                if let Some(exit) = hooks.exit.as_mut() {
                    exit();
                }
                return Err(e);
            }
        };

        let mut brightness = config.default_brightness;
        if brightness > config.max_brightness {
            tracing::warn!(
                "default brightness {} above maximum {}, clamping",
                brightness,
                config.max_brightness
            );
            brightness = config.max_brightness;
        }

        let mut device = Self {
            name: config.name.clone(),
            props: BacklightProperties {
                brightness,
                max_brightness: config.max_brightness,
                power: BlankMode::Unblank,
                fb_blank: BlankMode::Unblank,
            },
            controller,
            panel_power,
            hooks,
        };

        tracing::info!(
            "backlight '{}' attached, period {}ns, brightness {}/{}",
            device.name,
            device.controller.period_ns(),
            device.props.brightness,
            device.props.max_brightness
        );
        device.update_status();
        Ok(device)
    }

    fn claim_hardware(
        hal: &mut dyn Hal,
        config: &BoardConfig,
    ) -> Result<(BacklightController, Option<Box<dyn GpioLine>>), BacklightError> {
        // the panel supply comes up first and stays up
        let panel_power = match config.panel_power_gpio {
            Some(id) => {
                let mut gpio = hal.claim_gpio(id, "lcd_power")?;
                gpio.set_direction_output(true);
                Some(gpio)
            }
            None => None,
        };

        let enable_gpio = match config.backlight_enable_gpio {
            Some(id) => {
                let mut gpio = hal.claim_gpio(id, "bl_enable")?;
                gpio.set_direction_output(false);
                Some(gpio)
            }
            None => None,
        };

        let pwm = hal.claim_pwm(config.pwm_chip, config.pwm_channel, "backlight")?;
        let controller = BacklightController::new(pwm, enable_gpio, config)?;
        Ok((controller, panel_power))
    }

    /// Push the current properties to the hardware.
    ///
    /// Power state and framebuffer blanking fold the brightness to 0, the
    /// notify hook may adjust it, and the result goes to the controller.
    pub fn update_status(&mut self) {
        let mut brightness = self.props.effective_brightness();
        if let Some(notify) = self.hooks.notify.as_mut() {
            brightness = notify(brightness);
        }
        self.controller.apply(brightness);
        if let Some(notify_after) = self.hooks.notify_after.as_mut() {
            notify_after(brightness);
        }
    }

    /// Set the requested brightness on the device scale.
    pub fn set_brightness(&mut self, brightness: u32) -> Result<(), BacklightError> {
        if brightness > self.props.max_brightness {
            return Err(BacklightError::OutOfRange {
                requested: brightness,
                max: self.props.max_brightness,
            });
        }
        self.props.brightness = brightness;
        self.update_status();
        Ok(())
    }

    pub fn set_power(&mut self, mode: BlankMode) {
        if self.props.power != mode {
            tracing::debug!("'{}' power -> {:?}", self.name, mode);
        }
        self.props.power = mode;
        self.update_status();
    }

    pub fn set_fb_blank(&mut self, mode: BlankMode) {
        self.props.fb_blank = mode;
        self.update_status();
    }

    /// React to a blank event on framebuffer `fb`, if it is ours.
    pub fn handle_fb_blank(&mut self, fb: u32, mode: BlankMode) {
        if !self.applies_to_framebuffer(fb) {
            tracing::debug!("'{}' ignoring blank of fb{}", self.name, fb);
            return;
        }
        self.set_fb_blank(mode);
    }

    /// Whether blank events for framebuffer `fb` concern this backlight.
    /// Without a check hook every framebuffer matches.
    pub fn applies_to_framebuffer(&mut self, fb: u32) -> bool {
        match self.hooks.check_fb.as_mut() {
            Some(check) => check(fb),
            None => true,
        }
    }

    /// Power down for system suspend. The requested brightness is kept
    /// for [`BacklightDevice::resume`].
    pub fn suspend(&mut self) {
        if let Some(notify) = self.hooks.notify.as_mut() {
            notify(0);
        }
        self.controller.power_off();
        if let Some(notify_after) = self.hooks.notify_after.as_mut() {
            notify_after(0);
        }
    }

    /// Restore the pre-suspend state.
    pub fn resume(&mut self) {
        self.update_status();
    }

    /// Power down for system shutdown. No hooks run.
    pub fn shutdown(&mut self) {
        self.controller.power_off();
    }

    /// Tear the device down: power off, run the exit hook, release the
    /// hardware.
    pub fn detach(mut self) {
        tracing::info!("detaching backlight '{}'", self.name);
        self.controller.power_off();
        if let Some(exit) = self.hooks.exit.as_mut() {
            exit();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn brightness(&self) -> u32 {
        self.props.brightness
    }

    pub fn properties(&self) -> &BacklightProperties {
        &self.props
    }

    pub fn is_powered(&self) -> bool {
        self.controller.is_enabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_levels_round_trip() {
        for level in 0..=4 {
            let mode = BlankMode::from_level(level).unwrap();
            assert_eq!(mode.as_level(), level);
        }
        assert!(BlankMode::from_level(5).is_none());
        assert!(!BlankMode::Unblank.is_blanking());
        assert!(BlankMode::Normal.is_blanking());
        assert!(BlankMode::Powerdown.is_blanking());
    }

    #[test]
    fn test_effective_brightness_folds_blanking() {
        let mut props = BacklightProperties {
            brightness: 180,
            max_brightness: 255,
            power: BlankMode::Unblank,
            fb_blank: BlankMode::Unblank,
        };
        assert_eq!(props.effective_brightness(), 180);

        props.power = BlankMode::Powerdown;
        assert_eq!(props.effective_brightness(), 0);

        props.power = BlankMode::Unblank;
        props.fb_blank = BlankMode::Normal;
        assert_eq!(props.effective_brightness(), 0);
        assert!(props.is_blanked());

        props.fb_blank = BlankMode::Unblank;
        assert_eq!(props.effective_brightness(), 180);
    }
}
