//! Duty-cycle math and power sequencing for one PWM backlight.

use crate::BacklightError;
use lumid_config::BoardConfig;
use lumid_hal::{GpioLine, PwmChannel};

/// Drives the PWM channel and the optional enable line.
///
/// The controller tracks whether the output is currently powered so the
/// on/off sequences run at most once per transition.
#[derive(Debug)]
pub struct BacklightController {
    pwm: Box<dyn PwmChannel>,
    enable_gpio: Option<Box<dyn GpioLine>>,
    period_ns: u64,
    lth_ns: u64,
    scale: u64,
    enabled: bool,
}

impl BacklightController {
    /// Configure the channel for `config` and wrap it.
    ///
    /// A period already present on the channel wins over the configured
    /// one; the configured period is only programmed when the channel
    /// reports none. A brightness floor that scales past the period is
    /// clamped to it.
    pub(crate) fn new(
        mut pwm: Box<dyn PwmChannel>,
        enable_gpio: Option<Box<dyn GpioLine>>,
        config: &BoardConfig,
    ) -> Result<Self, BacklightError> {
        let mut period_ns = pwm.period();
        if period_ns == 0 && config.period_ns > 0 {
            period_ns = config.period_ns;
            pwm.set_period(period_ns);
        }
        if period_ns == 0 {
            return Err(BacklightError::NoPeriod);
        }

        pwm.set_polarity(config.polarity);

        let scale = u64::from(config.max_brightness);
        let mut lth_ns = scaled_floor(config.lth_brightness, period_ns, scale);
        if lth_ns > period_ns {
            tracing::warn!(
                "brightness floor {}ns above the period {}ns, clamping",
                lth_ns,
                period_ns
            );
            lth_ns = period_ns;
        }
        if lth_ns > 0 {
            tracing::debug!("brightness floor {}ns of {}ns", lth_ns, period_ns);
        }

        Ok(Self {
            pwm,
            enable_gpio,
            period_ns,
            lth_ns,
            scale,
            enabled: false,
        })
    }

    /// Duty cycle in nanoseconds for a brightness on the configured scale.
    ///
    /// Maps 0 to the floor and the maximum brightness to the full period.
    pub fn compute_duty_cycle(&self, brightness: u32) -> u64 {
        self.lth_ns + u64::from(brightness) * (self.period_ns - self.lth_ns) / self.scale
    }

    /// Program `brightness` into the channel, powering on or off as needed.
    pub fn apply(&mut self, brightness: u32) {
        if brightness == 0 {
            self.power_off();
            return;
        }
        let duty_ns = self.compute_duty_cycle(brightness);
        tracing::debug!("brightness {} -> {}ns / {}ns", brightness, duty_ns, self.period_ns);
        self.pwm.configure(duty_ns, self.period_ns);
        self.power_on();
    }

    /// Assert the enable line, then start the PWM. Idempotent.
    pub fn power_on(&mut self) {
        if self.enabled {
            return;
        }
        if let Some(gpio) = self.enable_gpio.as_mut() {
            gpio.set_value(true);
        }
        self.pwm.enable();
        self.enabled = true;
    }

    /// Zero the duty cycle and stop the PWM, then drop the enable line.
    /// Idempotent.
    pub fn power_off(&mut self) {
        if !self.enabled {
            return;
        }
        self.pwm.configure(0, self.period_ns);
        self.pwm.disable();
        if let Some(gpio) = self.enable_gpio.as_mut() {
            gpio.set_value(false);
        }
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }
}

/// Scale a brightness floor onto the period.
///
/// The division truncates before the multiply, so the floor lands on a
/// whole number of per-step increments rather than the exact ratio.
fn scaled_floor(lth: u32, period_ns: u64, scale: u64) -> u64 {
    u64::from(lth) * (period_ns / scale)
}
