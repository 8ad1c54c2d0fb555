//! Mock HAL for development and testing.
//!
//! Records every operation in order so tests can assert on exact power
//! sequencing, and supports injecting claim failures.

use crate::pwm::Polarity;
use crate::{GpioLine, Hal, HalError, PwmChannel, Result};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// One recorded HAL operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HalOp {
    GpioClaim(u32, String),
    GpioDirection(u32, bool),
    GpioSet(u32, bool),
    GpioRelease(u32),
    PwmClaim(u32, u32),
    PwmConfigure { duty_ns: u64, period_ns: u64 },
    PwmEnable,
    PwmDisable,
    PwmSetPeriod(u64),
    PwmSetPolarity(Polarity),
    PwmRelease,
}

/// Shared state behind a [`MockHal`] and the handles it gives out.
#[derive(Debug, Default)]
pub struct MockState {
    pub ops: Vec<HalOp>,
    pub gpio_values: HashMap<u32, bool>,
    pub pwm_period_ns: u64,
    pub pwm_duty_ns: u64,
    pub pwm_enabled: bool,
    pub pwm_polarity: Polarity,
    claimed_gpios: HashSet<u32>,
    pwm_claimed: bool,
    pub released_gpios: u32,
    pub released_pwms: u32,
}

/// In-memory HAL that hands out recording handles.
pub struct MockHal {
    state: Arc<RwLock<MockState>>,
    initial_period_ns: u64,
    fail_next_gpio: Option<HalError>,
    fail_next_pwm: Option<HalError>,
}

impl MockHal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            initial_period_ns: 0,
            fail_next_gpio: None,
            fail_next_pwm: None,
        }
    }

    /// A mock whose PWM channel reports `period_ns` before any configure.
    pub fn with_period(period_ns: u64) -> Self {
        let mut hal = Self::new();
        hal.initial_period_ns = period_ns;
        hal
    }

    pub fn state(&self) -> Arc<RwLock<MockState>> {
        Arc::clone(&self.state)
    }

    /// Make the next GPIO claim fail with `err`.
    pub fn fail_next_gpio(&mut self, err: HalError) {
        self.fail_next_gpio = Some(err);
    }

    /// Make the next PWM claim fail with `err`.
    pub fn fail_next_pwm(&mut self, err: HalError) {
        self.fail_next_pwm = Some(err);
    }

    pub fn ops(&self) -> Vec<HalOp> {
        self.state.read().map(|s| s.ops.clone()).unwrap_or_default()
    }

    pub fn gpio_value(&self, id: u32) -> Option<bool> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.gpio_values.get(&id).copied())
    }

    pub fn duty_ns(&self) -> u64 {
        self.state.read().map(|s| s.pwm_duty_ns).unwrap_or(0)
    }

    pub fn period_ns(&self) -> u64 {
        self.state.read().map(|s| s.pwm_period_ns).unwrap_or(0)
    }

    pub fn pwm_enabled(&self) -> bool {
        self.state.read().map(|s| s.pwm_enabled).unwrap_or(false)
    }

    pub fn released_counts(&self) -> (u32, u32) {
        self.state
            .read()
            .map(|s| (s.released_gpios, s.released_pwms))
            .unwrap_or((0, 0))
    }
}

impl Default for MockHal {
    fn default() -> Self {
        Self::new()
    }
}

impl Hal for MockHal {
    fn claim_gpio(&mut self, id: u32, label: &str) -> Result<Box<dyn GpioLine>> {
        if let Some(err) = self.fail_next_gpio.take() {
            return Err(err);
        }
        if let Ok(mut state) = self.state.write() {
            if !state.claimed_gpios.insert(id) {
                return Err(HalError::Busy(format!("gpio{id}")));
            }
            state.ops.push(HalOp::GpioClaim(id, label.to_string()));
        }
        Ok(Box::new(MockGpio {
            id,
            label: label.to_string(),
            state: Arc::clone(&self.state),
        }))
    }

    fn claim_pwm(&mut self, chip: u32, channel: u32, label: &str) -> Result<Box<dyn PwmChannel>> {
        if let Some(err) = self.fail_next_pwm.take() {
            return Err(err);
        }
        if let Ok(mut state) = self.state.write() {
            if state.pwm_claimed {
                return Err(HalError::Busy(format!("pwmchip{chip}/pwm{channel}")));
            }
            state.pwm_claimed = true;
            state.pwm_period_ns = self.initial_period_ns;
            state.ops.push(HalOp::PwmClaim(chip, channel));
        }
        Ok(Box::new(MockPwm {
            label: label.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

#[derive(Debug)]
struct MockGpio {
    id: u32,
    label: String,
    state: Arc<RwLock<MockState>>,
}

impl GpioLine for MockGpio {
    fn set_direction_output(&mut self, initial: bool) {
        if let Ok(mut state) = self.state.write() {
            state.gpio_values.insert(self.id, initial);
            state.ops.push(HalOp::GpioDirection(self.id, initial));
        }
    }

    fn set_value(&mut self, value: bool) {
        if let Ok(mut state) = self.state.write() {
            state.gpio_values.insert(self.id, value);
            state.ops.push(HalOp::GpioSet(self.id, value));
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for MockGpio {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.claimed_gpios.remove(&self.id);
            state.released_gpios += 1;
            state.ops.push(HalOp::GpioRelease(self.id));
        }
    }
}

#[derive(Debug)]
struct MockPwm {
    label: String,
    state: Arc<RwLock<MockState>>,
}

impl PwmChannel for MockPwm {
    fn configure(&mut self, duty_ns: u64, period_ns: u64) {
        if let Ok(mut state) = self.state.write() {
            state.pwm_duty_ns = duty_ns;
            state.pwm_period_ns = period_ns;
            state.ops.push(HalOp::PwmConfigure { duty_ns, period_ns });
        }
    }

    fn enable(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.pwm_enabled = true;
            state.ops.push(HalOp::PwmEnable);
        }
    }

    fn disable(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.pwm_enabled = false;
            state.ops.push(HalOp::PwmDisable);
        }
    }

    fn period(&self) -> u64 {
        self.state.read().map(|s| s.pwm_period_ns).unwrap_or(0)
    }

    fn set_period(&mut self, period_ns: u64) {
        if let Ok(mut state) = self.state.write() {
            state.pwm_period_ns = period_ns;
            state.ops.push(HalOp::PwmSetPeriod(period_ns));
        }
    }

    fn set_polarity(&mut self, polarity: Polarity) {
        if let Ok(mut state) = self.state.write() {
            state.pwm_polarity = polarity;
            state.ops.push(HalOp::PwmSetPolarity(polarity));
        }
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for MockPwm {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.write() {
            state.pwm_claimed = false;
            state.released_pwms += 1;
            state.ops.push(HalOp::PwmRelease);
        }
    }
}
