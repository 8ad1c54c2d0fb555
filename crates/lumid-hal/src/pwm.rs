//! PWM channel access via the sysfs PWM interface.

use crate::HalError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Output polarity of a PWM channel.
///
/// `Inversed` (the sysfs spelling) means the duty cycle describes the
/// low portion of the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Normal,
    Inversed,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::Normal => "normal",
            Polarity::Inversed => "inversed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "normal" => Some(Polarity::Normal),
            "inversed" => Some(Polarity::Inversed),
            _ => None,
        }
    }

    /// Map the raw polarity flag used by legacy board descriptions.
    pub fn from_raw(raw: u32) -> Self {
        if raw == 0 { Polarity::Normal } else { Polarity::Inversed }
    }
}

/// An exclusively owned PWM channel.
///
/// Channels are claimed through [`crate::Hal::claim_pwm`] and released when
/// the handle is dropped. As with GPIO lines, writes after a successful
/// claim log and continue on error.
pub trait PwmChannel: Send + std::fmt::Debug {
    /// Set duty cycle and period, both in nanoseconds.
    fn configure(&mut self, duty_ns: u64, period_ns: u64);

    /// Start the output.
    fn enable(&mut self);

    /// Stop the output.
    fn disable(&mut self);

    /// The currently configured period in nanoseconds, 0 if never set.
    fn period(&self) -> u64;

    /// Change the period without touching the duty cycle.
    fn set_period(&mut self, period_ns: u64);

    fn set_polarity(&mut self, polarity: Polarity);

    /// The label the channel was claimed with.
    fn label(&self) -> &str;
}

/// A PWM channel exported through `/sys/class/pwm/pwmchip<N>`.
#[derive(Debug)]
pub struct SysfsPwm {
    chip: u32,
    index: u32,
    label: String,
    chip_dir: PathBuf,
    dir: PathBuf,
    period_ns: u64,
}

impl SysfsPwm {
    /// Export the channel and take ownership of it.
    ///
    /// A missing `pwmchip<N>` directory means the controller has not been
    /// registered yet and is reported as [`HalError::ProbeDeferred`] so the
    /// caller can retry later. An already-exported channel is [`HalError::Busy`].
    pub(crate) fn claim(root: &Path, chip: u32, index: u32, label: &str) -> Result<Self, HalError> {
        let chip_dir = root.join(format!("pwmchip{chip}"));
        if !chip_dir.exists() {
            return Err(HalError::ProbeDeferred(format!("pwmchip{chip}")));
        }

        let dir = chip_dir.join(format!("pwm{index}"));
        if dir.exists() {
            return Err(HalError::Busy(format!("pwmchip{chip}/pwm{index}")));
        }

        if let Err(e) = fs::write(chip_dir.join("export"), index.to_string()) {
            if e.kind() == ErrorKind::ResourceBusy {
                return Err(HalError::Busy(format!("pwmchip{chip}/pwm{index}")));
            }
            return Err(e.into());
        }

        if !dir.exists() {
            return Err(HalError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("pwmchip{chip}/pwm{index} did not appear after export"),
            )));
        }

        let period_ns = read_u64(&dir.join("period"));
        tracing::debug!("claimed pwmchip{}/pwm{} as {}", chip, index, label);

        Ok(Self {
            chip,
            index,
            label: label.to_string(),
            chip_dir,
            dir,
            period_ns,
        })
    }
}

impl PwmChannel for SysfsPwm {
    fn configure(&mut self, duty_ns: u64, period_ns: u64) {
        // period before duty so the kernel never sees duty > period
        write_attr(&self.dir.join("period"), &period_ns.to_string());
        write_attr(&self.dir.join("duty_cycle"), &duty_ns.to_string());
        self.period_ns = period_ns;
        tracing::trace!("pwm {} <- {}ns / {}ns", self.label, duty_ns, period_ns);
    }

    fn enable(&mut self) {
        write_attr(&self.dir.join("enable"), "1");
    }

    fn disable(&mut self) {
        write_attr(&self.dir.join("enable"), "0");
    }

    fn period(&self) -> u64 {
        self.period_ns
    }

    fn set_period(&mut self, period_ns: u64) {
        write_attr(&self.dir.join("period"), &period_ns.to_string());
        self.period_ns = period_ns;
    }

    fn set_polarity(&mut self, polarity: Polarity) {
        write_attr(&self.dir.join("polarity"), polarity.as_str());
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for SysfsPwm {
    fn drop(&mut self) {
        // quiesce before handing the channel back
        write_attr(&self.dir.join("enable"), "0");
        if let Err(e) = fs::write(self.chip_dir.join("unexport"), self.index.to_string()) {
            tracing::warn!("failed to unexport pwmchip{}/pwm{}: {}", self.chip, self.index, e);
        }
    }
}

fn write_attr(path: &Path, value: &str) {
    if let Err(e) = fs::write(path, value) {
        tracing::warn!("pwm write {} <- {} failed: {}", path.display(), value, e);
    }
}

fn read_u64(path: &Path) -> u64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0)
}
