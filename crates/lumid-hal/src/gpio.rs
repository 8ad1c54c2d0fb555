//! GPIO line access via the sysfs GPIO interface.

use crate::HalError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// An exclusively owned output line.
///
/// Lines are claimed through [`crate::Hal::claim_gpio`] and released when the
/// handle is dropped. Writes after a successful claim are treated as
/// infallible: the sysfs implementation logs and continues on error, since
/// the power-sequencing path has no failure mode once attach succeeded.
pub trait GpioLine: Send + std::fmt::Debug {
    /// Configure the line as an output driving `initial`.
    fn set_direction_output(&mut self, initial: bool);

    /// Drive the line high (`true`) or low (`false`).
    fn set_value(&mut self, value: bool);

    /// The label the line was claimed with.
    fn label(&self) -> &str;
}

/// A GPIO line exported through `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsGpio {
    id: u32,
    label: String,
    dir: PathBuf,
    root: PathBuf,
}

impl SysfsGpio {
    /// Export the line and take ownership of it.
    ///
    /// A line whose `gpio<N>` directory already exists is owned by someone
    /// else and is reported as [`HalError::Busy`].
    pub(crate) fn claim(root: &Path, id: u32, label: &str) -> Result<Self, HalError> {
        let dir = root.join(format!("gpio{id}"));
        if dir.exists() {
            return Err(HalError::Busy(format!("gpio{id}")));
        }

        if let Err(e) = fs::write(root.join("export"), id.to_string()) {
            if e.kind() == ErrorKind::ResourceBusy {
                return Err(HalError::Busy(format!("gpio{id}")));
            }
            return Err(e.into());
        }

        if !dir.exists() {
            return Err(HalError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("gpio{id} did not appear after export"),
            )));
        }

        tracing::debug!("claimed gpio{} as {}", id, label);

        Ok(Self {
            id,
            label: label.to_string(),
            dir,
            root: root.to_path_buf(),
        })
    }
}

impl GpioLine for SysfsGpio {
    fn set_direction_output(&mut self, initial: bool) {
        // "high"/"low" set direction and initial level in one write
        write_attr(&self.dir.join("direction"), if initial { "high" } else { "low" });
    }

    fn set_value(&mut self, value: bool) {
        write_attr(&self.dir.join("value"), if value { "1" } else { "0" });
        tracing::trace!("gpio {} <- {}", self.label, value as u8);
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        if let Err(e) = fs::write(self.root.join("unexport"), self.id.to_string()) {
            tracing::warn!("failed to unexport gpio{}: {}", self.id, e);
        }
    }
}

fn write_attr(path: &Path, value: &str) {
    if let Err(e) = fs::write(path, value) {
        tracing::warn!("gpio write {} <- {} failed: {}", path.display(), value, e);
    }
}
