//! Registry of attached backlight devices.
//!
//! The daemon owns one registry and routes control events, suspend and
//! shutdown through it. Framebuffer blank events fan out to every
//! device; each one decides through its check hook whether the event
//! concerns it.

use lumid_backlight::{BacklightDevice, BacklightError, BacklightHooks, BlankMode};
use lumid_config::BoardConfig;
use lumid_hal::Hal;
use tracing::info;

#[derive(Default)]
pub struct Registry {
    devices: Vec<BacklightDevice>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the board described by `config` and take ownership of it.
    pub fn attach_board(
        &mut self,
        hal: &mut dyn Hal,
        config: &BoardConfig,
        hooks: BacklightHooks,
    ) -> Result<(), BacklightError> {
        let device = BacklightDevice::attach(hal, config, hooks)?;
        self.devices.push(device);
        Ok(())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut BacklightDevice> {
        self.devices.iter_mut().find(|d| d.name() == name)
    }

    /// Deliver a framebuffer blank event to every device that claims it.
    pub fn blank_framebuffer(&mut self, fb: u32, mode: BlankMode) {
        for device in &mut self.devices {
            device.handle_fb_blank(fb, mode);
        }
    }

    pub fn suspend_all(&mut self) {
        info!("suspending {} backlight(s)", self.devices.len());
        for device in &mut self.devices {
            device.suspend();
        }
    }

    pub fn resume_all(&mut self) {
        info!("resuming {} backlight(s)", self.devices.len());
        for device in &mut self.devices {
            device.resume();
        }
    }

    /// Power everything off without running any hooks, for host shutdown.
    pub fn shutdown_all(&mut self) {
        for device in &mut self.devices {
            device.shutdown();
        }
    }

    /// Detach every device, releasing the underlying hardware.
    pub fn teardown(&mut self) {
        for device in self.devices.drain(..) {
            device.detach();
        }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
