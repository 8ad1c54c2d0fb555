//! Optional platform callbacks around the backlight lifecycle.

/// Runs before any hardware is claimed; an `Err` aborts the attach.
pub type SetupHook = Box<dyn FnMut() -> Result<(), String> + Send>;

/// Sees every brightness about to be programmed and may adjust it.
pub type NotifyHook = Box<dyn FnMut(u32) -> u32 + Send>;

/// Runs after a brightness has been programmed.
pub type NotifyAfterHook = Box<dyn FnMut(u32) + Send>;

/// Decides whether a framebuffer blank event is for this backlight.
pub type CheckFbHook = Box<dyn FnMut(u32) -> bool + Send>;

/// Runs when the device is detached, and on attach failures after the
/// setup hook has already run.
pub type ExitHook = Box<dyn FnMut() + Send>;

/// Platform hook points, all optional.
///
/// Boards that need extra sequencing around the common path (for example
/// switching a panel supply rail, or remapping brightness through a
/// measured curve) install closures here; everything else uses
/// `BacklightHooks::default()`.
#[derive(Default)]
pub struct BacklightHooks {
    pub setup: Option<SetupHook>,
    pub notify: Option<NotifyHook>,
    pub notify_after: Option<NotifyAfterHook>,
    pub check_fb: Option<CheckFbHook>,
    pub exit: Option<ExitHook>,
}

impl std::fmt::Debug for BacklightHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BacklightHooks")
            .field("setup", &self.setup.is_some())
            .field("notify", &self.notify.is_some())
            .field("notify_after", &self.notify_after.is_some())
            .field("check_fb", &self.check_fb.is_some())
            .field("exit", &self.exit.is_some())
            .finish()
    }
}
