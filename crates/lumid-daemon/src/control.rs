//! Runtime control files for one backlight.
//!
//! The daemon exposes three files under `/run/lumid/<name>/`:
//! `brightness` (a value on the device scale), `bl_power` (a blank level,
//! 0 for on and 4 for full power-down) and `fb_blank` (a framebuffer
//! index and a blank level, whitespace separated). A background thread
//! polls them and turns content changes into [`ControlEvent`]s.

use lumid_backlight::{BacklightProperties, BlankMode};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// A change requested through the control files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    Brightness(u32),
    Power(BlankMode),
    FbBlank { fb: u32, mode: BlankMode },
}

/// What the control files contained at the last poll.
#[derive(Debug, Default, PartialEq, Eq)]
struct Snapshot {
    brightness: Option<String>,
    bl_power: Option<String>,
    fb_blank: Option<String>,
}

impl Snapshot {
    fn read(dir: &Path) -> Self {
        let slurp = |name: &str| fs::read_to_string(dir.join(name)).ok();
        Self {
            brightness: slurp("brightness"),
            bl_power: slurp("bl_power"),
            fb_blank: slurp("fb_blank"),
        }
    }
}

/// Watches one device's control directory.
pub struct ControlWatcher {
    dir: PathBuf,
    tx: Sender<ControlEvent>,
    rx: Receiver<ControlEvent>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ControlWatcher {
    pub fn new(dir: PathBuf) -> Self {
        let (tx, rx) = channel();
        Self {
            dir,
            tx,
            rx,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Create the control directory and write the device's current state
    /// into the files, so readers see it and the first poll is quiet.
    pub fn seed(&self, props: &BacklightProperties) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join("brightness"), props.brightness.to_string())?;
        fs::write(self.dir.join("bl_power"), props.power.as_level().to_string())?;
        fs::write(
            self.dir.join("fb_blank"),
            format!("0 {}", props.fb_blank.as_level()),
        )?;
        Ok(())
    }

    /// Start the polling thread.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let dir = self.dir.clone();
        let tx = self.tx.clone();
        let running = Arc::clone(&self.running);
        // baseline is taken here so writes racing the spawn still count
        // as changes
        let mut last = Snapshot::read(&dir);

        self.handle = Some(thread::spawn(move || {
            tracing::info!("watching control files in {}", dir.display());

            while running.load(Ordering::SeqCst) {
                thread::sleep(POLL_INTERVAL);
                let current = Snapshot::read(&dir);

                if current.brightness != last.brightness {
                    if let Some(content) = current.brightness.as_deref() {
                        match parse_brightness(content) {
                            Some(value) => {
                                let _ = tx.send(ControlEvent::Brightness(value));
                            }
                            None => tracing::warn!("unreadable brightness '{}'", content.trim()),
                        }
                    }
                }

                if current.bl_power != last.bl_power {
                    if let Some(content) = current.bl_power.as_deref() {
                        match parse_power(content) {
                            Some(mode) => {
                                let _ = tx.send(ControlEvent::Power(mode));
                            }
                            None => tracing::warn!("unreadable bl_power '{}'", content.trim()),
                        }
                    }
                }

                if current.fb_blank != last.fb_blank {
                    if let Some(content) = current.fb_blank.as_deref() {
                        match parse_fb_blank(content) {
                            Some((fb, mode)) => {
                                let _ = tx.send(ControlEvent::FbBlank { fb, mode });
                            }
                            None => tracing::warn!("unreadable fb_blank '{}'", content.trim()),
                        }
                    }
                }

                last = current;
            }
        }));
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<ControlEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for an event with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ControlEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Stop the polling thread and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ControlWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn parse_brightness(content: &str) -> Option<u32> {
    content.trim().parse().ok()
}

fn parse_power(content: &str) -> Option<BlankMode> {
    content.trim().parse().ok().and_then(BlankMode::from_level)
}

fn parse_fb_blank(content: &str) -> Option<(u32, BlankMode)> {
    let mut fields = content.split_whitespace();
    let fb = fields.next()?.parse().ok()?;
    let mode = BlankMode::from_level(fields.next()?.parse().ok()?)?;
    if fields.next().is_some() {
        return None;
    }
    Some((fb, mode))
}
