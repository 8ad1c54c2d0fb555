//! lumid - PWM backlight daemon.
//!
//! Brings up the backlight described by the board configuration and keeps
//! it in sync with the outside world until told to stop.
//!
//! Lifecycle:
//! 1. Load the board description (TOML, legacy file, or defaults)
//! 2. Claim the PWM channel and GPIO lines, retrying while the PWM
//!    controller has not shown up yet
//! 3. Serve brightness, power and framebuffer blank requests from the
//!    control files under /run/lumid/<name>/
//! 4. On SIGUSR1/SIGUSR2 suspend and resume, on SIGTERM/SIGINT tear
//!    everything down and release the hardware

mod control;
mod registry;

use anyhow::{Context, Result};
use control::{ControlEvent, ControlWatcher};
use lumid_backlight::BacklightHooks;
use lumid_config::BoardConfig;
use lumid_hal::{Hal, SysfsHal};
use registry::Registry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const RUN_DIR: &str = "/run/lumid";
const ATTACH_RETRIES: u32 = 30;
const RETRY_DELAY: Duration = Duration::from_millis(500);
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

const USAGE: &str = "\
lumid - PWM backlight daemon

Usage: lumid [OPTIONS]

Options:
  -c, --config <PATH>  Board description (default: /etc/lumid/board.toml,
                       falling back to /etc/lumid/board.conf)
  -h, --help           Show this help

Runtime control, per attached board:
  /run/lumid/<name>/brightness  requested brightness
  /run/lumid/<name>/bl_power    blank level, 0 = on, 4 = off
  /run/lumid/<name>/fb_blank    framebuffer index and blank level

Signals: SIGUSR1 suspends, SIGUSR2 resumes, SIGTERM exits.";

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);
static SUSPEND_REQUESTED: AtomicBool = AtomicBool::new(false);
static RESUME_REQUESTED: AtomicBool = AtomicBool::new(false);

fn main() -> Result<()> {
    let Some(options) = Options::parse(std::env::args().skip(1))? else {
        return Ok(());
    };

    setup_logging();
    info!("lumid {} starting", env!("CARGO_PKG_VERSION"));

    setup_signal_handlers()?;

    let config = match &options.config {
        Some(path) => BoardConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => lumid_config::load_default(),
    };

    let mut hal = SysfsHal::new();
    let mut registry = Registry::new();
    attach_with_retry(&mut registry, &mut hal, &config)?;

    let mut watcher = ControlWatcher::new(Path::new(RUN_DIR).join(&config.name));
    if let Some(device) = registry.get_mut(&config.name) {
        let props = *device.properties();
        if let Err(e) = watcher.seed(&props) {
            warn!("failed to populate control files: {}", e);
        }
    }
    watcher.start();

    main_loop(&mut registry, &watcher, &config.name);

    watcher.stop();
    registry.teardown();
    info!("lumid stopped");
    Ok(())
}

struct Options {
    config: Option<PathBuf>,
}

impl Options {
    /// Parse command line arguments. `Ok(None)` means help was printed
    /// and the process should exit.
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Option<Self>> {
        let mut config = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    let path = args.next().context("--config requires a path")?;
                    config = Some(PathBuf::from(path));
                }
                "--help" | "-h" => {
                    println!("{USAGE}");
                    return Ok(None);
                }
                other => anyhow::bail!("unknown argument '{}', try --help", other),
            }
        }
        Ok(Some(Self { config }))
    }
}

/// Setup logging to the console
fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_ansi(false))
        .init();
}

/// Install handlers for shutdown and suspend/resume signals
fn setup_signal_handlers() -> Result<()> {
    use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

    let action = SigAction::new(
        SigHandler::Handler(handle_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );

    unsafe {
        sigaction(Signal::SIGTERM, &action)?;
        sigaction(Signal::SIGINT, &action)?;
        sigaction(Signal::SIGUSR1, &action)?;
        sigaction(Signal::SIGUSR2, &action)?;
    }

    Ok(())
}

/// Signal handler; nothing but flag stores here, the main loop acts on them
extern "C" fn handle_signal(sig: i32) {
    match sig {
        libc::SIGTERM | libc::SIGINT => SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst),
        libc::SIGUSR1 => SUSPEND_REQUESTED.store(true, Ordering::SeqCst),
        libc::SIGUSR2 => RESUME_REQUESTED.store(true, Ordering::SeqCst),
        _ => {}
    }
}

/// Attach the configured board, waiting out a PWM controller that has
/// not been registered yet. Anything other than deferral fails for good.
fn attach_with_retry(
    registry: &mut Registry,
    hal: &mut dyn Hal,
    config: &BoardConfig,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        match registry.attach_board(hal, config, BacklightHooks::default()) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_deferred() && attempt < ATTACH_RETRIES => {
                attempt += 1;
                debug!("waiting for hardware: {} ({}/{})", e, attempt, ATTACH_RETRIES);
                if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
                    anyhow::bail!("interrupted while waiting for the PWM controller");
                }
                thread::sleep(RETRY_DELAY);
            }
            Err(e) => return Err(e).context("failed to attach the backlight"),
        }
    }
}

/// Serve control events and signal requests until shutdown is requested
fn main_loop(registry: &mut Registry, watcher: &ControlWatcher, device: &str) {
    info!("ready");
    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("shutdown requested");
            return;
        }
        if SUSPEND_REQUESTED.swap(false, Ordering::SeqCst) {
            registry.suspend_all();
        }
        if RESUME_REQUESTED.swap(false, Ordering::SeqCst) {
            registry.resume_all();
        }
        if let Some(event) = watcher.recv_timeout(EVENT_TIMEOUT) {
            dispatch(registry, device, event);
            // one poll tick can change several files at once
            while let Some(event) = watcher.try_recv() {
                dispatch(registry, device, event);
            }
        }
    }
}

fn dispatch(registry: &mut Registry, device: &str, event: ControlEvent) {
    debug!("control event: {:?}", event);
    match event {
        ControlEvent::Brightness(value) => {
            if let Some(dev) = registry.get_mut(device) {
                if let Err(e) = dev.set_brightness(value) {
                    warn!("{}", e);
                }
            }
        }
        ControlEvent::Power(mode) => {
            if let Some(dev) = registry.get_mut(device) {
                dev.set_power(mode);
            }
        }
        // blank events are per framebuffer, not per device
        ControlEvent::FbBlank { fb, mode } => registry.blank_framebuffer(fb, mode),
    }
}
