use lumid_backlight::{BacklightDevice, BacklightError, BacklightHooks, BlankMode};
use lumid_config::{BoardConfig, legacy};
use lumid_hal::mock::{HalOp, MockHal};
use lumid_hal::{HalError, Polarity};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

const PERIOD: u64 = 1_000_000;

fn board() -> BoardConfig {
    BoardConfig {
        name: "panel0".to_string(),
        period_ns: PERIOD,
        default_brightness: 150,
        panel_power_gpio: Some(40),
        backlight_enable_gpio: Some(68),
        ..BoardConfig::default()
    }
}

fn duty_for(brightness: u64) -> u64 {
    brightness * PERIOD / 255
}

#[test]
fn test_attach_claims_and_programs_in_order() {
    let mut hal = MockHal::new();
    let device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();

    assert_eq!(
        hal.ops(),
        vec![
            HalOp::GpioClaim(40, "lcd_power".to_string()),
            HalOp::GpioDirection(40, true),
            HalOp::GpioClaim(68, "bl_enable".to_string()),
            HalOp::GpioDirection(68, false),
            HalOp::PwmClaim(0, 0),
            HalOp::PwmSetPeriod(PERIOD),
            HalOp::PwmSetPolarity(Polarity::Normal),
            HalOp::PwmConfigure { duty_ns: duty_for(150), period_ns: PERIOD },
            HalOp::GpioSet(68, true),
            HalOp::PwmEnable,
        ]
    );
    assert!(device.is_powered());
    assert_eq!(device.brightness(), 150);
}

#[test]
fn test_attach_with_zero_brightness_never_powers_on() {
    let mut hal = MockHal::new();
    let config = BoardConfig {
        default_brightness: 0,
        ..board()
    };
    let device = BacklightDevice::attach(&mut hal, &config, BacklightHooks::default()).unwrap();

    assert!(!device.is_powered());
    assert!(!hal.pwm_enabled());
    assert!(!hal.ops().iter().any(|op| matches!(op, HalOp::PwmEnable)));
    // the enable line was configured low and never raised
    assert_eq!(hal.gpio_value(68), Some(false));
}

#[test]
fn test_attach_prefers_the_channel_period() {
    let mut hal = MockHal::with_period(2_000_000);
    let device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();

    assert!(!hal.ops().iter().any(|op| matches!(op, HalOp::PwmSetPeriod(_))));
    // full scale maps onto the channel's own period
    drop(device);
    assert_eq!(hal.period_ns(), 2_000_000);
}

#[test]
fn test_attach_clamps_default_brightness() {
    let mut hal = MockHal::new();
    let config = BoardConfig {
        default_brightness: 300,
        ..board()
    };
    let device = BacklightDevice::attach(&mut hal, &config, BacklightHooks::default()).unwrap();

    assert_eq!(device.brightness(), 255);
    assert_eq!(hal.duty_ns(), PERIOD);
}

#[test]
fn test_legacy_board_with_oversized_floor_attaches_cleanly() {
    let config = legacy::parse_str(
        "pwm_freq = 1000\n\
         lth_brightness = 300\n\
         dft_brightness = 150\n",
    );
    assert_eq!(config.lth_brightness, 255);

    let mut hal = MockHal::new();
    let mut device = BacklightDevice::attach(&mut hal, &config, BacklightHooks::default()).unwrap();

    // floor 255 * 3921 = 999_855, brightness 150 adds 150 * 145 / 255
    assert!(device.is_powered());
    assert_eq!(hal.duty_ns(), 999_940);

    device.set_brightness(10).unwrap();
    assert_eq!(hal.duty_ns(), 999_860);

    // a zero default leaves the output off, the first write must be safe too
    let off_config = legacy::parse_str(
        "pwm_freq = 1000\n\
         lth_brightness = 300\n\
         dft_brightness = 0\n",
    );
    let mut hal = MockHal::new();
    let mut device =
        BacklightDevice::attach(&mut hal, &off_config, BacklightHooks::default()).unwrap();
    assert!(!device.is_powered());

    device.set_brightness(10).unwrap();
    assert!(device.is_powered());
    assert_eq!(hal.duty_ns(), 999_860);
    assert!(hal.duty_ns() <= hal.period_ns());
}

#[test]
fn test_deferred_pwm_releases_gpios_and_can_retry() {
    let mut hal = MockHal::new();
    hal.fail_next_pwm(HalError::ProbeDeferred("pwmchip0".to_string()));
    let exits = Arc::new(AtomicU32::new(0));
    let exits_seen = Arc::clone(&exits);
    let hooks = BacklightHooks {
        exit: Some(Box::new(move || {
            exits_seen.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    let err = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap_err();
    assert!(err.is_deferred());
    // both gpio lines went back, and the exit hook ran
    assert_eq!(hal.released_counts(), (2, 0));
    assert_eq!(exits.load(Ordering::SeqCst), 1);

    // the controller shows up later and the same attach succeeds
    let device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();
    assert!(device.is_powered());
}

#[test]
fn test_busy_gpio_is_not_deferred() {
    let mut hal = MockHal::new();
    hal.fail_next_gpio(HalError::Busy("gpio40".to_string()));

    let err = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap_err();
    assert!(!err.is_deferred());
    assert!(matches!(err, BacklightError::Hal(HalError::Busy(_))));
}

#[test]
fn test_setup_hook_failure_aborts_before_claiming() {
    let mut hal = MockHal::new();
    let exits = Arc::new(AtomicU32::new(0));
    let exits_seen = Arc::clone(&exits);
    let hooks = BacklightHooks {
        setup: Some(Box::new(|| Err("panel rail down".to_string()))),
        exit: Some(Box::new(move || {
            exits_seen.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    };

    let err = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap_err();
    assert!(matches!(err, BacklightError::Setup(_)));
    assert!(hal.ops().is_empty());
    // setup never succeeded, so exit must not run
    assert_eq!(exits.load(Ordering::SeqCst), 0);
}

#[test]
fn test_brightness_change_only_reconfigures() {
    let mut hal = MockHal::new();
    let mut device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();
    let before = hal.ops().len();

    device.set_brightness(200).unwrap();

    let ops = hal.ops();
    assert_eq!(
        &ops[before..],
        &[HalOp::PwmConfigure { duty_ns: duty_for(200), period_ns: PERIOD }]
    );
    assert!(device.is_powered());
}

#[test]
fn test_brightness_zero_runs_the_power_off_sequence() {
    let mut hal = MockHal::new();
    let mut device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();
    let before = hal.ops().len();

    device.set_brightness(0).unwrap();

    let ops = hal.ops();
    assert_eq!(
        &ops[before..],
        &[
            HalOp::PwmConfigure { duty_ns: 0, period_ns: PERIOD },
            HalOp::PwmDisable,
            HalOp::GpioSet(68, false),
        ]
    );
    assert!(!device.is_powered());

    // and back on: configure, enable line, pwm, in that order
    let before = hal.ops().len();
    device.set_brightness(150).unwrap();
    let ops = hal.ops();
    assert_eq!(
        &ops[before..],
        &[
            HalOp::PwmConfigure { duty_ns: duty_for(150), period_ns: PERIOD },
            HalOp::GpioSet(68, true),
            HalOp::PwmEnable,
        ]
    );
}

#[test]
fn test_out_of_range_brightness_is_rejected() {
    let mut hal = MockHal::new();
    let mut device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();
    let before = hal.ops().len();

    let err = device.set_brightness(300).unwrap_err();
    assert!(matches!(
        err,
        BacklightError::OutOfRange { requested: 300, max: 255 }
    ));
    assert_eq!(device.brightness(), 150);
    assert_eq!(hal.ops().len(), before);
}

#[test]
fn test_power_state_folds_brightness_to_zero() {
    let mut hal = MockHal::new();
    let mut device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();

    device.set_power(BlankMode::Powerdown);
    assert!(!device.is_powered());
    // the request survives the blank
    assert_eq!(device.brightness(), 150);

    device.set_power(BlankMode::Unblank);
    assert!(device.is_powered());
    assert_eq!(hal.duty_ns(), duty_for(150));
}

#[test]
fn test_fb_blank_checks_ownership() {
    let mut hal = MockHal::new();
    let hooks = BacklightHooks {
        check_fb: Some(Box::new(|fb| fb == 1)),
        ..Default::default()
    };
    let mut device = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap();

    // not our framebuffer: nothing happens
    device.handle_fb_blank(0, BlankMode::Powerdown);
    assert!(device.is_powered());

    device.handle_fb_blank(1, BlankMode::Powerdown);
    assert!(!device.is_powered());

    device.handle_fb_blank(1, BlankMode::Unblank);
    assert!(device.is_powered());
}

#[test]
fn test_fb_blank_without_check_hook_applies_to_all() {
    let mut hal = MockHal::new();
    let mut device = BacklightDevice::attach(&mut hal, &board(), BacklightHooks::default()).unwrap();

    device.handle_fb_blank(7, BlankMode::VsyncSuspend);
    assert!(!device.is_powered());
}

#[test]
fn test_notify_hook_adjusts_brightness() {
    let mut hal = MockHal::new();
    let after = Arc::new(Mutex::new(Vec::new()));
    let after_log = Arc::clone(&after);
    let hooks = BacklightHooks {
        notify: Some(Box::new(|b| b.min(100))),
        notify_after: Some(Box::new(move |b| {
            after_log.lock().unwrap().push(b);
        })),
        ..Default::default()
    };
    let mut device = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap();

    device.set_brightness(200).unwrap();
    assert_eq!(hal.duty_ns(), duty_for(100));
    // the after hook sees the adjusted values: capped attach, capped set
    assert_eq!(*after.lock().unwrap(), vec![100, 100]);
}

#[test]
fn test_suspend_resume_cycle() {
    let mut hal = MockHal::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_log = Arc::clone(&seen);
    let hooks = BacklightHooks {
        notify: Some(Box::new(move |b| {
            seen_log.lock().unwrap().push(b);
            b
        })),
        ..Default::default()
    };
    let mut device = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap();

    device.suspend();
    assert!(!device.is_powered());
    assert_eq!(hal.duty_ns(), 0);
    // attach saw 150, suspend announced 0
    assert_eq!(*seen.lock().unwrap(), vec![150, 0]);

    device.resume();
    assert!(device.is_powered());
    assert_eq!(hal.duty_ns(), duty_for(150));
    assert_eq!(*seen.lock().unwrap(), vec![150, 0, 150]);
}

#[test]
fn test_shutdown_powers_off_without_hooks() {
    let mut hal = MockHal::new();
    let notifies = Arc::new(AtomicU32::new(0));
    let notifies_seen = Arc::clone(&notifies);
    let hooks = BacklightHooks {
        notify: Some(Box::new(move |b| {
            notifies_seen.fetch_add(1, Ordering::SeqCst);
            b
        })),
        ..Default::default()
    };
    let mut device = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap();
    assert_eq!(notifies.load(Ordering::SeqCst), 1);

    device.shutdown();
    assert!(!device.is_powered());
    assert!(!hal.pwm_enabled());
    assert_eq!(notifies.load(Ordering::SeqCst), 1);
}

#[test]
fn test_detach_tears_down_in_reverse_order() {
    let mut hal = MockHal::new();
    let exits = Arc::new(AtomicU32::new(0));
    let exits_seen = Arc::clone(&exits);
    let hooks = BacklightHooks {
        exit: Some(Box::new(move || {
            exits_seen.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    };
    let device = BacklightDevice::attach(&mut hal, &board(), hooks).unwrap();
    let before = hal.ops().len();

    device.detach();

    let ops = hal.ops();
    assert_eq!(
        &ops[before..],
        &[
            HalOp::PwmConfigure { duty_ns: 0, period_ns: PERIOD },
            HalOp::PwmDisable,
            HalOp::GpioSet(68, false),
            HalOp::PwmRelease,
            HalOp::GpioRelease(68),
            HalOp::GpioRelease(40),
        ]
    );
    assert_eq!(exits.load(Ordering::SeqCst), 1);
    assert_eq!(hal.released_counts(), (2, 1));
}

#[test]
fn test_attach_without_gpios() {
    let mut hal = MockHal::new();
    let config = BoardConfig {
        panel_power_gpio: None,
        backlight_enable_gpio: None,
        ..board()
    };
    let mut device = BacklightDevice::attach(&mut hal, &config, BacklightHooks::default()).unwrap();

    assert!(device.is_powered());
    assert!(!hal.ops().iter().any(|op| matches!(op, HalOp::GpioClaim(..))));

    device.set_brightness(0).unwrap();
    assert!(!hal.pwm_enabled());
}
