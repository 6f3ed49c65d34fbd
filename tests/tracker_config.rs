use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use pan_tracker::config::{ActuatorKind, CameraKind, TrackerConfig};
use pan_tracker::frame::Rotation;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PAN_TRACKER_CONFIG",
        "PAN_TRACKER_CAMERA",
        "PAN_TRACKER_HARDWARE",
        "PAN_TRACKER_ACTUATOR",
        "PAN_TRACKER_MIN_AREA",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        fps_report_frames = 500

        [camera]
        device = "/dev/video2"
        kind = "module"
        width = 640
        height = 480
        framerate = 30
        rotation = 180
        hflip = true

        [detection]
        min_area = 150
        threshold_sensitivity = 30

        [watchdog]
        brightness_floor = 400000
        black_duration_ms = 2500

        [actuator]
        kind = "servo"
        hardware = "raspberrypi.local:8888"
        home_position = 150

        [actuator.servo]
        pin = 12
        sweep_delay_ms = 20
        "#,
    );

    std::env::set_var("PAN_TRACKER_CONFIG", file.path());
    std::env::set_var("PAN_TRACKER_CAMERA", "stub://static");
    std::env::set_var("PAN_TRACKER_MIN_AREA", "300");

    let cfg = TrackerConfig::load().expect("load config");

    assert_eq!(cfg.camera.device, "stub://static");
    assert_eq!(cfg.camera.kind, CameraKind::Module);
    assert_eq!(cfg.camera.warmup, Duration::from_secs(2));
    assert_eq!((cfg.camera.width, cfg.camera.height), (640, 480));
    assert_eq!(cfg.camera.framerate, 30);
    assert_eq!(cfg.camera.orientation.rotation, Rotation::Half);
    assert!(cfg.camera.orientation.hflip);
    assert!(!cfg.camera.orientation.vflip);
    assert_eq!(cfg.detection.min_area, 300);
    assert_eq!(cfg.detection.threshold_sensitivity, 30);
    assert_eq!(cfg.detection.blur_size, 10);
    assert_eq!(cfg.watchdog.brightness_floor, 400_000);
    assert_eq!(cfg.watchdog.black_duration, Duration::from_millis(2500));
    assert_eq!(cfg.actuator.kind, ActuatorKind::Servo);
    assert_eq!(cfg.actuator.hardware, "raspberrypi.local:8888");
    assert_eq!(cfg.actuator.home_position, 150);
    assert_eq!(cfg.actuator.servo.pin, 12);
    assert_eq!(cfg.actuator.servo.sweep_delay, Duration::from_millis(20));
    assert_eq!(cfg.fps_report_frames, 500);

    clear_env();
}

#[test]
fn env_selects_stepper_hardware_without_a_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PAN_TRACKER_ACTUATOR", "stepper");
    std::env::set_var("PAN_TRACKER_HARDWARE", "127.0.0.1:8888");

    let cfg = TrackerConfig::load().expect("load config");
    assert_eq!(cfg.actuator.kind, ActuatorKind::Stepper);
    assert_eq!(cfg.actuator.hardware, "127.0.0.1:8888");
    assert_eq!(cfg.actuator.stepper.dir_pin, 17);
    assert_eq!(cfg.actuator.stepper.step_pin, 27);
    assert_eq!(cfg.actuator.stepper.ramp.steps().len(), 8);
    assert_eq!(cfg.camera.device, "stub://scene");

    clear_env();
}

#[test]
fn rejects_bad_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PAN_TRACKER_MIN_AREA", "lots");
    assert!(TrackerConfig::load().is_err());
    clear_env();

    std::env::set_var("PAN_TRACKER_ACTUATOR", "galvo");
    assert!(TrackerConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_invalid_files() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let unknown_key = write_config("[detection]\nsensitivity = 3\n");
    assert!(TrackerConfig::load_from(Some(unknown_key.path())).is_err());

    let descending_ramp = write_config("[actuator.stepper]\nramp = [[500, 10], [250, 10]]\n");
    let err = TrackerConfig::load_from(Some(descending_ramp.path())).unwrap_err();
    assert!(err.to_string().contains("ascending"));

    let same_pins = write_config("[actuator.stepper]\ndir_pin = 4\nstep_pin = 4\n");
    assert!(TrackerConfig::load_from(Some(same_pins.path())).is_err());

    let zero_size = write_config("[camera]\nwidth = 0\n");
    assert!(TrackerConfig::load_from(Some(zero_size.path())).is_err());

    let missing = std::env::temp_dir().join("pan-tracker-missing-config.toml");
    let err = TrackerConfig::load_from(Some(missing.as_path())).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
