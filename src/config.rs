use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::actuator::ramp::{RampSegment, RampTable};
use crate::frame::{Orientation, Rotation};

const DEFAULT_CAMERA_DEVICE: &str = "stub://scene";
const DEFAULT_CAMERA_WIDTH: u32 = 320;
const DEFAULT_CAMERA_HEIGHT: u32 = 240;
const DEFAULT_CAMERA_FRAMERATE: u32 = 35;
const DEFAULT_RESTART_DELAY_MS: u64 = 4_000;
const DEFAULT_FIRST_FRAME_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MIN_AREA: u32 = 200;
const DEFAULT_THRESHOLD_SENSITIVITY: u8 = 25;
const DEFAULT_BLUR_SIZE: u32 = 10;
const DEFAULT_DILATE_ITERATIONS: u32 = 2;
const DEFAULT_BRIGHTNESS_FLOOR: u64 = 100_000;
const DEFAULT_BLACK_DURATION_MS: u64 = 3_000;
const DEFAULT_BASE_OFFSET: i32 = 105;
const DEFAULT_FIELD_OF_VIEW: f64 = 90.0;
const DEFAULT_MIN_DEADBAND_PCT: f64 = 0.02;
const DEFAULT_MAX_DEADBAND_PCT: f64 = 0.75;
const DEFAULT_HARDWARE: &str = "stub://";
const DEFAULT_HOME_POSITION: i32 = 145;
const DEFAULT_MIN_POSITION: i32 = 105;
const DEFAULT_MAX_POSITION: i32 = 195;
const DEFAULT_IDLE_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_SERVO_PIN: u32 = 18;
const DEFAULT_SWEEP_DELAY_MS: u64 = 35;
const DEFAULT_PULSE_US_PER_UNIT: u32 = 10;
const DEFAULT_DIR_PIN: u32 = 17;
const DEFAULT_STEP_PIN: u32 = 27;
const DEFAULT_STEPS_PER_UNIT: u32 = 20;
const DEFAULT_FPS_REPORT_FRAMES: u64 = 1_000;

/// Servo pulse widths outside this window can drive a hobby servo into its end stops.
const SERVO_PULSE_RANGE_US: (u32, u32) = (500, 2_500);

// ----------------------------------------------------------------------------
// File layout (every key optional)
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TrackerConfigFile {
    fps_report_frames: Option<u64>,
    camera: Option<CameraConfigFile>,
    detection: Option<DetectionConfigFile>,
    watchdog: Option<WatchdogConfigFile>,
    mapper: Option<MapperConfigFile>,
    actuator: Option<ActuatorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    device: Option<String>,
    kind: Option<CameraKind>,
    width: Option<u32>,
    height: Option<u32>,
    framerate: Option<u32>,
    rotation: Option<u32>,
    hflip: Option<bool>,
    vflip: Option<bool>,
    warmup_ms: Option<u64>,
    restart_delay_ms: Option<u64>,
    first_frame_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct DetectionConfigFile {
    min_area: Option<u32>,
    threshold_sensitivity: Option<u8>,
    blur_size: Option<u32>,
    dilate_iterations: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct WatchdogConfigFile {
    brightness_floor: Option<u64>,
    black_duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct MapperConfigFile {
    base_offset: Option<i32>,
    field_of_view: Option<f64>,
    min_deadband_pct: Option<f64>,
    max_deadband_pct: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ActuatorConfigFile {
    kind: Option<ActuatorKind>,
    hardware: Option<String>,
    home_position: Option<i32>,
    min_position: Option<i32>,
    max_position: Option<i32>,
    idle_timeout_ms: Option<u64>,
    servo: Option<ServoConfigFile>,
    stepper: Option<StepperConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ServoConfigFile {
    pin: Option<u32>,
    sweep_delay_ms: Option<u64>,
    pulse_us_per_unit: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct StepperConfigFile {
    dir_pin: Option<u32>,
    step_pin: Option<u32>,
    steps_per_unit: Option<u32>,
    ramp: Option<Vec<[u32; 2]>>,
}

// ----------------------------------------------------------------------------
// Resolved configuration
// ----------------------------------------------------------------------------

/// Which kind of camera is attached. Both capture through the same device
/// interface; the kind only changes how long the sensor needs to settle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    #[default]
    Usb,
    Module,
}

impl CameraKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "usb" => Ok(CameraKind::Usb),
            "module" => Ok(CameraKind::Module),
            other => Err(anyhow!("unknown camera kind '{}' (usb|module)", other)),
        }
    }

    pub fn default_warmup(self) -> Duration {
        match self {
            CameraKind::Usb => Duration::from_secs(4),
            CameraKind::Module => Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    #[default]
    Servo,
    Stepper,
}

impl ActuatorKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "servo" => Ok(ActuatorKind::Servo),
            "stepper" => Ok(ActuatorKind::Stepper),
            other => Err(anyhow!("unknown actuator kind '{}' (servo|stepper)", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub camera: CameraSettings,
    pub detection: DetectionSettings,
    pub watchdog: WatchdogSettings,
    pub mapper: MapperSettings,
    pub actuator: ActuatorSettings,
    /// Log the processing rate every N frames (0 disables).
    pub fps_report_frames: u64,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// `stub://scene`, `stub://dark`, `stub://static`, or a V4L2 device path.
    pub device: String,
    pub kind: CameraKind,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub orientation: Orientation,
    pub warmup: Duration,
    pub restart_delay: Duration,
    pub first_frame_timeout: Duration,
}

impl CameraSettings {
    /// Switch the camera kind. A warm-up still at the old kind's default
    /// follows the new kind; an explicit one is kept.
    pub fn set_kind(&mut self, kind: CameraKind) {
        if self.warmup == self.kind.default_warmup() {
            self.warmup = kind.default_warmup();
        }
        self.kind = kind;
    }
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub min_area: u32,
    pub threshold_sensitivity: u8,
    pub blur_size: u32,
    pub dilate_iterations: u32,
}

#[derive(Debug, Clone)]
pub struct WatchdogSettings {
    /// Raw sum-of-pixels floor; resolution dependent.
    pub brightness_floor: u64,
    pub black_duration: Duration,
}

#[derive(Debug, Clone)]
pub struct MapperSettings {
    pub base_offset: i32,
    pub field_of_view: f64,
    /// Fractions of the frame width.
    pub min_deadband_pct: f64,
    pub max_deadband_pct: f64,
}

#[derive(Debug, Clone)]
pub struct ActuatorSettings {
    pub kind: ActuatorKind,
    /// `stub://` for simulated hardware, otherwise a pigpio daemon address.
    pub hardware: String,
    pub home_position: i32,
    pub min_position: i32,
    pub max_position: i32,
    pub idle_timeout: Duration,
    pub servo: ServoSettings,
    pub stepper: StepperSettings,
}

#[derive(Debug, Clone)]
pub struct ServoSettings {
    pub pin: u32,
    pub sweep_delay: Duration,
    pub pulse_us_per_unit: u32,
}

#[derive(Debug, Clone)]
pub struct StepperSettings {
    pub dir_pin: u32,
    pub step_pin: u32,
    pub steps_per_unit: u32,
    pub ramp: RampTable,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            kind: CameraKind::Usb,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            framerate: DEFAULT_CAMERA_FRAMERATE,
            orientation: Orientation::default(),
            warmup: CameraKind::Usb.default_warmup(),
            restart_delay: Duration::from_millis(DEFAULT_RESTART_DELAY_MS),
            first_frame_timeout: Duration::from_millis(DEFAULT_FIRST_FRAME_TIMEOUT_MS),
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            min_area: DEFAULT_MIN_AREA,
            threshold_sensitivity: DEFAULT_THRESHOLD_SENSITIVITY,
            blur_size: DEFAULT_BLUR_SIZE,
            dilate_iterations: DEFAULT_DILATE_ITERATIONS,
        }
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            brightness_floor: DEFAULT_BRIGHTNESS_FLOOR,
            black_duration: Duration::from_millis(DEFAULT_BLACK_DURATION_MS),
        }
    }
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self {
            base_offset: DEFAULT_BASE_OFFSET,
            field_of_view: DEFAULT_FIELD_OF_VIEW,
            min_deadband_pct: DEFAULT_MIN_DEADBAND_PCT,
            max_deadband_pct: DEFAULT_MAX_DEADBAND_PCT,
        }
    }
}

impl Default for ServoSettings {
    fn default() -> Self {
        Self {
            pin: DEFAULT_SERVO_PIN,
            sweep_delay: Duration::from_millis(DEFAULT_SWEEP_DELAY_MS),
            pulse_us_per_unit: DEFAULT_PULSE_US_PER_UNIT,
        }
    }
}

impl Default for StepperSettings {
    fn default() -> Self {
        Self {
            dir_pin: DEFAULT_DIR_PIN,
            step_pin: DEFAULT_STEP_PIN,
            steps_per_unit: DEFAULT_STEPS_PER_UNIT,
            ramp: RampTable::default(),
        }
    }
}

impl Default for ActuatorSettings {
    fn default() -> Self {
        Self {
            kind: ActuatorKind::Servo,
            hardware: DEFAULT_HARDWARE.to_string(),
            home_position: DEFAULT_HOME_POSITION,
            min_position: DEFAULT_MIN_POSITION,
            max_position: DEFAULT_MAX_POSITION,
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            servo: ServoSettings::default(),
            stepper: StepperSettings::default(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            camera: CameraSettings::default(),
            detection: DetectionSettings::default(),
            watchdog: WatchdogSettings::default(),
            mapper: MapperSettings::default(),
            actuator: ActuatorSettings::default(),
            fps_report_frames: DEFAULT_FPS_REPORT_FRAMES,
        }
    }
}

impl TrackerConfig {
    /// Load from the file named by `PAN_TRACKER_CONFIG` (if any), then apply
    /// environment overrides and validate.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PAN_TRACKER_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => TrackerConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let file: TrackerConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        let cfg = Self::from_file(file)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: TrackerConfigFile) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let kind = camera_file.kind.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            kind,
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            framerate: camera_file.framerate.unwrap_or(DEFAULT_CAMERA_FRAMERATE),
            orientation: Orientation {
                rotation: Rotation::from_degrees(camera_file.rotation.unwrap_or(0))?,
                hflip: camera_file.hflip.unwrap_or(false),
                vflip: camera_file.vflip.unwrap_or(false),
            },
            warmup: camera_file
                .warmup_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| kind.default_warmup()),
            restart_delay: Duration::from_millis(
                camera_file
                    .restart_delay_ms
                    .unwrap_or(DEFAULT_RESTART_DELAY_MS),
            ),
            first_frame_timeout: Duration::from_millis(
                camera_file
                    .first_frame_timeout_ms
                    .unwrap_or(DEFAULT_FIRST_FRAME_TIMEOUT_MS),
            ),
        };

        let detection_file = file.detection.unwrap_or_default();
        let detection = DetectionSettings {
            min_area: detection_file.min_area.unwrap_or(DEFAULT_MIN_AREA),
            threshold_sensitivity: detection_file
                .threshold_sensitivity
                .unwrap_or(DEFAULT_THRESHOLD_SENSITIVITY),
            blur_size: detection_file.blur_size.unwrap_or(DEFAULT_BLUR_SIZE),
            dilate_iterations: detection_file
                .dilate_iterations
                .unwrap_or(DEFAULT_DILATE_ITERATIONS),
        };

        let watchdog_file = file.watchdog.unwrap_or_default();
        let watchdog = WatchdogSettings {
            brightness_floor: watchdog_file
                .brightness_floor
                .unwrap_or(DEFAULT_BRIGHTNESS_FLOOR),
            black_duration: Duration::from_millis(
                watchdog_file
                    .black_duration_ms
                    .unwrap_or(DEFAULT_BLACK_DURATION_MS),
            ),
        };

        let mapper_file = file.mapper.unwrap_or_default();
        let mapper = MapperSettings {
            base_offset: mapper_file.base_offset.unwrap_or(DEFAULT_BASE_OFFSET),
            field_of_view: mapper_file.field_of_view.unwrap_or(DEFAULT_FIELD_OF_VIEW),
            min_deadband_pct: mapper_file
                .min_deadband_pct
                .unwrap_or(DEFAULT_MIN_DEADBAND_PCT),
            max_deadband_pct: mapper_file
                .max_deadband_pct
                .unwrap_or(DEFAULT_MAX_DEADBAND_PCT),
        };

        let actuator_file = file.actuator.unwrap_or_default();
        let servo_file = actuator_file.servo.unwrap_or_default();
        let stepper_file = actuator_file.stepper.unwrap_or_default();
        let ramp = match stepper_file.ramp {
            Some(entries) => RampTable::new(
                entries
                    .into_iter()
                    .map(|[frequency_hz, steps]| RampSegment {
                        frequency_hz,
                        steps,
                    })
                    .collect(),
            )?,
            None => RampTable::default(),
        };
        let actuator = ActuatorSettings {
            kind: actuator_file.kind.unwrap_or_default(),
            hardware: actuator_file
                .hardware
                .unwrap_or_else(|| DEFAULT_HARDWARE.to_string()),
            home_position: actuator_file.home_position.unwrap_or(DEFAULT_HOME_POSITION),
            min_position: actuator_file.min_position.unwrap_or(DEFAULT_MIN_POSITION),
            max_position: actuator_file.max_position.unwrap_or(DEFAULT_MAX_POSITION),
            idle_timeout: Duration::from_millis(
                actuator_file
                    .idle_timeout_ms
                    .unwrap_or(DEFAULT_IDLE_TIMEOUT_MS),
            ),
            servo: ServoSettings {
                pin: servo_file.pin.unwrap_or(DEFAULT_SERVO_PIN),
                sweep_delay: Duration::from_millis(
                    servo_file.sweep_delay_ms.unwrap_or(DEFAULT_SWEEP_DELAY_MS),
                ),
                pulse_us_per_unit: servo_file
                    .pulse_us_per_unit
                    .unwrap_or(DEFAULT_PULSE_US_PER_UNIT),
            },
            stepper: StepperSettings {
                dir_pin: stepper_file.dir_pin.unwrap_or(DEFAULT_DIR_PIN),
                step_pin: stepper_file.step_pin.unwrap_or(DEFAULT_STEP_PIN),
                steps_per_unit: stepper_file
                    .steps_per_unit
                    .unwrap_or(DEFAULT_STEPS_PER_UNIT),
                ramp,
            },
        };

        Ok(Self {
            camera,
            detection,
            watchdog,
            mapper,
            actuator,
            fps_report_frames: file
                .fps_report_frames
                .unwrap_or(DEFAULT_FPS_REPORT_FRAMES),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("PAN_TRACKER_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(hardware) = std::env::var("PAN_TRACKER_HARDWARE") {
            if !hardware.trim().is_empty() {
                self.actuator.hardware = hardware;
            }
        }
        if let Ok(kind) = std::env::var("PAN_TRACKER_ACTUATOR") {
            if !kind.trim().is_empty() {
                self.actuator.kind = ActuatorKind::parse(&kind)?;
            }
        }
        if let Ok(min_area) = std::env::var("PAN_TRACKER_MIN_AREA") {
            self.detection.min_area = min_area
                .trim()
                .parse()
                .map_err(|_| anyhow!("PAN_TRACKER_MIN_AREA must be a non-negative integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if camera.width == 0 || camera.height == 0 {
            return Err(anyhow!(
                "camera dimensions must be non-zero (got {}x{})",
                camera.width,
                camera.height
            ));
        }
        if camera.framerate == 0 {
            return Err(anyhow!("camera framerate must be >= 1"));
        }

        if self.detection.blur_size == 0 {
            return Err(anyhow!("detection blur_size must be >= 1"));
        }

        let mapper = &self.mapper;
        if !(0.0..=1.0).contains(&mapper.min_deadband_pct)
            || !(0.0..=1.0).contains(&mapper.max_deadband_pct)
            || mapper.min_deadband_pct >= mapper.max_deadband_pct
        {
            return Err(anyhow!(
                "deadband must satisfy 0 <= min < max <= 1 (got {} / {})",
                mapper.min_deadband_pct,
                mapper.max_deadband_pct
            ));
        }
        if !mapper.field_of_view.is_finite() || mapper.field_of_view <= 0.0 {
            return Err(anyhow!("mapper field_of_view must be a positive number"));
        }

        let actuator = &self.actuator;
        if actuator.min_position > actuator.max_position
            || actuator.home_position < actuator.min_position
            || actuator.home_position > actuator.max_position
        {
            return Err(anyhow!(
                "actuator positions must satisfy min <= home <= max (got {} <= {} <= {})",
                actuator.min_position,
                actuator.home_position,
                actuator.max_position
            ));
        }
        if actuator.hardware.trim().is_empty() {
            return Err(anyhow!("actuator hardware address must not be empty"));
        }
        if actuator.kind == ActuatorKind::Servo {
            let per_unit = i64::from(actuator.servo.pulse_us_per_unit);
            let low = i64::from(actuator.min_position) * per_unit;
            let high = i64::from(actuator.max_position) * per_unit;
            let (min_us, max_us) = SERVO_PULSE_RANGE_US;
            if low < i64::from(min_us) || high > i64::from(max_us) {
                return Err(anyhow!(
                    "servo pulse range {}..{}us falls outside {}..{}us",
                    low,
                    high,
                    min_us,
                    max_us
                ));
            }
        }
        if actuator.stepper.steps_per_unit == 0 {
            return Err(anyhow!("stepper steps_per_unit must be >= 1"));
        }
        if actuator.stepper.dir_pin == actuator.stepper.step_pin {
            return Err(anyhow!("stepper dir_pin and step_pin must differ"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<TrackerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let cfg = TrackerConfig::default();
        cfg.validate()?;
        assert_eq!(cfg.detection.min_area, 200);
        assert_eq!(cfg.actuator.home_position, 145);
        assert_eq!(cfg.camera.warmup, Duration::from_secs(4));
        Ok(())
    }

    #[test]
    fn module_camera_warms_up_faster() -> Result<()> {
        let cfg = TrackerConfig::from_toml("[camera]\nkind = \"module\"\n")?;
        assert_eq!(cfg.camera.kind, CameraKind::Module);
        assert_eq!(cfg.camera.warmup, Duration::from_secs(2));
        Ok(())
    }

    #[test]
    fn switching_kind_keeps_an_explicit_warmup() -> Result<()> {
        let mut cfg = TrackerConfig::default();
        cfg.camera.set_kind(CameraKind::Module);
        assert_eq!(cfg.camera.warmup, Duration::from_secs(2));

        let mut cfg = TrackerConfig::from_toml("[camera]\nwarmup_ms = 750\n")?;
        cfg.camera.set_kind(CameraKind::Module);
        assert_eq!(cfg.camera.kind, CameraKind::Module);
        assert_eq!(cfg.camera.warmup, Duration::from_millis(750));
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let cfg = TrackerConfig::from_toml(
            r#"
            [detection]
            min_area = 100

            [actuator]
            kind = "stepper"

            [actuator.stepper]
            ramp = [[100, 10], [200, 20]]
            "#,
        )?;
        assert_eq!(cfg.detection.min_area, 100);
        assert_eq!(cfg.detection.threshold_sensitivity, 25);
        assert_eq!(cfg.actuator.kind, ActuatorKind::Stepper);
        assert_eq!(cfg.actuator.stepper.ramp.steps().len(), 2);
        Ok(())
    }

    #[test]
    fn rejects_inverted_deadband() {
        let err = TrackerConfig::from_toml(
            "[mapper]\nmin_deadband_pct = 0.5\nmax_deadband_pct = 0.1\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("deadband"));
    }

    #[test]
    fn rejects_home_outside_range() {
        assert!(TrackerConfig::from_toml("[actuator]\nhome_position = 300\n").is_err());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_rotation() {
        assert!(TrackerConfig::from_toml("[camera]\nzoom = 2\n").is_err());
        assert!(TrackerConfig::from_toml("[camera]\nrotation = 45\n").is_err());
    }

    #[test]
    fn rejects_servo_pulses_out_of_range() {
        let err = TrackerConfig::from_toml("[actuator.servo]\npulse_us_per_unit = 20\n")
            .unwrap_err();
        assert!(err.to_string().contains("servo pulse range"));
    }

    #[test]
    fn kinds_parse_case_insensitively() -> Result<()> {
        assert_eq!(ActuatorKind::parse("Stepper")?, ActuatorKind::Stepper);
        assert_eq!(CameraKind::parse(" MODULE ")?, CameraKind::Module);
        assert!(ActuatorKind::parse("linear").is_err());
        Ok(())
    }
}
