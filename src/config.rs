// src/config.rs
// Tunable parameters for every AGV subsystem, loadable from YAML.
//
// Every section falls back to the calibrated defaults, so a config file only needs to
// name the values it overrides.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::navigation::map::Orientation;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be opened
    #[error("cannot read config {path}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// YAML did not match the schema
    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    /// Values parsed but make no sense
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Main configuration structure for the AGV
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgvConfig {
    /// Control loop / timer tick rate in Hz
    pub control_loop_hz: u32,
    /// Optional YAML map replacing the built-in competition map
    pub map_file: Option<PathBuf>,
    /// Line following and junction handling
    pub motion: MotionConfig,
    /// Route execution and bay search
    pub navigation: NavigationConfig,
    /// Servo timing and calibration
    pub grabber: GrabberConfig,
    /// Reel classification
    pub resistance: ResistanceConfig,
    /// Bay occupancy sensing
    pub occupancy: OccupancyConfig,
    /// Button and indicator LEDs
    pub panel: PanelConfig,
    /// Top-level mission sequencing
    pub mission: MissionConfig,
}

/// Motion controller parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Default drive power, percent
    pub robot_speed: i32,
    /// Duty trim for the left motor, percent
    pub left_motor_bias: i32,
    /// Duty trim for the right motor, percent
    pub right_motor_bias: i32,
    /// Output clamp of the PD controller
    pub max_pd_correction: f32,
    /// Proportional gain
    pub kp: f32,
    /// Integral gain
    pub ki: f32,
    /// Derivative gain
    pub kd: f32,
    /// Gain scale applied to Kp/Kd while reversing
    pub reverse_gain_scale: f32,
    /// Moving-average window per line sensor
    pub filter_window: usize,
    /// Averaged value above which a sensor counts as on the line
    pub filter_threshold: f32,
    /// Forward crawl after a junction edge before turning, ms
    pub junction_forward_ms: u32,
    /// Grace before looking for the line after going straight, ms
    pub straight_grace_ms: u32,
    /// Grace before looking for the line after a turn, ms
    pub turn_grace_ms: u32,
    /// Crawl time multiplier when approaching a junction in reverse
    pub reverse_grace_multiplier: f32,
    /// U-turns must also exceed turn grace times this before centring counts
    pub u_turn_grace_multiplier: f32,
}

/// Navigation orchestrator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Node the robot starts on
    pub start_node: String,
    /// Heading at power-on
    pub start_orientation: Orientation,
    /// Forward creep into a dropoff bay, ms
    pub dropoff_forward_ms: u32,
    /// Power used for the creep into a bay
    pub dropoff_creep_power: i32,
    /// Fault if motion makes no progress for this long; `None` retries forever
    pub stall_timeout_ms: Option<u32>,
    /// Routes starting at these nodes spin U-turns the other way
    pub opposite_u_turn_nodes: Vec<String>,
}

/// Pulse widths (µs) for each named servo position
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoCalibration {
    pub jaw_open: u16,
    pub jaw_closed: u16,
    pub lifter_down: u16,
    pub lifter_mid: u16,
    pub lifter_up: u16,
    pub mid: u16,
}

/// Grabber parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabberConfig {
    /// Time after a position command before a servo is assumed in position, ms
    pub servo_settle_ms: u32,
    /// Position calibration
    pub calibration: ServoCalibration,
}

/// Resistance classifier parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceConfig {
    /// Readings averaged per classification
    pub sample_count: usize,
    /// Mean above this is reel 1
    pub reel1_threshold: u16,
    /// Mean above this is reel 3
    pub reel3_threshold: u16,
    /// Mean above this is reel 0, anything lower is reel 2
    pub reel0_threshold: u16,
    /// Nominal reel 2 level, kept for calibration reference
    pub reel2_threshold: u16,
    /// Readings above this are treated as an open circuit and discarded
    pub open_circuit_value: u16,
    /// Discarded readings tolerated before defaulting to reel 0
    pub fallback_count: u32,
}

/// Bay occupancy sampler parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyConfig {
    /// Readings above this are saturated and discarded, mm
    pub saturation_ceiling_mm: u16,
    /// Valid readings wanted per decision
    pub target_valid: u32,
    /// Attempts allowed per decision
    pub max_attempts: u32,
    /// Value substituted for zero readings, mm
    pub far_value_mm: u16,
    /// Mean below this means the bay is occupied, mm
    pub occupied_threshold_mm: u16,
}

/// Operator panel parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Presses inside this window after an accepted press are ignored, ms
    pub button_debounce_ms: u32,
    /// Strobe step interval, ms
    pub strobe_interval_ms: u32,
    /// Flash toggle interval, ms
    pub flash_interval_ms: u32,
    /// A pattern idle longer than this restarts from the beginning, ms
    pub pattern_reset_ms: u32,
}

/// Mission parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Run-time budget, ms
    pub run_time_ms: u32,
    /// Creep into the start box at the end of the run, ms
    pub end_forward_ms: u32,
    /// Power for the final creep
    pub end_forward_power: i32,
    /// Pre-assigned first pickup bay
    pub first_pickup: String,
    /// Node to return to when time runs out
    pub home_node: String,
    /// Lifter is lowered this long after leaving a dropoff, ms
    pub lifter_reset_grace_ms: u32,
}

impl Default for AgvConfig {
    fn default() -> Self {
        AgvConfig {
            control_loop_hz: 200,
            map_file: None,
            motion: MotionConfig::default(),
            navigation: NavigationConfig::default(),
            grabber: GrabberConfig::default(),
            resistance: ResistanceConfig::default(),
            occupancy: OccupancyConfig::default(),
            panel: PanelConfig::default(),
            mission: MissionConfig::default(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            robot_speed: 95,
            left_motor_bias: 0,
            right_motor_bias: 0,
            max_pd_correction: 80.0,
            kp: 200.0,
            ki: 0.0,
            kd: 0.0,
            reverse_gain_scale: 0.25,
            filter_window: 5,
            filter_threshold: 0.5,
            junction_forward_ms: 135,
            straight_grace_ms: 150,
            turn_grace_ms: 450,
            reverse_grace_multiplier: 1.25,
            u_turn_grace_multiplier: 2.5,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            start_node: "START_BOX".to_string(),
            start_orientation: Orientation::N,
            dropoff_forward_ms: 1550,
            dropoff_creep_power: 60,
            stall_timeout_ms: Some(20_000),
            opposite_u_turn_nodes: vec!["P4".to_string()],
        }
    }
}

impl Default for ServoCalibration {
    fn default() -> Self {
        ServoCalibration {
            jaw_open: 1700,
            jaw_closed: 1350,
            lifter_down: 1300,
            lifter_mid: 1450,
            lifter_up: 1550,
            mid: 1500,
        }
    }
}

impl Default for GrabberConfig {
    fn default() -> Self {
        GrabberConfig {
            servo_settle_ms: 500,
            calibration: ServoCalibration::default(),
        }
    }
}

impl Default for ResistanceConfig {
    fn default() -> Self {
        ResistanceConfig {
            sample_count: 5,
            reel1_threshold: 51_000,
            reel3_threshold: 48_500,
            reel0_threshold: 25_000,
            reel2_threshold: 3_600,
            open_circuit_value: 53_000,
            fallback_count: 5,
        }
    }
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        OccupancyConfig {
            saturation_ceiling_mm: 8_000,
            target_valid: 5,
            max_attempts: 20,
            far_value_mm: 600,
            occupied_threshold_mm: 300,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            button_debounce_ms: 1_000,
            strobe_interval_ms: 150,
            flash_interval_ms: 250,
            pattern_reset_ms: 1_000,
        }
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        MissionConfig {
            run_time_ms: 360_000,
            end_forward_ms: 500,
            end_forward_power: 50,
            first_pickup: "P2".to_string(),
            home_node: "S".to_string(),
            lifter_reset_grace_ms: 5_000,
        }
    }
}

impl AgvConfig {
    /// Load and validate a YAML config file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AgvConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AgvConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Control loop period in milliseconds
    pub fn control_period_ms(&self) -> u64 {
        1000 / u64::from(self.control_loop_hz.max(1))
    }

    /// Reject values the state machines cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_loop_hz == 0 {
            return Err(ConfigError::Invalid("control_loop_hz must be positive".into()));
        }
        if self.motion.filter_window == 0 {
            return Err(ConfigError::Invalid("motion.filter_window must be positive".into()));
        }
        if self.resistance.sample_count == 0 {
            return Err(ConfigError::Invalid(
                "resistance.sample_count must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AgvConfig::from_yaml_str(
            "control_loop_hz: 100\nmotion:\n  kp: 50.0\nmission:\n  first_pickup: P3\n",
        )
        .unwrap();
        assert_eq!(config.control_loop_hz, 100);
        assert_eq!(config.motion.kp, 50.0);
        assert_eq!(config.motion.robot_speed, 95);
        assert_eq!(config.mission.first_pickup, "P3");
        assert_eq!(config.mission.home_node, "S");
        assert_eq!(config.control_period_ms(), 10);
    }

    #[test]
    fn stall_timeout_can_be_disabled() {
        let config = AgvConfig::from_yaml_str("navigation:\n  stall_timeout_ms: null\n").unwrap();
        assert_eq!(config.navigation.stall_timeout_ms, None);
    }

    #[test]
    fn zero_rate_rejected() {
        let err = AgvConfig::from_yaml_str("control_loop_hz: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn unknown_orientation_is_a_parse_error() {
        let err = AgvConfig::from_yaml_str("navigation:\n  start_orientation: Q\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
