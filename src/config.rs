// config.rs

use crate::errors::SignalError;
use crate::global_variables::{
    ACCIDENT_CLASS_ID, ALERT_JOURNAL_FILE, AMQP_URL, BASE_GREEN_SECS, CONFIDENCE_THRESHOLD,
    DATA_DIR, DETECTION_JOURNAL_FILE, GREEN_SECS_PER_VEHICLE, GREEN_TIMES_FILE, LANE_IMAGES,
    LANE_PINS, QUEUE_ACCIDENT_ALERTS, QUEUE_ACCIDENT_REPORTS, RED_DWELL_SECS, VEHICLE_CLASS_IDS,
    VEHICLE_COUNTS_FILE, YELLOW_DWELL_SECS,
};
use crate::models::LaneId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// GPIO pins of one signal head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanePins {
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    pub id: LaneId,
    /// Camera frame analysed during the detection pass.
    #[serde(default)]
    pub image: Option<PathBuf>,
    pub pins: LanePins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub base_green_secs: u64,
    pub multiplier_secs: u64,
    pub red_dwell_secs: u64,
    pub yellow_dwell_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_green_secs: BASE_GREEN_SECS,
            multiplier_secs: GREEN_SECS_PER_VEHICLE,
            red_dwell_secs: RED_DWELL_SECS,
            yellow_dwell_secs: YELLOW_DWELL_SECS,
        }
    }
}

impl TimingConfig {
    pub fn red_dwell(&self) -> Duration {
        Duration::from_secs(self.red_dwell_secs)
    }

    pub fn yellow_dwell(&self) -> Duration {
        Duration::from_secs(self.yellow_dwell_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub vehicle_class_ids: Vec<u32>,
    pub accident_class_id: u32,
    /// Detections must score strictly above this to count.
    pub confidence_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            vehicle_class_ids: VEHICLE_CLASS_IDS.to_vec(),
            accident_class_id: ACCIDENT_CLASS_ID,
            confidence_threshold: CONFIDENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub vehicle_counts_file: String,
    pub green_times_file: String,
    pub detection_journal_file: String,
    pub alert_journal_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            vehicle_counts_file: VEHICLE_COUNTS_FILE.to_string(),
            green_times_file: GREEN_TIMES_FILE.to_string(),
            detection_journal_file: DETECTION_JOURNAL_FILE.to_string(),
            alert_journal_file: ALERT_JOURNAL_FILE.to_string(),
        }
    }
}

impl StorageConfig {
    pub fn vehicle_counts_path(&self) -> PathBuf {
        self.data_dir.join(&self.vehicle_counts_file)
    }

    pub fn green_times_path(&self) -> PathBuf {
        self.data_dir.join(&self.green_times_file)
    }

    pub fn detection_journal_path(&self) -> PathBuf {
        self.data_dir.join(&self.detection_journal_file)
    }

    pub fn alert_journal_path(&self) -> PathBuf {
        self.data_dir.join(&self.alert_journal_file)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub destination_id: String,
    pub amqp_url: String,
    pub queue: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            destination_id: String::from("traffic-operations"),
            amqp_url: AMQP_URL.to_string(),
            queue: QUEUE_ACCIDENT_ALERTS.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccidentReportConfig {
    pub enabled: bool,
    pub amqp_url: String,
    pub queue: String,
}

impl Default for AccidentReportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            amqp_url: AMQP_URL.to_string(),
            queue: QUEUE_ACCIDENT_REPORTS.to_string(),
        }
    }
}

/// Everything the controller can be tuned with. Missing fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Lanes in cycle order.
    pub lanes: Vec<LaneConfig>,
    pub timing: TimingConfig,
    pub detection: DetectionConfig,
    pub storage: StorageConfig,
    pub alerts: AlertConfig,
    pub accident_reports: AccidentReportConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        let lanes = LANE_PINS
            .iter()
            .zip(LANE_IMAGES)
            .map(|(&(lane, [red, yellow, green]), image)| LaneConfig {
                id: LaneId(lane),
                image: Some(PathBuf::from(image)),
                pins: LanePins { red, yellow, green },
            })
            .collect();
        Self {
            lanes,
            timing: TimingConfig::default(),
            detection: DetectionConfig::default(),
            storage: StorageConfig::default(),
            alerts: AlertConfig::default(),
            accident_reports: AccidentReportConfig::default(),
        }
    }
}

impl SignalConfig {
    /// Reads a JSON config file and validates it.
    pub fn load(path: &Path) -> Result<Self, SignalError> {
        let contents = fs::read_to_string(path).map_err(|source| SignalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: SignalConfig = serde_json::from_str(&contents)
            .map_err(|e| SignalError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise validates and returns the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SignalError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn lane_ids(&self) -> Vec<LaneId> {
        self.lanes.iter().map(|lane| lane.id).collect()
    }

    pub fn lane(&self, id: LaneId) -> Option<&LaneConfig> {
        self.lanes.iter().find(|lane| lane.id == id)
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        if self.lanes.is_empty() {
            return Err(SignalError::Config("at least one lane is required".into()));
        }
        let mut seen_lanes = HashSet::new();
        let mut seen_pins = HashSet::new();
        for lane in &self.lanes {
            if !seen_lanes.insert(lane.id) {
                return Err(SignalError::Config(format!("{} is listed twice", lane.id)));
            }
            for pin in [lane.pins.red, lane.pins.yellow, lane.pins.green] {
                if !seen_pins.insert(pin) {
                    return Err(SignalError::Config(format!(
                        "gpio pin {} is assigned more than once",
                        pin
                    )));
                }
            }
        }
        if self.timing.base_green_secs == 0 {
            return Err(SignalError::Config("base_green_secs must be positive".into()));
        }
        if self.timing.red_dwell_secs == 0 || self.timing.yellow_dwell_secs == 0 {
            return Err(SignalError::Config(
                "red and yellow dwell times must be positive".into(),
            ));
        }
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SignalError::Config(format!(
                "confidence_threshold {} is outside [0, 1]",
                threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let config = SignalConfig::default();
        assert_eq!(
            config.lane_ids(),
            vec![LaneId(1), LaneId(2), LaneId(3), LaneId(4)]
        );
        assert_eq!(config.timing.base_green_secs, 10);
        assert_eq!(config.timing.multiplier_secs, 2);
        assert_eq!(config.timing.red_dwell(), Duration::from_secs(4));
        assert_eq!(config.timing.yellow_dwell(), Duration::from_secs(5));
        assert_eq!(config.detection.vehicle_class_ids, vec![2, 3, 5, 7]);
        assert_eq!(
            config.lane(LaneId(2)).map(|l| l.pins),
            Some(LanePins {
                red: 18,
                yellow: 23,
                green: 24
            })
        );
        assert_eq!(
            config.lane(LaneId(1)).and_then(|l| l.image.clone()),
            Some(PathBuf::from("Images/IMG_3/IMG_3.jpg"))
        );
        assert!(config.lanes.iter().all(|l| l.image.is_some()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: SignalConfig =
            serde_json::from_str(r#"{ "timing": { "base_green_secs": 15 } }"#).unwrap();
        assert_eq!(config.timing.base_green_secs, 15);
        assert_eq!(config.timing.multiplier_secs, 2);
        assert_eq!(config.lanes.len(), 4);
    }

    #[test]
    fn lanes_parse_from_text_ids() {
        let config: SignalConfig = serde_json::from_str(
            r#"{ "lanes": [
                { "id": "lane_2", "image": "north.jpg", "pins": { "red": 1, "yellow": 2, "green": 3 } },
                { "id": "lane_1", "pins": { "red": 4, "yellow": 5, "green": 6 } }
            ] }"#,
        )
        .unwrap();
        assert_eq!(config.lane_ids(), vec![LaneId(2), LaneId(1)]);
        assert_eq!(config.lanes[0].image, Some(PathBuf::from("north.jpg")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_configs() {
        let mut duplicate_lane = SignalConfig::default();
        duplicate_lane.lanes[1].id = LaneId(1);
        assert!(matches!(
            duplicate_lane.validate(),
            Err(SignalError::Config(_))
        ));

        let mut shared_pin = SignalConfig::default();
        shared_pin.lanes[1].pins.red = shared_pin.lanes[0].pins.green;
        assert!(shared_pin.validate().is_err());

        let mut zero_base = SignalConfig::default();
        zero_base.timing.base_green_secs = 0;
        assert!(zero_base.validate().is_err());

        let mut threshold = SignalConfig::default();
        threshold.detection.confidence_threshold = 1.5;
        assert!(threshold.validate().is_err());

        let no_lanes = SignalConfig {
            lanes: Vec::new(),
            ..SignalConfig::default()
        };
        assert!(no_lanes.validate().is_err());
    }
}
