// demand_analysis.rs

use crate::config::{DetectionConfig, SignalConfig};
use crate::control_system::signal_policy::{LinearDemandPolicy, SignalPolicy, VehicleCounts};
use crate::demand_store::{DemandSnapshot, DemandStore};
use crate::errors::SignalError;
use crate::flow_analyzer::detector::Detector;
use crate::models::LaneId;
use crate::monitoring::accident_monitor::AccidentMonitor;
use crate::monitoring::journal::log_detection_pass;
use crate::shared_data::Detection;

/// What the detector saw on one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaneObservation {
    pub lane: LaneId,
    pub vehicle_count: u32,
    pub accident: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionSummary {
    /// In cycle order.
    pub observations: Vec<LaneObservation>,
    pub snapshot: DemandSnapshot,
    pub accident_lane: Option<LaneId>,
}

/// Counts confident vehicle detections and checks for a confident accident detection.
pub fn analyze_detections(
    lane: LaneId,
    detections: &[Detection],
    config: &DetectionConfig,
) -> LaneObservation {
    let confident = detections
        .iter()
        .filter(|d| d.confidence > config.confidence_threshold);
    let mut vehicle_count = 0u32;
    let mut accident = false;
    for detection in confident {
        if detection.class_id == config.accident_class_id {
            accident = true;
        }
        if config.vehicle_class_ids.contains(&detection.class_id) {
            vehicle_count += 1;
        }
    }
    LaneObservation {
        lane,
        vehicle_count,
        accident,
    }
}

/// Runs the detector over every configured lane image, derives green times and updates
/// the accident monitor. A lane whose image cannot be analysed is counted as empty.
pub fn run_detection_pass<D, P>(
    detector: &mut D,
    config: &SignalConfig,
    policy: &P,
    monitor: &AccidentMonitor,
) -> Result<DetectionSummary, SignalError>
where
    D: Detector + ?Sized,
    P: SignalPolicy + ?Sized,
{
    let mut observations = Vec::with_capacity(config.lanes.len());
    for lane in &config.lanes {
        let detections = match &lane.image {
            Some(image) => match detector.detect(image) {
                Ok(detections) => detections,
                Err(e) => {
                    log::error!("{}: {}; counting no vehicles", lane.id, e);
                    Vec::new()
                }
            },
            None => {
                log::warn!("No image configured for {}; counting no vehicles", lane.id);
                Vec::new()
            }
        };
        let observation = analyze_detections(lane.id, &detections, &config.detection);
        log::info!(
            "{}: {} vehicles{}",
            lane.id,
            observation.vehicle_count,
            if observation.accident { ", accident detected" } else { "" }
        );
        observations.push(observation);
    }

    let counts: VehicleCounts = observations
        .iter()
        .map(|o| (o.lane, i64::from(o.vehicle_count)))
        .collect();
    let green_times = policy.compute_green_times(&counts, &config.lane_ids())?;

    let accident_lane = observations
        .iter()
        .rev()
        .find(|o| o.accident)
        .map(|o| o.lane);
    match accident_lane {
        Some(lane) => {
            monitor.report(lane);
        }
        None => {
            monitor.clear();
        }
    }

    Ok(DetectionSummary {
        observations,
        snapshot: DemandSnapshot {
            counts,
            green_times,
        },
        accident_lane,
    })
}

/// Detection pass with the configured linear policy, persisted through the demand store
/// and journaled. Journal failures are logged, never fatal.
pub fn run_and_record_detection_pass<D>(
    detector: &mut D,
    config: &SignalConfig,
    monitor: &AccidentMonitor,
) -> Result<DetectionSummary, SignalError>
where
    D: Detector + ?Sized,
{
    let policy = LinearDemandPolicy::from_timing(&config.timing);
    let summary = run_detection_pass(detector, config, &policy, monitor)?;
    DemandStore::from_config(&config.storage).persist(&summary.snapshot)?;
    let journal = config.storage.detection_journal_path();
    if let Err(e) = log_detection_pass(&journal, &summary) {
        log::error!("Error logging detection pass to {}: {}", journal.display(), e);
    }
    Ok(summary)
}
